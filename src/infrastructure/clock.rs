//! Wall-clock helpers

use std::time::SystemTime;

/// Current Unix time in milliseconds (0 if the clock is before the epoch)
#[inline]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_advances() {
        let a = now_millis();
        let b = now_millis();
        assert!(a > 0);
        assert!(b >= a);
    }
}
