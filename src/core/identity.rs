//! Node identity and monitoring names
//!
//! A node is identified by the owning client's app name, server group and
//! client id, plus the host it talks to. Combined with the connect time this
//! yields a monitoring name that is unique per reconnect epoch.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Domain prefix used when none is configured
pub const DEFAULT_MONITOR_DOMAIN: &str = "com.netflix.evcache";

/// Characters that force a name value to be quoted
const RESERVED: &[char] = &[',', '=', ':', '*', '?', '"', '\\', '\n'];

/// Server group (shard/cluster) a node belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerGroup {
    pub zone: String,
    pub name: String,
}

impl ServerGroup {
    pub fn new(zone: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Key/value label attached to a node for metric dimensioning
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Immutable identity of a node
///
/// Cheap to clone; strings are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    app_name: Arc<str>,
    server_group: ServerGroup,
    node_id: u32,
    host_name: Arc<str>,
    tags: Arc<[Tag]>,
}

impl NodeIdentity {
    /// Build an identity for a connection to `addr`
    ///
    /// The host name is the textual form of the resolved IP. Use
    /// [`NodeIdentity::with_host_name`] when a DNS name is already known.
    pub fn new(
        app_name: impl Into<String>,
        server_group: ServerGroup,
        node_id: u32,
        addr: SocketAddr,
    ) -> Self {
        let app_name: String = app_name.into();
        Self {
            app_name: Arc::from(app_name),
            server_group,
            node_id,
            host_name: Arc::from(addr.ip().to_string()),
            tags: Arc::from(Vec::new()),
        }
    }

    /// Override the host name derived from the socket address
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        let host_name: String = host_name.into();
        self.host_name = Arc::from(host_name);
        self
    }

    /// Attach metric tags
    pub fn with_tags(mut self, mut tags: Vec<Tag>) -> Self {
        tags.sort();
        tags.dedup();
        self.tags = Arc::from(tags);
        self
    }

    #[inline]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    #[inline]
    pub fn server_group(&self) -> &ServerGroup {
        &self.server_group
    }

    #[inline]
    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    #[inline]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    #[inline]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

/// Error for a monitoring name that cannot be rendered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid monitor name component {component}: {value:?}")]
pub struct InvalidMonitorName {
    pub component: &'static str,
    pub value: String,
}

/// Monitoring name of one node for one connect epoch
///
/// Format:
/// `{domain}:Group={app},SubGroup=pool,SubSubGroup={group},SubSubSubGroup={id},SubSubSubSubGroup={host}_{connect_time}`
///
/// Values holding a reserved character (an IPv6 host, say) are written as a
/// quoted value with `\\`, `"`, `*`, `?` and newline escaped. The domain
/// cannot be quoted and must be free of reserved characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorName(String);

impl MonitorName {
    /// Render the name for `identity` at `connect_time` (epoch millis)
    pub fn render(
        domain: &str,
        identity: &NodeIdentity,
        connect_time: u64,
    ) -> Result<Self, InvalidMonitorName> {
        if domain.is_empty() || domain.contains(RESERVED) {
            return Err(InvalidMonitorName {
                component: "domain",
                value: domain.to_string(),
            });
        }
        check_component("app_name", identity.app_name())?;
        check_component("server_group", &identity.server_group().name)?;
        check_component("host_name", identity.host_name())?;

        let endpoint = format!("{}_{}", identity.host_name(), connect_time);
        Ok(Self(format!(
            "{}:Group={},SubGroup=pool,SubSubGroup={},SubSubSubGroup={},SubSubSubSubGroup={}",
            domain,
            quote(identity.app_name()),
            quote(&identity.server_group().name),
            identity.node_id(),
            quote(&endpoint),
        )))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonitorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MonitorName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn check_component(component: &'static str, value: &str) -> Result<(), InvalidMonitorName> {
    if value.is_empty() {
        return Err(InvalidMonitorName {
            component,
            value: String::new(),
        });
    }
    Ok(())
}

/// Quote a value if it holds a reserved character, otherwise pass it through
fn quote(value: &str) -> Cow<'_, str> {
    if !value.contains(RESERVED) {
        return Cow::Borrowed(value);
    }

    let mut quoted = String::with_capacity(value.len() + 8);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' | '*' | '?' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    Cow::Owned(quoted)
}
