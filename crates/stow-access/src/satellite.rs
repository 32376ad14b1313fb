//! Satellite address parsing.

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::error::{ScopeError, ScopeResult};

/// Where a grant's metadata and objects live.
///
/// Accepted forms are `[node-id@]host:port`, an `http(s)://` gateway URL, or a
/// `file://` directory holding one sub-directory per bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatelliteAddress {
    /// A network node, reached through its HTTPS gateway.
    Node {
        id: Option<String>,
        host: String,
        port: u16,
    },
    /// An explicit gateway URL.
    Gateway(Url),
    /// A local directory.
    Local(PathBuf),
}

impl SatelliteAddress {
    /// Parses `address`, rejecting anything without a usable host or path.
    pub fn parse(address: &str) -> ScopeResult<Self> {
        let address = address.trim();
        let invalid = |reason: &str| ScopeError::InvalidSatellite {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        if address.is_empty() {
            return Err(invalid("address is empty"));
        }

        if address.contains("://") {
            let url = Url::parse(address).map_err(|e| invalid(&e.to_string()))?;
            return match url.scheme() {
                "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => {
                    Ok(Self::Gateway(url))
                }
                "http" | "https" => Err(invalid("missing host")),
                "file" => url
                    .to_file_path()
                    .map(Self::Local)
                    .map_err(|()| invalid("not an absolute file path")),
                other => Err(invalid(&format!("unsupported scheme '{other}'"))),
            };
        }

        let (id, host_port) = match address.split_once('@') {
            Some((id, rest)) if !id.is_empty() => (Some(id.to_string()), rest),
            Some(_) => return Err(invalid("empty node id")),
            None => (None, address),
        };
        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse().map_err(|_| invalid("invalid port"))?;

        Ok(Self::Node {
            id,
            host: host.to_string(),
            port,
        })
    }

    /// Returns the HTTPS endpoint for network addresses.
    pub fn endpoint(&self) -> Option<String> {
        match self {
            Self::Node { host, port, .. } => Some(format!("https://{host}:{port}")),
            Self::Gateway(url) => Some(url.as_str().trim_end_matches('/').to_string()),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for SatelliteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node {
                id: Some(id),
                host,
                port,
            } => write!(f, "{id}@{host}:{port}"),
            Self::Node { id: None, host, port } => write!(f, "{host}:{port}"),
            Self::Gateway(url) => f.write_str(url.as_str()),
            Self::Local(path) => write!(f, "file://{}", path.display()),
        }
    }
}
