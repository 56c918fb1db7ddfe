//! Service URLs: the address + parameter bag used for exporters, refers,
//! candidate nodes and the pin-point routing attachment.
//!
//! Accepted forms are `protocol://host:port/path?k=v&k2=v2` and bare
//! `host:port`, in which case a default protocol is supplied by the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use url::{Host, ParseError, Url};

/// Parameter key carrying the filter black/white list
pub const FILTER_OPTION: &str = "filter";
/// Parameter key carrying the per-service concurrency cap
pub const CONCURRENCY_OPTION: &str = "concurrency";
/// Parameter key naming the route strategy of a refer
pub const ROUTE_OPTION: &str = "route";

/// Error while parsing a service URL
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty url")]
    Empty,
    #[error("missing host in url: {0}")]
    MissingHost(String),
    #[error("invalid port in url: {0}")]
    InvalidPort(String),
    #[error("malformed url {url}: {reason}")]
    Invalid { url: String, reason: String },
}

/// Parsed service URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUrl {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

impl ServiceUrl {
    /// Create a URL without parameters. A bracketed IPv6 host is unwrapped.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            Some(inner) => inner.to_string(),
            None => host,
        };
        Self {
            protocol: protocol.into(),
            host,
            port,
            path: String::new(),
            params: BTreeMap::new(),
        }
    }

    /// Builder: set the path (usually the interface name)
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Builder: add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// URL of a socket address, e.g. a connection peer
    pub fn from_socket_addr(protocol: impl Into<String>, addr: SocketAddr) -> Self {
        Self::new(protocol, addr.ip().to_string(), addr.port())
    }

    /// Parse `text`, using `default_protocol` when no scheme is present.
    ///
    /// IPv6 hosts are stored without brackets, the same form a `SocketAddr`
    /// prints its address in. Query values are percent-decoded.
    pub fn parse(text: &str, default_protocol: &str) -> Result<Self, UrlError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(UrlError::Empty);
        }

        let parsed = if text.contains("://") {
            Url::parse(text)
        } else {
            Url::parse(&format!("{}://{}", default_protocol, text))
        }
        .map_err(|e| match e {
            ParseError::EmptyHost => UrlError::MissingHost(text.to_string()),
            ParseError::InvalidPort => UrlError::InvalidPort(text.to_string()),
            other => UrlError::Invalid {
                url: text.to_string(),
                reason: other.to_string(),
            },
        })?;

        let host = match parsed.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(UrlError::MissingHost(text.to_string())),
        };
        let params = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            protocol: parsed.scheme().to_string(),
            host,
            port: parsed.port_or_known_default().unwrap_or(0),
            path: parsed.path().trim_start_matches('/').to_string(),
            params,
        })
    }

    /// String parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// String parameter with default
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Numeric parameter, `default` when absent or unparsable
    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// `host:port`, with IPv6 hosts in brackets
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.address())?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(f, "{}{}={}", sep, k, v)?;
            sep = '&';
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let url = ServiceUrl::parse(
            "joy://10.0.0.1:22000/com.x.Foo?alias=v1&filter=-limiter",
            "joy",
        )
        .unwrap();
        assert_eq!(url.protocol, "joy");
        assert_eq!(url.host, "10.0.0.1");
        assert_eq!(url.port, 22000);
        assert_eq!(url.path, "com.x.Foo");
        assert_eq!(url.get("alias"), Some("v1"));
        assert_eq!(url.get(FILTER_OPTION), Some("-limiter"));
    }

    #[test]
    fn test_parse_bare_address_uses_default_protocol() {
        let url = ServiceUrl::parse("192.168.1.7:8000", "joy").unwrap();
        assert_eq!(url.protocol, "joy");
        assert_eq!(url.address(), "192.168.1.7:8000");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ServiceUrl::parse("  ", "joy"), Err(UrlError::Empty));
        assert!(matches!(
            ServiceUrl::parse("host:notaport", "joy"),
            Err(UrlError::InvalidPort(_))
        ));
        assert!(matches!(
            ServiceUrl::parse("joy://:80", "joy"),
            Err(UrlError::MissingHost(_))
        ));
    }

    #[test]
    fn test_ipv6_host_matches_socket_addr_form() {
        let parsed = ServiceUrl::parse("joy://[::1]:22000", "joy").unwrap();
        let peer = ServiceUrl::from_socket_addr("joy", "[::1]:22000".parse().unwrap());
        assert_eq!(parsed.host, "::1");
        assert_eq!(parsed.host, peer.host);
        assert_eq!(parsed.port, peer.port);
        assert_eq!(parsed.address(), "[::1]:22000");
        assert_eq!(ServiceUrl::new("joy", "[::1]", 1).host, "::1");
    }

    #[test]
    fn test_ipv6_without_port() {
        let url = ServiceUrl::parse("[fe80::2]", "joy").unwrap();
        assert_eq!(url.host, "fe80::2");
        assert_eq!(url.port, 0);
    }

    #[test]
    fn test_query_values_are_decoded() {
        let url = ServiceUrl::parse("joy://h:1/com.x.Foo?filter=-limiter%2Ctimeout&alias=a%20b", "joy")
            .unwrap();
        assert_eq!(url.get(FILTER_OPTION), Some("-limiter,timeout"));
        assert_eq!(url.get("alias"), Some("a b"));
    }

    #[test]
    fn test_numeric_param_default() {
        let url = ServiceUrl::new("joy", "h", 1).with_param(CONCURRENCY_OPTION, "x");
        assert_eq!(url.get_u32(CONCURRENCY_OPTION, 7), 7);
        assert_eq!(url.get_u32("missing", 3), 3);
    }

    #[test]
    fn test_display() {
        let url = ServiceUrl::new("joy", "h", 1)
            .with_path("com.x.Foo")
            .with_param("a", "1");
        assert_eq!(url.to_string(), "joy://h:1/com.x.Foo?a=1");
    }
}
