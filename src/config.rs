//! Listening configuration

use crate::errors::ServerError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Where and for whom the server listens.
///
/// Constructed once by the application and handed to
/// [`ServerBuilder::config`](crate::ServerBuilder::config); the server owns it
/// for as long as it listens.
///
/// # Examples
///
/// ```
/// use simplehttp::{Config, HostPolicy};
///
/// let config = Config {
///     host_name: Some("lamp.local".into()),
///     port: "http".into(),
///     append_slashes: true,
///     ..Config::default()
/// };
/// assert_eq!(config.host_policy, HostPolicy::Enforce);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Host name this server answers for (default: `None`, any host).
    ///
    /// Compared against the request's `Host` header according to `host_policy`.
    pub host_name: Option<String>,

    /// What to do with a request for another host (default: [`HostPolicy::Enforce`]).
    pub host_policy: HostPolicy,

    /// Port number or service name (default: `"80"`).
    ///
    /// Recognized service names: `http` (80), `http-alt` (8080), `https` (443).
    pub port: String,

    /// Local address to bind (default: `0.0.0.0`).
    pub bind_addr: IpAddr,

    /// Ignore exactly one trailing `/` of the request path before route
    /// matching (default: `false`).
    pub append_slashes: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_name: None,
            host_policy: HostPolicy::Enforce,
            port: "80".into(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            append_slashes: false,

            _priv: (),
        }
    }
}

/// Treatment of a `Host` header that does not match [`Config::host_name`]
///
/// Requests without a `Host` header are always accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPolicy {
    /// Answer `404 Not Found` without running any handler.
    Enforce,
    /// Log the mismatch and serve the request anyway.
    Advisory,
}

impl Config {
    /// Socket address built from `bind_addr` and the resolved `port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(SocketAddr::new(self.bind_addr, resolve_port(&self.port)?))
    }

    #[inline]
    pub(crate) fn host_filter(&self) -> Option<HostFilter> {
        self.host_name.as_ref().map(|name| HostFilter {
            name: name.as_str().into(),
            policy: self.host_policy,
        })
    }
}

fn resolve_port(port: &str) -> Result<u16, ServerError> {
    if let Ok(number) = port.parse::<u16>() {
        return Ok(number);
    }

    match port {
        "http" | "www" => Ok(80),
        "http-alt" => Ok(8080),
        "https" => Ok(443),
        other => Err(ServerError::UnknownService(other.to_string())),
    }
}

/// Host check handed to each connection's parser.
#[derive(Debug, Clone)]
pub(crate) struct HostFilter {
    pub(crate) name: Box<str>,
    pub(crate) policy: HostPolicy,
}

impl HostFilter {
    /// Compares a `Host` header value, ignoring case and any `:port` suffix.
    pub(crate) fn matches(&self, host: &str) -> bool {
        let host = host.trim_end();
        let without_port = match host.rsplit_once(':') {
            // `[::1]:80` style literals keep their brackets
            Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        };

        without_port.eq_ignore_ascii_case(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports() {
        #[rustfmt::skip]
        let cases = [
            ("80",        Some(80)),
            ("8080",      Some(8080)),
            ("0",         Some(0)),
            ("http",      Some(80)),
            ("http-alt",  Some(8080)),
            ("https",     Some(443)),
            ("gopher",    None),
            ("70000",     None),
            ("",          None),
        ];

        for (port, expected) in cases {
            match expected {
                Some(number) => assert_eq!(resolve_port(port).unwrap(), number),
                None => assert!(matches!(
                    resolve_port(port),
                    Err(ServerError::UnknownService(name)) if name == port
                )),
            }
        }

        let config = Config {
            port: "http".into(),
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..Config::default()
        };
        assert_eq!(config.socket_addr().unwrap(), "127.0.0.1:80".parse().unwrap());
    }

    #[test]
    fn host_matching() {
        let filter = HostFilter {
            name: "lamp.local".into(),
            policy: HostPolicy::Enforce,
        };

        #[rustfmt::skip]
        let cases = [
            ("lamp.local",       true),
            ("LAMP.local",       true),
            ("lamp.local:80",    true),
            ("lamp.local:8080",  true),
            ("lamp.local ",      true),
            ("lamp.localx",      false),
            ("evil.local",       false),
            ("lamp.local:x",     false),
            ("",                 false),
        ];

        for (host, expected) in cases {
            assert_eq!(filter.matches(host), expected, "{host}");
        }
    }

    #[test]
    fn host_filter_from_config() {
        assert!(Config::default().host_filter().is_none());

        let config = Config {
            host_name: Some("lamp.local".into()),
            host_policy: HostPolicy::Advisory,
            ..Config::default()
        };
        let filter = config.host_filter().unwrap();
        assert_eq!(&*filter.name, "lamp.local");
        assert_eq!(filter.policy, HostPolicy::Advisory);
    }
}
