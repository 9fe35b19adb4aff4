//! Same-origin admission check for websocket upgrades.
//!
//! Browsers do not apply the same-origin policy to websocket handshakes, so a
//! page on any site can open a socket to this server with the user's cookies
//! attached (cross-site websocket hijacking, RFC 6455 §1.3 and §10.2). Every
//! upgrade request is therefore checked against an explicit allow-list before
//! it may join the hub.

use std::fmt;

use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, Uri};

/// A host/port pair an `Origin` header must match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedOrigin {
    pub host: String,
    pub port: u16,
}

impl AllowedOrigin {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for AllowedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Fail-closed `Origin` validator.
#[derive(Debug, Clone)]
pub struct OriginGate {
    allowed: Vec<AllowedOrigin>,
}

impl OriginGate {
    pub fn new(allowed: Vec<AllowedOrigin>) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> &[AllowedOrigin] {
        &self.allowed
    }

    /// Decide admission from the raw `Origin` header values of a request.
    ///
    /// Exactly one value must be present, it must parse as an absolute URI
    /// with a host and an explicit port, and that (host, port) pair must be
    /// on the allow-list. Host comparison is exact and case-sensitive.
    pub fn admit<I, S>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = values.into_iter();
        let (Some(origin), None) = (values.next(), values.next()) else {
            return false;
        };
        self.origin_matches(origin.as_ref())
    }

    /// [`OriginGate::admit`] over every `Origin` header in `headers`.
    ///
    /// A value that is not visible ASCII counts as a missing origin.
    pub fn admit_headers(&self, headers: &HeaderMap) -> bool {
        let mut values = headers.get_all(ORIGIN).iter();
        let (Some(value), None) = (values.next(), values.next()) else {
            return false;
        };
        value
            .to_str()
            .is_ok_and(|origin| self.origin_matches(origin))
    }

    fn origin_matches(&self, origin: &str) -> bool {
        let Ok(uri) = origin.parse::<Uri>() else {
            return false;
        };
        if uri.scheme().is_none() {
            return false;
        }
        let (Some(host), Some(port)) = (uri.host(), uri.port_u16()) else {
            return false;
        };
        self.allowed
            .iter()
            .any(|allowed| allowed.host == host && allowed.port == port)
    }
}

impl Default for OriginGate {
    fn default() -> Self {
        Self::new(crate::config::Config::default().allowed_origins)
    }
}
