//! NMDC hub address helpers.

use url::Url;

use crate::error::{DcError, Result};

/// URL scheme for the NMDC protocol.
pub const SCHEME_NMDC: &str = "dchub";
/// URL scheme for NMDC over TLS.
pub const SCHEME_NMDCS: &str = "nmdcs";
/// Default port for client-hub connections.
pub const DEFAULT_PORT: u16 = 411;

/// Parses an NMDC address as a URL, assuming `dchub://` when no scheme is
/// set.
pub fn parse_addr(addr: &str) -> Result<Url> {
    let with_scheme;
    let addr = if addr.contains("://") {
        addr
    } else {
        with_scheme = format!("{}://{}", SCHEME_NMDC, addr);
        &with_scheme
    };
    let u = Url::parse(addr).map_err(|e| DcError::protocol(format!("invalid address: {}", e)))?;
    if u.scheme() != SCHEME_NMDC && u.scheme() != SCHEME_NMDCS {
        return Err(DcError::protocol(format!(
            "unsupported protocol: {:?}",
            u.scheme()
        )));
    }
    Ok(u)
}

/// Parses and normalizes the address to `scheme://host[:port]` form.
pub fn normalize_addr(addr: &str) -> Result<String> {
    let u = parse_addr(addr)?;
    let host = u
        .host_str()
        .ok_or_else(|| DcError::protocol(format!("no hostname in address: {:?}", addr)))?;
    Ok(match u.port() {
        Some(port) => format!("{}://{}:{}", u.scheme(), host, port),
        None => format!("{}://{}", u.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_assumed() {
        let u = parse_addr("example.org:411").unwrap();
        assert_eq!(u.scheme(), SCHEME_NMDC);
        assert_eq!(u.host_str(), Some("example.org"));
        assert_eq!(u.port(), Some(411));
    }

    #[test]
    fn test_secure_scheme() {
        let u = parse_addr("nmdcs://example.org").unwrap();
        assert_eq!(u.scheme(), SCHEME_NMDCS);
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(parse_addr("http://example.org").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize_addr("example.org:411/some/path").unwrap(),
            "dchub://example.org:411"
        );
        assert_eq!(
            normalize_addr("dchub://example.org").unwrap(),
            "dchub://example.org"
        );
    }
}
