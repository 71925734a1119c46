//! ADC hub address helpers.

use url::Url;

use crate::error::{DcError, Result};

/// ADC protocol name used in `CTM` requests.
pub const PROTO_ADC: &str = "ADC/1.0";
/// ADC-over-TLS protocol name used in `CTM` requests.
pub const PROTO_ADCS: &str = "ADCS/0.10";

/// URL scheme for the ADC protocol.
pub const SCHEME_ADC: &str = "adc";
/// URL scheme for ADC over TLS.
pub const SCHEME_ADCS: &str = "adcs";

/// Parses an ADC address as a URL.
pub fn parse_addr(addr: &str) -> Result<Url> {
    let u = Url::parse(addr).map_err(|e| DcError::protocol(format!("invalid address: {}", e)))?;
    if u.scheme() != SCHEME_ADC && u.scheme() != SCHEME_ADCS {
        return Err(DcError::protocol(format!(
            "unsupported protocol: {:?}",
            u.scheme()
        )));
    }
    Ok(u)
}

/// Parses and normalizes the address to `scheme://host:port` form.
pub fn normalize_addr(addr: &str) -> Result<String> {
    let u = parse_addr(addr)?;
    let host = u
        .host_str()
        .ok_or_else(|| DcError::protocol(format!("no hostname in address: {:?}", addr)))?;
    let port = u
        .port()
        .ok_or_else(|| DcError::protocol(format!("no port in address: {:?}", addr)))?;
    Ok(format!("{}://{}:{}", u.scheme(), host, port))
}
