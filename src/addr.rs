//! Cross-protocol address helpers.

use url::Url;

use crate::error::Result;
use crate::{adc, nmdc};

/// Parses a DC address as a URL, dispatching on the scheme. Addresses
/// without a scheme are treated as NMDC.
pub fn parse_addr(addr: &str) -> Result<Url> {
    if addr.starts_with(adc::SCHEME_ADC) {
        return adc::parse_addr(addr);
    }
    nmdc::parse_addr(addr)
}

/// Parses and normalizes the address to `scheme://host[:port]` form.
pub fn normalize_addr(addr: &str) -> Result<String> {
    if addr.starts_with(adc::SCHEME_ADC) {
        return adc::normalize_addr(addr);
    }
    nmdc::normalize_addr(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch() {
        assert_eq!(parse_addr("adc://host:411").unwrap().scheme(), "adc");
        assert_eq!(parse_addr("adcs://host:411").unwrap().scheme(), "adcs");
        assert_eq!(parse_addr("host:411").unwrap().scheme(), "dchub");
        assert_eq!(
            normalize_addr("nmdcs://host:411").unwrap(),
            "nmdcs://host:411"
        );
    }
}
