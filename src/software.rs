//! Software identification shared by both protocols.

use serde::{Deserialize, Serialize};

/// Name and version of a hub or client implementation.
///
/// NMDC transfers it as a single `"name version"` string in `HubINFO`,
/// while ADC splits it over the `AP`/`VE` user-info fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Software {
    pub name: String,
    pub version: String,
}

impl Software {
    /// Splits a `"name version"` string on the last space.
    ///
    /// A string without a space is treated as a bare name.
    pub fn parse(s: &str) -> Software {
        match s.rfind(' ') {
            Some(i) => Software {
                name: s[..i].to_string(),
                version: s[i + 1..].to_string(),
            },
            None => Software {
                name: s.to_string(),
                version: String::new(),
            },
        }
    }
}

impl std::fmt::Display for Software {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} {}", self.name, self.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_version() {
        let s = Software::parse("Verlihub 1.1.0.12");
        assert_eq!(s.name, "Verlihub");
        assert_eq!(s.version, "1.1.0.12");
        assert_eq!(s.to_string(), "Verlihub 1.1.0.12");
    }

    #[test]
    fn test_parse_name_only() {
        let s = Software::parse("PtokaX");
        assert_eq!(s.name, "PtokaX");
        assert_eq!(s.version, "");
        assert_eq!(s.to_string(), "PtokaX");
    }

    #[test]
    fn test_parse_last_space_wins() {
        let s = Software::parse("YnHub beta 1.0364");
        assert_eq!(s.name, "YnHub beta");
        assert_eq!(s.version, "1.0364");
    }
}
