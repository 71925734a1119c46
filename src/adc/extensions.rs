//! Known ADC feature codes.

use super::types::Feature;

/// Base ADC protocol support.
pub const FEA_BASE: Feature = Feature(*b"BASE");
pub const FEA_BAS0: Feature = Feature(*b"BAS0");

/// Tiger hash support.
pub const FEA_TIGR: Feature = Feature(*b"TIGR");
/// Additional fields in the hub's info message.
pub const FEA_PING: Feature = Feature(*b"PING");
/// Online services identification.
pub const FEA_ONID: Feature = Feature(*b"ONID");
/// Bzip2-compressed file list.
pub const FEA_BZIP: Feature = Feature(*b"BZIP");
/// Unix timestamps in chat messages.
pub const FEA_TS: Feature = Feature(*b"TS00");
/// Compressed communication (full), adds `ZON`/`ZOF`.
pub const FEA_ZLIF: Feature = Feature(*b"ZLIF");
/// Compressed communication (get).
pub const FEA_ZLIG: Feature = Feature(*b"ZLIG");
/// Grouping of file extensions in search.
pub const FEA_SEGA: Feature = Feature(*b"SEGA");
/// User commands.
pub const FEA_UCMD: Feature = Feature(*b"UCMD");
pub const FEA_UCM0: Feature = Feature(*b"UCM0");
/// ADC over TLS for client-hub connections.
pub const FEA_ADCS: Feature = Feature(*b"ADCS");
/// ADC over TLS for client-client connections.
pub const FEA_ADC0: Feature = Feature(*b"ADC0");
/// NAT traversal for client-client connections.
pub const FEA_NAT0: Feature = Feature(*b"NAT0");
pub const FEA_ASCH: Feature = Feature(*b"ASCH");
pub const FEA_SUD1: Feature = Feature(*b"SUD1");
pub const FEA_SUDP: Feature = Feature(*b"SUDP");
pub const FEA_CCPM: Feature = Feature(*b"CCPM");
pub const FEA_BLO0: Feature = Feature(*b"BLO0");
pub const FEA_SIPR: Feature = Feature(*b"SIPR");

/// Marks an open TCP4 port (active mode) in the user's info.
pub const FEA_TCP4: Feature = Feature(*b"TCP4");
/// Marks an open TCP6 port (active mode) in the user's info.
pub const FEA_TCP6: Feature = Feature(*b"TCP6");
pub const FEA_UDP4: Feature = Feature(*b"UDP4");
pub const FEA_UDP6: Feature = Feature(*b"UDP6");
