//! User and hub identity messages (`INF`).

use super::marshal::{adc_msg, int_wrapper_field};
use super::types::{Cid, ExtFeatures, Pid};

/// Client type bitmask carried in the `CT` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserType(pub i32);

impl UserType {
    pub const NONE: UserType = UserType(0x00);
    pub const BOT: UserType = UserType(0x01);
    pub const REGISTERED: UserType = UserType(0x02);
    pub const OPERATOR: UserType = UserType(0x04);
    pub const SUPER_USER: UserType = UserType(0x08);
    pub const HUB_OWNER: UserType = UserType(0x10);
    pub const HUB: UserType = UserType(0x20);
    pub const HIDDEN: UserType = UserType(0x40);

    pub fn is(self, t: UserType) -> bool {
        self.0 & t.0 != 0
    }
}

impl std::ops::BitOr for UserType {
    type Output = UserType;
    fn bitor(self, rhs: UserType) -> UserType {
        UserType(self.0 | rhs.0)
    }
}

/// Away state carried in the `AW` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AwayType(pub i32);

impl AwayType {
    pub const NONE: AwayType = AwayType(0);
    pub const NORMAL: AwayType = AwayType(1);
    pub const EXTENDED: AwayType = AwayType(2);
}

int_wrapper_field!(UserType, AwayType);

adc_msg! {
    /// User presence information, the large tagged `INF` record.
    pub struct UserInfo : b"INF" {
        pub id: Cid => tag "ID",
        /// Private ID, sent only to the hub.
        pub pid: Option<Pid> => tag "PD",
        pub name: String => req "NI",
        pub ip4: String => tag "I4",
        pub ip6: String => tag "I6",
        pub udp4: i32 => tag "U4",
        pub udp6: i32 => tag "U6",
        pub share_size: i64 => req "SS",
        pub share_files: i32 => req "SF",
        pub version: String => req "VE",
        pub application: String => tag "AP",
        pub max_upload: String => tag "US",
        pub max_download: String => tag "DS",
        pub slots: i32 => req "SL",
        pub slots_free: i32 => req "FS",
        pub auto_slot_limit: i32 => tag "AS",
        pub email: String => tag "EM",
        pub desc: String => tag "DE",
        pub hubs_normal: i32 => req "HN",
        pub hubs_registered: i32 => req "HR",
        pub hubs_operator: i32 => req "HO",
        /// Client-to-client connect token.
        pub token: String => tag "TO",
        pub user_type: UserType => tag "CT",
        pub away: AwayType => tag "AW",
        pub referrer: String => tag "RF",
        pub features: ExtFeatures => req "SU",
        /// TLS certificate keyprint (`SHA256/<base32>`).
        pub kp: String => tag "KP",
        /// Non-standard direct address extension.
        pub address: String => tag "EA",
    }
}

impl UserInfo {
    /// Splits a combined `"APP VER"` version into application and
    /// version, for clients that only send `VE`.
    pub fn normalize(&mut self) {
        if self.application.is_empty() {
            if let Some(i) = self.version.rfind(' ') {
                self.application = self.version[..i].to_string();
                self.version = self.version[i + 1..].to_string();
            }
        }
    }
}

adc_msg! {
    /// Hub information sent in info packets, including the `PING`
    /// extension fields.
    pub struct HubInfo : b"INF" {
        pub name: String => req "NI",
        pub version: String => req "VE",
        pub application: String => tag "AP",
        pub desc: String => tag "DE",
        pub user_type: UserType => tag "CT",
        /// Hub host address (ADC/ADCS URL form).
        pub address: String => tag "HH",
        pub website: String => tag "WS",
        pub network: String => tag "NE",
        pub owner: String => tag "OW",
        pub users: i32 => tag "UC",
        pub share: i64 => tag "SS",
        pub files: i32 => tag "SF",
        /// Minimum share required to enter the hub, in bytes.
        pub min_share: i64 => tag "MS",
        pub max_share: i64 => tag "XS",
        pub min_slots: i32 => tag "ML",
        pub max_slots: i32 => tag "XL",
        pub users_limit: i32 => tag "MC",
        /// Hub uptime in seconds.
        pub uptime: i32 => tag "UP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::MessageBody;

    fn roundtrip(data: &[u8]) -> UserInfo {
        let m = UserInfo::unmarshal_adc(data).unwrap();
        let mut buf = Vec::new();
        m.marshal_adc(&mut buf).unwrap();
        assert_eq!(buf, data, "got {:?}", String::from_utf8_lossy(&buf));
        m
    }

    #[test]
    fn test_user_info_basic() {
        let m = roundtrip(
            b"IDHVBNEMDCTKCD4V3N54X4MMOVLJLJL6PSKVHFXHI NIgopher I4172.17.42.1 SS39542721391 SF34 VEGoConn\\s0.01 SL3 FS0 HN0 HR0 HO0 SUGCON,ADC0",
        );
        assert_eq!(m.name, "gopher");
        assert_eq!(m.ip4, "172.17.42.1");
        assert_eq!(m.share_size, 39542721391);
        assert_eq!(m.share_files, 34);
        assert_eq!(m.version, "GoConn 0.01");
        assert_eq!(m.slots, 3);
        assert_eq!(m.features.0.len(), 2);
    }

    #[test]
    fn test_user_info_with_pid_and_kp() {
        let m = roundtrip(
            b"IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser I4172.17.42.1 U43000 SS25146919163 SF23 VEEiskaltDC++\\s2.2.9 US1310720 SL3 FS3 HN11 HR0 HO1 SUSEGA,ADC0,TCP4,UDP4 KPSHA256/C44JWX62IN6JBAVH7NIHEZIQ6WSNQ2LHTOWYWP7ADGAYTCPZVWRQ",
        );
        assert_eq!(m.udp4, 3000);
        assert_eq!(m.max_upload, "1310720");
        assert_eq!(m.hubs_normal, 11);
        assert_eq!(m.hubs_operator, 1);
        assert_eq!(
            m.kp,
            "SHA256/C44JWX62IN6JBAVH7NIHEZIQ6WSNQ2LHTOWYWP7ADGAYTCPZVWRQ"
        );
    }

    #[test]
    fn test_user_info_required_fields_always_emitted() {
        let m = roundtrip(b"NI SS34815324082 SF8416 VE SL0 FS1 HN18 HR0 HO2 SUNAT0,ADC0,SEGA");
        assert_eq!(m.name, "");
        assert_eq!(m.slots, 0);
        assert_eq!(m.slots_free, 1);
    }

    #[test]
    fn test_normalize_splits_version() {
        let mut m = UserInfo {
            version: "EiskaltDC++ 2.2.9".into(),
            ..UserInfo::default()
        };
        m.normalize();
        assert_eq!(m.application, "EiskaltDC++");
        assert_eq!(m.version, "2.2.9");
    }

    #[test]
    fn test_hub_info() {
        let m = HubInfo::unmarshal_adc(
            b"NIADCH VEHubSoft\\s1.0 DEtest UC120 UP3600",
        )
        .unwrap();
        assert_eq!(m.name, "ADCH");
        assert_eq!(m.version, "HubSoft 1.0");
        assert_eq!(m.users, 120);
        assert_eq!(m.uptime, 3600);
    }
}
