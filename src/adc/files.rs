//! File transfer negotiation (`GFI`/`GET`/`SND`).

use super::marshal::adc_msg;

/// Virtual name of the bzip2-compressed file list.
pub const FILE_LIST_BZIP: &str = "files.xml.bz2";

adc_msg! {
    /// Requests information about a shared item.
    pub struct GetInfoRequest : b"GFI" {
        pub typ: String => pos,
        pub path: String => pos,
    }
}

adc_msg! {
    /// Requests a byte range of a shared item:
    /// `type path start bytes [ZL1] [DB<n>]`.
    pub struct GetRequest : b"GET" {
        pub typ: String => pos,
        pub path: String => pos,
        pub start: i64 => pos,
        /// `-1` requests the whole remainder.
        pub bytes: i64 => pos,
        /// ZLIG extension: the payload will be zlib-compressed.
        pub compressed: bool => tag "ZL",
        /// Bytes the downloader already has, for segmented downloads.
        pub downloaded: Option<u64> => tag "DB",
    }
}

adc_msg! {
    /// The answer to a [`GetRequest`], followed by the binary payload.
    pub struct GetResponse : b"SND" {
        pub typ: String => pos,
        pub path: String => pos,
        pub start: i64 => pos,
        pub bytes: i64 => pos,
        pub compressed: bool => tag "ZL",
    }
}
