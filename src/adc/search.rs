//! Search messages (`SCH`/`RES`) and the extension-group bitmask.

use crate::tiger::Hash;

use super::marshal::{adc_msg, int_wrapper_field};

/// File-or-directory filter carried in the `TY` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileType(pub i32);

impl FileType {
    pub const ANY: FileType = FileType(0);
    pub const FILE: FileType = FileType(1);
    pub const DIR: FileType = FileType(2);
}

/// Extension-group bitmask of the `SEGA` extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtGroup(pub i32);

impl ExtGroup {
    pub const NONE: ExtGroup = ExtGroup(0x00);
    pub const AUDIO: ExtGroup = ExtGroup(0x01);
    pub const ARCH: ExtGroup = ExtGroup(0x02);
    pub const DOC: ExtGroup = ExtGroup(0x04);
    pub const EXE: ExtGroup = ExtGroup(0x08);
    pub const IMAGE: ExtGroup = ExtGroup(0x10);
    pub const VIDEO: ExtGroup = ExtGroup(0x20);

    pub fn has(self, g: ExtGroup) -> bool {
        self.0 & g.0 != 0
    }

    /// Whether a file extension (or name) falls into one of the selected
    /// groups. An empty mask matches everything.
    pub fn matches(self, ext: &str) -> bool {
        if self.0 == 0 {
            return true;
        }
        let ext = match ext.rfind('.') {
            Some(i) => &ext[i + 1..],
            None => ext,
        };
        self.has(ext_group(&ext.to_ascii_lowercase()))
    }
}

impl std::ops::BitOr for ExtGroup {
    type Output = ExtGroup;
    fn bitor(self, rhs: ExtGroup) -> ExtGroup {
        ExtGroup(self.0 | rhs.0)
    }
}

fn ext_group(ext: &str) -> ExtGroup {
    match ext {
        "ape" | "flac" | "m4a" | "mid" | "mp3" | "mpc" | "ogg" | "ra" | "wav" | "wma" => {
            ExtGroup::AUDIO
        }
        "7z" | "ace" | "arj" | "bz2" | "gz" | "lha" | "lzh" | "rar" | "tar" | "tz" | "z"
        | "zip" => ExtGroup::ARCH,
        "doc" | "docx" | "htm" | "html" | "nfo" | "odf" | "odp" | "ods" | "odt" | "pdf"
        | "ppt" | "pptx" | "rtf" | "txt" | "xls" | "xlsx" | "xml" | "xps" => ExtGroup::DOC,
        "app" | "bat" | "cmd" | "com" | "dll" | "exe" | "jar" | "msi" | "ps1" | "vbs"
        | "wsf" => ExtGroup::EXE,
        "bmp" | "cdr" | "eps" | "gif" | "ico" | "img" | "jpeg" | "jpg" | "png" | "ps"
        | "psd" | "sfw" | "tga" | "tif" | "webp" => ExtGroup::IMAGE,
        "3gp" | "asf" | "asx" | "avi" | "divx" | "flv" | "mkv" | "mov" | "mp4" | "mpeg"
        | "mpg" | "ogm" | "pxp" | "qt" | "rm" | "rmvb" | "swf" | "vob" | "webm" | "wmv" => {
            ExtGroup::VIDEO
        }
        _ => ExtGroup::NONE,
    }
}

int_wrapper_field!(FileType, ExtGroup);

adc_msg! {
    /// A search request.
    pub struct SearchRequest : b"SCH" {
        pub token: String => tag "TO",
        pub and: Vec<String> => repeat "AN",
        pub not: Vec<String> => repeat "NO",
        pub ext: Vec<String> => repeat "EX",
        pub le: i64 => tag "LE",
        pub ge: i64 => tag "GE",
        pub eq: i64 => tag "EQ",
        pub file_type: FileType => tag "TY",
        /// TIGR extension.
        pub tth: Option<Hash> => tag "TR",
        /// SEGA extension.
        pub group: ExtGroup => tag "GR",
        pub no_ext: Vec<String> => repeat "RX",
    }
}

adc_msg! {
    /// A search result.
    pub struct SearchResult : b"RES" {
        pub token: String => tag "TO",
        pub path: String => tag "FN",
        pub size: i64 => tag "SI",
        pub slots: i32 => tag "SL",
        /// TIGR extension.
        pub tth: Option<Hash> => tag "TR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::MessageBody;

    #[test]
    fn test_search_request_roundtrip() {
        let data: &[u8] = b"TO4171511714 ANsome ANdata GR32";
        let m = SearchRequest::unmarshal_adc(data).unwrap();
        assert_eq!(m.token, "4171511714");
        assert_eq!(m.and, vec!["some", "data"]);
        assert_eq!(m.group, ExtGroup::VIDEO);

        let mut buf = Vec::new();
        m.marshal_adc(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_search_result_roundtrip() {
        let data: &[u8] = b"TOtok FNfilepath SI1234567 SL3";
        let m = SearchResult::unmarshal_adc(data).unwrap();
        assert_eq!(m.path, "filepath");
        assert_eq!(m.size, 1234567);
        assert_eq!(m.slots, 3);
        assert!(m.tth.is_none());

        let mut buf = Vec::new();
        m.marshal_adc(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_search_with_tth() {
        let m = SearchRequest::unmarshal_adc(
            b"TOtok TRBR4BVJBMHDFVCFI4WBPSL63W5TWXWVBSC574BLI",
        )
        .unwrap();
        assert_eq!(
            m.tth.unwrap().to_base32(),
            "BR4BVJBMHDFVCFI4WBPSL63W5TWXWVBSC574BLI"
        );
    }

    #[test]
    fn test_ext_group_matching() {
        assert!(ExtGroup::VIDEO.matches("movie.mkv"));
        assert!(!ExtGroup::VIDEO.matches("song.mp3"));
        assert!((ExtGroup::AUDIO | ExtGroup::VIDEO).matches("song.MP3"));
        assert!(ExtGroup::NONE.matches("anything.bin"));
    }
}
