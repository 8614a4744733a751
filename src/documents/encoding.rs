/// Text encodings tried, in order, for plain-text uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl TextEncoding {
    /// cp1252 goes before latin-1 so C1 bytes get their printable glyphs; latin-1 accepts
    /// every byte and ends the chain.
    pub(crate) const PREFERENCE: [TextEncoding; 3] =
        [TextEncoding::Utf8, TextEncoding::Windows1252, TextEncoding::Latin1];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
            Self::Windows1252 => "cp1252",
        }
    }

    pub(crate) fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                std::str::from_utf8(bytes).ok().map(str::to_string)
            }
            Self::Latin1 => Some(latin1(bytes)),
            Self::Windows1252 => bytes.iter().map(|byte| windows_1252_char(*byte)).collect(),
        }
    }
}

/// Decodes with the first encoding in preference order that accepts every byte.
pub(crate) fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    TextEncoding::PREFERENCE
        .into_iter()
        .find_map(|encoding| encoding.decode(bytes).map(|text| (text, encoding)))
        .unwrap_or_else(|| (latin1(bytes), TextEncoding::Latin1))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

fn windows_1252_char(byte: u8) -> Option<char> {
    let mapped = match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => return None,
        other => char::from(other),
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_is_preferred() {
        let (text, encoding) = decode_text("café \u{2014} naïve".as_bytes());
        assert_eq!(encoding, TextEncoding::Utf8);
        assert_eq!(text, "café \u{2014} naïve");
    }

    #[test]
    fn utf8_bom_is_dropped() {
        let (text, _) = decode_text(b"\xEF\xBB\xBFQ1. Define force");
        assert_eq!(text, "Q1. Define force");
    }

    #[test]
    fn cp1252_claims_invalid_utf8() {
        let (text, encoding) = decode_text(b"caf\xE9 \x93smart quotes\x94 \x96 \x80");
        assert_eq!(encoding, TextEncoding::Windows1252);
        assert_eq!(text, "café \u{201C}smart quotes\u{201D} \u{2013} \u{20AC}");
    }

    #[test]
    fn latin1_takes_bytes_cp1252_leaves_undefined() {
        let (text, encoding) = decode_text(b"broken \x81 byte \xE8");
        assert_eq!(encoding, TextEncoding::Latin1);
        assert_eq!(text, "broken \u{81} byte è");
    }

    #[test]
    fn latin1_decodes_every_byte() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = TextEncoding::Latin1.decode(&bytes).expect("total");
        assert_eq!(text.chars().count(), 256);
        assert!(TextEncoding::Windows1252.decode(&bytes).is_none());
    }
}
