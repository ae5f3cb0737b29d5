use std::fmt;

use encoding_rs::{BIG5, UTF_8};

/// Text encodings a price list may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// Plain UTF-8 without a signature.
    Utf8,
    /// UTF-8 with an optional byte-order mark, as spreadsheet tools write it.
    Utf8Sig,
    /// Traditional Chinese legacy encoding (Windows code page 950).
    Big5,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl TextEncoding {
    /// Decode `bytes`, returning `None` on any malformed sequence.
    ///
    /// Signed input is left to `Utf8Sig`, so a fallback reports which of
    /// the two UTF-8 flavours a file actually used.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        let (encoding, body) = match self {
            TextEncoding::Utf8 if bytes.starts_with(UTF8_BOM) => return None,
            TextEncoding::Utf8 => (UTF_8, bytes),
            TextEncoding::Utf8Sig => (UTF_8, bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)),
            TextEncoding::Big5 => (BIG5, bytes),
        };
        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .map(|text| text.into_owned())
    }

    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Big5 => "big5",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How uploaded or discovered delimited text is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingStrategy {
    /// One encoding; failure is final.
    Strict(TextEncoding),
    /// Try each encoding in order, keep the first that parses.
    Fallback(Vec<TextEncoding>),
}

impl EncodingStrategy {
    pub fn strict() -> Self {
        EncodingStrategy::Strict(TextEncoding::Utf8Sig)
    }

    pub fn candidates(&self) -> &[TextEncoding] {
        match self {
            EncodingStrategy::Strict(enc) => std::slice::from_ref(enc),
            EncodingStrategy::Fallback(list) => list,
        }
    }
}

impl Default for EncodingStrategy {
    fn default() -> Self {
        EncodingStrategy::Fallback(vec![
            TextEncoding::Utf8,
            TextEncoding::Utf8Sig,
            TextEncoding::Big5,
        ])
    }
}
