//! Text encoding resolution for fetched pages.
//!
//! Novel hosts frequently serve GBK pages with a missing or wrong charset
//! declaration, so the decoder looks at the bytes instead of the headers.
//!
//! Resolution order:
//! 1. Valid UTF-8 (BOM or not) decodes as UTF-8.
//! 2. Otherwise `chardetng` guesses from the byte distribution; a GB2312
//!    or GBK guess is normalized to GBK, the superset.
//! 3. Input without any non-ASCII byte gives the detector nothing to go on
//!    and falls back to [`DEFAULT_ENCODING`].

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, GBK, UTF_8};

/// Encoding used when the bytes carry no evidence either way.
pub const DEFAULT_ENCODING: &Encoding = UTF_8;

/// Determines the encoding of `bytes`. Never fails.
#[must_use]
pub fn resolve(bytes: &[u8]) -> &'static Encoding {
    if bytes.is_empty() {
        return DEFAULT_ENCODING;
    }
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    let saw_non_ascii = detector.feed(bytes, true);
    if !saw_non_ascii {
        return DEFAULT_ENCODING;
    }
    normalize(detector.guess(None, true))
}

/// Maps an encoding label to an encoding, normalizing the GB2312/GBK pair.
///
/// Unknown labels resolve to [`DEFAULT_ENCODING`].
#[must_use]
pub fn for_label(label: &str) -> &'static Encoding {
    Encoding::for_label(label.trim().as_bytes()).map_or(DEFAULT_ENCODING, normalize)
}

/// Decodes `bytes` with the resolved encoding, replacing malformed sequences.
#[must_use]
pub fn decode(bytes: &[u8]) -> String {
    let encoding = resolve(bytes);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn normalize(encoding: &'static Encoding) -> &'static Encoding {
    if encoding.name().eq_ignore_ascii_case("gb2312") || encoding == GBK {
        GBK
    } else {
        encoding
    }
}
