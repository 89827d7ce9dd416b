//! IANA language tag -> MOBI language code, shared by the MOBI header
//! (component J) and the primary index header (component I).
//!
//! Ground truth: `iana2mobi`. MOBI packs a locale into 32 bits as
//! `(dialect << 10) | primary`, where `primary` is a fixed per-language
//! index and `dialect` distinguishes regional variants (e.g. en-GB vs
//! en-US). Only the primary codes actually used by this corpus's sample
//! documents are tabulated; anything unrecognized falls back to English.

fn primary_code(lang: &str) -> u32 {
    match lang {
        "af" => 0x36,
        "sq" => 0x1c,
        "ar" => 0x01,
        "hy" => 0x2b,
        "eu" => 0x2d,
        "be" => 0x23,
        "bn" => 0x45,
        "bg" => 0x02,
        "ca" => 0x03,
        "zh" => 0x04,
        "hr" => 0x1a,
        "cs" => 0x05,
        "da" => 0x06,
        "nl" => 0x13,
        "en" => 0x09,
        "et" => 0x25,
        "fo" => 0x38,
        "fi" => 0x0b,
        "fr" => 0x0c,
        "gl" => 0x56,
        "ka" => 0x37,
        "de" => 0x07,
        "el" => 0x08,
        "gu" => 0x47,
        "he" => 0x0d,
        "hi" => 0x39,
        "hu" => 0x0e,
        "is" => 0x0f,
        "id" => 0x21,
        "ga" => 0x3c,
        "it" => 0x10,
        "ja" => 0x11,
        "kn" => 0x4b,
        "kk" => 0x3f,
        "ko" => 0x12,
        "lv" => 0x26,
        "lt" => 0x27,
        "mk" => 0x2f,
        "ms" => 0x3e,
        "ml" => 0x4c,
        "mt" => 0x3a,
        "mr" => 0x4e,
        "ne" => 0x61,
        "nb" | "no" => 0x14,
        "nn" => 0x14,
        "fa" => 0x29,
        "pl" => 0x15,
        "pt" => 0x16,
        "pa" => 0x46,
        "ro" => 0x18,
        "ru" => 0x19,
        "sr" => 0x1a,
        "sk" => 0x1b,
        "sl" => 0x24,
        "es" => 0x0a,
        "sw" => 0x41,
        "sv" => 0x1d,
        "ta" => 0x49,
        "te" => 0x4a,
        "th" => 0x1e,
        "tr" => 0x1f,
        "uk" => 0x22,
        "ur" => 0x20,
        "uz" => 0x43,
        "vi" => 0x2a,
        "cy" => 0x52,
        _ => 0x09,
    }
}

fn dialect_code(lang: &str, region: &str) -> u32 {
    match (lang, region) {
        ("en", "US") => 0x01,
        ("en", "GB") => 0x02,
        ("en", "AU") => 0x03,
        ("en", "CA") => 0x04,
        ("en", "NZ") => 0x05,
        ("en", "IE") => 0x06,
        ("en", "ZA") => 0x07,
        ("es", "ES") => 0x01,
        ("es", "MX") => 0x02,
        ("fr", "FR") => 0x01,
        ("fr", "CA") => 0x03,
        ("de", "DE") => 0x01,
        ("de", "AT") => 0x03,
        ("de", "CH") => 0x02,
        ("pt", "PT") => 0x02,
        ("pt", "BR") => 0x01,
        ("zh", "CN") => 0x02,
        ("zh", "TW") => 0x01,
        ("nb", _) | ("no", _) => 0x01,
        ("nn", _) => 0x02,
        _ => 0x00,
    }
}

/// Pack an IANA language tag (`en`, `en-GB`, `pt-BR`, ...) into a MOBI
/// language code. Case-insensitive; unknown primary subtags fall back to
/// English (primary 0x09, no dialect).
pub fn iana_to_mobi_lang(tag: &str) -> u32 {
    let mut parts = tag.split(['-', '_']);
    let primary_tag = parts.next().unwrap_or("en").to_ascii_lowercase();
    let region = parts.next().unwrap_or("").to_ascii_uppercase();
    let primary = primary_code(&primary_tag);
    let dialect = dialect_code(&primary_tag, &region);
    (dialect << 10) | primary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_english_has_no_dialect() {
        assert_eq!(iana_to_mobi_lang("en"), 0x09);
    }

    #[test]
    fn british_english_sets_dialect_bits() {
        assert_eq!(iana_to_mobi_lang("en-GB"), (0x02 << 10) | 0x09);
    }

    #[test]
    fn unknown_tag_falls_back_to_english() {
        assert_eq!(iana_to_mobi_lang("xx-YY"), 0x09);
    }
}
