//! Identifier and URL parsing
//!
//! Remote identifiers are 32 hex digits, shown either compact or in the
//! 8-4-4-4-12 dashed form. Everything downstream works with the compact
//! lowercase form.

use ncli_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Length of a compact identifier
pub const ID_LENGTH: usize = 32;

static CANONICAL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}$")
        .expect("identifier pattern compiles")
});

static TRAILING_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9a-f]{32})$").expect("trailing identifier pattern compiles"));

static ID_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F-]{20,}$").expect("id-like pattern compiles"));

/// What a piece of user input turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// A compact lowercase identifier
    Id(String),
    /// Free text to look up by name
    Name(String),
}

/// Classify `input` as an identifier or a name
///
/// URLs must carry an identifier and hex-looking input must be well formed;
/// anything else is treated as a name.
pub fn parse_input(input: &str) -> Result<ParsedInput> {
    let trimmed = input.trim();

    if looks_like_url(trimmed) {
        return extract_id_from_url(trimmed).map(ParsedInput::Id);
    }
    if let Some(id) = normalize_id(trimmed) {
        return Ok(ParsedInput::Id(id));
    }
    if looks_like_malformed_id(trimmed) {
        return Err(Error::invalid_id(trimmed));
    }
    Ok(ParsedInput::Name(trimmed.to_string()))
}

pub fn looks_like_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
}

/// Compact lowercase form of a dashed or compact identifier
pub fn normalize_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    CANONICAL_ID
        .is_match(trimmed)
        .then(|| trimmed.replace('-', "").to_ascii_lowercase())
}

/// Hex and dashes only and long enough to be a mistyped identifier
pub fn looks_like_malformed_id(input: &str) -> bool {
    ID_LIKE.is_match(input) && normalize_id(input).is_none()
}

/// Dashed 8-4-4-4-12 form of a compact identifier
pub fn to_dashed(id: &str) -> Option<String> {
    let compact = normalize_id(id)?;
    Some(format!(
        "{}-{}-{}-{}-{}",
        &compact[..8],
        &compact[8..12],
        &compact[12..16],
        &compact[16..20],
        &compact[20..]
    ))
}

/// Pull the identifier out of a resource URL
///
/// A `p` query parameter names the page opened on top of a view and wins
/// over the path. Otherwise the last path segment ending in 32 hex digits
/// is used, with any title slug before it ignored.
pub fn extract_id_from_url(input: &str) -> Result<String> {
    let absolute = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };
    let url = Url::parse(&absolute).map_err(|e| Error::invalid_url(input, e.to_string()))?;

    if let Some(id) = url
        .query_pairs()
        .find(|(name, _)| name == "p")
        .and_then(|(_, value)| normalize_id(&value))
    {
        return Ok(id);
    }

    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    segments
        .iter()
        .rev()
        .find_map(|segment| trailing_id(segment))
        .ok_or_else(|| Error::invalid_url(input, "no 32-character identifier found"))
}

fn trailing_id(segment: &str) -> Option<String> {
    let compact: String = segment.chars().filter(|c| *c != '-').collect();
    TRAILING_ID
        .captures(&compact)
        .map(|captures| captures[1].to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ID: &str = "1fb79d4c71bb8032b722c82305b63a00";

    #[test]
    fn test_url_with_query_returns_compact_id() {
        let url = "https://host/1fb79d4c71bb8032b722c82305b63a00?v=x";
        assert_eq!(extract_id_from_url(url).unwrap(), ID);
        assert_eq!(parse_input(url).unwrap(), ParsedInput::Id(ID.to_string()));
    }

    #[test]
    fn test_url_with_title_slug() {
        let url = "https://www.example.so/acme/Sprint-Tasks-1FB79D4C71BB8032B722C82305B63A00";
        assert_eq!(extract_id_from_url(url).unwrap(), ID);
    }

    #[test]
    fn test_url_with_dashed_id() {
        let url = "https://host/team/1fb79d4c-71bb-8032-b722-c82305b63a00";
        assert_eq!(extract_id_from_url(url).unwrap(), ID);
    }

    #[test]
    fn test_page_query_parameter_wins_over_path() {
        let url = "https://host/ffffffffffffffffffffffffffffffff?v=1&p=1fb79d4c71bb8032b722c82305b63a00";
        assert_eq!(extract_id_from_url(url).unwrap(), ID);
    }

    #[test]
    fn test_url_without_id_is_invalid_url() {
        let err = parse_input("https://host/workspace/Tasks").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_scheme_less_url() {
        let url = "www.example.so/Tasks-1fb79d4c71bb8032b722c82305b63a00";
        assert_eq!(parse_input(url).unwrap(), ParsedInput::Id(ID.to_string()));
    }

    #[test]
    fn test_raw_ids_are_normalized() {
        assert_eq!(normalize_id("1FB79D4C-71BB-8032-B722-C82305B63A00").unwrap(), ID);
        assert_eq!(normalize_id(&format!("  {ID} ")).unwrap(), ID);
        assert!(normalize_id("1fb79d4c71bb8032b722c82305b63a0").is_none());
        assert!(normalize_id("zfb79d4c71bb8032b722c82305b63a00").is_none());
    }

    #[test]
    fn test_malformed_id_is_rejected() {
        let err = parse_input("1fb79d4c-71bb-8032-b722-c82305b63a").unwrap_err();
        assert!(matches!(err, Error::InvalidId { .. }));
    }

    #[test]
    fn test_plain_text_is_a_name() {
        assert_eq!(
            parse_input("  Tasks Database ").unwrap(),
            ParsedInput::Name("Tasks Database".to_string())
        );
        assert_eq!(
            parse_input("deadbeef").unwrap(),
            ParsedInput::Name("deadbeef".to_string())
        );
    }

    #[test]
    fn test_to_dashed() {
        assert_eq!(
            to_dashed(ID).unwrap(),
            "1fb79d4c-71bb-8032-b722-c82305b63a00"
        );
    }

    proptest! {
        #[test]
        fn proptest_normalize_is_idempotent_and_compact(raw in "[0-9a-fA-F]{32}", dashed in any::<bool>()) {
            let input = if dashed {
                format!("{}-{}-{}-{}-{}", &raw[..8], &raw[8..12], &raw[12..16], &raw[16..20], &raw[20..])
            } else {
                raw.clone()
            };

            let id = normalize_id(&input).unwrap();
            prop_assert_eq!(id.len(), ID_LENGTH);
            prop_assert_eq!(&id, &raw.to_ascii_lowercase());
            prop_assert_eq!(normalize_id(&id), Some(id.clone()));
        }

        #[test]
        fn proptest_urls_round_trip_ids(raw in "[0-9a-f]{32}", slug in "[A-Za-z]{1,12}") {
            let url = format!("https://host/ws/{slug}-{raw}?v=abc");
            prop_assert_eq!(extract_id_from_url(&url).unwrap(), raw);
        }
    }
}
