// crates/update-gate-core/src/core/structured_headers.rs
// ============================================================================
// Module: Update Gate Structured Headers
// Description: RFC 8941 dictionary parsing and serialization.
// Purpose: Decode signature and manifest-filter headers without lenient fallbacks.
// Dependencies: base64, sfv, thiserror
// ============================================================================

//! ## Overview
//! Signature metadata (`sig`, `keyid`, `alg`), the accept-signature header, and
//! server manifest filters are all RFC 8941 structured dictionaries. Parsing
//! and serialization are delegated to `sfv`; this module maps its values onto
//! [`StructuredItem`] and applies a length limit. Member parameters are parsed
//! and discarded.
//!
//! Security posture: header values are untrusted input; any malformed input
//! fails the whole header.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sfv::BareItem;
use sfv::Decimal;
use sfv::Dictionary;
use sfv::InnerList;
use sfv::Item;
use sfv::ListEntry;
use sfv::Parameters;
use sfv::Parser;
use sfv::SerializeValue;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted header length in bytes.
pub const MAX_HEADER_LENGTH: usize = 16 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Value carried by a dictionary member.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredItem {
    /// Quoted string.
    String(String),
    /// Token.
    Token(String),
    /// Integer.
    Integer(i64),
    /// Decimal.
    Decimal(Decimal),
    /// Byte sequence (base64 between colons).
    ByteSequence(Vec<u8>),
    /// Boolean (`?1` / `?0`, or a bare key for `true`).
    Boolean(bool),
    /// Parenthesized list of bare items.
    InnerList(Vec<StructuredItem>),
}

impl StructuredItem {
    /// Returns the string payload of string items.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Renders a bare item as plain text for value comparison.
    ///
    /// Inner lists have no plain-text form.
    #[must_use]
    pub fn to_plain_text(&self) -> Option<String> {
        match self {
            Self::String(value) | Self::Token(value) => Some(value.clone()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Decimal(value) => Some(value.to_string()),
            Self::ByteSequence(bytes) => Some(STANDARD.encode(bytes)),
            Self::Boolean(value) => Some(value.to_string()),
            Self::InnerList(_) => None,
        }
    }

    /// Converts a parsed bare item.
    fn from_bare(item: BareItem) -> Self {
        match item {
            BareItem::String(value) => Self::String(value),
            BareItem::Token(value) => Self::Token(value),
            BareItem::Integer(value) => Self::Integer(value),
            BareItem::Decimal(value) => Self::Decimal(value),
            BareItem::ByteSeq(bytes) => Self::ByteSequence(bytes),
            BareItem::Boolean(value) => Self::Boolean(value),
        }
    }

    /// Converts into a serializable dictionary member.
    fn into_entry(self) -> Result<ListEntry, HeaderError> {
        match self {
            Self::InnerList(items) => {
                let items = items
                    .into_iter()
                    .map(|item| item.into_bare().map(bare_member))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ListEntry::InnerList(InnerList {
                    items,
                    params: Parameters::new(),
                }))
            }
            other => Ok(ListEntry::Item(bare_member(other.into_bare()?))),
        }
    }

    /// Converts a bare item for serialization.
    fn into_bare(self) -> Result<BareItem, HeaderError> {
        match self {
            Self::String(value) => Ok(BareItem::String(value)),
            Self::Token(value) => Ok(BareItem::Token(value)),
            Self::Integer(value) => Ok(BareItem::Integer(value)),
            Self::Decimal(value) => Ok(BareItem::Decimal(value)),
            Self::ByteSequence(bytes) => Ok(BareItem::ByteSeq(bytes)),
            Self::Boolean(value) => Ok(BareItem::Boolean(value)),
            Self::InnerList(_) => {
                Err(HeaderError::Serialize("inner lists cannot be nested".to_string()))
            }
        }
    }
}

/// Parsed dictionary; later duplicates overwrite earlier ones.
pub type StructuredDictionary = BTreeMap<String, StructuredItem>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing or serializing structured header values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Header exceeded [`MAX_HEADER_LENGTH`].
    #[error("structured header exceeds {MAX_HEADER_LENGTH} bytes")]
    TooLong,
    /// Header was syntactically invalid.
    #[error("invalid structured header: {0}")]
    Syntax(String),
    /// Members could not be serialized.
    #[error("structured header not serializable: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses an RFC 8941 dictionary.
///
/// # Errors
///
/// Returns [`HeaderError`] when the input is too long or not a valid dictionary.
pub fn parse_dictionary(input: &str) -> Result<StructuredDictionary, HeaderError> {
    if input.len() > MAX_HEADER_LENGTH {
        return Err(HeaderError::TooLong);
    }
    let parsed = Parser::parse_dictionary(input.as_bytes())
        .map_err(|reason| HeaderError::Syntax(reason.to_string()))?;
    Ok(parsed
        .into_iter()
        .map(|(key, entry)| {
            let item = match entry {
                ListEntry::Item(item) => StructuredItem::from_bare(item.bare_item),
                ListEntry::InnerList(list) => StructuredItem::InnerList(
                    list.items
                        .into_iter()
                        .map(|item| StructuredItem::from_bare(item.bare_item))
                        .collect(),
                ),
            };
            (key, item)
        })
        .collect())
}

// ============================================================================
// SECTION: Serialization
// ============================================================================

/// Serializes dictionary members in the given order.
///
/// `Boolean(true)` members serialize as bare keys. Strings are escaped.
///
/// # Errors
///
/// Returns [`HeaderError::Serialize`] for invalid keys, strings outside
/// printable ASCII, out-of-range numbers, or an empty member list.
pub fn serialize_dictionary(members: Vec<(&str, StructuredItem)>) -> Result<String, HeaderError> {
    let mut dictionary = Dictionary::new();
    for (key, item) in members {
        dictionary.insert(key.to_string(), item.into_entry()?);
    }
    dictionary.serialize_value().map_err(|reason| HeaderError::Serialize(reason.to_string()))
}

/// Wraps a bare item without parameters.
fn bare_member(bare_item: BareItem) -> Item {
    Item {
        bare_item,
        params: Parameters::new(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]
mod tests {
    use super::HeaderError;
    use super::StructuredItem;
    use super::parse_dictionary;
    use super::serialize_dictionary;

    #[test]
    fn parses_signature_style_dictionary() {
        let parsed =
            parse_dictionary(r#"sig="c2lnbmF0dXJl", keyid="root", alg="rsa-v1_5-sha256""#)
                .unwrap();
        assert_eq!(parsed.get("sig"), Some(&StructuredItem::String("c2lnbmF0dXJl".into())));
        assert_eq!(parsed.get("keyid"), Some(&StructuredItem::String("root".into())));
        assert_eq!(parsed.get("alg"), Some(&StructuredItem::String("rsa-v1_5-sha256".into())));
    }

    #[test]
    fn bare_key_is_true_and_parameters_are_ignored() {
        let parsed = parse_dictionary("sig;q=1, branch=main, count=-12, ratio=1.5").unwrap();
        assert_eq!(parsed.get("sig"), Some(&StructuredItem::Boolean(true)));
        assert_eq!(parsed.get("branch"), Some(&StructuredItem::Token("main".into())));
        assert_eq!(parsed.get("count"), Some(&StructuredItem::Integer(-12)));
        assert_eq!(parsed["ratio"].to_plain_text().as_deref(), Some("1.5"));
    }

    #[test]
    fn inner_lists_are_parsed() {
        let parsed = parse_dictionary("channels=(main \"beta\");q=1, n=2").unwrap();
        assert_eq!(
            parsed.get("channels"),
            Some(&StructuredItem::InnerList(vec![
                StructuredItem::Token("main".into()),
                StructuredItem::String("beta".into()),
            ]))
        );
        assert_eq!(parsed["channels"].to_plain_text(), None);
        assert_eq!(parsed.get("n"), Some(&StructuredItem::Integer(2)));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_dictionary("sig=\"unterminated").is_err());
        assert!(parse_dictionary("Sig=\"upper\"").is_err());
        assert!(parse_dictionary("a=1,").is_err());
        assert!(parse_dictionary("a=(1 2").is_err());
        assert!(parse_dictionary("a=1 b=2").is_err());
    }

    #[test]
    fn serializes_accept_signature_header() {
        let header = serialize_dictionary(vec![
            ("sig", StructuredItem::Boolean(true)),
            ("keyid", StructuredItem::String("root".into())),
            ("alg", StructuredItem::String("rsa-v1_5-sha256".into())),
        ])
        .unwrap();
        assert_eq!(header, r#"sig, keyid="root", alg="rsa-v1_5-sha256""#);
        let parsed = parse_dictionary(&header).unwrap();
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn serialization_rejects_values_outside_the_grammar() {
        let non_ascii =
            serialize_dictionary(vec![("keyid", StructuredItem::String("ключ".into()))]);
        assert!(matches!(non_ascii, Err(HeaderError::Serialize(_))));
        let bad_key = serialize_dictionary(vec![("KeyId", StructuredItem::Boolean(true))]);
        assert!(matches!(bad_key, Err(HeaderError::Serialize(_))));
    }
}
