//! CNJ process number: canonical format and validated newtype.
//!
//! Canonical layout is `NNNNNNN-DD.AAAA.J.TR.OOOO`: 7-digit sequence, 2-digit
//! verification digit, 4-digit year, 1-digit segment, 2-digit court and
//! 4-digit origin unit. Only ASCII digits are accepted; no trimming or other
//! normalization is applied.

use core::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Message carried by the validation error for malformed numbers.
pub const INVALID_FORMAT_MESSAGE: &str = "invalid CNJ format";

// `[0-9]` rather than `\d`: the regex crate's `\d` matches any Unicode digit.
static CNJ_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{7}-[0-9]{2}\.[0-9]{4}\.[0-9]\.[0-9]{2}\.[0-9]{4}$")
        .expect("CNJ pattern is a valid regex")
});

/// Pure predicate over the canonical CNJ format.
pub fn validate_format(candidate: &str) -> bool {
    CNJ_PATTERN.is_match(candidate)
}

/// A CNJ number known to match the canonical format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CnjNumber(String);

impl CnjNumber {
    /// Validate and wrap a raw number.
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if validate_format(&raw) {
            Ok(Self(raw))
        } else {
            Err(DomainError::validation(INVALID_FORMAT_MESSAGE))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for CnjNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CnjNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for CnjNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for CnjNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "1234567-12.1234.1.12.1234";

    #[test]
    fn accepts_canonical_number() {
        assert!(validate_format(VALID));
        assert!(validate_format("0000000-00.0000.0.00.0000"));
    }

    #[test]
    fn rejects_wrong_digit_counts() {
        assert!(!validate_format("123456-12.1234.1.12.1234"));
        assert!(!validate_format("12345678-12.1234.1.12.1234"));
        assert!(!validate_format("1234567-1.1234.1.12.1234"));
        assert!(!validate_format("1234567-12.123.1.12.1234"));
        assert!(!validate_format("1234567-12.1234.12.12.1234"));
        assert!(!validate_format("1234567-12.1234.1.1.1234"));
        assert!(!validate_format("1234567-12.1234.1.12.12345"));
    }

    #[test]
    fn does_not_normalize() {
        assert!(!validate_format(" 1234567-12.1234.1.12.1234"));
        assert!(!validate_format("1234567-12.1234.1.12.1234\n"));
        assert!(!validate_format("12345671212341121234"));
        assert!(!validate_format("1234567-12-1234-1-12-1234"));
        assert!(!validate_format(""));
        assert!(!validate_format("invalid"));
    }

    #[test]
    fn rejects_non_ascii_digits() {
        // Arabic-Indic digits in the first group.
        assert!(!validate_format("١٢٣٤٥٦٧-12.1234.1.12.1234"));
    }

    #[test]
    fn parse_reports_validation_error() {
        let err = CnjNumber::parse("bad").unwrap_err();
        assert_eq!(err, DomainError::validation(INVALID_FORMAT_MESSAGE));

        let ok = CnjNumber::parse(VALID).unwrap();
        assert_eq!(ok.as_str(), VALID);
    }

    #[test]
    fn deserialize_validates() {
        let ok: CnjNumber = serde_json::from_str(&format!("\"{VALID}\"")).unwrap();
        assert_eq!(ok.as_str(), VALID);
        assert!(serde_json::from_str::<CnjNumber>("\"bad\"").is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: every string built from the canonical layout is accepted.
            #[test]
            fn canonical_strings_are_accepted(
                s in "[0-9]{7}-[0-9]{2}\\.[0-9]{4}\\.[0-9]\\.[0-9]{2}\\.[0-9]{4}"
            ) {
                prop_assert!(validate_format(&s));
            }

            /// Property: dropping any single character breaks the format.
            #[test]
            fn truncated_strings_are_rejected(
                s in "[0-9]{7}-[0-9]{2}\\.[0-9]{4}\\.[0-9]\\.[0-9]{2}\\.[0-9]{4}",
                idx in 0usize..25
            ) {
                let mut chars: Vec<char> = s.chars().collect();
                chars.remove(idx);
                let truncated: String = chars.into_iter().collect();
                prop_assert!(!validate_format(&truncated));
            }

            /// Property: arbitrary strings are accepted only if they match the layout.
            #[test]
            fn arbitrary_strings_agree_with_layout(s in ".{0,40}") {
                let expected = s.len() == 25
                    && s.chars().enumerate().all(|(i, c)| match i {
                        7 => c == '-',
                        10 | 15 | 17 | 20 => c == '.',
                        _ => c.is_ascii_digit(),
                    });
                prop_assert_eq!(validate_format(&s), expected);
            }
        }
    }
}
