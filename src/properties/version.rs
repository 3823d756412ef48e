//! Three-part version values with wildcard support.
//!
//! Versions compare part by part (`major.minor.patch`); a wildcard in
//! either operand makes that part compare equal. Shorter versions fill
//! the missing parts with wildcards, so `"1.2"` accepts any patch level.

use super::error::PropertyError;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Part {
    Num(u64),
    Wildcard,
}

/// Outcome of comparing an instance version to a reference version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionCheck {
    Equal,
    Newer,
    Older,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionSpec {
    parts: [Part; 3],
    text: String,
}

impl VersionSpec {
    /// Parses a version string, accepting wildcards (`"1.2.*"`, `"*"`)
    /// and trailing pre-release suffixes on numeric parts (`"1.0.1rc1"`).
    pub fn parse(text: &str) -> Result<VersionSpec, PropertyError> {
        let invalid = || PropertyError::InvalidVersionFormat(text.to_string());
        let pieces: Vec<&str> = text.split('.').collect();
        if pieces.is_empty() || pieces.len() > 3 {
            return Err(invalid());
        }
        let mut parts = [Part::Wildcard; 3];
        for (slot, piece) in parts.iter_mut().zip(&pieces) {
            *slot = if *piece == "*" {
                Part::Wildcard
            } else {
                let digits: String = piece.chars().take_while(char::is_ascii_digit).collect();
                if digits.is_empty() {
                    return Err(invalid());
                }
                let rest = &piece[digits.len()..];
                if !rest.is_empty() && !rest.chars().all(char::is_alphanumeric) {
                    return Err(invalid());
                }
                Part::Num(digits.parse().map_err(|_| invalid())?)
            };
        }
        Ok(VersionSpec {
            parts,
            text: text.to_string(),
        })
    }

    /// Compares `self` (the instance version) against a reference.
    pub fn compare(&self, reference: &VersionSpec) -> VersionCheck {
        for (mine, theirs) in self.parts.iter().zip(&reference.parts) {
            match (mine, theirs) {
                (Part::Num(a), Part::Num(b)) if a != b => {
                    return if a > b {
                        VersionCheck::Newer
                    } else {
                        VersionCheck::Older
                    };
                }
                _ => {}
            }
        }
        VersionCheck::Equal
    }

    /// The implicit minimum version floor: the major part with minor and
    /// patch zeroed.
    pub fn major_floor(&self) -> VersionSpec {
        let major = match self.parts[0] {
            Part::Num(n) => n,
            Part::Wildcard => 0,
        };
        VersionSpec {
            parts: [Part::Num(major), Part::Num(0), Part::Num(0)],
            text: format!("{major}.0.0"),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_formats() {
        for text in ["1.2.3", "1.2.*", "1.*", "*", "1.1.1", "1.0.1rc1"] {
            assert!(VersionSpec::parse(text).is_ok(), "version {text}");
        }
    }

    #[test]
    fn test_invalid_formats() {
        for text in ["1.k.3", "invalid.2.*", "not a version", "1.2.3.4", ""] {
            assert!(VersionSpec::parse(text).is_err(), "version {text}");
        }
    }

    #[test]
    fn test_comparison() {
        let compare = |a: &str, b: &str| {
            VersionSpec::parse(a)
                .unwrap()
                .compare(&VersionSpec::parse(b).unwrap())
        };
        assert_eq!(compare("1.2.3", "1.2.3"), VersionCheck::Equal);
        assert_eq!(compare("1.2.4", "1.2.3"), VersionCheck::Newer);
        assert_eq!(compare("1.2.2", "1.2.3"), VersionCheck::Older);
        assert_eq!(compare("2.0.0", "1.9.9"), VersionCheck::Newer);
        // wildcards match anything at their position
        assert_eq!(compare("1.2.*", "1.2.9"), VersionCheck::Equal);
        assert_eq!(compare("*", "3.1.4"), VersionCheck::Equal);
    }

    #[test]
    fn test_major_floor() {
        let floor = VersionSpec::parse("2.7.1").unwrap().major_floor();
        assert_eq!(floor.to_string(), "2.0.0");
        assert_eq!(
            VersionSpec::parse("2.0.0").unwrap().compare(&floor),
            VersionCheck::Equal
        );
    }
}
