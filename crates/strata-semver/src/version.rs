use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A package version.
///
/// Versions are dotted numeric components with an optional pre-release tag
/// (`1.2.0-beta1`). Parsing is lenient and never fails: anything after the
/// first non-numeric character of a component becomes the pre-release tag,
/// and missing components compare as zero, so `1.0` equals `1.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    parts: Vec<u64>,
    pre: Option<String>,
}

impl Version {
    /// Parse a version string.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (numeric, pre) = match input.split_once('-') {
            Some((head, tail)) if !tail.is_empty() => (head, Some(tail.to_string())),
            _ => (input, None),
        };

        let mut parts = Vec::new();
        let mut pre = pre;
        for component in numeric.split('.') {
            let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                // non-numeric component, e.g. "1.0.x" or "dev"
                if pre.is_none() && !component.is_empty() {
                    pre = Some(component.to_string());
                }
                break;
            }
            // leading digits always fit or saturate
            parts.push(digits.parse().unwrap_or(u64::MAX));
            if digits.len() != component.len() {
                if pre.is_none() {
                    pre = Some(component[digits.len()..].trim_start_matches(['-', '_']).to_string());
                }
                break;
            }
        }

        Version { parts, pre }
    }

    /// The numeric components.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// The pre-release tag, if any.
    pub fn pre_release(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    /// Whether this is a stable (non-pre-release) version.
    pub fn is_stable(&self) -> bool {
        self.pre.is_none()
    }

    fn part(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            match self.part(i).cmp(&other.part(i)) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }

        // a release outranks any pre-release of the same number
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Version {
    fn from(input: &str) -> Self {
        Version::parse(input)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            write!(f, "0")?;
        } else {
            for (i, part) in self.parts.iter().enumerate() {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{}", part)?;
            }
        }
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("1.2.3");
        assert_eq!(v.parts(), &[1, 2, 3]);
        assert!(v.is_stable());
    }

    #[test]
    fn test_version_parse_pre_release() {
        let v = Version::parse("1.0.0-beta1");
        assert_eq!(v.parts(), &[1, 0, 0]);
        assert_eq!(v.pre_release(), Some("beta1"));
    }

    #[test]
    fn test_version_parse_embedded_suffix() {
        let v = Version::parse("1.0rc2");
        assert_eq!(v.parts(), &[1]);
        assert_eq!(v.pre_release(), Some("rc2"));
    }

    #[test]
    fn test_version_missing_parts_are_zero() {
        assert_eq!(Version::parse("1.0"), Version::parse("1.0.0"));
        assert_eq!(Version::parse("2"), Version::parse("2.0.0"));
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::parse("2.0") > Version::parse("1.9.9"));
        assert!(Version::parse("1.10") > Version::parse("1.9"));
        assert!(Version::parse("1.0.0") > Version::parse("1.0.0-beta"));
        assert!(Version::parse("1.0.0-beta") > Version::parse("1.0.0-alpha"));
    }

    #[test]
    fn test_version_display_round_trip() {
        assert_eq!(Version::parse("1.2.3").to_string(), "1.2.3");
        assert_eq!(Version::parse("1.0.0-rc1").to_string(), "1.0.0-rc1");
    }
}
