use std::fmt;

use serde::{Deserialize, Serialize};
use strata_semver::Constraint;

/// Type of package link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Regular require dependency
    Require,
    /// Conflicts with this package
    Conflict,
    /// Package provides this virtual package
    Provide,
    /// Replaces this package
    Replace,
    /// Recommended companion (no hard rule, traversed for rule generation)
    Recommend,
    /// Suggested companion (no hard rule, traversed for rule generation)
    Suggest,
}

impl LinkType {
    /// Returns a human-readable description of the link type
    pub fn description(&self) -> &'static str {
        match self {
            LinkType::Require => "requires",
            LinkType::Conflict => "conflicts with",
            LinkType::Provide => "provides",
            LinkType::Replace => "replaces",
            LinkType::Recommend => "recommends",
            LinkType::Suggest => "suggests",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A link from a package to a named target with a version constraint.
///
/// Links express every relation a package declares: requirements,
/// conflicts, provided virtual names, replacements, recommendations and
/// suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Target package name (lowercase)
    pub target: String,
    /// Version constraint on the target
    pub constraint: Constraint,
    /// Type of link
    pub link_type: LinkType,
}

impl Link {
    /// Creates a new link
    pub fn new(target: impl Into<String>, constraint: Constraint, link_type: LinkType) -> Self {
        Self {
            target: target.into().to_lowercase(),
            constraint,
            link_type,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.link_type, self.target, self.constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_lowercases_target() {
        let link = Link::new("Vendor/Pkg", Constraint::Any, LinkType::Require);
        assert_eq!(link.target, "vendor/pkg");
    }

    #[test]
    fn test_link_display() {
        let link = Link::new("foo", Constraint::parse(">=1.0").unwrap(), LinkType::Conflict);
        assert_eq!(link.to_string(), "conflicts with foo (>= 1.0)");
    }
}
