use std::fmt;

use serde::{Deserialize, Serialize};
use strata_semver::{Constraint, Version};

use super::link::{Link, LinkType};

/// A package: a named, versioned unit with links to other packages.
///
/// Packages are immutable once handed to a repository. The pool assigns
/// ids and tracks the originating repository; the package itself carries
/// only its own metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Package name (lowercase)
    pub name: String,
    /// Package version
    pub version: Version,
    /// Required dependencies
    pub requires: Vec<Link>,
    /// Declared conflicts
    pub conflicts: Vec<Link>,
    /// Provided virtual package names
    pub provides: Vec<Link>,
    /// Replaced package names
    pub replaces: Vec<Link>,
    /// Recommended companions
    pub recommends: Vec<Link>,
    /// Suggested companions
    pub suggests: Vec<Link>,
}

impl Package {
    /// Create a new package with the given name and version
    pub fn new(name: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            version: version.into(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            provides: Vec::new(),
            replaces: Vec::new(),
            recommends: Vec::new(),
            suggests: Vec::new(),
        }
    }

    /// Add a requirement
    pub fn require(mut self, target: &str, constraint: Constraint) -> Self {
        self.requires.push(Link::new(target, constraint, LinkType::Require));
        self
    }

    /// Add a conflict
    pub fn conflict(mut self, target: &str, constraint: Constraint) -> Self {
        self.conflicts.push(Link::new(target, constraint, LinkType::Conflict));
        self
    }

    /// Add a provided virtual package name
    pub fn provide(mut self, target: &str, constraint: Constraint) -> Self {
        self.provides.push(Link::new(target, constraint, LinkType::Provide));
        self
    }

    /// Add a replaced package name
    pub fn replace(mut self, target: &str, constraint: Constraint) -> Self {
        self.replaces.push(Link::new(target, constraint, LinkType::Replace));
        self
    }

    /// Add a recommended companion
    pub fn recommend(mut self, target: &str, constraint: Constraint) -> Self {
        self.recommends.push(Link::new(target, constraint, LinkType::Recommend));
        self
    }

    /// Add a suggested companion
    pub fn suggest(mut self, target: &str, constraint: Constraint) -> Self {
        self.suggests.push(Link::new(target, constraint, LinkType::Suggest));
        self
    }

    /// All names under which this package can satisfy a requirement:
    /// its own name plus everything it provides or replaces.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.provides.iter().map(|l| l.target.as_str()))
            .chain(self.replaces.iter().map(|l| l.target.as_str()))
    }

    /// `name-version` form used in messages
    pub fn pretty_string(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_new() {
        let pkg = Package::new("Vendor/A", "1.0.0");
        assert_eq!(pkg.name, "vendor/a");
        assert_eq!(pkg.version, Version::parse("1.0.0"));
        assert!(pkg.requires.is_empty());
    }

    #[test]
    fn test_package_links() {
        let pkg = Package::new("a", "1.0")
            .require("b", Constraint::Any)
            .conflict("c", Constraint::Any)
            .provide("virt", Constraint::Any);

        assert_eq!(pkg.requires.len(), 1);
        assert_eq!(pkg.conflicts.len(), 1);
        assert_eq!(pkg.provides.len(), 1);
        assert_eq!(pkg.requires[0].link_type, LinkType::Require);
    }

    #[test]
    fn test_package_names() {
        let pkg = Package::new("a", "1.0")
            .provide("virt", Constraint::Any)
            .replace("old-a", Constraint::Any);

        let names: Vec<_> = pkg.names().collect();
        assert_eq!(names, vec!["a", "virt", "old-a"]);
    }

    #[test]
    fn test_package_pretty_string() {
        let pkg = Package::new("foo", "2.1");
        assert_eq!(pkg.pretty_string(), "foo-2.1");
    }
}
