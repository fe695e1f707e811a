use std::sync::Arc;

use crate::package::Package;

/// Identity of a repository registered with a pool.
///
/// The solver decides whether a package "is installed" by comparing the
/// repository id the pool recorded at registration time, so the id stands
/// in for pointer identity on the repository itself.
pub type RepositoryId = usize;

/// A collection of packages.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    /// Repository name, used in messages only
    pub name: String,
    packages: Vec<Arc<Package>>,
}

impl Repository {
    /// Create a new empty repository
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
        }
    }

    /// Add a package to the repository
    pub fn add_package(&mut self, package: Package) -> &mut Self {
        self.packages.push(Arc::new(package));
        self
    }

    /// All packages in insertion order
    pub fn packages(&self) -> &[Arc<Package>] {
        &self.packages
    }

    /// Whether the repository contains a package with the given name
    pub fn has_package(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.packages.iter().any(|p| p.name == name)
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the repository is empty
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_add() {
        let mut repo = Repository::new("packagist");
        repo.add_package(Package::new("foo", "1.0"));
        repo.add_package(Package::new("bar", "2.0"));

        assert_eq!(repo.len(), 2);
        assert!(repo.has_package("foo"));
        assert!(repo.has_package("FOO"));
        assert!(!repo.has_package("baz"));
    }

    #[test]
    fn test_repository_preserves_order() {
        let mut repo = Repository::new("test");
        repo.add_package(Package::new("b", "1.0"));
        repo.add_package(Package::new("a", "1.0"));

        let names: Vec<_> = repo.packages().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
