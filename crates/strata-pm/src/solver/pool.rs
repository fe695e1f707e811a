use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use strata_semver::Constraint;

use crate::package::Package;
use crate::repository::{Repository, RepositoryId};

/// Identifier of a package registered with a pool.
///
/// Ids are dense, positive, and assigned in repository registration order,
/// then in-repo order. They double as SAT variables: the literal `+id`
/// means "install", `-id` means "don't install".
pub type PackageId = i32;

/// Pool of all candidate packages for dependency resolution.
///
/// The pool indexes packages across every registered repository and answers
/// `what_provides(name, constraint)` queries: which packages satisfy a
/// requirement on `name`, either under their own name or through a
/// `provides`/`replaces` link. Results are memoized per query.
#[derive(Debug, Default)]
pub struct Pool {
    repositories: Vec<Repository>,

    /// All packages, in id order (id is index + 1)
    packages: Vec<Arc<Package>>,

    /// Originating repository per package, parallel to `packages`
    package_repos: Vec<RepositoryId>,

    /// Lazy index: name -> ids of packages matching under that name
    name_index: RefCell<HashMap<String, Vec<PackageId>>>,
    name_index_built: RefCell<bool>,

    /// Memoized `what_provides` results, keyed by (name, constraint digest)
    provides_cache: RefCell<HashMap<(String, String), Vec<PackageId>>>,
}

impl Pool {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository, assigning ids to its packages.
    ///
    /// Invalidates the name index and the `what_provides` cache.
    pub fn add_repository(&mut self, repository: Repository) -> RepositoryId {
        let repo_id = self.repositories.len();
        for package in repository.packages() {
            self.packages.push(Arc::clone(package));
            self.package_repos.push(repo_id);
        }
        self.repositories.push(repository);

        self.name_index.borrow_mut().clear();
        *self.name_index_built.borrow_mut() = false;
        self.provides_cache.borrow_mut().clear();

        repo_id
    }

    /// Get a package by its id
    pub fn package(&self, id: PackageId) -> Option<&Arc<Package>> {
        if id <= 0 {
            return None;
        }
        self.packages.get(id as usize - 1)
    }

    /// The repository a package was registered from
    pub fn repository_of(&self, id: PackageId) -> Option<RepositoryId> {
        if id <= 0 {
            return None;
        }
        self.package_repos.get(id as usize - 1).copied()
    }

    /// A registered repository by id
    pub fn repository(&self, id: RepositoryId) -> Option<&Repository> {
        self.repositories.get(id)
    }

    /// Ids of all packages registered from a repository, in order
    pub fn repository_packages(&self, repo: RepositoryId) -> Vec<PackageId> {
        self.package_repos
            .iter()
            .enumerate()
            .filter(|(_, &r)| r == repo)
            .map(|(i, _)| (i + 1) as PackageId)
            .collect()
    }

    /// Total number of packages in the pool
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the pool has no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All packages that satisfy a requirement on `name`.
    ///
    /// A package matches when its own name equals `name` or one of its
    /// `provides`/`replaces` links targets `name`, and its version
    /// satisfies `constraint` (`None` matches everything). Results ascend
    /// by id, so ordering follows repository registration order and is
    /// stable across calls.
    pub fn what_provides(&self, name: &str, constraint: Option<&Constraint>) -> Vec<PackageId> {
        let name = name.to_lowercase();
        let digest = constraint.map_or_else(|| "*".to_string(), |c| c.to_string());
        let key = (name.clone(), digest);

        if let Some(cached) = self.provides_cache.borrow().get(&key) {
            return cached.clone();
        }

        self.build_name_index();

        let candidates = self
            .name_index
            .borrow()
            .get(&name)
            .cloned()
            .unwrap_or_default();

        let result: Vec<PackageId> = candidates
            .into_iter()
            .filter(|&id| match constraint {
                None => true,
                Some(c) => self
                    .package(id)
                    .is_some_and(|p| c.matches(&p.version)),
            })
            .collect();

        self.provides_cache.borrow_mut().insert(key, result.clone());
        result
    }

    fn build_name_index(&self) {
        if *self.name_index_built.borrow() {
            return;
        }

        let mut index: HashMap<String, Vec<PackageId>> = HashMap::new();
        for (i, package) in self.packages.iter().enumerate() {
            let id = (i + 1) as PackageId;
            for provided in package.names() {
                let ids = index.entry(provided.to_string()).or_default();
                // a package providing its own name twice is indexed once
                if ids.last() != Some(&id) {
                    ids.push(id);
                }
            }
        }

        *self.name_index.borrow_mut() = index;
        *self.name_index_built.borrow_mut() = true;
    }
}
