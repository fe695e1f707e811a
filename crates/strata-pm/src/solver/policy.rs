use std::cmp::Ordering;
use std::collections::HashSet;

use super::pool::{PackageId, Pool};
use super::rule::{literal_package, Literal};

/// Candidate filtering and preference ordering.
///
/// The policy decides which packages are installable at all, which
/// packages count as update candidates for an installed package, and in
/// which order competing candidates should be tried. Implementations must
/// be deterministic: the same inputs must produce the same order, or
/// solving stops being reproducible.
pub trait Policy {
    /// Whether a package can be installed on this system at all
    fn installable(&self, pool: &Pool, package: PackageId) -> bool;

    /// Update candidates for an installed package: other providers of the
    /// package's own name. Downgrades are excluded unless
    /// `allow_downgrade` is set.
    fn find_update_packages(
        &self,
        pool: &Pool,
        installed_map: &HashSet<PackageId>,
        package: PackageId,
        allow_downgrade: bool,
    ) -> Vec<PackageId>;

    /// Order candidate literals by preference, best first. The solver
    /// decides the first literal and keeps the rest as branch
    /// alternatives.
    fn select_preferred(
        &self,
        pool: &Pool,
        installed_map: &HashSet<PackageId>,
        candidates: &[Literal],
    ) -> Vec<Literal>;

    /// Whether installed packages may be dropped to satisfy the request.
    /// When true, update and feature rules are added weak, so conflicts
    /// with them silently disable them instead of failing the solve.
    fn allow_uninstall(&self) -> bool;
}

/// Default policy: everything is installable, prefer the highest version,
/// prefer the installed instance among equal versions, never uninstall
/// implicitly.
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicy {
    allow_uninstall: bool,
}

impl DefaultPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow update/feature rules to be dropped on conflict
    pub fn with_allow_uninstall(mut self, allow: bool) -> Self {
        self.allow_uninstall = allow;
        self
    }

    fn compare_preference(
        &self,
        pool: &Pool,
        installed_map: &HashSet<PackageId>,
        a: PackageId,
        b: PackageId,
    ) -> Ordering {
        let pkg_a = pool.package(a);
        let pkg_b = pool.package(b);

        if let (Some(pa), Some(pb)) = (pkg_a, pkg_b) {
            // highest version first
            match pb.version.cmp(&pa.version) {
                Ordering::Equal => {}
                ordering => return ordering,
            }
            // among equal versions keep the installed instance
            let a_installed = installed_map.contains(&a);
            let b_installed = installed_map.contains(&b);
            if a_installed != b_installed {
                return if a_installed { Ordering::Less } else { Ordering::Greater };
            }
        }

        // pool insertion order as the final deterministic tie break
        a.cmp(&b)
    }
}

impl Policy for DefaultPolicy {
    fn installable(&self, _pool: &Pool, _package: PackageId) -> bool {
        true
    }

    fn find_update_packages(
        &self,
        pool: &Pool,
        _installed_map: &HashSet<PackageId>,
        package: PackageId,
        allow_downgrade: bool,
    ) -> Vec<PackageId> {
        let Some(current) = pool.package(package) else {
            return Vec::new();
        };

        pool.what_provides(&current.name, None)
            .into_iter()
            .filter(|&candidate| {
                if candidate == package {
                    return false;
                }
                if allow_downgrade {
                    return true;
                }
                pool.package(candidate)
                    .map(|p| p.version >= current.version)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn select_preferred(
        &self,
        pool: &Pool,
        installed_map: &HashSet<PackageId>,
        candidates: &[Literal],
    ) -> Vec<Literal> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(|&a, &b| {
            self.compare_preference(
                pool,
                installed_map,
                literal_package(a),
                literal_package(b),
            )
        });
        sorted
    }

    fn allow_uninstall(&self) -> bool {
        self.allow_uninstall
    }
}
