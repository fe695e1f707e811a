use std::fmt;
use std::sync::Arc;

use crate::package::Package;

/// A single operation in a transaction
#[derive(Debug, Clone)]
pub enum Operation {
    /// Install a new package
    Install(Arc<Package>),
    /// Remove an installed package
    Remove(Arc<Package>),
}

impl Operation {
    pub fn package(&self) -> &Arc<Package> {
        match self {
            Operation::Install(p) | Operation::Remove(p) => p,
        }
    }
}

/// The ordered list of installs and removals a solve produced.
///
/// Operations are ordered so that removals that unblock other operations
/// come before the installs that depend on them; an empty transaction
/// means no change is required.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_install(&mut self, package: Arc<Package>) {
        self.operations.push(Operation::Install(package));
    }

    pub fn push_remove(&mut self, package: Arc<Package>) {
        self.operations.push(Operation::Remove(package));
    }

    /// Reverse the operation order (the solver builds the list backwards)
    pub fn reverse(&mut self) {
        self.operations.reverse();
    }

    /// Packages being installed
    pub fn installs(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Install(p) => Some(p),
            _ => None,
        })
    }

    /// Packages being removed
    pub fn removals(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Remove(p) => Some(p),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operations.is_empty() {
            return write!(f, "nothing to do");
        }
        for (i, op) in self.operations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match op {
                Operation::Install(p) => write!(f, "install {}", p.pretty_string())?,
                Operation::Remove(p) => write!(f, "remove {}", p.pretty_string())?,
            }
        }
        Ok(())
    }
}
