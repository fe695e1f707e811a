// Package model for Strata packages.

mod link;
mod package;

pub use link::{Link, LinkType};
pub use package::Package;
