use super::pool::PackageId;

/// One user-level job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobCommand {
    /// Install one of the job's candidates
    Install,
    /// Remove every candidate
    Remove,
    /// Update the named installed packages
    Update,
    /// Update every installed package
    UpdateAll,
    /// Re-enforce the dependencies of the named installed packages
    Fix,
    /// Re-enforce the dependencies of every installed package
    FixAll,
    /// Pin a candidate to its current state
    Lock,
}

/// A job: a command, the name it was requested under, and the candidate
/// packages the caller resolved for it via the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub command: JobCommand,
    /// The requested package name, when the job names one
    pub package_name: Option<String>,
    /// Resolved candidates, in pool order
    pub packages: Vec<PackageId>,
}

impl Job {
    pub fn new(command: JobCommand, package_name: Option<String>, packages: Vec<PackageId>) -> Self {
        Self {
            command,
            package_name,
            packages,
        }
    }
}

/// The user's declared jobs, in order.
///
/// Name-and-constraint resolution happens before the request reaches the
/// solver: callers look candidates up in the pool and hand over package
/// ids.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub jobs: Vec<Job>,
}

impl Request {
    /// Create a new empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Install one of `packages`
    pub fn install(&mut self, name: impl Into<String>, packages: Vec<PackageId>) -> &mut Self {
        self.push(JobCommand::Install, Some(name.into()), packages)
    }

    /// Remove all of `packages`
    pub fn remove(&mut self, name: impl Into<String>, packages: Vec<PackageId>) -> &mut Self {
        self.push(JobCommand::Remove, Some(name.into()), packages)
    }

    /// Update the installed packages among `packages`
    pub fn update(&mut self, name: impl Into<String>, packages: Vec<PackageId>) -> &mut Self {
        self.push(JobCommand::Update, Some(name.into()), packages)
    }

    /// Update every installed package
    pub fn update_all(&mut self) -> &mut Self {
        self.push(JobCommand::UpdateAll, None, Vec::new())
    }

    /// Repair the dependencies of the installed packages among `packages`
    pub fn fix(&mut self, name: impl Into<String>, packages: Vec<PackageId>) -> &mut Self {
        self.push(JobCommand::Fix, Some(name.into()), packages)
    }

    /// Repair the dependencies of every installed package
    pub fn fix_all(&mut self) -> &mut Self {
        self.push(JobCommand::FixAll, None, Vec::new())
    }

    /// Keep each candidate exactly as it currently is
    pub fn lock(&mut self, name: impl Into<String>, packages: Vec<PackageId>) -> &mut Self {
        self.push(JobCommand::Lock, Some(name.into()), packages)
    }

    fn push(
        &mut self,
        command: JobCommand,
        package_name: Option<String>,
        packages: Vec<PackageId>,
    ) -> &mut Self {
        self.jobs.push(Job::new(command, package_name, packages));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
