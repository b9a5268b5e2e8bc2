//! Repository bundles and the executor seam they run on.

pub mod bundle;
pub mod executor;
pub mod factory;
pub mod repository;

pub use bundle::{
    AttendanceRepos, ContentRepos, DoingRepos, GivingRepos, MembershipRepos, MessagingRepos,
    ModuleRepos, ReportingRepos, RepositoryBundle, RepositorySet,
};
pub use executor::{PoolSettings, QueryExecutor, SqlxExecutor};
pub use factory::{BundleFactory, SqlxBundleFactory};
pub use repository::Repository;
