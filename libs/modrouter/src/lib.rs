//! Context-scoped routing of data access to per-module databases.
//!
//! Each module (membership, attendance, content, ...) lives in its own physical
//! database. Connection strings are parsed once into a [`ConnectionConfigStore`];
//! a unit of work declares which module it acts as with [`ModuleContext::run_as`];
//! and [`RepositoryRegistry`] hands out that module's [`RepositoryBundle`], building
//! it on first use.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod module_key;
pub mod registry;
pub mod repos;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::ModuleContext;
pub use descriptor::{ConnectionDescriptor, Engine, ParseError};
pub use error::RouterError;
pub use module_key::{ModuleKey, UnknownModule};
pub use registry::RepositoryRegistry;
pub use repos::{
    BundleFactory, ModuleRepos, PoolSettings, QueryExecutor, Repository, RepositoryBundle,
    SqlxBundleFactory,
};
pub use store::{AbsentReason, ConnectionConfigStore, ConnectionSummary, Lookup, StoreStatus};
