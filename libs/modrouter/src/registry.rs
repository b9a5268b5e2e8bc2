//! Build-once, per-module cache of repository bundles.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::context::ModuleContext;
use crate::error::RouterError;
use crate::module_key::ModuleKey;
use crate::repos::{BundleFactory, RepositoryBundle};
use crate::store::ConnectionConfigStore;

type BundleCell = Arc<OnceCell<Arc<RepositoryBundle>>>;

/// Hands out the repository bundle of a module, building it on first use.
///
/// Concurrent first requests for the same module share one build; a failed build
/// leaves the cell empty so a later request may retry.
pub struct RepositoryRegistry {
    store: Arc<ConnectionConfigStore>,
    factory: Arc<dyn BundleFactory>,
    cache: DashMap<ModuleKey, BundleCell>,
}

impl std::fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field("store", &self.store)
            .field("cached", &self.cached_modules())
            .finish()
    }
}

impl RepositoryRegistry {
    pub fn new(store: Arc<ConnectionConfigStore>, factory: Arc<dyn BundleFactory>) -> Self {
        Self {
            store,
            factory,
            cache: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<ConnectionConfigStore> {
        &self.store
    }

    /// Bundle for `module`, built on first use.
    pub async fn get(&self, module: ModuleKey) -> Result<Arc<RepositoryBundle>, RouterError> {
        let descriptor = self.store.get(module).ok_or_else(|| {
            let reason = self
                .store
                .absence_reason(module)
                .unwrap_or(crate::store::AbsentReason::Missing);
            tracing::debug!(module = %module, %reason, "Module unavailable");
            RouterError::ModuleUnavailable { module, reason }
        })?;

        // Clone the cell out so the map shard is not held across the build.
        let cell = {
            let entry = self.cache.entry(module).or_default();
            Arc::clone(entry.value())
        };

        let bundle = cell
            .get_or_try_init(|| async {
                tracing::info!(module = %module, descriptor = %descriptor, "Building repository bundle");
                let bundle = self
                    .factory
                    .build(module, Arc::clone(&descriptor))
                    .await
                    .map_err(|source| {
                        tracing::error!(module = %module, error = %source, "Repository bundle build failed");
                        RouterError::Build { module, source }
                    })?;
                Ok::<_, RouterError>(Arc::new(bundle))
            })
            .await?;

        Ok(Arc::clone(bundle))
    }

    /// Bundle for whichever module the calling task is scoped to.
    pub async fn get_for_current_context(&self) -> Result<Arc<RepositoryBundle>, RouterError> {
        let module = ModuleContext::require()?;
        self.get(module).await
    }

    /// Modules whose bundle has been built.
    pub fn cached_modules(&self) -> Vec<ModuleKey> {
        let mut modules: Vec<_> = self
            .cache
            .iter()
            .filter(|e| e.value().initialized())
            .map(|e| *e.key())
            .collect();
        modules.sort();
        modules
    }

    /// Forget every built bundle. Only meant for test teardown.
    pub fn reset(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::{ContentRepos, MembershipRepos, MessagingRepos};
    use crate::store::AbsentReason;
    use crate::testing::CountingFactory;

    fn registry_with(
        entries: &[(ModuleKey, &str)],
        factory: Arc<CountingFactory>,
    ) -> RepositoryRegistry {
        let store = Arc::new(ConnectionConfigStore::new());
        for (module, raw) in entries {
            let _ = store.load(*module, raw);
        }
        RepositoryRegistry::new(store, factory)
    }

    #[tokio::test]
    async fn test_get_builds_once_and_caches() {
        let factory = Arc::new(CountingFactory::new());
        let registry = registry_with(
            &[(ModuleKey::Content, "mysql://u:p@db/content")],
            factory.clone(),
        );

        let a = registry.get(ModuleKey::Content).await.unwrap();
        let b = registry.get(ModuleKey::Content).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.builds(), 1);
        assert_eq!(a.module(), ModuleKey::Content);
        assert!(a.repos::<ContentRepos>().is_ok());
        assert_eq!(registry.cached_modules(), vec![ModuleKey::Content]);
    }

    #[tokio::test]
    async fn test_unconfigured_module_is_unavailable_without_build() {
        let factory = Arc::new(CountingFactory::new());
        let registry = registry_with(&[], factory.clone());
        registry.store().mark_missing(ModuleKey::Giving);

        let err = registry.get(ModuleKey::Giving).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::ModuleUnavailable {
                module: ModuleKey::Giving,
                reason: AbsentReason::Missing
            }
        ));
        assert!(err.is_unavailable());
        assert_eq!(factory.builds(), 0);
    }

    #[tokio::test]
    async fn test_malformed_module_reports_reason() {
        let factory = Arc::new(CountingFactory::new());
        let registry = registry_with(&[(ModuleKey::Doing, "redis://u@h/db")], factory.clone());

        match registry.get(ModuleKey::Doing).await {
            Err(RouterError::ModuleUnavailable {
                reason: AbsentReason::Malformed(msg),
                ..
            }) => assert!(msg.contains("redis")),
            other => panic!("expected malformed, got {other:?}"),
        }
        assert_eq!(factory.builds(), 0);
    }

    #[tokio::test]
    async fn test_alias_gets_its_own_membership_bundle() {
        let factory = Arc::new(CountingFactory::new());
        let registry = registry_with(
            &[
                (ModuleKey::Membership, "mysql://u:p@db/membership"),
                (ModuleKey::MembershipForDoing, "mysql://u:p@db/membership"),
            ],
            factory.clone(),
        );

        let primary = registry.get(ModuleKey::Membership).await.unwrap();
        let alias = registry.get(ModuleKey::MembershipForDoing).await.unwrap();

        assert!(!Arc::ptr_eq(&primary, &alias));
        assert_eq!(alias.module(), ModuleKey::MembershipForDoing);
        assert!(alias.repos::<MembershipRepos>().is_ok());
        assert_eq!(factory.builds(), 2);
    }

    #[tokio::test]
    async fn test_schema_mismatch() {
        let factory = Arc::new(CountingFactory::new());
        let registry = registry_with(
            &[(ModuleKey::Content, "mysql://u:p@db/content")],
            factory,
        );

        let bundle = registry.get(ModuleKey::Content).await.unwrap();
        let err = bundle.repos::<MessagingRepos>().unwrap_err();
        assert!(matches!(
            err,
            RouterError::SchemaMismatch {
                module: ModuleKey::Content,
                expected: ModuleKey::Messaging,
                actual: ModuleKey::Content
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        let factory = Arc::new(CountingFactory::new().failing());
        let registry = registry_with(
            &[(ModuleKey::Reporting, "postgres://u@pg/reporting")],
            factory.clone(),
        );

        assert!(matches!(
            registry.get(ModuleKey::Reporting).await,
            Err(RouterError::Build { module: ModuleKey::Reporting, .. })
        ));
        assert!(registry.get(ModuleKey::Reporting).await.is_err());
        assert_eq!(factory.builds(), 2);
        assert!(registry.cached_modules().is_empty());
    }

    #[tokio::test]
    async fn test_current_context_routing() {
        let factory = Arc::new(CountingFactory::new());
        let registry = registry_with(
            &[
                (ModuleKey::Content, "mysql://u:p@db/content"),
                (ModuleKey::Messaging, "mysql://u:p@db/messaging"),
            ],
            factory.clone(),
        );

        assert!(matches!(
            registry.get_for_current_context().await,
            Err(RouterError::NoActiveContext)
        ));
        assert_eq!(factory.builds(), 0);

        let bundle = ModuleContext::run_as(ModuleKey::Messaging, registry.get_for_current_context())
            .await
            .unwrap();
        assert_eq!(bundle.module(), ModuleKey::Messaging);
    }

    #[tokio::test]
    async fn test_reset_forces_rebuild() {
        let factory = Arc::new(CountingFactory::new());
        let registry = registry_with(
            &[(ModuleKey::Content, "mysql://u:p@db/content")],
            factory.clone(),
        );

        let first = registry.get(ModuleKey::Content).await.unwrap();
        registry.reset();
        let second = registry.get(ModuleKey::Content).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.builds(), 2);
    }

    #[tokio::test]
    async fn test_repository_primitives_route_through_executor() {
        let factory = Arc::new(CountingFactory::new().with_count("notifications", 7));
        let registry = registry_with(
            &[(ModuleKey::Messaging, "postgres://u@pg/messaging")],
            factory.clone(),
        );

        let bundle = registry.get(ModuleKey::Messaging).await.unwrap();
        let repos = bundle.repos::<MessagingRepos>().unwrap();
        assert_eq!(repos.notifications.count().await.unwrap(), 7);
        assert!(repos.devices.delete("abc").await.unwrap());
        bundle.ping().await.unwrap();

        let seen = factory.executor_for(ModuleKey::Messaging).unwrap().statements();
        assert_eq!(seen[0].statement, "SELECT COUNT(*) FROM \"notifications\"");
        assert_eq!(seen[1].statement, "DELETE FROM \"devices\" WHERE id = $1");
        assert_eq!(seen[1].params, vec!["abc".to_string()]);
        assert_eq!(seen[2].statement, "SELECT 1");
    }
}
