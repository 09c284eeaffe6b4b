//! Sequential composition of stores.

use async_trait::async_trait;
use tracing::debug;

use crate::core::{DynRepository, Repository};
use crate::error::{RepositoryError, RepositoryResult};
use crate::types::{
    Bundle, OperationResult, OperationTarget, Parameters, Resource, SearchQuery, WriteOutcome,
};

/// Tries delegates one after another.
///
/// Unlike [`Federator`](super::Federator), the proxy distinguishes a clean
/// miss from a failure: a read continues past `NotFound` but stops at any
/// other error, and a search stops at the first failing delegate. Writes go
/// to the first delegate.
#[derive(Clone, Default)]
pub struct OrderedProxy {
    delegates: Vec<DynRepository>,
}

impl std::fmt::Debug for OrderedProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.delegates.iter().map(|d| d.name()).collect();
        f.debug_struct("OrderedProxy")
            .field("delegates", &names)
            .finish()
    }
}

impl OrderedProxy {
    /// Creates a proxy over delegates in priority order.
    pub fn new(delegates: impl IntoIterator<Item = DynRepository>) -> Self {
        Self {
            delegates: delegates.into_iter().collect(),
        }
    }

    /// Appends a delegate with the lowest priority.
    pub fn with_delegate(mut self, delegate: DynRepository) -> Self {
        self.delegates.push(delegate);
        self
    }

    /// Returns the delegates in order.
    pub fn delegates(&self) -> &[DynRepository] {
        &self.delegates
    }

    fn primary(&self, operation: &str) -> RepositoryResult<&DynRepository> {
        self.delegates
            .first()
            .ok_or_else(|| RepositoryError::unsupported(self.name(), operation))
    }
}

#[async_trait]
impl Repository for OrderedProxy {
    fn name(&self) -> &str {
        "ordered-proxy"
    }

    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        for delegate in &self.delegates {
            match delegate.read(resource_type, id).await {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn create(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.primary("create")?.create(resource).await
    }

    async fn update(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.primary("update")?.update(resource).await
    }

    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        self.primary("delete")?.delete(resource_type, id).await
    }

    async fn search(&self, resource_type: &str, query: &SearchQuery) -> RepositoryResult<Bundle> {
        let mut resources = Vec::new();
        for delegate in &self.delegates {
            let bundle = delegate.search(resource_type, query).await?;
            resources.extend(bundle.into_resources());
        }
        Ok(Bundle::searchset(resources))
    }

    async fn transaction(&self, bundle: Bundle) -> RepositoryResult<Bundle> {
        self.primary("transaction")?.transaction(bundle).await
    }

    async fn invoke(
        &self,
        target: &OperationTarget,
        name: &str,
        parameters: &Parameters,
    ) -> RepositoryResult<Option<OperationResult>> {
        self.primary("invoke")?
            .invoke(target, name, parameters)
            .await
    }

    async fn history(&self, target: &OperationTarget) -> RepositoryResult<Bundle> {
        self.primary("history")?.history(target).await
    }

    async fn link(&self, url: &str) -> RepositoryResult<Option<Bundle>> {
        for delegate in &self.delegates {
            match delegate.link(url).await {
                Ok(Some(bundle)) if bundle.has_resources() => return Ok(Some(bundle)),
                Ok(_) => {}
                Err(e) => debug!(store = delegate.name(), error = %e, "Link not followed"),
            }
        }
        Ok(None)
    }
}
