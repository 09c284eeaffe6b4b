//! The repository contract.
//!
//! This module defines the [`Repository`] trait, the single interface through
//! which every store and composite is used. Client code holds a
//! [`DynRepository`] and never learns whether a resource lives in memory, on
//! disk, behind a category router or in a federation of stores.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RepositoryError, RepositoryResult};
use crate::types::{
    Bundle, BundleEntry, BundleMethod, BundleResponse, BundleType, OperationResult,
    OperationTarget, Parameters, Resource, SearchQuery, WriteOutcome,
};

/// Uniform access to a store of typed resources.
///
/// `read`, `create`, `update`, `delete` and `search` are mandatory. The
/// remaining operations default to [`RepositoryError::Unsupported`] so that a
/// store which cannot perform them fails fast instead of silently doing
/// nothing.
///
/// Identifiers are versionless: a `/_history/{version}` suffix on an id is
/// accepted and ignored.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use helios_repository::{DynRepository, InMemoryStore, Repository};
/// use helios_repository::types::{Resource, SearchQuery};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), helios_repository::RepositoryError> {
/// let repo: DynRepository = Arc::new(InMemoryStore::new());
///
/// let outcome = repo
///     .create(Resource::new("Patient", json!({"name": [{"family": "Smith"}]})))
///     .await?;
/// assert!(outcome.created);
///
/// let patient = repo.read("Patient", outcome.id.id()).await?;
/// assert_eq!(patient.content()["name"][0]["family"], "Smith");
///
/// let all = repo.search("Patient", &SearchQuery::new()).await?;
/// assert_eq!(all.len(), 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Repository: Send + Sync {
    /// Returns a human-readable name for this store, used in logs and
    /// failure reports.
    fn name(&self) -> &str;

    /// Reads a resource by type and logical id.
    ///
    /// # Errors
    ///
    /// * `RepositoryError::NotFound` - If no resource has that identifier
    /// * `RepositoryError::Internal` - If the backing storage could not be read
    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource>;

    /// Stores a new resource, assigning an id if it has none.
    ///
    /// # Errors
    ///
    /// * `RepositoryError::AlreadyExists` - If the supplied id is taken
    /// * `RepositoryError::Unsupported` - If the store is read-only
    async fn create(&self, resource: Resource) -> RepositoryResult<WriteOutcome>;

    /// Replaces the resource with the same identifier, creating it if absent.
    ///
    /// # Errors
    ///
    /// * `RepositoryError::InvalidResource` - If the resource has no id
    /// * `RepositoryError::Unsupported` - If the store is read-only
    async fn update(&self, resource: Resource) -> RepositoryResult<WriteOutcome>;

    /// Removes a resource.
    ///
    /// # Errors
    ///
    /// * `RepositoryError::NotFound` - If no resource has that identifier
    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()>;

    /// Returns every resource of the type that matches all query parameters.
    ///
    /// An empty query returns every resource of the type.
    async fn search(&self, resource_type: &str, query: &SearchQuery) -> RepositoryResult<Bundle>;

    /// Applies the writes of a transaction bundle.
    async fn transaction(&self, _bundle: Bundle) -> RepositoryResult<Bundle> {
        Err(RepositoryError::unsupported(self.name(), "transaction"))
    }

    /// Invokes a named operation.
    ///
    /// Returns `Ok(None)` when the operation ran but produced nothing.
    async fn invoke(
        &self,
        _target: &OperationTarget,
        name: &str,
        _parameters: &Parameters,
    ) -> RepositoryResult<Option<OperationResult>> {
        Err(RepositoryError::unsupported(
            self.name(),
            format!("invoke {}", name),
        ))
    }

    /// Returns the version history at the given level.
    async fn history(&self, _target: &OperationTarget) -> RepositoryResult<Bundle> {
        Err(RepositoryError::unsupported(self.name(), "history"))
    }

    /// Follows a continuation link of a previous result.
    async fn link(&self, _url: &str) -> RepositoryResult<Option<Bundle>> {
        Err(RepositoryError::unsupported(self.name(), "link"))
    }
}

/// A shared, dynamically dispatched repository.
pub type DynRepository = Arc<dyn Repository>;

/// Applies a transaction bundle entry by entry.
///
/// `POST` entries are created and `PUT` entries updated; any other method
/// fails with `Unsupported`. Entries are applied in order and the first
/// failure aborts the rest, so there is no rollback of earlier entries.
pub(crate) async fn apply_writes<R>(store: &R, bundle: Bundle) -> RepositoryResult<Bundle>
where
    R: Repository + ?Sized,
{
    if !matches!(
        bundle.bundle_type,
        BundleType::Transaction | BundleType::Batch
    ) {
        return Err(RepositoryError::InvalidResource {
            message: format!(
                "expected a transaction or batch bundle, got '{}'",
                bundle.bundle_type
            ),
        });
    }

    let mut response = Bundle::new(bundle.bundle_type.response_type());

    for (index, entry) in bundle.entries.into_iter().enumerate() {
        let method = match entry.request.as_ref().map(|r| r.method) {
            Some(method @ (BundleMethod::Post | BundleMethod::Put)) => method,
            Some(other) => {
                return Err(RepositoryError::unsupported(
                    store.name(),
                    format!("transaction {}", other.as_str()),
                ));
            }
            None => {
                return Err(RepositoryError::InvalidResource {
                    message: format!("entry {} has no request", index),
                });
            }
        };
        let resource = entry.resource.ok_or_else(|| RepositoryError::InvalidResource {
            message: format!("entry {} has no resource", index),
        })?;

        let outcome = if method == BundleMethod::Post {
            store.create(resource).await?
        } else {
            store.update(resource).await?
        };

        response.entries.push(BundleEntry {
            resource: None,
            request: None,
            response: Some(BundleResponse {
                status: outcome.status().to_string(),
                location: Some(outcome.id.to_string()),
                outcome: None,
            }),
        });
    }

    Ok(response)
}
