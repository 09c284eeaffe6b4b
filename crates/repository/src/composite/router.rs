//! Category-based routing.
//!
//! [`CategoryRouter`] holds one delegate per [`Category`] and forwards each
//! operation to the delegate owning the resource type. It owns no resources
//! itself.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::core::{DynRepository, Repository};
use crate::error::RepositoryResult;
use crate::types::{
    Bundle, Category, OperationResult, OperationTarget, Parameters, Resource, SearchQuery,
    WriteOutcome,
};

/// Routes operations to a terminology, content or data delegate.
///
/// Missing terminology or content delegates fall back to the data delegate,
/// so `CategoryRouter::new(data)` behaves exactly like `data`.
///
/// | Operation | Delegate |
/// |-----------|----------|
/// | read, create, update, delete, search | category of the resource type |
/// | invoke, history with a type or instance target | category of the type |
/// | invoke, history at system level; transaction | data |
/// | link | data, content, terminology until one returns entries |
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use helios_repository::{CategoryRouter, InMemoryStore, Repository};
/// use helios_repository::types::{Category, Resource};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> helios_repository::RepositoryResult<()> {
/// let data = Arc::new(InMemoryStore::new());
/// let terminology = Arc::new(InMemoryStore::new());
/// let router = CategoryRouter::new(data.clone()).with_terminology(terminology.clone());
///
/// router.update(Resource::new("ValueSet", json!({"id": "vs"}))).await?;
/// router.update(Resource::new("Patient", json!({"id": "p"}))).await?;
///
/// assert_eq!(terminology.len(), 1);
/// assert_eq!(data.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CategoryRouter {
    terminology: DynRepository,
    content: DynRepository,
    data: DynRepository,
}

impl std::fmt::Debug for CategoryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRouter")
            .field("terminology", &self.terminology.name())
            .field("content", &self.content.name())
            .field("data", &self.data.name())
            .finish()
    }
}

impl CategoryRouter {
    /// Creates a router sending every category to `data`.
    pub fn new(data: DynRepository) -> Self {
        Self {
            terminology: data.clone(),
            content: data.clone(),
            data,
        }
    }

    /// Sets the terminology delegate.
    pub fn with_terminology(mut self, terminology: DynRepository) -> Self {
        self.terminology = terminology;
        self
    }

    /// Sets the content delegate.
    pub fn with_content(mut self, content: DynRepository) -> Self {
        self.content = content;
        self
    }

    /// Returns the delegate for a category.
    pub fn delegate(&self, category: Category) -> &DynRepository {
        match category {
            Category::Terminology => &self.terminology,
            Category::Content => &self.content,
            Category::Data => &self.data,
        }
    }

    /// Returns the delegate for a resource type.
    pub fn delegate_for_type(&self, resource_type: &str) -> &DynRepository {
        self.delegate(Category::for_type(resource_type))
    }

    fn delegate_for_target(&self, target: &OperationTarget) -> &DynRepository {
        match target.resource_type() {
            Some(resource_type) => self.delegate_for_type(resource_type),
            None => &self.data,
        }
    }
}

#[async_trait]
impl Repository for CategoryRouter {
    fn name(&self) -> &str {
        "category-router"
    }

    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        self.delegate_for_type(resource_type)
            .read(resource_type, id)
            .await
    }

    async fn create(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.delegate_for_type(resource.resource_type())
            .create(resource)
            .await
    }

    async fn update(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.delegate_for_type(resource.resource_type())
            .update(resource)
            .await
    }

    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        self.delegate_for_type(resource_type)
            .delete(resource_type, id)
            .await
    }

    async fn search(&self, resource_type: &str, query: &SearchQuery) -> RepositoryResult<Bundle> {
        self.delegate_for_type(resource_type)
            .search(resource_type, query)
            .await
    }

    async fn transaction(&self, bundle: Bundle) -> RepositoryResult<Bundle> {
        self.data.transaction(bundle).await
    }

    async fn invoke(
        &self,
        target: &OperationTarget,
        name: &str,
        parameters: &Parameters,
    ) -> RepositoryResult<Option<OperationResult>> {
        self.delegate_for_target(target)
            .invoke(target, name, parameters)
            .await
    }

    async fn history(&self, target: &OperationTarget) -> RepositoryResult<Bundle> {
        self.delegate_for_target(target).history(target).await
    }

    #[instrument(skip(self))]
    async fn link(&self, url: &str) -> RepositoryResult<Option<Bundle>> {
        for category in Category::ALL {
            let delegate = self.delegate(category);
            match delegate.link(url).await {
                Ok(Some(bundle)) if bundle.has_resources() => return Ok(Some(bundle)),
                Ok(_) => {}
                Err(e) => {
                    debug!(category = %category, store = delegate.name(), error = %e, "Link not followed");
                }
            }
        }
        Ok(None)
    }
}
