//! Shared fixtures and stub repositories for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use helios_repository::types::{Bundle, Resource, SearchQuery, WriteOutcome};
use helios_repository::{DynRepository, InMemoryStore, Repository, RepositoryError, RepositoryResult};

// ============================================================================
// Fixtures
// ============================================================================

pub fn patient(id: &str, family: &str) -> Resource {
    Resource::new(
        "Patient",
        json!({"id": id, "name": [{"family": family}], "active": true}),
    )
}

pub fn library(id: &str) -> Resource {
    Resource::new(
        "Library",
        json!({"id": id, "name": id, "status": "active"}),
    )
}

pub fn value_set(id: &str) -> Resource {
    Resource::new("ValueSet", json!({"id": id, "status": "active"}))
}

/// An in-memory store holding `count` libraries with ids `{prefix}-{n}`.
pub fn library_store(name: &str, prefix: &str, count: usize) -> Arc<InMemoryStore> {
    let libraries = (0..count).map(|n| library(&format!("{}-{}", prefix, n)));
    Arc::new(InMemoryStore::from_resources(libraries).with_name(name))
}

pub fn ids(bundle: &Bundle) -> Vec<String> {
    bundle
        .resources()
        .filter_map(|r| r.id_part().map(str::to_string))
        .collect()
}

// ============================================================================
// Stub repositories
// ============================================================================

/// Fails every operation with an `Internal` error.
pub struct FailingStore {
    name: String,
}

impl FailingStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn shared(name: &str) -> DynRepository {
        Arc::new(Self::new(name))
    }

    fn fail<T>(&self) -> RepositoryResult<T> {
        Err(RepositoryError::internal(&self.name, "backend unavailable"))
    }
}

#[async_trait]
impl Repository for FailingStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, _resource_type: &str, _id: &str) -> RepositoryResult<Resource> {
        self.fail()
    }

    async fn create(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.fail()
    }

    async fn update(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.fail()
    }

    async fn delete(&self, _resource_type: &str, _id: &str) -> RepositoryResult<()> {
        self.fail()
    }

    async fn search(&self, _resource_type: &str, _query: &SearchQuery) -> RepositoryResult<Bundle> {
        self.fail()
    }

    async fn link(&self, _url: &str) -> RepositoryResult<Option<Bundle>> {
        self.fail()
    }
}

/// Panics on search; everything else is empty.
pub struct PanickingStore;

#[async_trait]
impl Repository for PanickingStore {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn create(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        Err(RepositoryError::unsupported(self.name(), "create"))
    }

    async fn update(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        Err(RepositoryError::unsupported(self.name(), "update"))
    }

    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn search(&self, _resource_type: &str, _query: &SearchQuery) -> RepositoryResult<Bundle> {
        panic!("search exploded");
    }
}

/// Answers `link` with a fixed bundle and nothing else.
pub struct LinkStore {
    name: String,
    page: Option<Bundle>,
}

impl LinkStore {
    pub fn shared(name: &str, page: Option<Bundle>) -> DynRepository {
        Arc::new(Self {
            name: name.to_string(),
            page,
        })
    }
}

#[async_trait]
impl Repository for LinkStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn create(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        Err(RepositoryError::unsupported(self.name(), "create"))
    }

    async fn update(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        Err(RepositoryError::unsupported(self.name(), "update"))
    }

    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn search(&self, _resource_type: &str, _query: &SearchQuery) -> RepositoryResult<Bundle> {
        Ok(Bundle::searchset(Vec::new()))
    }

    async fn link(&self, _url: &str) -> RepositoryResult<Option<Bundle>> {
        Ok(self.page.clone())
    }
}

/// Serves libraries `{prefix}-{n}` over `pages` pages linked by `next`.
///
/// With `fail_at`, fetching that page fails with `Internal`.
pub struct PagedStore {
    name: String,
    prefix: String,
    pages: usize,
    per_page: usize,
    fail_at: Option<usize>,
}

impl PagedStore {
    pub fn shared(name: &str, prefix: &str, pages: usize, per_page: usize) -> DynRepository {
        Arc::new(Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            pages,
            per_page,
            fail_at: None,
        })
    }

    pub fn failing_at(
        name: &str,
        prefix: &str,
        pages: usize,
        per_page: usize,
        fail_at: usize,
    ) -> DynRepository {
        Arc::new(Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            pages,
            per_page,
            fail_at: Some(fail_at),
        })
    }

    fn page(&self, n: usize) -> RepositoryResult<Bundle> {
        if self.fail_at == Some(n) {
            return Err(RepositoryError::internal(
                &self.name,
                format!("page {} unavailable", n),
            ));
        }
        let first = n * self.per_page;
        let bundle = Bundle::searchset(
            (first..first + self.per_page).map(|i| library(&format!("{}-{}", self.prefix, i))),
        );
        Ok(if n + 1 < self.pages {
            bundle.with_link("next", format!("https://example.org/{}/page/{}", self.name, n + 1))
        } else {
            bundle
        })
    }
}

#[async_trait]
impl Repository for PagedStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn create(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        Err(RepositoryError::unsupported(self.name(), "create"))
    }

    async fn update(&self, _resource: Resource) -> RepositoryResult<WriteOutcome> {
        Err(RepositoryError::unsupported(self.name(), "update"))
    }

    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn search(&self, _resource_type: &str, _query: &SearchQuery) -> RepositoryResult<Bundle> {
        self.page(0)
    }

    async fn link(&self, url: &str) -> RepositoryResult<Option<Bundle>> {
        match url.rsplit('/').next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n < self.pages => self.page(n).map(Some),
            _ => Ok(None),
        }
    }
}
