//! Federation of a local store with fallback stores.
//!
//! # Overview
//!
//! - **Reads**: local first, then each secondary in order; the first hit wins
//! - **Search**: every store in parallel, every page of each, results
//!   concatenated in store order
//! - **Writes, operations, history**: local only
//!
//! A search in which some store fails still returns what the others found,
//! wrapped in [`RepositoryError::Degraded`] so the caller knows the result may
//! be incomplete.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::core::{DynRepository, Repository};
use crate::error::{RepositoryError, RepositoryResult, StoreFailure};
use crate::types::{
    Bundle, OperationResult, OperationTarget, Parameters, Resource, SearchQuery, WriteOutcome,
};

/// Outcome of reading from one store during a fallback read.
#[derive(Debug)]
enum Attempt {
    Found(Resource),
    Missed {
        store: String,
        error: RepositoryError,
    },
}

impl Attempt {
    async fn read(store: &DynRepository, resource_type: &str, id: &str) -> Self {
        match store.read(resource_type, id).await {
            Ok(resource) => Attempt::Found(resource),
            Err(error) => Attempt::Missed {
                store: store.name().to_string(),
                error,
            },
        }
    }
}

/// Runs a search against one store and follows its `next` links to the end.
///
/// A failure on any page fails the whole store.
async fn search_all_pages(
    store: &dyn Repository,
    resource_type: &str,
    query: &SearchQuery,
) -> RepositoryResult<Vec<Resource>> {
    let mut page = store.search(resource_type, query).await?;
    let mut resources = Vec::new();
    let mut followed = HashSet::new();

    loop {
        let next = page.next_link().map(str::to_string);
        resources.extend(page.into_resources());

        let Some(url) = next else { break };
        if !followed.insert(url.clone()) {
            warn!(store = store.name(), url = %url, "Next link already followed, stopping");
            break;
        }
        match store.link(&url).await? {
            Some(next_page) => page = next_page,
            None => break,
        }
    }

    Ok(resources)
}

/// A local store federated with ordered secondary stores.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use helios_repository::{Federator, InMemoryStore, Repository};
/// use helios_repository::types::{Resource, SearchQuery};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> helios_repository::RepositoryResult<()> {
/// let local = Arc::new(InMemoryStore::new());
/// let remote = Arc::new(InMemoryStore::from_resources(vec![
///     Resource::new("Library", json!({"id": "shared"})),
/// ]));
///
/// let federator = Federator::new(local).with_secondary(remote);
///
/// // found in the secondary
/// let library = federator.read("Library", "shared").await?;
/// assert_eq!(library.id_part(), Some("shared"));
///
/// let all = federator.search("Library", &SearchQuery::new()).await?;
/// assert_eq!(all.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Federator {
    local: DynRepository,
    secondaries: Vec<DynRepository>,
}

impl std::fmt::Debug for Federator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secondaries: Vec<&str> = self.secondaries.iter().map(|s| s.name()).collect();
        f.debug_struct("Federator")
            .field("local", &self.local.name())
            .field("secondaries", &secondaries)
            .finish()
    }
}

impl Federator {
    /// Creates a federation with only a local store.
    pub fn new(local: DynRepository) -> Self {
        Self {
            local,
            secondaries: Vec::new(),
        }
    }

    /// Appends a secondary store.
    pub fn with_secondary(mut self, store: DynRepository) -> Self {
        self.secondaries.push(store);
        self
    }

    /// Appends several secondary stores in order.
    pub fn with_secondaries(mut self, stores: impl IntoIterator<Item = DynRepository>) -> Self {
        self.secondaries.extend(stores);
        self
    }

    /// Returns the local store.
    pub fn local(&self) -> &DynRepository {
        &self.local
    }

    /// Returns the secondary stores.
    pub fn secondaries(&self) -> &[DynRepository] {
        &self.secondaries
    }

    /// Every store, local first.
    fn stores(&self) -> impl Iterator<Item = &DynRepository> {
        std::iter::once(&self.local).chain(self.secondaries.iter())
    }
}

#[async_trait]
impl Repository for Federator {
    fn name(&self) -> &str {
        "federator"
    }

    #[instrument(skip(self))]
    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        for store in self.stores() {
            match Attempt::read(store, resource_type, id).await {
                Attempt::Found(resource) => return Ok(resource),
                Attempt::Missed { store, error } => {
                    debug!(store = %store, error = %error, "Read fell through");
                }
            }
        }
        Err(RepositoryError::not_found(resource_type, id))
    }

    async fn create(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.local.create(resource).await
    }

    async fn update(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.local.update(resource).await
    }

    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        self.local.delete(resource_type, id).await
    }

    #[instrument(skip(self, query), fields(stores = self.secondaries.len() + 1))]
    async fn search(&self, resource_type: &str, query: &SearchQuery) -> RepositoryResult<Bundle> {
        let stores: Vec<DynRepository> = self.stores().cloned().collect();
        let mut tasks: JoinSet<(usize, RepositoryResult<Vec<Resource>>)> = JoinSet::new();

        for (index, store) in stores.iter().enumerate() {
            let store = store.clone();
            let resource_type = resource_type.to_string();
            let query = query.clone();
            tasks.spawn(async move {
                let result = search_all_pages(store.as_ref(), &resource_type, &query).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<RepositoryResult<Vec<Resource>>>> =
            stores.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "Task join error during federated search"),
            }
        }

        let mut resources = Vec::new();
        let mut failures = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            let store = stores[index].name().to_string();
            match slot {
                Some(Ok(found)) => resources.extend(found),
                Some(Err(e)) => {
                    warn!(store = %store, error = %e, "Federated search store failed");
                    failures.push(StoreFailure {
                        index,
                        store,
                        message: e.to_string(),
                    });
                }
                None => failures.push(StoreFailure {
                    index,
                    store,
                    message: "search task did not complete".to_string(),
                }),
            }
        }

        let bundle = Bundle::searchset(resources);
        if failures.is_empty() {
            Ok(bundle)
        } else {
            Err(RepositoryError::Degraded {
                partial: bundle,
                failures,
            })
        }
    }

    async fn transaction(&self, bundle: Bundle) -> RepositoryResult<Bundle> {
        self.local.transaction(bundle).await
    }

    async fn invoke(
        &self,
        target: &OperationTarget,
        name: &str,
        parameters: &Parameters,
    ) -> RepositoryResult<Option<OperationResult>> {
        self.local.invoke(target, name, parameters).await
    }

    async fn history(&self, target: &OperationTarget) -> RepositoryResult<Bundle> {
        self.local.history(target).await
    }

    #[instrument(skip(self))]
    async fn link(&self, url: &str) -> RepositoryResult<Option<Bundle>> {
        for store in self.stores() {
            match store.link(url).await {
                Ok(Some(bundle)) if bundle.has_resources() => return Ok(Some(bundle)),
                Ok(_) => {}
                Err(e) => debug!(store = store.name(), error = %e, "Link not followed"),
            }
        }
        Ok(None)
    }
}
