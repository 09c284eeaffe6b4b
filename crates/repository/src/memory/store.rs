//! In-process resource store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::core::{
    ElementMatcher, OperationRegistry, Repository, ResourceMatcher, UnknownOperation, apply_writes,
    invoke_with, matches_all,
};
use crate::error::{RepositoryError, RepositoryResult};
use crate::types::{
    Bundle, OperationResult, OperationTarget, Parameters, Resource, ResourceId, SearchQuery,
    WriteOutcome,
};

use super::id::{IdGenerator, UuidGenerator};

/// Upper bound on generated-id collisions before a create gives up.
const MAX_ID_ATTEMPTS: usize = 64;

/// Resources of one type, keyed by logical id.
#[derive(Debug, Default)]
struct TypePartition {
    resources: HashMap<String, Resource>,
    /// Ids in insertion order; searches without `_id` return this order.
    order: Vec<String>,
}

impl TypePartition {
    fn insert(&mut self, id: String, resource: Resource) -> bool {
        let existed = self.resources.insert(id.clone(), resource).is_some();
        if !existed {
            self.order.push(id);
        }
        existed
    }

    fn remove(&mut self, id: &str) -> Option<Resource> {
        let removed = self.resources.remove(id)?;
        self.order.retain(|i| i != id);
        Some(removed)
    }

    fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().filter_map(|id| self.resources.get(id))
    }
}

/// A thread-safe map of resources held in process memory.
///
/// Resources are partitioned by type and then by logical id. Reads and
/// searches take a shared lock; writes take the exclusive lock for the whole
/// check-then-insert, so id uniqueness holds under concurrent creates.
pub struct InMemoryStore {
    name: String,
    partitions: RwLock<HashMap<String, TypePartition>>,
    ids: Arc<dyn IdGenerator>,
    matcher: Arc<dyn ResourceMatcher>,
    operations: Option<OperationRegistry>,
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store using UUID ids and the [`ElementMatcher`].
    pub fn new() -> Self {
        Self {
            name: "in-memory".to_string(),
            partitions: RwLock::new(HashMap::new()),
            ids: Arc::new(UuidGenerator),
            matcher: Arc::new(ElementMatcher),
            operations: None,
        }
    }

    /// Creates a store seeded with resources.
    ///
    /// Resources without an id are assigned one; a later resource with the
    /// same id replaces an earlier one.
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let store = Self::new();
        {
            let mut partitions = store.partitions.write();
            for mut resource in resources {
                let partition = partitions
                    .entry(resource.resource_type().to_string())
                    .or_default();
                let id = match resource.id_part().map(str::to_string) {
                    Some(id) => id,
                    None => {
                        let id = store.ids.next_id();
                        resource.set_id(id.clone());
                        id
                    }
                };
                partition.insert(id, resource);
            }
        }
        store
    }

    /// Creates a store seeded with the resources of a bundle.
    pub fn from_bundle(bundle: Bundle) -> Self {
        Self::from_resources(bundle.into_resources())
    }

    /// Sets the name reported in logs and failure reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the id generator used for creates without an id.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Sets the search parameter matcher.
    pub fn with_matcher(mut self, matcher: Arc<dyn ResourceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Sets the operation registry used by `invoke`.
    pub fn with_operations(mut self, operations: OperationRegistry) -> Self {
        self.operations = Some(operations);
        self
    }

    /// Total number of stored resources across all types.
    pub fn len(&self) -> usize {
        self.partitions
            .read()
            .values()
            .map(|p| p.resources.len())
            .sum()
    }

    /// Returns `true` if the store holds no resources.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every resource.
    pub fn clear(&self) {
        self.partitions.write().clear();
    }

    /// Generates an id not yet used in the partition.
    fn fresh_id(&self, partition: &TypePartition) -> RepositoryResult<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = self.ids.next_id();
            if !partition.resources.contains_key(&candidate) {
                return Ok(candidate);
            }
            debug!(id = %candidate, "Generated id collided, retrying");
        }
        Err(RepositoryError::internal(
            &self.name,
            format!("no unused id after {} attempts", MAX_ID_ATTEMPTS),
        ))
    }
}

#[async_trait]
impl Repository for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        let rid = ResourceId::new(resource_type, id);
        self.partitions
            .read()
            .get(resource_type)
            .and_then(|p| p.resources.get(rid.id()))
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(resource_type, rid.id()))
    }

    #[instrument(skip(self, resource), fields(resource_type = %resource.resource_type()))]
    async fn create(&self, mut resource: Resource) -> RepositoryResult<WriteOutcome> {
        let mut partitions = self.partitions.write();
        let partition = partitions
            .entry(resource.resource_type().to_string())
            .or_default();

        let id = match resource.id_part().map(str::to_string) {
            Some(id) if partition.resources.contains_key(&id) => {
                return Err(RepositoryError::AlreadyExists {
                    resource_type: resource.resource_type().to_string(),
                    id,
                });
            }
            Some(id) => id,
            None => {
                let id = self.fresh_id(partition)?;
                resource.set_id(id.clone());
                id
            }
        };

        let rid = ResourceId::new(resource.resource_type(), id.clone());
        partition.insert(id, resource);
        debug!(id = %rid, "Created resource");
        Ok(WriteOutcome::created(rid))
    }

    #[instrument(skip(self, resource), fields(resource_type = %resource.resource_type()))]
    async fn update(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        let id = resource
            .id_part()
            .map(str::to_string)
            .ok_or_else(|| RepositoryError::InvalidResource {
                message: format!("cannot update {} without an id", resource.resource_type()),
            })?;
        let rid = ResourceId::new(resource.resource_type(), id.clone());

        let existed = self
            .partitions
            .write()
            .entry(resource.resource_type().to_string())
            .or_default()
            .insert(id, resource);

        Ok(if existed {
            WriteOutcome::updated(rid)
        } else {
            WriteOutcome::created(rid)
        })
    }

    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        let rid = ResourceId::new(resource_type, id);
        self.partitions
            .write()
            .get_mut(resource_type)
            .and_then(|p| p.remove(rid.id()))
            .map(|_| ())
            .ok_or_else(|| RepositoryError::not_found(resource_type, rid.id()))
    }

    async fn search(&self, resource_type: &str, query: &SearchQuery) -> RepositoryResult<Bundle> {
        let partitions = self.partitions.read();
        let Some(partition) = partitions.get(resource_type) else {
            return Ok(Bundle::searchset(Vec::new()));
        };

        let candidates: Vec<&Resource> = match query.id_values() {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.into_iter()
                    .map(|id| ResourceId::new(resource_type, id))
                    .filter(|rid| seen.insert(rid.id().to_string()))
                    .filter_map(|rid| partition.resources.get(rid.id()))
                    .collect()
            }
            None => partition.iter().collect(),
        };

        let matched = candidates
            .into_iter()
            .filter(|r| matches_all(self.matcher.as_ref(), query, r))
            .cloned();

        Ok(Bundle::searchset(matched))
    }

    async fn transaction(&self, bundle: Bundle) -> RepositoryResult<Bundle> {
        apply_writes(self, bundle).await
    }

    async fn invoke(
        &self,
        target: &OperationTarget,
        name: &str,
        parameters: &Parameters,
    ) -> RepositoryResult<Option<OperationResult>> {
        invoke_with(
            self.operations.as_ref(),
            UnknownOperation::Reject,
            target,
            name,
            parameters,
        )
    }
}
