//! Filesystem-backed resource store.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::core::{
    ElementMatcher, OperationRegistry, Repository, ResourceMatcher, UnknownOperation, apply_writes,
    invoke_with, matches_all,
};
use crate::error::{RepositoryError, RepositoryResult};
use crate::types::{
    Bundle, OperationResult, OperationTarget, Parameters, Resource, ResourceId, SearchQuery,
    WriteOutcome,
};

use super::codec::{JsonCodec, ResourceCodec};
use super::conventions::DirectoryConventions;
use super::path::PathResolver;
use super::side_content::embed_side_content;

/// A store that keeps one resource per file under a root directory.
///
/// File locations follow the configured [`DirectoryConventions`]. Parsed
/// files are cached by path; the cache is refreshed by this store's own
/// writes and can be cleared for changes made outside it.
///
/// # Example
///
/// ```no_run
/// use helios_repository::directory::{DirectoryConventions, DirectoryStore};
/// use helios_repository::Repository;
///
/// # async fn example() -> helios_repository::RepositoryResult<()> {
/// let store = DirectoryStore::new("input", DirectoryConventions::STANDARD).read_only();
/// let library = store.read("Library", "lib-1").await?;
/// println!("{}", library.content());
/// # Ok(())
/// # }
/// ```
pub struct DirectoryStore {
    name: String,
    resolver: PathResolver,
    codec: Arc<dyn ResourceCodec>,
    matcher: Arc<dyn ResourceMatcher>,
    operations: Option<OperationRegistry>,
    read_only: bool,
    cache: RwLock<HashMap<PathBuf, Resource>>,
}

impl fmt::Debug for DirectoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryStore")
            .field("name", &self.name)
            .field("resolver", &self.resolver)
            .field("read_only", &self.read_only)
            .field("cached", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

impl DirectoryStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, conventions: DirectoryConventions) -> Self {
        let root = root.into();
        Self {
            name: format!("directory:{}", root.display()),
            resolver: PathResolver::new(root, conventions),
            codec: Arc::new(JsonCodec),
            matcher: Arc::new(ElementMatcher),
            operations: None,
            read_only: false,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store whose conventions are detected from the tree.
    pub fn auto_detect(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let conventions = DirectoryConventions::auto_detect(&root);
        Self::new(root, conventions)
    }

    /// Sets the name reported in logs and failure reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the serializer used for resource files.
    ///
    /// File names keep the extension of the configured encoding, so a codec
    /// with a different extension only makes sense for a read-through tree.
    pub fn with_codec(mut self, codec: Arc<dyn ResourceCodec>) -> Self {
        let expected = self.resolver.conventions().encoding.extension();
        if codec.extension() != expected {
            warn!(
                store = %self.name,
                codec = codec.extension(),
                expected,
                "Codec extension differs from directory conventions"
            );
        }
        self.codec = codec;
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

    /// Rejects every write with `Unsupported`.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Returns `true` if writes are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Returns the layout in use.
    pub fn conventions(&self) -> &DirectoryConventions {
        self.resolver.conventions()
    }

    /// Returns the path resolver.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Drops every cached file.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Drops the cached entries for specific files.
    pub fn evict<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut cache = self.cache.write();
        for path in paths {
            cache.remove(path.as_ref());
        }
    }

    /// Number of cached files.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    fn ensure_writable(&self, operation: &str) -> RepositoryResult<()> {
        if self.read_only {
            return Err(RepositoryError::unsupported(&self.name, operation));
        }
        Ok(())
    }

    /// Rebrands a codec failure with this store's name and the file path.
    fn codec_error(&self, action: &str, path: &Path, error: RepositoryError) -> RepositoryError {
        match error {
            RepositoryError::Internal {
                message, source, ..
            } => RepositoryError::Internal {
                store: self.name.clone(),
                message: format!("unable to {} {}: {}", action, path.display(), message),
                source,
            },
            other => RepositoryError::internal_with_source(
                &self.name,
                format!("unable to {} {}", action, path.display()),
                other,
            ),
        }
    }

    /// Decodes a file without touching the cache. A missing file is `None`.
    fn decode_file(&self, path: &Path) -> RepositoryResult<Option<Resource>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RepositoryError::internal_with_source(
                    &self.name,
                    format!("unable to read {}", path.display()),
                    e,
                ));
            }
        };
        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|e| self.codec_error("decode", path, e))
    }

    /// Embeds side content and caches the result.
    fn finish_load(&self, path: &Path, mut resource: Resource) -> RepositoryResult<Resource> {
        embed_side_content(&self.name, &mut resource, path)?;
        self.cache
            .write()
            .insert(path.to_path_buf(), resource.clone());
        Ok(resource)
    }

    fn cached(&self, path: &Path) -> Option<Resource> {
        self.cache.read().get(path).cloned()
    }

    /// Loads the resource stored at a path, or `None` if there is no file.
    fn load(&self, path: &Path) -> RepositoryResult<Option<Resource>> {
        if let Some(resource) = self.cached(path) {
            return Ok(Some(resource));
        }
        match self.decode_file(path)? {
            Some(resource) => self.finish_load(path, resource).map(Some),
            None => Ok(None),
        }
    }

    /// Loads a resource and checks that the file holds what its path claims.
    fn load_expected(&self, rid: &ResourceId, path: &Path) -> RepositoryResult<Option<Resource>> {
        let Some(resource) = self.load(path)? else {
            return Ok(None);
        };
        if resource.resource_type() != rid.resource_type() || resource.id_part() != Some(rid.id()) {
            return Err(RepositoryError::internal(
                &self.name,
                format!(
                    "expected {} at {} but found {}/{}; the directory layout is inconsistent",
                    rid,
                    path.display(),
                    resource.resource_type(),
                    resource.id_part().unwrap_or("<no id>")
                ),
            ));
        }
        Ok(Some(resource))
    }

    /// Loads every decodable resource of a type. Undecodable files are
    /// skipped; side content failures are not.
    fn load_all(&self, resource_type: &str) -> RepositoryResult<Vec<Resource>> {
        let mut found = Vec::new();
        for path in self.list_type_files(resource_type)? {
            let resource = match self.cached(&path) {
                Some(resource) => resource,
                None => match self.decode_file(&path) {
                    Ok(Some(resource)) if resource.resource_type() == resource_type => {
                        self.finish_load(&path, resource)?
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable resource file");
                        continue;
                    }
                },
            };
            if resource.resource_type() == resource_type {
                found.push(resource);
            }
        }
        Ok(found)
    }

    fn write_file(&self, path: &Path, resource: &Resource) -> RepositoryResult<()> {
        let bytes = self
            .codec
            .encode(resource)
            .map_err(|e| self.codec_error("encode", path, e))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RepositoryError::internal_with_source(
                    &self.name,
                    format!("unable to create {}", parent.display()),
                    e,
                )
            })?;
        }
        fs::write(path, bytes).map_err(|e| {
            RepositoryError::internal_with_source(
                &self.name,
                format!("unable to write {}", path.display()),
                e,
            )
        })?;
        self.evict([path]);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> RepositoryResult<bool> {
        let result = fs::remove_file(path);
        self.evict([path]);
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RepositoryError::internal_with_source(
                &self.name,
                format!("unable to delete {}", path.display()),
                e,
            )),
        }
    }

    /// Lists candidate files of a type, walking each search directory.
    ///
    /// Paths are sorted and unique. Missing directories are empty; entries
    /// below a directory that cannot be read are skipped with a warning.
    fn list_type_files(&self, resource_type: &str) -> RepositoryResult<Vec<PathBuf>> {
        let mut files = BTreeSet::new();
        for dir in self.resolver.search_dirs(resource_type) {
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.depth() == 0 => {
                        return Err(RepositoryError::internal_with_source(
                            &self.name,
                            format!("unable to list {}", dir.display()),
                            e,
                        ));
                    }
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                        continue;
                    }
                };
                if entry.file_type().is_file()
                    && self.resolver.is_candidate_file(resource_type, entry.path())
                {
                    files.insert(entry.into_path());
                }
            }
        }
        Ok(files.into_iter().collect())
    }

    fn require_valid_id(resource: &Resource, id: &str) -> RepositoryResult<()> {
        if !PathResolver::is_valid_type(resource.resource_type()) {
            return Err(RepositoryError::InvalidResource {
                message: format!("invalid resource type '{}'", resource.resource_type()),
            });
        }
        if !PathResolver::is_valid_id(id) {
            return Err(RepositoryError::InvalidResource {
                message: format!("invalid {} id '{}'", resource.resource_type(), id),
            });
        }
        Ok(())
    }
}

/// Returns `true` if `(type, id)` can name a file under the root.
fn addressable(rid: &ResourceId) -> bool {
    PathResolver::is_valid_type(rid.resource_type()) && PathResolver::is_valid_id(rid.id())
}

#[async_trait]
impl Repository for DirectoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn read(&self, resource_type: &str, id: &str) -> RepositoryResult<Resource> {
        let rid = ResourceId::new(resource_type, id);
        if !addressable(&rid) {
            debug!(resource_type, id, "Rejecting unaddressable read");
            return Err(RepositoryError::not_found(resource_type, rid.id()));
        }
        for path in self.resolver.candidate_paths(resource_type, rid.id()) {
            if let Some(resource) = self.load_expected(&rid, &path)? {
                return Ok(resource);
            }
        }
        Err(RepositoryError::not_found(resource_type, rid.id()))
    }

    #[instrument(skip(self, resource), fields(store = %self.name, resource_type = %resource.resource_type()))]
    async fn create(&self, mut resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.ensure_writable("create")?;

        let id = match resource.id_part().map(str::to_string) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                resource.set_id(id.clone());
                id
            }
        };
        Self::require_valid_id(&resource, &id)?;

        let candidates = self.resolver.candidate_paths(resource.resource_type(), &id);
        if candidates.iter().any(|p| p.exists()) {
            return Err(RepositoryError::AlreadyExists {
                resource_type: resource.resource_type().to_string(),
                id,
            });
        }

        let path = self.resolver.path_for_resource(&resource, &id);
        self.write_file(&path, &resource)?;
        debug!(path = %path.display(), "Created resource file");
        Ok(WriteOutcome::created(ResourceId::new(
            resource.resource_type(),
            id,
        )))
    }

    #[instrument(skip(self, resource), fields(store = %self.name, resource_type = %resource.resource_type()))]
    async fn update(&self, resource: Resource) -> RepositoryResult<WriteOutcome> {
        self.ensure_writable("update")?;

        let id = resource
            .id_part()
            .map(str::to_string)
            .ok_or_else(|| RepositoryError::InvalidResource {
                message: format!("cannot update {} without an id", resource.resource_type()),
            })?;
        Self::require_valid_id(&resource, &id)?;

        let path = self.resolver.path_for_resource(&resource, &id);
        let rid = ResourceId::new(resource.resource_type(), id);
        let mut existed = path.exists();

        self.write_file(&path, &resource)?;

        // a changed compartment leaves the old copy behind
        for stale in self.resolver.candidate_paths(rid.resource_type(), rid.id()) {
            if stale == path || !stale.exists() {
                continue;
            }
            if let Ok(Some(_)) = self.load_expected(&rid, &stale) {
                self.remove_file(&stale)?;
                debug!(from = %stale.display(), to = %path.display(), "Moved resource file");
                existed = true;
            }
        }

        Ok(if existed {
            WriteOutcome::updated(rid)
        } else {
            WriteOutcome::created(rid)
        })
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn delete(&self, resource_type: &str, id: &str) -> RepositoryResult<()> {
        self.ensure_writable("delete")?;

        let rid = ResourceId::new(resource_type, id);
        if !addressable(&rid) {
            debug!(resource_type, id, "Rejecting unaddressable delete");
            return Err(RepositoryError::not_found(resource_type, rid.id()));
        }
        for path in self.resolver.candidate_paths(resource_type, rid.id()) {
            if self.remove_file(&path)? {
                return Ok(());
            }
        }
        Err(RepositoryError::not_found(resource_type, rid.id()))
    }

    #[instrument(skip(self, query), fields(store = %self.name))]
    async fn search(&self, resource_type: &str, query: &SearchQuery) -> RepositoryResult<Bundle> {
        if !PathResolver::is_valid_type(resource_type) {
            debug!(resource_type, "Unaddressable type, nothing to search");
            return Ok(Bundle::searchset(Vec::new()));
        }

        let all = self.load_all(resource_type)?;
        let candidates = match query.id_values() {
            Some(ids) => {
                let mut by_id: HashMap<String, Resource> = HashMap::new();
                for resource in all {
                    if let Some(id) = resource.id_part().map(str::to_string) {
                        by_id.entry(id).or_insert(resource);
                    }
                }
                // removal drops repeated ids
                ids.into_iter()
                    .filter_map(|id| by_id.remove(ResourceId::new(resource_type, id).id()))
                    .collect()
            }
            None => all,
        };

        let matched: Vec<Resource> = candidates
            .into_iter()
            .filter(|r| matches_all(self.matcher.as_ref(), query, r))
            .collect();
        debug!(resource_type, count = matched.len(), "Directory search complete");
        Ok(Bundle::searchset(matched))
    }

    async fn transaction(&self, bundle: Bundle) -> RepositoryResult<Bundle> {
        self.ensure_writable("transaction")?;
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
            UnknownOperation::NotApplicable,
            target,
            name,
            parameters,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{CategoryLayout, FilenameMode, TypeLayout};
    use serde_json::json;
    use tempfile::TempDir;

    fn library(id: &str) -> Resource {
        Resource::new("Library", json!({"id": id, "name": id}))
    }

    #[tokio::test]
    async fn test_standard_layout_path() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::STANDARD);

        let outcome = store.update(library("lib-1")).await.unwrap();
        assert!(outcome.created);
        assert!(dir.path().join("resources/library/lib-1.json").is_file());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::FLAT);
        let err = store.read("Library", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_file_on_read_is_internal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Library-bad.json"), "{ nope").unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::FLAT);
        let err = store.read("Library", "bad").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_decode_error_names_the_store() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Library-bad.json"), "{ nope").unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::FLAT).with_name("ig");

        let err = store.read("Library", "bad").await.unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
        match err {
            RepositoryError::Internal { store, message, .. } => {
                assert_eq!(store, "ig");
                assert!(message.contains("Library-bad.json"));
                assert!(!message.contains("internal error in"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_id_mismatch_is_internal() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Library-a.json"),
            r#"{"resourceType": "Library", "id": "b"}"#,
        )
        .unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::FLAT);
        let err = store.read("Library", "a").await.unwrap_err();
        assert!(err.to_string().contains("inconsistent"));
    }

    #[tokio::test]
    async fn test_type_mismatch_in_shared_directory() {
        let dir = TempDir::new().unwrap();
        let conventions =
            DirectoryConventions::new(CategoryLayout::Flat, TypeLayout::Flat, FilenameMode::IdOnly);
        let store = DirectoryStore::new(dir.path(), conventions);
        store
            .update(Resource::new("Patient", json!({"id": "x"})))
            .await
            .unwrap();

        // same file name, different type
        let err = store.read("Library", "x").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Internal { .. }));

        // search filters by declared type
        let libraries = store.search("Library", &SearchQuery::new()).await.unwrap();
        assert!(libraries.is_empty());
        let patients = store.search("Patient", &SearchQuery::new()).await.unwrap();
        assert_eq!(patients.len(), 1);
    }

    #[tokio::test]
    async fn test_search_skips_malformed_files() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::FLAT);
        store.update(library("good")).await.unwrap();
        fs::write(dir.path().join("Library-broken.json"), "not json").unwrap();

        let bundle = store.search("Library", &SearchQuery::new()).await.unwrap();
        assert_eq!(bundle.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_and_evict() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::FLAT);
        store.update(library("a")).await.unwrap();
        assert_eq!(store.cached_len(), 0);

        store.read("Library", "a").await.unwrap();
        assert_eq!(store.cached_len(), 1);

        // an edit behind the store's back is invisible until evicted
        let path = dir.path().join("Library-a.json");
        fs::write(&path, r#"{"resourceType": "Library", "id": "a", "name": "edited"}"#).unwrap();
        assert_eq!(store.read("Library", "a").await.unwrap().content()["name"], "a");

        store.evict([&path]);
        assert_eq!(
            store.read("Library", "a").await.unwrap().content()["name"],
            "edited"
        );

        store.clear_cache();
        assert_eq!(store.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_create_with_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path(), DirectoryConventions::STANDARD);
        store.create(library("a")).await.unwrap();
        let err = store.create(library("a")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_invoke_rules() {
        let dir = TempDir::new().unwrap();
        let target = OperationTarget::Type("Library".to_string());

        let bare = DirectoryStore::new(dir.path(), DirectoryConventions::STANDARD);
        let err = bare.invoke(&target, "$package", &json!({})).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidOperation { .. }));

        let with_registry = DirectoryStore::new(dir.path(), DirectoryConventions::STANDARD)
            .with_operations(OperationRegistry::new());
        let result = with_registry
            .invoke(&target, "$package", &json!({}))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
