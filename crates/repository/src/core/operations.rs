//! Named operation dispatch.
//!
//! Stores do not implement operations themselves. They forward `invoke` to an
//! [`OperationRegistry`] of handlers keyed by resource type and operation name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RepositoryError, RepositoryResult};
use crate::types::{OperationResult, OperationTarget, Parameters};

/// A registered operation implementation.
pub type OperationHandler = Arc<
    dyn Fn(&OperationTarget, &Parameters) -> RepositoryResult<Option<OperationResult>>
        + Send
        + Sync,
>;

/// Handlers keyed by `(resource type, operation name)`.
///
/// System-level handlers are registered without a type. Operation names may
/// be given with or without the leading `$`.
///
/// # Examples
///
/// ```
/// use helios_repository::core::OperationRegistry;
/// use helios_repository::types::{OperationResult, OperationTarget, Resource};
/// use serde_json::json;
///
/// let registry = OperationRegistry::new().with_type_operation("Library", "$echo", |_, params| {
///     Ok(Some(OperationResult::Resource(Resource::new("Parameters", params.clone()))))
/// });
///
/// let target = OperationTarget::Type("Library".to_string());
/// let result = registry.dispatch(&target, "echo", &json!({"x": 1})).unwrap();
/// assert!(result.is_some());
///
/// let other = OperationTarget::Type("Measure".to_string());
/// assert!(registry.dispatch(&other, "echo", &json!({})).unwrap().is_none());
/// ```
#[derive(Clone, Default)]
pub struct OperationRegistry {
    handlers: HashMap<(Option<String>, String), OperationHandler>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for type- and instance-level invocations.
    pub fn with_type_operation<F>(
        mut self,
        resource_type: impl Into<String>,
        name: &str,
        handler: F,
    ) -> Self
    where
        F: Fn(&OperationTarget, &Parameters) -> RepositoryResult<Option<OperationResult>>
            + Send
            + Sync
            + 'static,
    {
        self.register(Some(resource_type.into()), name, Arc::new(handler));
        self
    }

    /// Registers a handler for system-level invocations.
    pub fn with_system_operation<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&OperationTarget, &Parameters) -> RepositoryResult<Option<OperationResult>>
            + Send
            + Sync
            + 'static,
    {
        self.register(None, name, Arc::new(handler));
        self
    }

    /// Registers a handler, replacing any previous one with the same key.
    pub fn register(&mut self, resource_type: Option<String>, name: &str, handler: OperationHandler) {
        self.handlers
            .insert((resource_type, normalize(name).to_string()), handler);
    }

    /// Returns `true` if a handler exists for the target and name.
    pub fn contains(&self, target: &OperationTarget, name: &str) -> bool {
        self.handlers.contains_key(&key(target, name))
    }

    /// Runs the matching handler. No handler yields `Ok(None)`.
    pub fn dispatch(
        &self,
        target: &OperationTarget,
        name: &str,
        parameters: &Parameters,
    ) -> RepositoryResult<Option<OperationResult>> {
        match self.handlers.get(&key(target, name)) {
            Some(handler) => handler(target, parameters),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("OperationRegistry")
            .field("operations", &keys)
            .finish()
    }
}

/// What a store answers when its registry has no handler for a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnknownOperation {
    /// Fail with `InvalidOperation`.
    Reject,
    /// Return `Ok(None)`: the operation does not apply to this store.
    NotApplicable,
}

/// Invokes through an optional registry.
///
/// A store without a registry cannot process any operation, which is an
/// `InvalidOperation` rather than an empty result.
pub(crate) fn invoke_with(
    registry: Option<&OperationRegistry>,
    unknown: UnknownOperation,
    target: &OperationTarget,
    name: &str,
    parameters: &Parameters,
) -> RepositoryResult<Option<OperationResult>> {
    let Some(registry) = registry else {
        return Err(RepositoryError::InvalidOperation {
            operation: normalize(name).to_string(),
            message: format!("no operation processor configured for {}", target),
        });
    };
    if !registry.contains(target, name) && unknown == UnknownOperation::Reject {
        return Err(RepositoryError::InvalidOperation {
            operation: normalize(name).to_string(),
            message: format!("no handler registered for {}", target),
        });
    }
    registry.dispatch(target, name, parameters)
}

fn key(target: &OperationTarget, name: &str) -> (Option<String>, String) {
    (
        target.resource_type().map(str::to_string),
        normalize(name).to_string(),
    )
}

fn normalize(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}
