//! Type-keyed registry of serializers.
//!
//! The registry is an ordinary value: create one at startup, register the
//! codecs for your record types and hand it (usually behind an `Arc`) to
//! whatever needs to look them up.

use crate::error::{Result, SerializationError};
use crate::serializer::{Serializer, TargetType};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

struct Entry {
    type_name: &'static str,
    /// Always an `Arc<dyn Serializer<T>>` for the `T` the entry is keyed by.
    serializer: Box<dyn Any + Send + Sync>,
}

/// Maps value types to their serializers.
///
/// Safe to share between threads; registration and lookup may run
/// concurrently.
///
/// # Examples
///
/// ```rust
/// use playersync_codec::{JsonSerializer, SerializationContext, Serializer, SerializerRegistry};
///
/// let registry = SerializerRegistry::new();
/// registry.register::<Vec<String>, _>(JsonSerializer::new());
///
/// let serializer = registry.require::<Vec<String>>()?;
/// let text = serializer.serialize(&vec!["Steve".to_string()], &SerializationContext::json())?;
/// assert_eq!(text, r#"["Steve"]"#);
/// # Ok::<(), playersync_codec::SerializationError>(())
/// ```
#[derive(Default)]
pub struct SerializerRegistry {
    entries: DashMap<TypeId, Entry>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `serializer` for `T`, returning the serializer it replaced.
    pub fn register<T, S>(&self, serializer: S) -> Option<Arc<dyn Serializer<T>>>
    where
        T: 'static,
        S: Serializer<T> + 'static,
    {
        self.register_shared(Arc::new(serializer))
    }

    /// Registers an already shared serializer for `T`.
    pub fn register_shared<T: 'static>(
        &self,
        serializer: Arc<dyn Serializer<T>>,
    ) -> Option<Arc<dyn Serializer<T>>> {
        let target = TargetType::of::<T>();
        let entry = Entry {
            type_name: target.name(),
            serializer: Box::new(serializer),
        };

        let previous = self
            .entries
            .insert(target.id(), entry)
            .and_then(|old| downcast::<T>(&old));

        if previous.is_some() {
            warn!(target_type = %target, "Replaced registered serializer");
        } else {
            debug!(target_type = %target, "Registered serializer");
        }
        previous
    }

    /// Looks up the serializer for `T`.
    pub fn get<T: 'static>(&self) -> Option<Arc<dyn Serializer<T>>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| downcast::<T>(&entry))
    }

    /// Like [`SerializerRegistry::get`], but fails with
    /// [`SerializationError::NotRegistered`] when nothing is registered.
    pub fn require<T: 'static>(&self) -> Result<Arc<dyn Serializer<T>>> {
        self.get::<T>().ok_or(SerializationError::NotRegistered {
            type_name: std::any::type_name::<T>(),
        })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Removes the serializer for `T`, returning it.
    pub fn unregister<T: 'static>(&self) -> Option<Arc<dyn Serializer<T>>> {
        let (_, entry) = self.entries.remove(&TypeId::of::<T>())?;
        debug!(target_type = entry.type_name, "Unregistered serializer");
        downcast::<T>(&entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of all registered types, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .entries
            .iter()
            .map(|entry| entry.type_name)
            .collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

fn downcast<T: 'static>(entry: &Entry) -> Option<Arc<dyn Serializer<T>>> {
    entry
        .serializer
        .downcast_ref::<Arc<dyn Serializer<T>>>()
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SerializationContext;
    use crate::json::JsonSerializer;

    #[test]
    fn test_register_and_get() {
        let registry = SerializerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get::<u32>().is_none());

        assert!(registry.register::<u32, _>(JsonSerializer::new()).is_none());
        assert!(registry.contains::<u32>());
        assert!(!registry.contains::<i32>());

        let serializer = registry.get::<u32>().unwrap();
        let context = SerializationContext::json();
        assert_eq!(serializer.serialize(&42, &context).unwrap(), "42");
        assert_eq!(serializer.target_type(), TargetType::of::<u32>());
    }

    #[test]
    fn test_require_names_missing_type() {
        let registry = SerializerRegistry::new();
        match registry.require::<String>() {
            Err(SerializationError::NotRegistered { type_name }) => {
                assert_eq!(type_name, std::any::type_name::<String>());
            }
            Err(other) => panic!("expected NotRegistered, got {other:?}"),
            Ok(_) => panic!("expected NotRegistered"),
        }
    }

    #[test]
    fn test_replace_and_unregister() {
        let registry = SerializerRegistry::new();
        registry.register::<String, _>(JsonSerializer::new());
        let replaced = registry.register::<String, _>(JsonSerializer::new());
        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister::<String>().is_some());
        assert!(registry.unregister::<String>().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_type_names_sorted() {
        let registry = SerializerRegistry::new();
        registry.register::<u64, _>(JsonSerializer::new());
        registry.register::<bool, _>(JsonSerializer::new());
        assert_eq!(registry.type_names(), vec!["bool", "u64"]);
    }
}
