//! Name-keyed heterogeneous store.
//!
//! Each entry is stored together with the concrete type it was added as.
//! Reads are type-checked against the [`TypedKey`] used for the lookup.
//! Values are kept behind `Arc` so reads hand out shared references without
//! holding a lock.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use super::DataError;

/// A key name paired with the type of the value stored under it.
pub struct TypedKey<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<T> std::fmt::Debug for TypedKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedKey")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// A stored value and the name of the type it was added as.
#[derive(Clone)]
pub struct TypedEntry {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl TypedEntry {
    fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }
}

/// Storage shared by [`ConcurrentTypedKeyMap`] and [`LocalTypedKeyMap`].
///
/// Implementors supply raw entry access; the typed operations are provided.
pub trait TypedKeyMap {
    /// Store an entry, replacing anything stored under the same name.
    fn put_entry(&self, name: String, entry: TypedEntry);

    /// Fetch the entry stored under `name`.
    fn entry(&self, name: &str) -> Option<TypedEntry>;

    /// Snapshot of all entries.
    fn entries(&self) -> Vec<(String, TypedEntry)>;

    /// Add a value. Overwrites any existing entry for the key's name,
    /// whatever its type.
    fn add<T: Any + Send + Sync>(&self, key: &TypedKey<T>, value: T)
    where
        Self: Sized,
    {
        self.put_entry(key.name().to_string(), TypedEntry::new(value));
    }

    /// Get the value stored under the key's name.
    fn get<T: Any + Send + Sync>(&self, key: &TypedKey<T>) -> Result<Arc<T>, DataError>
    where
        Self: Sized,
    {
        let entry = self
            .entry(key.name())
            .ok_or_else(|| DataError::KeyNotFound(key.name().to_string()))?;
        entry.downcast::<T>().ok_or_else(|| DataError::TypeMismatch {
            key: key.name().to_string(),
            stored: entry.type_name().to_string(),
            requested: type_name::<T>().to_string(),
        })
    }

    /// Non-failing variant of [`TypedKeyMap::get`].
    fn try_get<T: Any + Send + Sync>(&self, key: &TypedKey<T>) -> Option<Arc<T>>
    where
        Self: Sized,
    {
        self.get(key).ok()
    }

    /// Get the single stored value of type `T`.
    fn get_by_type<T: Any + Send + Sync>(&self) -> Result<Arc<T>, DataError>
    where
        Self: Sized,
    {
        let mut matches: Vec<Arc<T>> = self
            .entries()
            .into_iter()
            .filter_map(|(_, entry)| entry.downcast::<T>())
            .collect();
        match matches.len() {
            0 => Err(DataError::TypeNotFound(type_name::<T>().to_string())),
            1 => Ok(matches.remove(0)),
            count => Err(DataError::Ambiguous {
                requested: type_name::<T>().to_string(),
                count,
            }),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(name, _)| name).collect()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe map used while elements run in parallel.
///
/// Insertion order is kept so iteration matches the order results were added.
#[derive(Default)]
pub struct ConcurrentTypedKeyMap {
    inner: RwLock<OrderedEntries>,
}

impl ConcurrentTypedKeyMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypedKeyMap for ConcurrentTypedKeyMap {
    fn put_entry(&self, name: String, entry: TypedEntry) {
        // A poisoned lock still holds consistent entries; every write is a single insert.
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.insert(name, entry);
    }

    fn entry(&self, name: &str) -> Option<TypedEntry> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.get(name)
    }

    fn entries(&self) -> Vec<(String, TypedEntry)> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.snapshot()
    }
}

/// Map for single-threaded callers. Not `Sync`.
#[derive(Default)]
pub struct LocalTypedKeyMap {
    inner: RefCell<OrderedEntries>,
}

impl LocalTypedKeyMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypedKeyMap for LocalTypedKeyMap {
    fn put_entry(&self, name: String, entry: TypedEntry) {
        self.inner.borrow_mut().insert(name, entry);
    }

    fn entry(&self, name: &str) -> Option<TypedEntry> {
        self.inner.borrow().get(name)
    }

    fn entries(&self) -> Vec<(String, TypedEntry)> {
        self.inner.borrow().snapshot()
    }
}

#[derive(Default)]
struct OrderedEntries {
    order: Vec<String>,
    values: HashMap<String, TypedEntry>,
}

impl OrderedEntries {
    fn insert(&mut self, name: String, entry: TypedEntry) {
        if self.values.insert(name.clone(), entry).is_none() {
            self.order.push(name);
        }
    }

    fn get(&self, name: &str) -> Option<TypedEntry> {
        self.values.get(name).cloned()
    }

    fn snapshot(&self) -> Vec<(String, TypedEntry)> {
        self.order
            .iter()
            .filter_map(|name| self.values.get(name).map(|e| (name.clone(), e.clone())))
            .collect()
    }
}
