//! The keyspace.
//!
//! Records live in a sharded [`DashMap`], so readers and writers of unrelated keys do
//! not contend. Every mutation of a record happens while its shard entry is locked,
//! which also serializes concurrent mutators of the same key. Callers pass closures
//! that run under that lock; none of them may await or touch another key of the store.
//!
//! Expiry is lazy: a record whose expiration has passed is treated as absent by every
//! read and replaced by every write.

pub mod geo;
pub mod list;
pub mod sorted_set;
pub mod stream;

use dashmap::{mapref::entry::Entry, DashMap};
use jiff::Timestamp;
use thiserror::Error;

pub use list::{List, ListEnd};
pub use sorted_set::SortedSet;
pub use stream::{IdRequest, StreamEntry, StreamEntryId, StreamFields, StreamIdError, StreamRecord};

#[derive(Error, Debug, PartialEq, Clone)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    List(List),
    Stream(StreamRecord),
    SortedSet(SortedSet),
}

impl DataType {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String(_) => "string",
            DataType::List(_) => "list",
            DataType::Stream(_) => "stream",
            DataType::SortedSet(_) => "zset",
        }
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            DataType::String(_) => false,
            DataType::List(list) => list.is_empty(),
            DataType::Stream(stream) => stream.is_empty(),
            DataType::SortedSet(set) => set.is_empty(),
        }
    }

    fn as_string(&self) -> Option<&String> {
        match self {
            DataType::String(value) => Some(value),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&List> {
        match self {
            DataType::List(list) => Some(list),
            _ => None,
        }
    }

    fn as_list_mut(&mut self) -> Option<&mut List> {
        match self {
            DataType::List(list) => Some(list),
            _ => None,
        }
    }

    fn as_stream(&self) -> Option<&StreamRecord> {
        match self {
            DataType::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    fn as_stream_mut(&mut self) -> Option<&mut StreamRecord> {
        match self {
            DataType::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    fn as_sorted_set(&self) -> Option<&SortedSet> {
        match self {
            DataType::SortedSet(set) => Some(set),
            _ => None,
        }
    }

    fn as_sorted_set_mut(&mut self) -> Option<&mut SortedSet> {
        match self {
            DataType::SortedSet(set) => Some(set),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: DataType,
    pub expiration: Option<Timestamp>,
}

impl Value {
    pub fn new(data: DataType) -> Self {
        Self {
            data,
            expiration: None,
        }
    }

    pub fn with_expiration(data: DataType, expiration: Option<Timestamp>) -> Self {
        Self { data, expiration }
    }

    pub fn is_expired(&self) -> bool {
        self.expiration
            .is_some_and(|expiration| Timestamp::now() > expiration)
    }
}

#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: DashMap<String, Value>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional replace, visible to the next lookup.
    pub fn insert(&self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn extend<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn type_of(&self, key: &str) -> Option<&'static str> {
        self.read_value(key, |value| value.data.type_name())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.lookup(key, DataType::as_string, String::clone)
    }

    pub fn with_list<R>(&self, key: &str, f: impl FnOnce(&List) -> R) -> Option<R> {
        self.lookup(key, DataType::as_list, f)
    }

    pub fn with_stream<R>(&self, key: &str, f: impl FnOnce(&StreamRecord) -> R) -> Option<R> {
        self.lookup(key, DataType::as_stream, f)
    }

    pub fn with_sorted_set<R>(&self, key: &str, f: impl FnOnce(&SortedSet) -> R) -> Option<R> {
        self.lookup(key, DataType::as_sorted_set, f)
    }

    /// Like [`KeyValueStore::with_stream`], but a key holding another kind is an error
    /// rather than absent.
    pub fn read_stream<R>(
        &self,
        key: &str,
        f: impl FnOnce(&StreamRecord) -> R,
    ) -> Result<Option<R>, StoreError> {
        self.read_value(key, |value| {
            DataType::as_stream(&value.data)
                .map(f)
                .ok_or(StoreError::WrongType)
        })
        .transpose()
    }

    /// Runs `f` on the list at `key` (or `None` when absent) with the record locked.
    /// A list left empty is removed.
    pub fn update_list<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut List>) -> R,
    ) -> Result<R, StoreError> {
        self.update(key, DataType::as_list_mut, f)
    }

    /// Like [`KeyValueStore::update_list`], creating the list when absent.
    pub fn upsert_list<R>(&self, key: &str, f: impl FnOnce(&mut List) -> R) -> Result<R, StoreError> {
        self.upsert(key, || DataType::List(List::new()), DataType::as_list_mut, f)
    }

    pub fn update_stream<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut StreamRecord>) -> R,
    ) -> Result<R, StoreError> {
        self.update(key, DataType::as_stream_mut, f)
    }

    /// The stream is only kept if `f` leaves at least one entry in it.
    pub fn upsert_stream<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut StreamRecord) -> R,
    ) -> Result<R, StoreError> {
        self.upsert(
            key,
            || DataType::Stream(StreamRecord::new()),
            DataType::as_stream_mut,
            f,
        )
    }

    pub fn update_sorted_set<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut SortedSet>) -> R,
    ) -> Result<R, StoreError> {
        self.update(key, DataType::as_sorted_set_mut, f)
    }

    pub fn upsert_sorted_set<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut SortedSet) -> R,
    ) -> Result<R, StoreError> {
        self.upsert(
            key,
            || DataType::SortedSet(SortedSet::new()),
            DataType::as_sorted_set_mut,
            f,
        )
    }

    /// Adds `by` to the integer stored at `key`, starting from 0. Keeps the expiration.
    pub fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::new(DataType::String("0".to_string())));

        if entry.is_expired() {
            *entry = Value::new(DataType::String("0".to_string()));
        }

        let DataType::String(current) = &mut entry.data else {
            return Err(StoreError::WrongType);
        };

        let next = current
            .parse::<i64>()
            .ok()
            .and_then(|current| current.checked_add(by))
            .ok_or(StoreError::NotAnInteger)?;

        *current = next.to_string();

        Ok(next)
    }

    fn read_value<R>(&self, key: &str, f: impl FnOnce(&Value) -> R) -> Option<R> {
        let found = {
            let value = self.entries.get(key)?;

            if value.is_expired() {
                None
            } else {
                Some(f(value.value()))
            }
        };

        if found.is_none() {
            self.entries.remove_if(key, |_, value| value.is_expired());
        }

        found
    }

    /// Kind mismatches read as absent.
    fn lookup<T, R>(
        &self,
        key: &str,
        project: fn(&DataType) -> Option<&T>,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        self.read_value(key, |value| project(&value.data).map(f))
            .flatten()
    }

    fn update<T, R>(
        &self,
        key: &str,
        project: fn(&mut DataType) -> Option<&mut T>,
        f: impl FnOnce(Option<&mut T>) -> R,
    ) -> Result<R, StoreError> {
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(_vacant) => Ok(f(None)),
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    let result = f(None);
                    occupied.remove();
                    return Ok(result);
                }

                let value = occupied.get_mut();

                let Some(inner) = project(&mut value.data) else {
                    return Err(StoreError::WrongType);
                };

                let result = f(Some(inner));

                if value.data.is_empty_collection() {
                    occupied.remove();
                }

                Ok(result)
            }
        }
    }

    fn upsert<T, R>(
        &self,
        key: &str,
        create: fn() -> DataType,
        project: fn(&mut DataType) -> Option<&mut T>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, StoreError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(Value::new(create()));
                }

                let value = occupied.get_mut();

                let Some(inner) = project(&mut value.data) else {
                    return Err(StoreError::WrongType);
                };

                let result = f(inner);

                if value.data.is_empty_collection() {
                    occupied.remove();
                }

                Ok(result)
            }
            Entry::Vacant(vacant) => {
                let mut data = create();

                let Some(inner) = project(&mut data) else {
                    return Err(StoreError::WrongType);
                };

                let result = f(inner);

                if !data.is_empty_collection() {
                    vacant.insert(Value::new(data));
                }

                Ok(result)
            }
        }
    }
}
