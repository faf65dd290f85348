use crate::{Error, Metrics, Storage};
use prometheus_client::{
    encoding::text::encode,
    metrics::counter::Counter,
    registry::{Metric, Registry},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A [Storage] paired with a shared prometheus [Registry].
///
/// Cloning a [Context] is cheap: all clones share the same storage and registry. Use
/// [Metrics::with_label] to scope metrics registered by a component.
#[derive(Clone)]
pub struct Context<S: Storage> {
    storage: S,
    label: String,
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Mutex<HashMap<String, Counter>>>,
}

impl<S: Storage> Context<S> {
    /// Create a new context over `storage` with an empty registry.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            label: String::new(),
            registry: Arc::new(Mutex::new(Registry::default())),
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn prefixed(&self, name: String) -> String {
        if self.label.is_empty() {
            name
        } else {
            format!("{}_{}", self.label, name)
        }
    }
}

impl<S: Storage> Storage for Context<S> {
    type Blob = S::Blob;

    fn create(&self, partition: &str, name: &str) -> Result<Self::Blob, Error> {
        self.storage.create(partition, name)
    }

    fn open(&self, partition: &str, name: &str) -> Result<(Self::Blob, u64), Error> {
        self.storage.open(partition, name)
    }

    fn exists(&self, partition: &str, name: &str) -> Result<bool, Error> {
        self.storage.exists(partition, name)
    }

    fn remove(&self, partition: &str, name: Option<&str>) -> Result<(), Error> {
        self.storage.remove(partition, name)
    }

    fn scan(&self, partition: &str) -> Result<Vec<String>, Error> {
        self.storage.scan(partition)
    }
}

impl<S: Storage> Metrics for Context<S> {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn with_label(&self, label: &str) -> Self {
        let label = if self.label.is_empty() {
            label.to_string()
        } else {
            format!("{}_{}", self.label, label)
        };
        Self {
            storage: self.storage.clone(),
            label,
            registry: self.registry.clone(),
            counters: self.counters.clone(),
        }
    }

    fn register<N: Into<String>, H: Into<String>>(&self, name: N, help: H, metric: impl Metric) {
        self.registry
            .lock()
            .unwrap()
            .register(self.prefixed(name.into()), help, metric);
    }

    fn counter<N: Into<String>, H: Into<String>>(&self, name: N, help: H) -> Counter {
        let mut counters = self.counters.lock().unwrap();
        counters
            .entry(self.prefixed(name.into()))
            .or_insert_with_key(|name| {
                let counter = Counter::default();
                self.registry
                    .lock()
                    .unwrap()
                    .register(name.clone(), help, counter.clone());
                counter
            })
            .clone()
    }

    fn encode(&self) -> String {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry.lock().unwrap()).expect("encoding failed");
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory;
    use commonware_macros::test_traced;
    use prometheus_client::metrics::counter::Counter;

    #[test_traced]
    fn test_register_with_label() {
        let context = Context::new(memory::Storage::default());
        let scoped = context.with_label("reader").with_label("shard_7");
        assert_eq!(scoped.label(), "reader_shard_7");

        let lookups = Counter::<u64>::default();
        scoped.register("lookups", "Number of lookups", lookups.clone());
        lookups.inc();
        lookups.inc();

        // Metrics registered through a clone are visible from the root
        let buffer = context.encode();
        assert!(buffer.contains("reader_shard_7_lookups_total 2"));
    }

    #[test_traced]
    fn test_counter_registered_once() {
        let context = Context::new(memory::Storage::default());
        let first = context.with_label("reader").counter("lookups", "Number of lookups");
        let second = context.with_label("reader").counter("lookups", "Number of lookups");
        first.inc();
        second.inc_by(2);
        assert_eq!(first.get(), 3);

        // A different label gets its own counter
        let other = context.with_label("writer").counter("lookups", "Number of lookups");
        assert_eq!(other.get(), 0);

        let buffer = context.encode();
        assert_eq!(buffer.matches("# TYPE reader_lookups counter").count(), 1);
        assert!(buffer.contains("reader_lookups_total 3"));
        assert!(buffer.contains("writer_lookups_total 0"));
    }

    #[test_traced]
    fn test_storage_is_shared() {
        let context = Context::new(memory::Storage::default());
        let clone = context.with_label("writer");
        clone.create("partition", "blob").unwrap();
        assert!(context.exists("partition", "blob").unwrap());
    }
}
