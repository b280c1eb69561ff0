//! In-flight registry for transformer calls.
//!
//! # Responsibilities
//! - Track which (transformer, resource) pairs have a call running
//! - Hand out exactly one guard per key at a time
//!
//! # Design Decisions
//! - Acquisition goes through the map's entry API so check-and-insert is
//!   atomic under concurrent POSTs
//! - Release is RAII: dropping the guard frees the key, including when the
//!   call task panics or is cancelled

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use url::Url;

/// Deduplication key for transformer calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InFlightKey {
    pub transformer: Url,
    pub resource: Url,
}

impl fmt::Display for InFlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.transformer, self.resource)
    }
}

/// Keys currently running, with the time each call started.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    running: DashMap<InFlightKey, SystemTime>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` while another guard for it is alive.
    pub fn try_acquire(self: &Arc<Self>, key: InFlightKey) -> Option<InFlightGuard> {
        match self.running.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(SystemTime::now());
                Some(InFlightGuard {
                    registry: Arc::clone(self),
                    key,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }
}

/// Holds a key in the registry until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    key: InFlightKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.running.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(resource: &str) -> InFlightKey {
        InFlightKey {
            transformer: Url::parse("http://t.example/simple-transformer").unwrap(),
            resource: Url::parse(resource).unwrap(),
        }
    }

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let registry = Arc::new(InFlightRegistry::new());
        let k = key("http://example.org/container1/a");

        let guard = registry.try_acquire(k.clone()).expect("first acquire");
        assert_eq!(registry.len(), 1);
        assert!(registry.try_acquire(k.clone()).is_none());

        drop(guard);
        assert_eq!(registry.len(), 0);
        assert!(registry.try_acquire(k).is_some());
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let registry = Arc::new(InFlightRegistry::new());
        let _a = registry.try_acquire(key("http://example.org/a")).unwrap();
        let _b = registry.try_acquire(key("http://example.org/b")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_acquire_yields_single_winner() {
        let registry = Arc::new(InFlightRegistry::new());
        let k = key("http://example.org/contended");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let k = k.clone();
                std::thread::spawn(move || registry.try_acquire(k))
            })
            .collect();

        let guards: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        assert_eq!(guards.iter().filter(|g| g.is_some()).count(), 1);
    }
}
