use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{model::AggregationRecord, store::clock::Clock};

struct CacheEntry {
    record: AggregationRecord,
    expires_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    insertion_order: VecDeque<String>,
}

/// Process-local dedup cache mapping correlation id to in-flight
/// aggregation state. Lets concurrent handlers within one process observe a
/// just-created record instead of racing the store; it is not a correctness
/// mechanism, since cross-process races are settled by the store's
/// idempotent operations. Entries expire a fixed window after the last write,
/// independent of reads, and the cache is capacity-bounded with
/// oldest-write eviction.
pub struct AggregationCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl AggregationCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, capacity: usize) -> Self {
        Self {
            clock,
            ttl,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn get(&self, correlation_id: &str) -> Option<AggregationRecord> {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("lock poisoned");
        let expired = match state.entries.get(correlation_id) {
            Some(entry) if entry.expires_at > now => return Some(entry.record.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(correlation_id);
            state.insertion_order.retain(|key| key != correlation_id);
        }
        None
    }

    pub fn put(&self, record: AggregationRecord) {
        let expires_at = self.clock.now() + self.ttl;
        let key = record.correlation_id.clone();
        let mut state = self.state.lock().expect("lock poisoned");
        if state.entries.contains_key(&key) {
            state.insertion_order.retain(|existing| existing != &key);
        }
        state.insertion_order.push_back(key.clone());
        state.entries.insert(key, CacheEntry { record, expires_at });

        while state.entries.len() > self.capacity {
            let Some(oldest) = state.insertion_order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    pub fn remove(&self, correlation_id: &str) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.entries.remove(correlation_id);
        state.insertion_order.retain(|key| key != correlation_id);
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
