//! Per-document mutual exclusion.
//!
//! A recompute call is a read-modify-write cycle over one stored byte blob;
//! two concurrent calls against the same document would race and the later
//! encode would silently clobber the earlier one. Calls therefore hold a
//! per-document lock for the whole cycle. The table is keyed by storage key
//! so aliased `prefix:id` spellings share one lock; entries are kept for
//! the lifetime of the table, which is bounded by the set of documents a
//! service instance ever touches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::store::storage_key;

/// Keyed lock table handed one guard per recompute call.
#[derive(Debug, Default)]
pub struct DocumentLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for one document. Lock the returned handle and hold the
    /// guard across the whole decode → apply → encode → persist cycle.
    pub fn handle(&self, id: &str) -> Arc<Mutex<()>> {
        let mut table = self.inner.lock().expect("document lock table poisoned");
        Arc::clone(
            table
                .entry(storage_key(id).to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
