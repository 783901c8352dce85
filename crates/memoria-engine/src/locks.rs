// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-memory lock table.
//!
//! Mutating operations on the same `memory_id` are serialized; operations
//! on distinct ids run concurrently. Recall and search never take these
//! locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Sharded map of per-id mutexes.
#[derive(Default)]
pub(crate) struct LockTable {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one memory id, waiting if another mutation on
    /// the same id is in flight.
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Acquire locks for two ids in canonical order, avoiding deadlock
    /// between concurrent pairwise operations (merges).
    pub async fn lock_pair(&self, a: Uuid, b: Uuid) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        debug_assert_ne!(a, b);
        if a < b {
            let first = self.lock(a).await;
            let second = self.lock(b).await;
            (first, second)
        } else {
            let first = self.lock(b).await;
            let second = self.lock(a).await;
            (first, second)
        }
    }
}
