//! Per-environment mutual exclusion.
//!
//! The config_state row is the only mutable shared resource in the engine.
//! Draft mutation and promotion hold an exclusive per-environment guard for
//! the duration of the read-modify-write so concurrent requests serialize
//! instead of interleaving. The contract is mutual exclusion per
//! environment; in this single-process deployment that is an in-process
//! async mutex keyed by environment id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one exclusive lock per environment id.
///
/// Guards are owned so they can be held across await points; the lock
/// releases when the guard drops.
#[derive(Clone, Default)]
pub struct EnvLockRegistry {
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl EnvLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to an environment's configuration state.
    ///
    /// Waits until any in-flight mutation for the same environment has
    /// finished. Locks for distinct environments never contend.
    pub async fn acquire(&self, environment_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                map.entry(environment_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
