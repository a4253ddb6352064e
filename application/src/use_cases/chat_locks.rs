//! Per-chat turn serialization.
//!
//! A turn is a read-modify-write of the whole [`Chat`](chatstream_domain::Chat)
//! aggregate, so two turns on the same chat must not interleave. Turns on
//! different chats run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Keyed async mutex over chat ids.
///
/// Cloning shares the same lock table. Entries nobody holds or waits on are
/// pruned on the next acquisition.
#[derive(Clone, Default)]
pub struct ChatLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Exclusive access to one chat id; released on drop.
pub struct ChatGuard {
    _guard: OwnedMutexGuard<()>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other turn holds `chat_id`, then take it.
    pub async fn acquire(&self, chat_id: &str) -> ChatGuard {
        let lock = {
            let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(chat_id.to_string()).or_default().clone()
        };
        ChatGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of chat ids currently tracked
    pub fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
