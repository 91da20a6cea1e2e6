// Access token holder with best-effort persistence

use parking_lot::RwLock;
use std::sync::Arc;

use super::slot::{DurableSlot, TOKEN_KEY};

/// Single source of truth for the current bearer token
///
/// The in-memory value is authoritative. Writes to the durable slot are
/// mirrored on every change; slot failures are logged and otherwise ignored.
pub struct TokenStore {
    current: RwLock<Option<String>>,
    slot: Arc<dyn DurableSlot>,
}

impl TokenStore {
    /// Create an empty store
    pub fn new(slot: Arc<dyn DurableSlot>) -> Self {
        Self {
            current: RwLock::new(None),
            slot,
        }
    }

    /// Create a store seeded from whatever the slot holds
    pub fn rehydrate(slot: Arc<dyn DurableSlot>) -> Self {
        let current = match slot.load(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted access token");
                None
            }
        };

        if current.is_some() {
            tracing::debug!("Rehydrated access token from session store");
        }

        Self {
            current: RwLock::new(current),
            slot,
        }
    }

    pub fn get(&self) -> Option<String> {
        self.current.read().clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        if let Err(e) = self.slot.store(TOKEN_KEY, &token) {
            tracing::warn!(error = %e, "Failed to persist access token, keeping it in memory");
        }
        *self.current.write() = Some(token);
    }

    pub fn clear(&self) {
        *self.current.write() = None;
        if let Err(e) = self.slot.remove(TOKEN_KEY) {
            tracing::warn!(error = %e, "Failed to remove persisted access token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::slot::MemorySlot;

    struct BrokenSlot;

    impl DurableSlot for BrokenSlot {
        fn load(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("storage disabled")
        }
        fn store(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("quota exceeded")
        }
        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("storage disabled")
        }
    }

    #[test]
    fn test_set_get_clear() {
        let slot = Arc::new(MemorySlot::new());
        let store = TokenStore::new(slot.clone());
        assert_eq!(store.get(), None);

        store.set("tok1");
        store.set("tok2");
        assert_eq!(store.get().as_deref(), Some("tok2"));
        assert_eq!(slot.load(TOKEN_KEY).unwrap().as_deref(), Some("tok2"));

        store.clear();
        assert_eq!(store.get(), None);
        assert_eq!(slot.load(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_rehydrate_reads_slot() {
        let slot = Arc::new(MemorySlot::new());
        slot.store(TOKEN_KEY, "persisted").unwrap();

        let store = TokenStore::rehydrate(slot);
        assert_eq!(store.get().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_broken_slot_keeps_memory_authoritative() {
        let store = TokenStore::rehydrate(Arc::new(BrokenSlot));
        assert_eq!(store.get(), None);

        store.set("tok1");
        assert_eq!(store.get().as_deref(), Some("tok1"));

        store.clear();
        assert_eq!(store.get(), None);
    }
}
