use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::KeyValueBackend;
use crate::core::error::Error;

/// Writes between full sweeps of expired values.
const SWEEP_INTERVAL: u64 = 256;

#[derive(Default)]
struct State {
    values: HashMap<String, (String, Instant)>,
    sets: HashMap<String, HashSet<String>>,
    writes: u64,
}

/// Process-local backend for development and tests. Clones share the same
/// data. Expired values are dropped lazily on read; values that are never
/// read again are swept once every [`SWEEP_INTERVAL`] writes.
#[derive(Clone, Default)]
pub(crate) struct MemoryBackend {
    state: Arc<RwLock<State>>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn value_count(&self) -> usize {
        self.state.read().values.len()
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error> {
        let now = Instant::now();
        let mut state = self.state.write();

        state.writes = state.writes.wrapping_add(1);
        if state.writes % SWEEP_INTERVAL == 0 {
            state.values.retain(|_, (_, expires_at)| *expires_at > now);
        }
        state.values.insert(key.to_string(), (value, now + ttl));

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let now = Instant::now();

        {
            let state = self.state.read();
            match state.values.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                Some(_) => (),
            }
        }

        // expired; only remove if nobody rewrote it in between
        let mut state = self.state.write();
        if let Some((_, expires_at)) = state.values.get(key) {
            if *expires_at <= now {
                state.values.remove(key);
            }
        }

        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut state = self.state.write();
        state.values.remove(key);
        state.sets.remove(key);

        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), Error> {
        self.state
            .write()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());

        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), Error> {
        let mut state = self.state.write();

        if let Some(members) = state.sets.get_mut(key) {
            members.remove(member);
            if members.is_empty() {
                state.sets.remove(key);
            }
        }

        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .state
            .read()
            .sets
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}
