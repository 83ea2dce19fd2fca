use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::app::models::LivenessChallenge;

/// Short-lived, single-use storage for outstanding liveness challenges
/// (spec §4.4, §6.1). The host may back this with Redis or any other
/// transient store; `InMemorySessionScratch` is the in-process reference
/// used by the CLI and tests.
#[async_trait]
pub trait SessionScratch: Send + Sync {
    async fn put_challenge(&self, key: &str, challenge: LivenessChallenge) -> anyhow::Result<()>;

    /// Removes and returns the challenge if present. Must be atomic: a
    /// challenge can be consumed at most once (spec invariant on nonce reuse).
    async fn take_challenge(&self, key: &str) -> anyhow::Result<Option<LivenessChallenge>>;
}

#[derive(Default)]
pub struct InMemorySessionScratch {
    challenges: Mutex<HashMap<String, LivenessChallenge>>,
}

impl InMemorySessionScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionScratch for InMemorySessionScratch {
    async fn put_challenge(&self, key: &str, challenge: LivenessChallenge) -> anyhow::Result<()> {
        self.challenges
            .lock()
            .expect("session scratch lock poisoned")
            .insert(key.to_string(), challenge);
        Ok(())
    }

    async fn take_challenge(&self, key: &str) -> anyhow::Result<Option<LivenessChallenge>> {
        Ok(self
            .challenges
            .lock()
            .expect("session scratch lock poisoned")
            .remove(key))
    }
}
