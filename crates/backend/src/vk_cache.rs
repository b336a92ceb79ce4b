//! Memoizing verification-key cache.
//!
//! All proofs generated from the same circuit share one verification key, so
//! derivation runs at most once per (circuit, oracle hash) pair per run. The
//! oracle hash is part of the key: the terminal circuit's keccak-transcript
//! vk differs from the default-transcript vk of the same circuit used inside
//! the recursion.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use tracing::debug;

use fields::VerificationKey;

use crate::options::OracleHash;

#[derive(Default)]
pub struct VkCache {
    entries: Mutex<HashMap<(String, OracleHash), VerificationKey>>,
}

impl VkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached key, deriving it through `derive` on first use.
    /// The lock is held across derivation so concurrent callers cannot
    /// duplicate the (expensive, minutes-long) backend invocation.
    pub fn get_or_derive(
        &self,
        circuit_name: &str,
        oracle_hash: OracleHash,
        derive: impl FnOnce() -> Result<VerificationKey>,
    ) -> Result<VerificationKey> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (circuit_name.to_string(), oracle_hash);
        if let Some(vk) = entries.get(&key) {
            debug!(circuit = circuit_name, ?oracle_hash, "vk cache hit");
            return Ok(vk.clone());
        }
        let vk = derive()?;
        entries.insert(key, vk.clone());
        Ok(vk)
    }
}
