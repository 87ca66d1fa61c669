//! Evidence cache
//!
//! Advisory: every backend or decoding failure is logged and reported as a
//! miss, so callers only ever see "hit" or "recompute".

use std::sync::Arc;
use std::time::Duration;

use super::types::EvidenceSet;
use crate::traits::KvStore;

const KEY_PREFIX: &str = "evidence:";

#[derive(Clone)]
pub struct EvidenceCache {
    kv: Arc<dyn KvStore>,
    default_ttl: Duration,
}

impl EvidenceCache {
    pub fn new(kv: Arc<dyn KvStore>, default_ttl: Duration) -> Self {
        Self { kv, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn key(document_id: &str) -> String {
        format!("{KEY_PREFIX}{document_id}")
    }

    pub async fn get(&self, document_id: &str) -> Option<EvidenceSet> {
        let bytes = match self.kv.get(&Self::key(document_id)).await {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => return None,
            Err(err) => {
                tracing::warn!(document_id, error = %err, "Evidence cache read failed, treating as miss");
                return None;
            }
        };

        let set: EvidenceSet = match serde_json::from_slice(&bytes) {
            Ok(set) => set,
            Err(err) => {
                tracing::warn!(document_id, error = %err, "Evidence cache payload unreadable, treating as miss");
                return None;
            }
        };

        if set.document_id != document_id || !set.is_complete() {
            tracing::warn!(document_id, "Evidence cache entry incomplete, treating as miss");
            return None;
        }
        Some(set)
    }

    pub async fn put(&self, set: &EvidenceSet) {
        self.put_with_ttl(set, self.default_ttl).await
    }

    /// Writes the whole set in one value. Incomplete sets are never written.
    pub async fn put_with_ttl(&self, set: &EvidenceSet, ttl: Duration) {
        if !set.is_complete() {
            tracing::warn!(
                document_id = %set.document_id,
                chunks = set.chunks.len(),
                "Refusing to cache incomplete evidence set"
            );
            return;
        }

        let bytes = match serde_json::to_vec(set) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(document_id = %set.document_id, error = %err, "Evidence set encode failed");
                return;
            }
        };

        if let Err(err) = self.kv.set(&Self::key(&set.document_id), &bytes, ttl).await {
            tracing::warn!(document_id = %set.document_id, error = %err, "Evidence cache write failed");
        }
    }

    pub async fn invalidate(&self, document_id: &str) {
        if let Err(err) = self.kv.delete(&Self::key(document_id)).await {
            tracing::warn!(document_id, error = %err, "Evidence cache invalidation failed");
        }
    }
}
