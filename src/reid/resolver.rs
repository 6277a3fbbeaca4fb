//! Visitor identity resolution from appearance embeddings.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::reid::embedding;

/// Opaque identifier that is stable for one appearance-day of a visitor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorKey(String);

impl VisitorKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading 8 hex chars, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for VisitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VisitorKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Configuration for the identity resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum cosine similarity against the daily registry for a new track
    /// to be treated as a re-entering visitor
    pub reentry_threshold: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            reentry_threshold: 0.65,
        }
    }
}

/// Per-track embedding cache entry.
#[derive(Debug, Clone)]
struct CachedEmbedding {
    embedding: Vec<f32>,
    count: u32,
    visitor_key: VisitorKey,
}

/// Cache and registry counts, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub cached_tracks: usize,
    pub daily_visitors: usize,
}

/// Maps tracks to stable visitor keys.
///
/// Keeps a per-track running-average embedding and a registry of every
/// visitor embedding seen today. A new track whose embedding is similar
/// enough to a registered one reuses that visitor's key, which is how a
/// person who leaves and re-enters frame is counted once per day. Both the
/// registry and the cache are cleared whenever the resolved date changes;
/// a key minted on one day is never returned on another.
pub struct IdentityResolver {
    config: ResolverConfig,
    cache: HashMap<u64, CachedEmbedding>,
    registry: HashMap<VisitorKey, Vec<f32>>,
    current_date: Option<NaiveDate>,
}

impl IdentityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cache: HashMap::new(),
            registry: HashMap::new(),
            current_date: None,
        }
    }

    /// Resolve a track to its visitor key for `date`.
    ///
    /// Within one day the key assigned to a track never changes: once
    /// cached, later calls only refine the running-average embedding. A
    /// track still alive at midnight is re-resolved from scratch on the new
    /// day. Without an embedding the key falls back to a digest of
    /// (camera, track, date), which cannot recognize re-entries.
    pub fn resolve(
        &mut self,
        track_id: u64,
        embedding: Option<&[f32]>,
        camera_id: i64,
        date: NaiveDate,
    ) -> VisitorKey {
        self.roll_day(date);

        let sample = embedding.filter(|e| !e.is_empty());

        if let Some(entry) = self.cache.get_mut(&track_id) {
            if let Some(sample) = sample {
                entry.embedding = embedding::merge_average(&entry.embedding, entry.count, sample);
                entry.count += 1;
            }
            return entry.visitor_key.clone();
        }

        let Some(sample) = sample else {
            return VisitorKey(embedding::fallback_digest(camera_id, track_id, date));
        };

        let normalized = embedding::normalize(sample);
        let visitor_key = match self.find_similar(&normalized) {
            Some(key) => {
                debug!(track_id, visitor = key.short(), "track matched re-entering visitor");
                key
            }
            None => {
                let key = VisitorKey(embedding::digest(&normalized, date));
                self.registry.insert(key.clone(), normalized.clone());
                info!(track_id, visitor = key.short(), "new visitor registered");
                key
            }
        };

        self.cache.insert(
            track_id,
            CachedEmbedding {
                embedding: normalized,
                count: 1,
                visitor_key: visitor_key.clone(),
            },
        );
        visitor_key
    }

    /// Drop cache entries for tracks the tracker no longer reports live.
    pub fn retain_tracks(&mut self, active: &BTreeSet<u64>) {
        self.cache.retain(|track_id, _| active.contains(track_id));
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            cached_tracks: self.cache.len(),
            daily_visitors: self.registry.len(),
        }
    }

    /// Clear the daily registry and the per-track cache. Part of the
    /// operator-triggered data wipe.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.registry.clear();
        self.current_date = None;
    }

    fn roll_day(&mut self, date: NaiveDate) {
        if self.current_date != Some(date) {
            if self.current_date.is_some() {
                info!(%date, "day rollover, clearing embedding registry and track cache");
            }
            self.registry.clear();
            self.cache.clear();
            self.current_date = Some(date);
        }
    }

    fn find_similar(&self, embedding: &[f32]) -> Option<VisitorKey> {
        let mut best_similarity = self.config.reentry_threshold;
        let mut best_key = None;
        for (key, registered) in &self.registry {
            let similarity = embedding::cosine_similarity(embedding, registered);
            if similarity > best_similarity {
                best_similarity = similarity;
                best_key = Some(key.clone());
            }
        }
        best_key
    }
}
