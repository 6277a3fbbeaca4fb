//! Greedy nearest-centroid multi-object tracker.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use serde::{Deserialize, Serialize};

use crate::tracker::matching::{self, Detection};
use crate::tracker::track::Track;

/// Configuration for the centroid tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum centroid distance (pixels) for binding a detection to a track
    pub max_distance: f32,
    /// Consecutive missed cycles after which a track is destroyed
    pub max_age: u32,
    /// Weight of appearance dissimilarity in the assignment cost; 0 keeps
    /// the purely geometric baseline
    pub appearance_weight: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance: 80.0,
            max_age: 20,
            appearance_weight: 0.0,
        }
    }
}

/// Multi-object tracker assigning stable short-lived IDs to detections.
///
/// Each [`update`](CentroidTracker::update) cycle binds detections to live
/// tracks by greedy global-minimum centroid distance, ages unbound tracks
/// and spawns new tracks for unbound detections. Track IDs start at 1 and
/// increase monotonically per tracker instance; live tracks are kept in a
/// `BTreeMap` so iteration order is deterministic for a fixed input order.
pub struct CentroidTracker {
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
    config: TrackerConfig,
}

impl CentroidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Consume one frame's detections and return the updated live tracks.
    pub fn update(&mut self, detections: &[Detection]) -> &BTreeMap<u64, Track> {
        if detections.is_empty() {
            self.age_all();
            return &self.tracks;
        }

        if self.tracks.is_empty() {
            for det in detections {
                self.spawn(det);
            }
            return &self.tracks;
        }

        let track_ids: Vec<u64> = self.tracks.keys().copied().collect();
        let centroids: Vec<(f32, f32)> = track_ids
            .iter()
            .map(|id| self.tracks[id].centroid)
            .collect();
        let embeddings: Vec<Option<&[f32]>> = track_ids
            .iter()
            .map(|id| self.tracks[id].embedding.as_deref())
            .collect();

        let costs = matching::cost_matrix(
            &centroids,
            &embeddings,
            detections,
            self.config.appearance_weight,
        );
        let assignment = matching::greedy_assignment(&costs, self.config.max_distance);

        for (ti, di) in assignment.pairs {
            let det = &detections[di];
            if let Some(track) = self.tracks.get_mut(&track_ids[ti]) {
                track.bind(det.bbox, det.score, det.embedding.clone());
            }
        }

        for ti in assignment.unmatched_tracks {
            self.age(track_ids[ti]);
        }

        for di in assignment.unmatched_detections {
            self.spawn(&detections[di]);
        }

        &self.tracks
    }

    pub fn tracks(&self) -> &BTreeMap<u64, Track> {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = (&u64, &mut Track)> {
        self.tracks.iter_mut()
    }

    /// IDs of all live tracks; drives cache cleanup in the resolver.
    pub fn active_ids(&self) -> BTreeSet<u64> {
        self.tracks.keys().copied().collect()
    }

    /// Forget ROI membership on every live track, forcing a fresh IN
    /// determination. Called at day rollover.
    pub fn clear_roi_flags(&mut self) {
        for track in self.tracks.values_mut() {
            track.in_roi = false;
        }
    }

    fn spawn(&mut self, det: &Detection) {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks
            .insert(id, Track::new(id, det.bbox, det.score, det.embedding.clone()));
        debug!(track_id = id, "spawned track");
    }

    fn age(&mut self, track_id: u64) {
        let expired = match self.tracks.get_mut(&track_id) {
            Some(track) => {
                track.misses += 1;
                track.misses > self.config.max_age
            }
            None => false,
        };
        if expired {
            self.tracks.remove(&track_id);
            debug!(track_id, "destroyed track after max_age misses");
        }
    }

    fn age_all(&mut self) {
        let ids: Vec<u64> = self.tracks.keys().copied().collect();
        for id in ids {
            self.age(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det_at(cx: f32, cy: f32) -> Detection {
        Detection::new(cx - 10.0, cy - 20.0, cx + 10.0, cy + 20.0, 0.9)
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        let tracks = tracker.update(&[det_at(100.0, 100.0), det_at(400.0, 100.0)]);
        let ids: Vec<u64> = tracks.keys().copied().collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_track_follows_moving_detection() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        tracker.update(&[det_at(100.0, 100.0)]);
        let tracks = tracker.update(&[det_at(130.0, 100.0)]);
        assert_eq!(tracks.len(), 1);
        let track = &tracks[&1];
        assert_eq!(track.centroid, (130.0, 100.0));
        assert_eq!(track.misses, 0);
    }

    #[test]
    fn test_distant_detection_spawns_new_track() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        tracker.update(&[det_at(100.0, 100.0)]);
        // 200px jump exceeds max_distance=80: old track ages, new one spawns.
        let tracks = tracker.update(&[det_at(300.0, 100.0)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[&1].misses, 1);
        assert_eq!(tracks[&2].centroid, (300.0, 100.0));
    }

    #[test]
    fn test_zero_detections_age_tracks() {
        let config = TrackerConfig {
            max_age: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = CentroidTracker::new(config);
        tracker.update(&[det_at(100.0, 100.0)]);
        tracker.update(&[]);
        tracker.update(&[]);
        assert_eq!(tracker.tracks()[&1].misses, 2);
        // Third miss exceeds max_age and destroys the track.
        let tracks = tracker.update(&[]);
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_id_not_reused_while_other_tracks_live() {
        let config = TrackerConfig {
            max_age: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = CentroidTracker::new(config);
        tracker.update(&[det_at(100.0, 100.0), det_at(400.0, 100.0)]);
        // Track 1 dies, track 2 survives; the next spawn takes a fresh ID.
        tracker.update(&[det_at(400.0, 100.0)]);
        let tracks = tracker.update(&[det_at(400.0, 100.0), det_at(700.0, 100.0)]);
        let ids: Vec<u64> = tracks.keys().copied().collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_update_is_deterministic() {
        let frames = vec![
            vec![det_at(100.0, 100.0), det_at(160.0, 100.0)],
            vec![det_at(120.0, 110.0), det_at(150.0, 90.0)],
            vec![det_at(140.0, 120.0)],
            vec![],
            vec![det_at(150.0, 130.0), det_at(260.0, 100.0)],
        ];

        let run = |frames: &[Vec<Detection>]| {
            let mut tracker = CentroidTracker::new(TrackerConfig::default());
            let mut history = Vec::new();
            for frame in frames {
                let tracks = tracker.update(frame);
                history.push(
                    tracks
                        .values()
                        .map(|t| (t.track_id, t.centroid))
                        .collect::<Vec<_>>(),
                );
            }
            history
        };

        assert_eq!(run(&frames), run(&frames));
    }

    #[test]
    fn test_embedding_carried_onto_track() {
        let mut tracker = CentroidTracker::new(TrackerConfig::default());
        let det = det_at(100.0, 100.0).with_embedding(vec![1.0, 0.0]);
        tracker.update(&[det]);
        assert_eq!(tracker.tracks()[&1].embedding.as_deref(), Some(&[1.0, 0.0][..]));

        // A later detection without an embedding keeps the cached one.
        tracker.update(&[det_at(110.0, 100.0)]);
        assert_eq!(tracker.tracks()[&1].embedding.as_deref(), Some(&[1.0, 0.0][..]));
    }
}
