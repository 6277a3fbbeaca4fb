//! Single tracked object.

use crate::tracker::rect::Rect;

/// A live track maintained by the tracker.
///
/// Created when a detection cannot be matched to any live track, destroyed
/// when `misses` exceeds the tracker's `max_age`. The crossing detector
/// owns the `in_roi` transitions; everything else is tracker state.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier, >= 1, never reused while the track lives
    pub track_id: u64,
    /// Centroid of the last matched detection
    pub centroid: (f32, f32),
    /// Bounding box of the last matched detection
    pub bbox: Rect,
    /// Confidence of the last matched detection
    pub score: f32,
    /// Appearance embedding from the last matched detection, if the
    /// detector provides one
    pub embedding: Option<Vec<f32>>,
    /// Consecutive update cycles without a matched detection
    pub misses: u32,
    /// ROI membership as of the previous crossing observation
    pub in_roi: bool,
}

impl Track {
    pub(crate) fn new(track_id: u64, bbox: Rect, score: f32, embedding: Option<Vec<f32>>) -> Self {
        Self {
            track_id,
            centroid: bbox.center(),
            bbox,
            score,
            embedding,
            misses: 0,
            in_roi: false,
        }
    }

    /// Bind a matched detection: refresh geometry, keep identity.
    pub(crate) fn bind(&mut self, bbox: Rect, score: f32, embedding: Option<Vec<f32>>) {
        self.centroid = bbox.center();
        self.bbox = bbox;
        self.score = score;
        if embedding.is_some() {
            self.embedding = embedding;
        }
        self.misses = 0;
    }
}
