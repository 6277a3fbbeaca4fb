//! Detection input and greedy centroid assignment.

use ndarray::Array2;

use crate::reid::embedding::cosine_similarity;
use crate::tracker::rect::Rect;

/// Detection input for the tracker, one per detected person per frame.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
    /// Appearance embedding, if the detector provides one
    pub embedding: Option<Vec<f32>>,
}

impl Detection {
    /// Create a detection from TLBR coordinates (x1, y1, x2, y2).
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
            embedding: None,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self {
            bbox,
            score,
            embedding: None,
        }
    }

    /// Attach an appearance embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn centroid(&self) -> (f32, f32) {
        self.bbox.center()
    }
}

/// Pairwise assignment cost between live tracks and detections.
///
/// Base cost is the Euclidean centroid distance. With a positive
/// `appearance_weight` and embeddings on both sides, the distance is
/// additionally scaled by appearance dissimilarity; with weight 0 this is
/// the plain geometric matrix.
pub(crate) fn cost_matrix(
    track_centroids: &[(f32, f32)],
    track_embeddings: &[Option<&[f32]>],
    detections: &[Detection],
    appearance_weight: f32,
) -> Array2<f32> {
    let mut costs = Array2::zeros((track_centroids.len(), detections.len()));
    for (i, &(tx, ty)) in track_centroids.iter().enumerate() {
        for (j, det) in detections.iter().enumerate() {
            let (dx, dy) = det.centroid();
            let mut cost = ((tx - dx).powi(2) + (ty - dy).powi(2)).sqrt();
            if appearance_weight > 0.0 {
                if let (Some(te), Some(de)) = (track_embeddings[i], det.embedding.as_deref()) {
                    let dissimilarity = 1.0 - cosine_similarity(te, de);
                    cost *= 1.0 + appearance_weight * dissimilarity;
                }
            }
            costs[[i, j]] = cost;
        }
    }
    costs
}

#[derive(Debug, Clone)]
pub(crate) struct GreedyAssignment {
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Greedy global-minimum assignment.
///
/// Repeatedly binds the globally cheapest remaining (track, detection) pair
/// until the cheapest remaining cost exceeds `max_cost`, removing each bound
/// row and column from consideration. Binding the global minimum rather than
/// each track's nearest neighbor prevents two tracks from claiming the same
/// detection. Ties resolve to the first pair in row-major scan order, which
/// is deterministic for a fixed input ordering.
pub(crate) fn greedy_assignment(costs: &Array2<f32>, max_cost: f32) -> GreedyAssignment {
    let (num_tracks, num_dets) = costs.dim();
    let mut remaining = costs.clone();
    let mut pairs = Vec::new();
    let mut track_used = vec![false; num_tracks];
    let mut det_used = vec![false; num_dets];

    for _ in 0..num_tracks.min(num_dets) {
        let mut best = f32::INFINITY;
        let mut best_pair = None;
        for i in 0..num_tracks {
            for j in 0..num_dets {
                if remaining[[i, j]] < best {
                    best = remaining[[i, j]];
                    best_pair = Some((i, j));
                }
            }
        }

        let Some((i, j)) = best_pair else { break };
        if best > max_cost {
            break;
        }

        pairs.push((i, j));
        track_used[i] = true;
        det_used[j] = true;
        for jj in 0..num_dets {
            remaining[[i, jj]] = f32::INFINITY;
        }
        for ii in 0..num_tracks {
            remaining[[ii, j]] = f32::INFINITY;
        }
    }

    GreedyAssignment {
        pairs,
        unmatched_tracks: (0..num_tracks).filter(|&i| !track_used[i]).collect(),
        unmatched_detections: (0..num_dets).filter(|&j| !det_used[j]).collect(),
    }
}
