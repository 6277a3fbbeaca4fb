mod centroid_tracker;
mod matching;
mod rect;
mod track;

pub use centroid_tracker::{CentroidTracker, TrackerConfig};
pub use matching::Detection;
pub use rect::Rect;
pub use track::Track;
