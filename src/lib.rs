//! Unique daily visitor counting core.
//!
//! Consumes per-frame person detections from an external detector and turns
//! them into daily-unique visitor statistics in three stages:
//!
//! 1. [`CentroidTracker`] assigns stable short-lived track IDs to moving
//!    detections with a greedy nearest-centroid assignment.
//! 2. [`IdentityResolver`] maps each track to a persistent [`VisitorKey`]
//!    using an appearance embedding, recognizing same-day re-entries.
//! 3. [`CrossingDetector`] converts ROI membership transitions into
//!    debounced IN/OUT events, which [`DailyLedger`] aggregates exactly once
//!    per (day, visitor) into per-camera daily counters.
//!
//! [`VisitorPipeline`] wires the three edge-side stages together for
//! per-frame processing and submits events through the [`EventSink`] seam.

pub mod crossing;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod reid;
pub mod roi;
pub mod tracker;

pub use crossing::{CrossingConfig, CrossingDetector, CrossingEvent, Direction};
pub use error::Error;
pub use ledger::{
    DailyLedger, DailyStats, DailySummary, EventSubmission, IngestAck, VisitorDayRecord,
};
pub use pipeline::{EventSink, FrameSummary, LedgerSink, PipelineConfig, VisitorPipeline};
pub use reid::{IdentityResolver, ResolverConfig, ResolverStats, VisitorKey};
pub use roi::{DirectionMode, Roi};
pub use tracker::{CentroidTracker, Detection, Rect, Track, TrackerConfig};
