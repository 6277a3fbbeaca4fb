//! Per-frame edge pipeline: tracker, identity resolution and crossing
//! detection run in strict sequence against one frame's detection batch.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crossing::{CrossingConfig, CrossingDetector, CrossingEvent};
use crate::error::Error;
use crate::ledger::{DailyLedger, EventSubmission, IngestAck};
use crate::reid::{IdentityResolver, ResolverConfig};
use crate::roi::Roi;
use crate::tracker::{CentroidTracker, Detection, TrackerConfig};

/// Seam toward the ingestion boundary.
///
/// Implement this to deliver events to wherever the ledger lives: an HTTP
/// client in a distributed deployment, [`LedgerSink`] when embedded.
pub trait EventSink {
    fn submit(&mut self, event: &EventSubmission) -> Result<IngestAck, Error>;
}

/// Sink feeding an in-process [`DailyLedger`].
pub struct LedgerSink {
    ledger: Arc<DailyLedger>,
}

impl LedgerSink {
    pub fn new(ledger: Arc<DailyLedger>) -> Self {
        Self { ledger }
    }
}

impl EventSink for LedgerSink {
    fn submit(&mut self, event: &EventSubmission) -> Result<IngestAck, Error> {
        Ok(self.ledger.ingest(event))
    }
}

/// Configuration for the whole edge pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub camera_id: i64,
    pub area_id: Option<i64>,
    /// Counting-area polygon; fewer than 3 points counts the whole frame
    pub roi: Vec<[f32; 2]>,
    pub tracker: TrackerConfig,
    pub resolver: ResolverConfig,
    pub crossing: CrossingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            camera_id: 1,
            area_id: None,
            roi: Vec::new(),
            tracker: TrackerConfig::default(),
            resolver: ResolverConfig::default(),
            crossing: CrossingConfig::default(),
        }
    }
}

/// Outcome of one processed frame.
#[derive(Debug)]
pub struct FrameSummary {
    /// Accepted crossing events with the sink's acknowledgement, `None`
    /// when submission failed
    pub events: Vec<(CrossingEvent, Option<IngestAck>)>,
    /// Live tracks after this cycle
    pub live_tracks: usize,
}

/// Ties the edge-side stages together for per-frame processing.
///
/// `process_frame` must be called with one frame's detections at a time;
/// each stage mutates per-track and per-visitor state the next stage reads,
/// so there is no cross-frame pipelining. Event submission is
/// fire-and-forget: a failed submission is logged and the loop continues,
/// since blocking would stall crossing detection for subsequent frames.
pub struct VisitorPipeline<S: EventSink> {
    camera_id: i64,
    area_id: Option<i64>,
    roi: Roi,
    tracker: CentroidTracker,
    resolver: IdentityResolver,
    crossing: CrossingDetector,
    sink: S,
    current_date: Option<NaiveDate>,
}

impl<S: EventSink> VisitorPipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Self {
        Self {
            camera_id: config.camera_id,
            area_id: config.area_id,
            roi: Roi::new(config.roi),
            tracker: CentroidTracker::new(config.tracker),
            resolver: IdentityResolver::new(config.resolver),
            crossing: CrossingDetector::new(config.crossing),
            sink,
            current_date: None,
        }
    }

    /// Process one frame's detection batch at time `now`.
    pub fn process_frame(&mut self, detections: &[Detection], now: DateTime<Utc>) -> FrameSummary {
        let today = now.date_naive();
        if self.current_date != Some(today) {
            if self.current_date.is_some() {
                info!(%today, "day rollover, resetting crossing state");
                self.crossing.roll_day();
                self.tracker.clear_roi_flags();
            }
            self.current_date = Some(today);
        }

        self.tracker.update(detections);
        let active = self.tracker.active_ids();
        self.resolver.retain_tracks(&active);

        let confidence_avg = if detections.is_empty() {
            None
        } else {
            let mean = detections.iter().map(|d| d.score).sum::<f32>() / detections.len() as f32;
            Some((mean * 10_000.0).round() / 10_000.0)
        };

        let mut events = Vec::new();
        for (&track_id, track) in self.tracker.tracks_mut() {
            let visitor_key =
                self.resolver
                    .resolve(track_id, track.embedding.as_deref(), self.camera_id, today);

            let Some(event) = self.crossing.observe(track, &visitor_key, &self.roi, now) else {
                continue;
            };

            let submission = EventSubmission {
                camera_id: self.camera_id,
                area_id: self.area_id,
                event_time: now,
                visitor_key,
                direction: Some(event.direction),
                confidence_avg,
            };

            let ack = match self.sink.submit(&submission) {
                Ok(ack) => {
                    info!(
                        visitor = submission.visitor_key.short(),
                        direction = %event.direction,
                        is_new_unique = ack.is_new_unique,
                        "visitor event accepted"
                    );
                    Some(ack)
                }
                Err(err) => {
                    warn!(error = %err, "event submission failed, continuing");
                    None
                }
            };
            events.push((event, ack));
        }

        FrameSummary {
            events,
            live_tracks: active.len(),
        }
    }

    /// Replace the counting-area polygon, e.g. after a config refresh.
    pub fn set_roi(&mut self, roi: Roi) {
        self.roi = roi;
    }

    /// Replace the counting-area identity attached to submissions.
    pub fn set_area(&mut self, area_id: Option<i64>) {
        self.area_id = area_id;
    }

    /// Clear all edge-side registries and caches. The edge half of the
    /// operator-triggered data wipe; the ledger side is
    /// [`DailyLedger::reset`].
    pub fn reset(&mut self) {
        self.resolver.reset();
        self.crossing.roll_day();
        self.tracker.clear_roi_flags();
        self.current_date = None;
    }

    pub fn tracker(&self) -> &CentroidTracker {
        &self.tracker
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
