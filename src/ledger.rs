//! Daily uniqueness ledger and per-camera statistics.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crossing::Direction;
use crate::reid::VisitorKey;

/// One unique visitor on one calendar day. The (date, key) pair is the
/// uniqueness mechanism: later events for the pair only touch
/// `last_seen_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorDayRecord {
    pub visit_date: NaiveDate,
    pub visitor_key: VisitorKey,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Per-(day, camera) counters, incremented monotonically on ingest and
/// cleared only by [`DailyLedger::reset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub stat_date: NaiveDate,
    pub camera_id: i64,
    pub total_events: u64,
    pub unique_visitors: u64,
    pub total_in: u64,
    pub total_out: u64,
    pub last_updated_at: DateTime<Utc>,
}

/// Cross-camera aggregate for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_events: u64,
    pub unique_visitors: u64,
    pub total_in: u64,
    pub total_out: u64,
}

/// Event payload at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubmission {
    pub camera_id: i64,
    pub area_id: Option<i64>,
    pub event_time: DateTime<Utc>,
    pub visitor_key: VisitorKey,
    pub direction: Option<Direction>,
    pub confidence_avg: Option<f32>,
}

/// Acknowledgement returned for each ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestAck {
    pub ok: bool,
    pub is_new_unique: bool,
}

#[derive(Default)]
struct LedgerState {
    visitors: BTreeMap<(NaiveDate, VisitorKey), VisitorDayRecord>,
    stats: BTreeMap<(NaiveDate, i64), DailyStats>,
    events: Vec<EventSubmission>,
}

/// In-memory reference store for the daily-unique-visitor ledger.
///
/// Ingestion is serialized by a single mutex over the whole ledger state,
/// so the check-then-create on a (date, visitor) pair is atomic: two
/// concurrent events for a new visitor cannot both observe "absent" and
/// double-count a unique. A persistent deployment gets the same guarantee
/// from a uniqueness constraint plus a transactional upsert.
#[derive(Default)]
pub struct DailyLedger {
    state: Mutex<LedgerState>,
}

impl DailyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event. The visit date is the UTC date of `event_time`.
    pub fn ingest(&self, submission: &EventSubmission) -> IngestAck {
        let visit_date = submission.event_time.date_naive();
        let mut state = self.locked();

        let is_new_unique = match state
            .visitors
            .entry((visit_date, submission.visitor_key.clone()))
        {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().last_seen_at = submission.event_time;
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(VisitorDayRecord {
                    visit_date,
                    visitor_key: submission.visitor_key.clone(),
                    first_seen_at: submission.event_time,
                    last_seen_at: submission.event_time,
                });
                true
            }
        };

        let stats = state
            .stats
            .entry((visit_date, submission.camera_id))
            .or_insert_with(|| DailyStats {
                stat_date: visit_date,
                camera_id: submission.camera_id,
                total_events: 0,
                unique_visitors: 0,
                total_in: 0,
                total_out: 0,
                last_updated_at: submission.event_time,
            });

        stats.total_events += 1;
        if is_new_unique {
            stats.unique_visitors += 1;
        }
        match submission.direction {
            Some(Direction::In) => stats.total_in += 1,
            Some(Direction::Out) => stats.total_out += 1,
            None => {}
        }
        stats.last_updated_at = Utc::now();

        state.events.push(submission.clone());

        debug!(
            visitor = submission.visitor_key.short(),
            camera = submission.camera_id,
            is_new_unique,
            "event ingested"
        );

        IngestAck {
            ok: true,
            is_new_unique,
        }
    }

    /// Daily stats within `[from, to]`, optionally for one camera.
    pub fn stats_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        camera_id: Option<i64>,
    ) -> Vec<DailyStats> {
        let state = self.locked();
        state
            .stats
            .values()
            .filter(|s| s.stat_date >= from && s.stat_date <= to)
            .filter(|s| camera_id.is_none_or(|id| s.camera_id == id))
            .cloned()
            .collect()
    }

    /// Visitor-day records within `[from, to]`.
    pub fn visitors_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<VisitorDayRecord> {
        let state = self.locked();
        state
            .visitors
            .values()
            .filter(|v| v.visit_date >= from && v.visit_date <= to)
            .cloned()
            .collect()
    }

    /// Raw accepted events within `[from, to]`, optionally for one camera.
    pub fn events_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        camera_id: Option<i64>,
    ) -> Vec<EventSubmission> {
        let state = self.locked();
        state
            .events
            .iter()
            .filter(|e| {
                let d = e.event_time.date_naive();
                d >= from && d <= to
            })
            .filter(|e| camera_id.is_none_or(|id| e.camera_id == id))
            .cloned()
            .collect()
    }

    /// Aggregate one day's stats across all cameras.
    pub fn daily_summary(&self, date: NaiveDate) -> DailySummary {
        let state = self.locked();
        let mut summary = DailySummary {
            date,
            total_events: 0,
            unique_visitors: 0,
            total_in: 0,
            total_out: 0,
        };
        for stats in state.stats.values().filter(|s| s.stat_date == date) {
            summary.total_events += stats.total_events;
            summary.unique_visitors += stats.unique_visitors;
            summary.total_in += stats.total_in;
            summary.total_out += stats.total_out;
        }
        summary
    }

    /// Atomically clear all visitor-day records, stats and events. A hard
    /// clear for operator-triggered wipes and test fixtures.
    pub fn reset(&self) {
        let mut state = self.locked();
        state.visitors.clear();
        state.stats.clear();
        state.events.clear();
        info!("ledger reset");
    }

    fn locked(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
