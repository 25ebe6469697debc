//! Time-aligned comparison of the live and reference pitch series.
//!
//! [`LiveComparison`] owns two [`RollingHistory`] windows and the live
//! confidence gate.  The controller feeds it one live estimate and at most
//! one reference row per tick, then asks for a [`ChartFrame`].
//!
//! Live gate: an estimate below the gate does not move the displayed
//! frequency; the previous one is carried forward.  The first sample of a
//! recording session is always accepted.

use crate::audio::RingBuffer;
use crate::config::ComparisonConfig;
use crate::pitch::{PitchEstimate, ReferenceRow};

use super::chart::{ChartFrame, ChartPoint, PointColor};

// ---------------------------------------------------------------------------
// RollingHistory
// ---------------------------------------------------------------------------

/// Bounded FIFO of displayed `(confidence, frequency)` pairs.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    buf: RingBuffer<PitchEstimate>,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: RingBuffer::new(capacity.max(1)),
        }
    }

    /// Append, evicting and returning the oldest entry when full.
    pub fn push(&mut self, entry: PitchEstimate) -> Option<PitchEstimate> {
        self.buf.push(entry)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn last(&self) -> Option<PitchEstimate> {
        self.buf.last()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = PitchEstimate> + '_ {
        self.buf.iter()
    }

    pub fn frequencies(&self) -> Vec<f32> {
        self.iter().map(|e| e.frequency_hz).collect()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

// ---------------------------------------------------------------------------
// LiveComparison
// ---------------------------------------------------------------------------

pub struct LiveComparison {
    live: RollingHistory,
    reference: RollingHistory,
    live_gate: f32,
    reference_gate: f32,
    y_max: f32,
    awaiting_first_live: bool,
    last_live_hz: f32,
}

impl LiveComparison {
    pub fn new(config: &ComparisonConfig) -> Self {
        Self {
            live: RollingHistory::new(config.history_capacity),
            reference: RollingHistory::new(config.history_capacity),
            live_gate: config.live_gate,
            reference_gate: config.reference_gate,
            y_max: config.y_max_hz,
            awaiting_first_live: true,
            last_live_hz: 0.0,
        }
    }

    /// New recording session: empty live history, next sample accepted
    /// unconditionally.
    pub fn reset_live(&mut self) {
        self.live.clear();
        self.awaiting_first_live = true;
        self.last_live_hz = 0.0;
    }

    /// New playback session.
    pub fn reset_reference(&mut self) {
        self.reference.clear();
    }

    /// Gate and append one live estimate.  Returns what was stored.
    pub fn push_live(&mut self, estimate: PitchEstimate) -> PitchEstimate {
        let accepted = self.awaiting_first_live || estimate.passes(self.live_gate);
        self.awaiting_first_live = false;
        if accepted {
            self.last_live_hz = estimate.frequency_hz;
        }
        let stored = PitchEstimate {
            confidence: estimate.confidence,
            frequency_hz: self.last_live_hz,
        };
        self.live.push(stored);
        stored
    }

    /// Append one reference row.
    pub fn push_reference(&mut self, row: ReferenceRow) {
        self.reference
            .push(PitchEstimate::new(row.confidence, row.frequency_hz));
    }

    pub fn live(&self) -> &RollingHistory {
        &self.live
    }

    pub fn reference(&self) -> &RollingHistory {
        &self.reference
    }

    /// Live points (x = 0..) followed by reference points (x = 0..).
    pub fn frame(&self) -> ChartFrame {
        let live = self.live.iter().enumerate().map(|(x, e)| ChartPoint {
            x,
            y: e.frequency_hz,
            color: PointColor::for_live(e.confidence, self.live_gate),
        });
        let reference = self.reference.iter().enumerate().map(|(x, e)| ChartPoint {
            x,
            y: e.frequency_hz,
            color: PointColor::for_reference(e.confidence, self.reference_gate),
        });
        ChartFrame {
            points: live.chain(reference).collect(),
            x_slots: self.live.capacity(),
            y_max: self.y_max,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
