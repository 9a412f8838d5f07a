//! Delay -> presentation timestamp normalization.
//!
//! A [`TimingPolicy`] turns per-frame delays into [`Emission`]s: the buffers to append and the
//! interval each one is displayed for. A session uses exactly one policy.

use crate::foundation::core::{Pts, Timescale};
use crate::foundation::error::GifMotionResult;
use crate::source::DelayRecord;

/// Direct timestamp accumulation.
pub mod accumulate;
/// Greatest-common-divisor frame expansion.
pub mod gcd_expand;

pub use accumulate::DirectAccumulation;
pub use gcd_expand::GcdExpansion;

/// One buffer submission: a source frame displayed over `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Emission {
    /// Source frame shown by this emission.
    pub frame_index: usize,
    /// Display start (presentation timestamp handed to the encoder).
    pub start: Pts,
    /// Display end; equals the next emission's start.
    pub end: Pts,
}

impl Emission {
    /// Display duration in ticks.
    pub fn duration_ticks(&self) -> i64 {
        self.end.ticks - self.start.ticks
    }
}

/// Strategy that places frames on the output time base.
pub trait TimingPolicy {
    /// Stable policy name for logs and reports.
    fn name(&self) -> &'static str;

    /// Whether [`TimingPolicy::begin`] needs every delay of the sequence up front.
    fn requires_prescan(&self) -> bool {
        false
    }

    /// Reset for a new session. `prescan` holds all delays when the policy requires them and
    /// may be empty otherwise.
    fn begin(&mut self, timescale: Timescale, prescan: &[DelayRecord]) -> GifMotionResult<()>;

    /// Emissions for the next frame, in order.
    fn place(&mut self, delay: DelayRecord) -> GifMotionResult<Vec<Emission>>;

    /// End of the last placed emission (session start before any frame).
    fn elapsed(&self) -> Pts;
}

/// Selectable timing strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingPolicyKind {
    /// One emission per frame, timestamps accumulate the exact delays.
    #[default]
    DirectAccumulation,
    /// Frames repeated at a constant `gcd(delays)` rate.
    GcdExpansion,
}

impl TimingPolicyKind {
    /// Construct a fresh policy.
    pub fn build(self) -> Box<dyn TimingPolicy> {
        match self {
            TimingPolicyKind::DirectAccumulation => Box::new(DirectAccumulation::new()),
            TimingPolicyKind::GcdExpansion => Box::new(GcdExpansion::new()),
        }
    }
}

/// A complete timing plan for a delay sequence.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Schedule {
    /// Time base of every timestamp.
    pub timescale: Timescale,
    /// Emissions in append order.
    pub emissions: Vec<Emission>,
}

impl Schedule {
    /// Number of buffers the plan appends.
    pub fn len(&self) -> usize {
        self.emissions.len()
    }

    /// Return `true` when nothing is emitted.
    pub fn is_empty(&self) -> bool {
        self.emissions.is_empty()
    }

    /// End timestamp of every emission, in ticks.
    pub fn end_ticks(&self) -> Vec<i64> {
        self.emissions.iter().map(|e| e.end.ticks).collect()
    }

    /// Total presentation duration.
    pub fn total_duration(&self) -> Pts {
        self.emissions
            .last()
            .map(|e| e.end)
            .unwrap_or_else(|| Pts::zero(self.timescale))
    }
}

/// Run `policy` over a complete delay list.
pub fn schedule(
    policy: &mut dyn TimingPolicy,
    delays: &[DelayRecord],
    timescale: Timescale,
) -> GifMotionResult<Schedule> {
    policy.begin(timescale, delays)?;
    let mut emissions = Vec::with_capacity(delays.len());
    for &delay in delays {
        emissions.extend(policy.place(delay)?);
    }
    Ok(Schedule {
        timescale,
        emissions,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/timing/schedule.rs"]
mod tests;
