use crate::foundation::core::{Pts, Timescale};
use crate::foundation::error::GifMotionResult;
use crate::source::DelayRecord;
use crate::timing::{Emission, TimingPolicy};

/// Running-total timing: frame `i` is shown from the previous total to
/// `previous + round(delay_i / 100 * timescale)`.
///
/// Durations are exact at tick granularity and no frame is duplicated.
#[derive(Clone, Debug)]
pub struct DirectAccumulation {
    timescale: Timescale,
    total_ticks: i64,
}

impl DirectAccumulation {
    /// Create a policy positioned at tick 0 of the default time base.
    pub fn new() -> Self {
        Self {
            timescale: Timescale::DEFAULT,
            total_ticks: 0,
        }
    }
}

impl Default for DirectAccumulation {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingPolicy for DirectAccumulation {
    fn name(&self) -> &'static str {
        "direct_accumulation"
    }

    fn begin(&mut self, timescale: Timescale, _prescan: &[DelayRecord]) -> GifMotionResult<()> {
        self.timescale = timescale;
        self.total_ticks = 0;
        Ok(())
    }

    fn place(&mut self, delay: DelayRecord) -> GifMotionResult<Vec<Emission>> {
        let start = self.elapsed();
        self.total_ticks = self
            .total_ticks
            .saturating_add(self.timescale.centis_to_ticks(delay.delay_cs));
        Ok(vec![Emission {
            frame_index: delay.frame_index,
            start,
            end: self.elapsed(),
        }])
    }

    fn elapsed(&self) -> Pts {
        Pts::from_ticks(self.total_ticks, self.timescale)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timing/accumulate.rs"]
mod tests;
