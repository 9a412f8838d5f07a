use crate::foundation::core::{Pts, Timescale};
use crate::foundation::error::{GifMotionError, GifMotionResult};
use crate::foundation::math::gcd_all;
use crate::source::DelayRecord;
use crate::timing::{Emission, TimingPolicy};

/// Constant-rate timing: every frame is repeated `delay / g` times at `g` centiseconds each,
/// where `g = gcd(all delays)`.
///
/// Needs the whole delay list before the first frame. Worst case (`g == 1`) emits
/// `sum(delays)` buffers.
#[derive(Clone, Debug)]
pub struct GcdExpansion {
    timescale: Timescale,
    unit_cs: u32,
    total_ticks: i64,
}

impl GcdExpansion {
    /// Create a policy; [`TimingPolicy::begin`] fixes the repeat unit.
    pub fn new() -> Self {
        Self {
            timescale: Timescale::DEFAULT,
            unit_cs: 1,
            total_ticks: 0,
        }
    }

    /// Duration of one emission in centiseconds.
    pub fn unit_cs(&self) -> u32 {
        self.unit_cs
    }

    /// Number of emissions `delays` expands to.
    pub fn expanded_len(delays: &[DelayRecord]) -> u64 {
        let g = gcd_all(delays.iter().map(|d| d.delay_cs));
        delays.iter().map(|d| u64::from(d.delay_cs / g)).sum()
    }
}

impl Default for GcdExpansion {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingPolicy for GcdExpansion {
    fn name(&self) -> &'static str {
        "gcd_expansion"
    }

    fn requires_prescan(&self) -> bool {
        true
    }

    fn begin(&mut self, timescale: Timescale, prescan: &[DelayRecord]) -> GifMotionResult<()> {
        self.timescale = timescale;
        self.unit_cs = gcd_all(prescan.iter().map(|d| d.delay_cs));
        self.total_ticks = 0;
        Ok(())
    }

    fn place(&mut self, delay: DelayRecord) -> GifMotionResult<Vec<Emission>> {
        if !delay.delay_cs.is_multiple_of(self.unit_cs) {
            return Err(GifMotionError::validation(format!(
                "frame {} delay {}cs is not a multiple of the prescanned unit {}cs",
                delay.frame_index, delay.delay_cs, self.unit_cs
            )));
        }

        let repeats = delay.delay_cs / self.unit_cs;
        let step = self.timescale.centis_to_ticks(self.unit_cs);
        let mut out = Vec::with_capacity(repeats as usize);
        for _ in 0..repeats {
            let start = self.elapsed();
            self.total_ticks = self.total_ticks.saturating_add(step);
            out.push(Emission {
                frame_index: delay.frame_index,
                start,
                end: self.elapsed(),
            });
        }
        Ok(out)
    }

    fn elapsed(&self) -> Pts {
        Pts::from_ticks(self.total_ticks, self.timescale)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timing/gcd_expand.rs"]
mod tests;
