use crate::parser::smf_parser::TimeSignatureEvent;
use crate::time::rational::{RationalError, RationalTime};

/// Quarter notes in a whole note, a bar of `n/d` lasts `n/d * 4` quarters.
const QUARTERS_PER_WHOLE: i64 = 4;

/// Musical coordinate of a tick: bar number (from 1) and offset inside the bar as a fraction of
/// the bar length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScorePosition {
    pub bar: u32,
    pub position: RationalTime,
}

impl ScorePosition {
    pub const fn new(bar: u32, position: RationalTime) -> Self {
        Self { bar, position }
    }

    /// Distance to `later` in bars, bar lengths are not weighted.
    pub fn bars_until(&self, later: &Self) -> RationalTime {
        let bars = RationalTime::from_integer(i64::from(later.bar) - i64::from(self.bar));
        bars + later.position - self.position
    }
}

/// Length of a bar in ticks for a `beat` signature, e.g. 4/4 at 96 ppq is 384.
pub fn bar_ticks(ticks_per_quarter: i64, beat: RationalTime) -> RationalTime {
    beat * (QUARTERS_PER_WHOLE * ticks_per_quarter)
}

/// Whole bars of `bar_length` inside `span`, at least one when `span >= bar_length`.
fn whole_bars(span: RationalTime, bar_length: RationalTime) -> i64 {
    span.checked_div(bar_length)
        .map_or(1, |bars| bars.numerator().div_euclid(bars.denominator()))
        .max(1)
}

/// Bars of `bar_length` needed to cover `span`, rounded up.
fn bars_to_reach(span: RationalTime, bar_length: RationalTime) -> i64 {
    span.checked_div(bar_length)
        .map_or(1, |bars| -(-bars.numerator()).div_euclid(bars.denominator()))
        .max(1)
}

/// Converts absolute ticks into bar/position coordinates for a fixed time-signature map.
#[derive(Debug, Clone)]
pub struct TimeQuantizer {
    ticks_per_quarter: i64,
    /// (tick, beat fraction) sorted by tick
    signatures: Vec<(u64, RationalTime)>,
}

impl TimeQuantizer {
    /// `signatures` must be ordered by tick. Fails when a bar would have no length.
    pub fn new(
        ticks_per_quarter: u16,
        signatures: &[TimeSignatureEvent],
    ) -> Result<Self, RationalError> {
        if ticks_per_quarter == 0 || signatures.iter().any(|ts| ts.beat <= RationalTime::ZERO) {
            return Err(RationalError::DivisionByZero);
        }
        debug_assert!(signatures.windows(2).all(|w| w[0].tick <= w[1].tick));
        Ok(Self {
            ticks_per_quarter: i64::from(ticks_per_quarter),
            signatures: signatures.iter().map(|ts| (ts.tick, ts.beat)).collect(),
        })
    }

    pub fn has_time_signature(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Most recent signature at or before `tick`, the first one if `tick` precedes them all.
    fn beat_at(&self, tick: RationalTime) -> RationalTime {
        self.signatures
            .iter()
            .rev()
            .find(|(at, _)| RationalTime::from_integer(*at as i64) <= tick)
            .or_else(|| self.signatures.first())
            .map_or(RationalTime::ONE, |(_, beat)| *beat)
    }

    fn bar_length(&self, at: RationalTime) -> RationalTime {
        bar_ticks(self.ticks_per_quarter, self.beat_at(at))
    }

    /// First signature strictly after `tick`, where the bar length may change.
    fn next_change_after(&self, tick: RationalTime) -> Option<RationalTime> {
        self.signatures
            .iter()
            .map(|(at, _)| RationalTime::from_integer(*at as i64))
            .find(|at| *at > tick)
    }

    pub fn position_of(&self, tick: u64) -> ScorePosition {
        if self.signatures.is_empty() {
            return ScorePosition::new(0, RationalTime::ZERO);
        }

        let target = RationalTime::from_integer(tick as i64);
        let mut bar: u32 = 1;
        let mut bar_start = RationalTime::ZERO;
        loop {
            let bar_length = self.bar_length(bar_start);
            let remaining = target - bar_start;
            if remaining < bar_length {
                // bar lengths are validated positive in `new`
                let position = remaining
                    .checked_div(bar_length)
                    .map_or(RationalTime::ZERO, RationalTime::reduce);
                return ScorePosition::new(bar, position);
            }

            // jump every bar of this length up to the target or the next signature
            let mut bars = whole_bars(remaining, bar_length);
            if let Some(change) = self.next_change_after(bar_start) {
                bars = bars.min(bars_to_reach(change - bar_start, bar_length));
            }
            bar_start = (bar_start + bar_length * bars).reduce();
            bar = bar.saturating_add(u32::try_from(bars).unwrap_or(u32::MAX));
        }
    }

    /// Nudge `tick` by at most `amplitude` ticks towards the position with the smallest
    /// denominator, when its own denominator exceeds `threshold`.
    ///
    /// Offsets are tried in ascending order and only a strictly smaller denominator replaces the
    /// current best, so ties resolve to the earliest offset.
    pub fn snap(&self, tick: &mut u64, amplitude: u32, threshold: i64) -> ScorePosition {
        let mut best = self.position_of(*tick);
        if best.position.denominator() <= threshold {
            return best;
        }

        let mut best_tick = *tick;
        let amplitude = i64::from(amplitude);
        for offset in -amplitude..=amplitude {
            if offset == 0 {
                continue;
            }
            let Some(candidate_tick) = tick.checked_add_signed(offset) else {
                continue;
            };
            let candidate = self.position_of(candidate_tick);
            if candidate.position.denominator() < best.position.denominator() {
                best = candidate;
                best_tick = candidate_tick;
            }
        }

        if best_tick != *tick {
            log::debug!(
                "snapped tick {} -> {best_tick} (bar {} at {})",
                *tick,
                best.bar,
                best.position
            );
            *tick = best_tick;
        }
        best
    }
}
