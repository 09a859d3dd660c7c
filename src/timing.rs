//! Timing model: tempo coefficient, buffer sizing, and time folding.
//!
//! Every channel's buffer covers a whole number of musical bars. The tempo
//! coefficient converts bars to seconds; the fold functions reduce elapsed
//! time modulo a period to produce the repeating phase values (`rt`/`bt`)
//! that time-dependent opcodes consume.

/// Fixed engine sample rate, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Global tempo used when a session does not specify one.
pub const DEFAULT_BPM: f64 = 120.0;

/// Seconds of audio represented by one bar at the given tempo.
///
/// `60 / bpm * 4`: four beats to the bar. At 120 bpm one bar is 2 seconds.
pub fn tempo_coefficient(bpm: f64) -> f64 {
    60.0 / bpm * 4.0
}

/// Buffer length in samples for a channel with the given bar length,
/// truncated to an integer sample count.
pub fn buffer_len(sample_rate: u32, bpm: f64, bar_length: f64) -> usize {
    (sample_rate as f64 * tempo_coefficient(bpm) * bar_length) as usize
}

/// Wall-clock fold: `real_time` reduced modulo `period`.
///
/// The identity fold is `period == f64::INFINITY` (`x % inf == x`).
pub fn fold(real_time: f64, period: f64) -> f64 {
    real_time % period
}

/// Tempo-scaled fold: the bar-time phase that musically-relevant opcodes
/// (decay, oscillator phase) are keyed to. The fold period is stretched by
/// the tempo coefficient so one period spans `period` bars, not seconds.
pub fn bar_fold(real_time: f64, period: f64, coefficient: f64) -> f64 {
    real_time % (period * coefficient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_is_seconds_per_bar() {
        assert_eq!(tempo_coefficient(120.0), 2.0);
        assert_eq!(tempo_coefficient(240.0), 1.0);
        assert_eq!(tempo_coefficient(60.0), 4.0);
    }

    #[test]
    fn buffer_len_truncates() {
        // The concrete scenario from the sequencer's reference session:
        // 48 kHz, 120 bpm, quarter bar.
        assert_eq!(buffer_len(48_000, 120.0, 0.25), 24_000);
        assert_eq!(buffer_len(48_000, 120.0, 1.0), 96_000);
        assert_eq!(buffer_len(48_000, 240.0, 1.0), 48_000);
    }

    #[test]
    fn infinite_period_is_identity() {
        assert_eq!(fold(1.75, f64::INFINITY), 1.75);
        assert_eq!(bar_fold(1.75, f64::INFINITY, 2.0), 1.75);
    }

    #[test]
    fn bar_fold_is_tempo_scaled() {
        // Quarter-bar fold at 120 bpm wraps every half second.
        let co = tempo_coefficient(120.0);
        assert_eq!(bar_fold(0.6, 0.25, co), 0.6 % 0.5);
        assert!(bar_fold(0.49, 0.25, co) > bar_fold(0.51, 0.25, co));
    }
}
