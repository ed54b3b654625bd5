//! Trigger timer arithmetic.

/// Reload value for a zero-based periodic countdown timer firing at
/// `rate_hz`.
///
/// The counter reloads automatically at the zero crossing, so the interval
/// between triggers is exactly `reload + 1` clock ticks. A reload of zero
/// breaks the periodic-mode contract; rates that high (or clocks that slow)
/// are an integration defect, caught here rather than at runtime on the
/// target.
pub fn reload_ticks(clock_hz: u32, rate_hz: u32) -> u32 {
    debug_assert!(rate_hz > 0);
    let period = clock_hz / rate_hz;
    debug_assert!(period > 1, "sample rate too high for timer clock");
    period - 1
}

/// Reported sample rate after hardware oversampling: averaging `factor` raw
/// conversions per reported sample divides the trigger rate by `factor`.
pub fn effective_rate_hz(trigger_rate_hz: u32, oversample_factor: u32) -> u32 {
    trigger_rate_hz / oversample_factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_is_exact_for_integer_divisors() {
        // 80 MHz system clock, 8 kHz sample rate.
        assert_eq!(reload_ticks(80_000_000, 8_000), 9_999);
        // Interval reproduces the rate to the tick.
        assert_eq!(80_000_000 / (9_999 + 1), 8_000);
    }

    #[test]
    fn reload_spans_representable_rates() {
        let clock = 80_000_000;
        for rate in [10, 100, 1_000, 8_000, 100_000, 1_000_000] {
            let reload = reload_ticks(clock, rate);
            assert!(reload > 0);
            let actual = clock / (reload + 1);
            // Within one clock tick of the requested period.
            assert!(actual >= rate && clock / actual <= clock / rate);
        }
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn zero_reload_is_rejected() {
        // clock / rate == 1 would reload with zero.
        reload_ticks(80_000_000, 80_000_000);
    }

    #[test]
    fn oversampling_divides_the_rate() {
        assert_eq!(effective_rate_hz(8_000, 8), 1_000);
        assert_eq!(effective_rate_hz(8_000, 1), 8_000);
    }
}
