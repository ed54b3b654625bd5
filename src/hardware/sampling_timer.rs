//! The sampling timer clocks the ADC sequence at a fixed rate.
//!
//! A 32-bit periodic countdown timer reloads itself at every zero crossing,
//! so the interval between triggers is constant at `reload + 1` core clock
//! ticks with no software involvement. Its ADC trigger output starts the
//! sample sequence on each crossing; the processor never polls.
use tm4c123x_hal::sysctl;

use acq::timing::reload_ticks;

/// Owning wrapper of the trigger timer peripheral.
///
/// The timer is created paused; nothing samples until [`start`](Self::start)
/// is called, which should happen last, after the whole acquisition chain is
/// configured.
pub struct SamplingTimer {
    timer: tm4c123x::TIMER0,
}

impl SamplingTimer {
    /// Take the timer peripheral and configure it for periodic operation
    /// with the ADC trigger output enabled, counter stopped.
    pub fn new(timer: tm4c123x::TIMER0, power: &sysctl::PowerControl) -> Self {
        sysctl::control_power(
            power,
            sysctl::Domain::Timer0,
            sysctl::RunMode::Run,
            sysctl::PowerState::On,
        );
        sysctl::reset(power, sysctl::Domain::Timer0);

        // Full-width (32-bit) timer A, periodic countdown.
        timer.ctl.modify(|_, w| w.taen().clear_bit());
        timer.cfg.write(|w| unsafe { w.bits(0) });
        timer.tamr.modify(|_, w| unsafe { w.tamr().bits(0x2) });
        timer.ctl.modify(|_, w| w.taote().set_bit());

        Self { timer }
    }

    /// Program the trigger rate.
    ///
    /// The reload value must be non-zero: `clock_hz / rate_hz` of one breaks
    /// the periodic reload contract. That is checked as an integration
    /// defect in [`reload_ticks`], not a runtime error here.
    pub fn set_rate(&mut self, clock_hz: u32, rate_hz: u32) {
        let reload = reload_ticks(clock_hz, rate_hz);
        self.timer.tailr.write(|w| unsafe { w.bits(reload) });
    }

    /// Current reload value in timer ticks.
    pub fn period_ticks(&self) -> u32 {
        self.timer.tailr.read().bits()
    }

    /// Start triggering. The engine runs from here on for the process
    /// lifetime; no stop transition exists.
    pub fn start(&mut self) {
        self.timer.ctl.modify(|_, w| w.taen().set_bit());
    }
}
