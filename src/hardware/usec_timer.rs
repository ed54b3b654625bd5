//! Free-running microsecond clock for display settle delays.
//!
//! A split 16-bit timer raises a periodic interrupt every microsecond which
//! increments a global counter. Delays busy-wait on counter deltas with
//! wrapping subtraction, so they stay correct across the 32-bit roll-over.
//! The resolution serves the character display's settle times; task pacing
//! uses the Systick monotonic instead.
use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal_02::blocking::delay::{DelayMs, DelayUs};
use tm4c123x_hal::sysctl;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Configure a 1 µs periodic up-counter and start it. The clock advances
/// only once the tick interrupt is bound and unmasked; delays taken before
/// then never return.
pub fn start(
    timer: tm4c123x::TIMER1,
    clock_hz: u32,
    power: &sysctl::PowerControl,
) -> (UsecDelay, MicroTick) {
    sysctl::control_power(
        power,
        sysctl::Domain::Timer1,
        sysctl::RunMode::Run,
        sysctl::PowerState::On,
    );
    sysctl::reset(power, sysctl::Domain::Timer1);

    let reload = acq::timing::reload_ticks(clock_hz, 1_000_000);

    timer.ctl.modify(|_, w| w.taen().clear_bit());
    // Split pair, timer A periodic, counting up.
    timer.cfg.write(|w| unsafe { w.bits(0x4) });
    timer
        .tamr
        .modify(|_, w| unsafe { w.tamr().bits(0x2).tacdir().set_bit() });
    timer.tailr.write(|w| unsafe { w.bits(reload) });
    timer.icr.write(|w| w.tatocint().set_bit());
    timer.imr.modify(|_, w| w.tatoim().set_bit());
    timer.ctl.modify(|_, w| w.taen().set_bit());

    (UsecDelay { _priv: () }, MicroTick { timer })
}

/// Tick-interrupt handle; owns the timer and is the only writer of the
/// counter.
pub struct MicroTick {
    timer: tm4c123x::TIMER1,
}

impl MicroTick {
    pub fn on_tick(&mut self) {
        self.timer.icr.write(|w| w.tatocint().set_bit());
        TICKS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Busy-wait delays against the free-running counter. Copyable; one handle
/// per bus driver.
#[derive(Copy, Clone)]
pub struct UsecDelay {
    _priv: (),
}

impl UsecDelay {
    fn wait(&self, us: u32) {
        let start = TICKS.load(Ordering::Relaxed);
        while TICKS.load(Ordering::Relaxed).wrapping_sub(start) < us {
            core::hint::spin_loop();
        }
    }
}

impl DelayUs<u32> for UsecDelay {
    fn delay_us(&mut self, us: u32) {
        self.wait(us);
    }
}

impl DelayMs<u32> for UsecDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.wait(ms * 1_000);
    }
}
