//! Hardware-specific setup and drivers for the dashboard.
pub use tm4c123x_hal as hal;

pub mod adc;
pub mod design_parameters;
pub mod sampling_timer;
pub mod setup;
pub mod udma;
pub mod usec_timer;

use self::design_parameters::SENSOR_CHANNELS;

rtic_monotonics::systick_monotonic!(Systick, 1_000);

/// Type alias for the display bus: I2C1 master on PA6/PA7.
pub type I2cBus = hal::i2c::I2c<
    tm4c123x::I2C1,
    (
        hal::gpio::gpioa::PA6<
            hal::gpio::AlternateFunction<hal::gpio::AF3, hal::gpio::PushPull>,
        >,
        hal::gpio::gpioa::PA7<
            hal::gpio::AlternateFunction<
                hal::gpio::AF3,
                hal::gpio::OpenDrain<hal::gpio::Floating>,
            >,
        >,
    ),
>;

/// Type alias for the character LCD on the display bus.
pub type DisplayLcd = lcd_pcf8574::Lcd<I2cBus, usec_timer::UsecDelay>;

/// The selected acquisition engine.
///
/// The timer-triggered sequencer is the production path; the scatter-gather
/// path carries the throttle channel only and is selected by the
/// `sg-throttle` feature.
pub enum Acquisition {
    Triggered(adc::TriggeredSequencer),
    ScatterGather(udma::SgAcquisition),
}

impl Acquisition {
    /// Newest raw codes, one per sensor. The scatter-gather path serves only
    /// the first (throttle) slot; the others read as zero.
    pub fn read(&self) -> [u32; SENSOR_CHANNELS] {
        match self {
            Acquisition::Triggered(engine) => engine.read(),
            Acquisition::ScatterGather(engine) => {
                let mut batch = [0; SENSOR_CHANNELS];
                batch[0] = engine.read();
                batch
            }
        }
    }
}

#[cfg(target_os = "none")]
#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::sync::atomic::{compiler_fence, AtomicBool, Ordering};
    use rtt_target::{ChannelMode, UpChannel};

    cortex_m::interrupt::disable();

    // Recursion protection
    static PANICKED: AtomicBool = AtomicBool::new(false);
    if !PANICKED.swap(true, Ordering::Relaxed) {
        if let Some(mut channel) = unsafe { UpChannel::conjure(0) } {
            channel.set_mode(ChannelMode::NoBlockTrim);
            use core::fmt::Write;
            writeln!(channel, "{}", info).ok();
        }
    }

    // No safe recovery action exists once task-context memory is suspect:
    // halt with interrupts off.
    loop {
        compiler_fence(Ordering::SeqCst);
    }
}

#[cfg(target_os = "none")]
#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}

#[cfg(target_os = "none")]
#[cortex_m_rt::exception]
unsafe fn DefaultHandler(irqn: i16) {
    panic!("Unhandled exception (IRQn = {})", irqn);
}
