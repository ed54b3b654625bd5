//! Device bring-up: everything that has to happen, in order, before the
//! tasks start running.
use tm4c123x_hal::gpio::GpioExt;
use tm4c123x_hal::sysctl::{self, SysctlExt};
use tm4c123x_hal::time::U32Ext;

use super::adc::{SequenceIrq, TriggeredSequencer};
use super::design_parameters::{
    LCD_ADDR, LCD_COLS, LCD_ROWS, SAMPLE_RATE_HZ, SENSOR_INPUTS,
    SYSTEM_CLOCK_HZ,
};
use super::sampling_timer::SamplingTimer;
use super::udma::{SgAcquisition, SgFaultIrq};
use super::usec_timer::{self, MicroTick};
use super::{Acquisition, DisplayLcd, Systick};

/// The configured hardware interfaces, sampling not yet started.
pub struct DashboardDevices {
    pub acquisition: Acquisition,
    /// Completion-interrupt handle of the periodic sequencer; absent on the
    /// scatter-gather path, which needs no interrupt per sample.
    pub adc_irq: Option<SequenceIrq>,
    /// The ADC trigger timer; absent on the (always-triggered)
    /// scatter-gather path. Start it last.
    pub sampling_timer: Option<SamplingTimer>,
    pub sg_fault_irq: SgFaultIrq,
    pub lcd: DisplayLcd,
    pub usec_tick: MicroTick,
}

/// Configure the dashboard hardware.
///
/// Returns all interfaces in a configured but quiescent state: nothing
/// samples until the sampling timer is started, and the display is
/// initialized by its task once interrupts (and with them the microsecond
/// clock) are live.
pub fn setup(
    core: cortex_m::Peripherals,
    device: tm4c123x::Peripherals,
) -> DashboardDevices {
    let mut sc = device.SYSCTL.constrain();
    sc.clock_setup.oscillator = sysctl::Oscillator::Main(
        sysctl::CrystalFrequency::_16mhz,
        sysctl::SystemClock::UsePll(sysctl::PllOutputFrequency::_80_00mhz),
    );
    let clocks = sc.clock_setup.freeze();
    debug_assert_eq!(clocks.sysclk.0, SYSTEM_CLOCK_HZ);

    // Set up RTT logging
    {
        use rtt_logger::RTTLogger;

        static LOGGER: RTTLogger = RTTLogger::new(log::LevelFilter::Info);
        rtt_target::rtt_init_print!();
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .unwrap();
        log::info!("starting");
    }

    // Set up the Systick monotonic for task scheduling.
    Systick::start(core.SYST, SYSTEM_CLOCK_HZ);

    // The analog pads live on ports D and E; splitting powers the ports so
    // the engines can take the pads to analog mode. The pins themselves stay
    // here and are handed out to nobody else.
    let _portd = device.GPIO_PORTD.split(&sc.power_control);
    let _porte = device.GPIO_PORTE.split(&sc.power_control);

    // Display bus: I2C1 master on PA6/PA7 at 100 kHz.
    let mut porta = device.GPIO_PORTA.split(&sc.power_control);
    let scl = porta
        .pa6
        .into_af_push_pull::<tm4c123x_hal::gpio::AF3>(&mut porta.control);
    let sda = porta
        .pa7
        .into_af_open_drain::<tm4c123x_hal::gpio::AF3, tm4c123x_hal::gpio::Floating>(
            &mut porta.control,
        );
    let i2c = tm4c123x_hal::i2c::I2c::i2c1(
        device.I2C1,
        (scl, sda),
        100_000.hz(),
        &clocks,
        &sc.power_control,
    );

    let (usec_delay, usec_tick) =
        usec_timer::start(device.TIMER1, SYSTEM_CLOCK_HZ, &sc.power_control);

    let lcd = lcd_pcf8574::Lcd::new(
        i2c,
        usec_delay,
        LCD_ADDR,
        lcd_pcf8574::Geometry {
            cols: LCD_COLS,
            rows: LCD_ROWS,
        },
    );

    let (acquisition, adc_irq, sampling_timer) = if cfg!(feature = "sg-throttle")
    {
        let engine = SgAcquisition::new(
            device.ADC0,
            device.UDMA,
            SENSOR_INPUTS[0],
            &sc.power_control,
        );
        (Acquisition::ScatterGather(engine), None, None)
    } else {
        let (mut engine, irq) =
            TriggeredSequencer::new(device.ADC0, &sc.power_control);

        // One blocking conversion to verify the analog chain before the
        // periodic stream exists.
        let probe = engine.read_oneshot();
        log::info!("initial readings: {:?}", probe);

        let mut timer = SamplingTimer::new(device.TIMER0, &sc.power_control);
        timer.set_rate(SYSTEM_CLOCK_HZ, SAMPLE_RATE_HZ);
        (Acquisition::Triggered(engine), Some(irq), Some(timer))
    };

    DashboardDevices {
        acquisition,
        adc_irq,
        sampling_timer,
        sg_fault_irq: SgFaultIrq::new(),
        lcd,
        usec_tick,
    }
}
