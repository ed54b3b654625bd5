//! Analog sensor acquisition interface
//!
//! # Design
//!
//! The throttle, brake-pressure and steering sensors are wired to analog
//! inputs of the on-chip converter. The converter runs its inputs through
//! sample sequencers: a sequencer is a short program of steps, each step
//! naming one analog input, with per-step flags marking the end of the
//! sequence and the step that raises the completion interrupt. Exactly one
//! step per sequence carries both flags and it must be the last configured
//! step, otherwise the sequencer keeps converting the remaining (stale)
//! steps or completes silently.
//!
//! Sampling is clocked entirely in hardware: the sampling timer's trigger
//! output starts the sequence at a fixed rate, the sequencer converts one
//! step after another into its result FIFO, and only the final step raises
//! the interrupt. The handler's job is deliberately minimal: acknowledge the
//! completion flag exactly once (the flag is level-generating; a missed
//! acknowledge re-raises the interrupt immediately) and drain one result per
//! step into the shared sample snapshot. Task-level readers take the
//! snapshot without ever blocking the handler.
//!
//! Hardware oversampling is applied before results enter the FIFO: the
//! converter averages `2^AVG` raw conversions per reported code, trading
//! output rate for noise. The reported rate is the trigger rate divided by
//! the averaging factor.
//!
//! ## Starting data collection
//!
//! Configuring the sequencer does not convert anything: nothing happens
//! until the sampling timer is started. The timer is therefore started last,
//! after all other initialization has completed.
use tm4c123x_hal::sysctl;

use super::design_parameters::{
    OVERSAMPLE, SAMPLE_RATE_HZ, SENSOR_CHANNELS, SENSOR_INPUTS,
};
use acq::buffer::SampleBuffer;
use num_enum::TryFromPrimitive;

// The multi-channel path runs on SS1, which holds four steps.
const _: () = assert!(SENSOR_CHANNELS <= Ss1::STEPS);
const _: () = assert!(SENSOR_CHANNELS > 0);

// Snapshot of the most recent completed sequence, one slot per configured
// step. Written only by the SS1 completion handler.
static SAMPLES: SampleBuffer<SENSOR_CHANNELS> = SampleBuffer::new();

/// One analog-capable input pad and its fixed pin assignment.
#[allow(dead_code)]
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum AnalogInput {
    Ain0 = 0,   // PE3
    Ain1 = 1,   // PE2
    Ain2 = 2,   // PE1
    Ain3 = 3,   // PE0
    Ain4 = 4,   // PD3
    Ain5 = 5,   // PD2
    Ain6 = 6,   // PD1
    Ain7 = 7,   // PD0
    Ain8 = 8,   // PE5
    Ain9 = 9,   // PE4
    Ain10 = 10, // PB4
    Ain11 = 11, // PB5
}

impl AnalogInput {
    fn pin(&self) -> (&'static tm4c123x::gpio_porta::RegisterBlock, u8) {
        // Note(unsafe): The returned block is only used for the pad-mode
        // registers of the named pin, which this module owns by convention
        // (the pads are not handed out by `setup`).
        unsafe {
            match self {
                AnalogInput::Ain0 => (&*tm4c123x::GPIO_PORTE::ptr(), 3),
                AnalogInput::Ain1 => (&*tm4c123x::GPIO_PORTE::ptr(), 2),
                AnalogInput::Ain2 => (&*tm4c123x::GPIO_PORTE::ptr(), 1),
                AnalogInput::Ain3 => (&*tm4c123x::GPIO_PORTE::ptr(), 0),
                AnalogInput::Ain4 => (&*tm4c123x::GPIO_PORTD::ptr(), 3),
                AnalogInput::Ain5 => (&*tm4c123x::GPIO_PORTD::ptr(), 2),
                AnalogInput::Ain6 => (&*tm4c123x::GPIO_PORTD::ptr(), 1),
                AnalogInput::Ain7 => (&*tm4c123x::GPIO_PORTD::ptr(), 0),
                AnalogInput::Ain8 => (&*tm4c123x::GPIO_PORTE::ptr(), 5),
                AnalogInput::Ain9 => (&*tm4c123x::GPIO_PORTE::ptr(), 4),
                AnalogInput::Ain10 => (&*tm4c123x::GPIO_PORTB::ptr(), 4),
                AnalogInput::Ain11 => (&*tm4c123x::GPIO_PORTB::ptr(), 5),
            }
        }
    }

    /// Put the pad into analog mode: input, digital path off, isolation
    /// removed. The port clock must already be running.
    pub(super) fn bind(&self) {
        let (port, pin) = self.pin();
        let mask = 1 << pin;
        port.dir.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
        port.afsel.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
        port.den.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
        port.amsel.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
    }
}

/// Hardware sample averaging factor (SAC register encoding).
#[allow(dead_code)]
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum Oversample {
    None = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
}

impl Oversample {
    pub const fn factor(&self) -> u32 {
        1 << *self as u32
    }
}

/// Conversion start source of a sequencer (EMUX register encoding).
#[allow(dead_code)]
#[derive(Copy, Clone)]
pub(super) enum Trigger {
    Processor = 0x0,
    Timer = 0x5,
    Always = 0xf,
}

macro_rules! sample_sequencer {
    ($name:ident, $index:literal, $steps:literal) => {
        paste::paste! {
            /// Register-level operations on one sample sequencer.
            ///
            /// Holding an instance is the license to touch this sequencer's
            /// registers; constructing it is only sound once per sequencer.
            pub(super) struct $name {}

            #[allow(dead_code)]
            impl $name {
                pub const STEPS: usize = $steps;

                /// # Safety
                /// Only one instance per sequencer may exist.
                pub unsafe fn new() -> Self {
                    Self {}
                }

                fn regs(&self) -> &'static tm4c123x::adc0::RegisterBlock {
                    // Note(unsafe): The instance owns this sequencer's
                    // registers; all shared registers (ACTSS, EMUX, ISC, IM)
                    // are only accessed with read-modify-write on this
                    // sequencer's bits.
                    unsafe { &*tm4c123x::ADC0::ptr() }
                }

                /// Program the step list and trigger source, then enable the
                /// sequencer. The last step is marked as sequence end with
                /// the completion interrupt flag.
                pub fn configure(&self, channels: &[AnalogInput], trigger: Trigger) {
                    debug_assert!(!channels.is_empty() && channels.len() <= Self::STEPS);
                    let adc = self.regs();

                    // The sequencer must be disabled while it is programmed.
                    adc.actss.modify(|_, w| w.[< asen $index >]().clear_bit());
                    adc.emux.modify(|_, w| unsafe {
                        w.[< em $index >]().bits(trigger as u8)
                    });

                    let mut mux = 0;
                    for (step, input) in channels.iter().enumerate() {
                        input.bind();
                        mux |= (*input as u32) << (4 * step);
                    }
                    // One step carries IE|END: the last configured one.
                    let ctl = 0x6 << (4 * (channels.len() - 1));
                    adc.[< ssmux $index >].write(|w| unsafe { w.bits(mux) });
                    adc.[< ssctl $index >].write(|w| unsafe { w.bits(ctl) });

                    adc.isc.write(|w| w.[< in $index >]().set_bit());
                    adc.actss.modify(|_, w| w.[< asen $index >]().set_bit());
                }

                /// Forward the completion raw flag to the interrupt line.
                pub fn interrupt_enable(&self) {
                    let adc = self.regs();
                    adc.im.modify(|_, w| w.[< mask $index >]().set_bit());
                }

                /// Acknowledge a completed sequence. Exactly one acknowledge
                /// per trigger; the flag re-raises the interrupt while set.
                pub fn acknowledge(&self) {
                    let adc = self.regs();
                    adc.isc.write(|w| w.[< in $index >]().set_bit());
                }

                pub fn completed(&self) -> bool {
                    let adc = self.regs();
                    adc.ris.read().[< inr $index >]().bit_is_set()
                }

                /// Pop one conversion result from the sequencer FIFO.
                pub fn pop(&self) -> u32 {
                    let adc = self.regs();
                    adc.[< ssfifo $index >].read().data().bits() as u32
                }

                /// Start the sequence from software (processor trigger).
                pub fn start(&self) {
                    let adc = self.regs();
                    adc.pssi.write(|w| w.[< ss $index >]().set_bit());
                }
            }
        }
    };
}

sample_sequencer!(Ss0, 0, 8);
sample_sequencer!(Ss1, 1, 4);
sample_sequencer!(Ss2, 2, 4);

/// The timer-triggered multi-channel acquisition engine.
///
/// SS1 converts all configured sensors per trigger of the sampling timer and
/// raises one completion interrupt per sequence. A second sequencer (SS2)
/// carries the same step list behind a processor trigger for one-shot
/// conversions outside the periodic stream.
///
/// States: constructed (sequencers enabled, timer stopped) until
/// [`super::sampling_timer::SamplingTimer::start`] is called; running from
/// then on, for the life of the process. There is no stop transition.
pub struct TriggeredSequencer {
    oneshot: Ss2,
}

impl TriggeredSequencer {
    /// Claim the converter and program both sequencers.
    ///
    /// Consuming the peripheral makes this a once-per-boot constructor; the
    /// returned IRQ handle is the only writer of the sample snapshot.
    pub fn new(
        adc: tm4c123x::ADC0,
        power: &sysctl::PowerControl,
    ) -> (Self, SequenceIrq) {
        sysctl::control_power(
            power,
            sysctl::Domain::Adc0,
            sysctl::RunMode::Run,
            sysctl::PowerState::On,
        );
        sysctl::reset(power, sysctl::Domain::Adc0);

        // Sample averaging and the internal voltage reference apply to the
        // converter as a whole, not per sequencer.
        adc.sac
            .write(|w| unsafe { w.avg().bits(OVERSAMPLE as u8) });
        adc.ctl.modify(|_, w| w.vref().clear_bit());

        // Note(unsafe): The two sequencer handles are created exactly once,
        // here, and ownership of the consumed ADC0 peripheral guarantees no
        // other code configures the converter.
        let periodic = unsafe { Ss1::new() };
        let oneshot = unsafe { Ss2::new() };

        periodic.configure(&SENSOR_INPUTS, Trigger::Timer);
        periodic.interrupt_enable();
        oneshot.configure(&SENSOR_INPUTS, Trigger::Processor);

        log::info!(
            "acquisition: {} channels at {} Hz trigger, {}x oversampling ({} Hz reported)",
            SENSOR_CHANNELS,
            SAMPLE_RATE_HZ,
            OVERSAMPLE.factor(),
            acq::timing::effective_rate_hz(SAMPLE_RATE_HZ, OVERSAMPLE.factor()),
        );

        (Self { oneshot }, SequenceIrq { seq: periodic })
    }

    /// Latest raw code of one configured channel. Raw 12-bit ADC counts, no
    /// unit conversion.
    pub fn read_channel(&self, index: usize) -> u32 {
        SAMPLES.read_channel(index)
    }

    /// Consistent snapshot of the latest completed sequence.
    pub fn read(&self) -> [u32; SENSOR_CHANNELS] {
        SAMPLES.snapshot()
    }

    /// Blocking single conversion of all channels, bypassing the periodic
    /// stream. Used at startup to verify the analog chain before the
    /// sampling timer runs.
    pub fn read_oneshot(&mut self) -> [u32; SENSOR_CHANNELS] {
        self.oneshot.start();
        while !self.oneshot.completed() {}
        self.oneshot.acknowledge();

        let mut batch = [0; SENSOR_CHANNELS];
        for value in batch.iter_mut() {
            *value = self.oneshot.pop();
        }
        batch
    }

    /// Generation counter of the snapshot; bumps once per completed
    /// sequence.
    pub fn generation(&self) -> u32 {
        SAMPLES.generation()
    }
}

/// Completion-interrupt handle of the periodic sequencer.
///
/// Runs in interrupt context: it must not block, allocate, or call into the
/// scheduler, and it must finish well inside one trigger period.
pub struct SequenceIrq {
    seq: Ss1,
}

impl SequenceIrq {
    /// Acknowledge the completed sequence and publish its results.
    pub fn on_sequence_complete(&mut self) {
        self.seq.acknowledge();

        let mut batch = [0; SENSOR_CHANNELS];
        for value in batch.iter_mut() {
            *value = self.seq.pop();
        }
        SAMPLES.publish(&batch);
    }
}
