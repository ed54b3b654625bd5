//! Scatter-gather acquisition path
//!
//! # Design
//!
//! The alternative single-channel acquisition path moves conversion results
//! without any processor involvement per sample. The transfer controller
//! executes four-word channel control structures out of a RAM control table;
//! in scatter-gather mode the channel's primary structure copies a list of
//! "task" structures into the channel's alternate structure one at a time,
//! and the alternate structure executes each task as it lands.
//!
//! The acquisition channel runs a fixed two-task chain per peripheral
//! request:
//!
//! 1. copy one 32-bit result from the sequencer FIFO into the reading cell
//!    (both addresses fixed, no increment), and
//! 2. copy the preloaded template control word back over the channel's
//!    primary control word.
//!
//! Task 2 exists because control structures are single-shot: executing a
//! task consumes its transfer count, so without the reload the channel would
//! serve exactly one request. With it, the channel is re-armed by its own
//! chain and accepts the next request with no interrupt and no processor
//! writes. The template is read, never written, by the chain; the channel is
//! {Armed} whenever its live primary control word equals the template
//! bit-for-bit and {Rearming} in the window between the two tasks. It must
//! always be back to Armed before the next request arrives.
//!
//! A controller bus fault aborts the in-flight transfer; the fault handler
//! clears the error latch and counts the event, dropping that sample. No
//! retry is attempted.
//!
//! This path trades channel count for overhead: one channel of data versus
//! the three-channel interrupt path, but zero cycles per sample.
use core::ptr::{addr_of, addr_of_mut, read_volatile, write_volatile};

use tm4c123x_hal::sysctl;

use super::adc::{AnalogInput, Ss0, Trigger};
use acq::ctl::{ChannelControl, FaultCounter, SgChain, SgState, TransferTask};

// Request line of ADC0 SS0 on the transfer controller.
const CHANNEL: usize = 14;
// The alternate control structures occupy the second half of the table.
const ALTERNATE: usize = 32 + CHANNEL;

/// The channel control table. The controller requires 1024-byte alignment
/// for a table carrying alternate structures.
#[repr(C, align(1024))]
struct ControlTable([TransferTask; 64]);

// The controller reads and writes the table, the chain and the reading cell
// behind the compiler's back; every access from software is volatile.
//
// Note(unsafe): Each of these statics is owned by exactly one place:
// `SgAcquisition::new` initializes them before the channel is enabled, and
// afterwards only the controller touches the table and reading while
// software is limited to volatile reads.
static mut CONTROL_TABLE: ControlTable = ControlTable([TransferTask::empty(); 64]);
static mut SG_TASKS: [TransferTask; SgChain::TASKS as usize] =
    [TransferTask::empty(); SgChain::TASKS as usize];
static mut SG_TEMPLATE: TransferTask = TransferTask::empty();
static mut SG_READING: u32 = 0;

static FAULTS: FaultCounter = FaultCounter::new();

/// The descriptor-chain acquisition engine.
///
/// Owns the converter (single channel, always-trigger sequence on SS0) and
/// channel 14 of the transfer controller.
pub struct SgAcquisition {
    _seq: Ss0,
}

impl SgAcquisition {
    /// Bring up the controller, load the chain and enable the channel.
    ///
    /// Sampling begins immediately: the sequence is always-triggered, so
    /// requests flow as soon as the channel is enabled.
    pub fn new(
        adc: tm4c123x::ADC0,
        udma: tm4c123x::UDMA,
        input: AnalogInput,
        power: &sysctl::PowerControl,
    ) -> Self {
        sysctl::control_power(
            power,
            sysctl::Domain::Adc0,
            sysctl::RunMode::Run,
            sysctl::PowerState::On,
        );
        sysctl::reset(power, sysctl::Domain::Adc0);
        sysctl::control_power(
            power,
            sysctl::Domain::MicroDma,
            sysctl::RunMode::Run,
            sysctl::PowerState::On,
        );

        adc.ctl.modify(|_, w| w.vref().clear_bit());

        udma.cfg.write(|w| w.masten().set_bit());
        udma.ctlbase
            .write(|w| unsafe { w.bits(addr_of!(CONTROL_TABLE) as u32) });

        // Note(unsafe): Single SS0 handle, created once here; the consumed
        // ADC0 peripheral guarantees exclusive converter configuration.
        let seq = unsafe { Ss0::new() };
        // The completion flag of the last (only) step drives the transfer
        // request; the NVIC line stays masked.
        seq.configure(&[input], Trigger::Always);

        // Note(unsafe): One-time initialization of the module statics before
        // the channel is enabled; nothing else references them yet.
        unsafe {
            let chain = SgChain::new(
                addr_of!((*tm4c123x::ADC0::ptr()).ssfifo0) as u32,
                addr_of_mut!(SG_READING) as u32,
                addr_of!(SG_TEMPLATE.control) as u32,
                addr_of!(CONTROL_TABLE.0[CHANNEL].control) as u32,
            );
            SG_TASKS = [chain.copy, chain.rearm];
            SG_TEMPLATE = TransferTask {
                // End pointers per the controller convention: last word of
                // the task list, last word of the alternate structure.
                src_end: addr_of!(SG_TASKS[1].spare) as u32,
                dst_end: addr_of!(CONTROL_TABLE.0[ALTERNATE].spare) as u32,
                control: SgChain::template_control(),
                spare: 0,
            };
            // Software loads the primary structure from the template once;
            // every completed chain reloads it from then on.
            write_volatile(addr_of_mut!(CONTROL_TABLE.0[CHANNEL]), SG_TEMPLATE);
        }

        // Channel attributes: primary structure, no burst restriction,
        // request unmasked, default priority; then enable. The channel
        // serves requests as soon as this bit is set.
        let bit = 1u32 << CHANNEL;
        udma.altclr.write(|w| unsafe { w.bits(bit) });
        udma.useburstclr.write(|w| unsafe { w.bits(bit) });
        udma.reqmaskclr.write(|w| unsafe { w.bits(bit) });
        udma.prioclr.write(|w| unsafe { w.bits(bit) });
        udma.enaset.write(|w| unsafe { w.bits(bit) });

        FAULTS.reset();
        log::info!("scatter-gather acquisition on channel {}", CHANNEL);

        Self { _seq: seq }
    }

    /// Last word landed by the copy task. A single word is never torn; the
    /// value is at most one sample stale.
    pub fn read(&self) -> u32 {
        unsafe { read_volatile(addr_of!(SG_READING)) }
    }

    /// Re-arm progress of the channel, derived from the live primary
    /// control word.
    pub fn state(&self) -> SgState {
        let live: ChannelControl = unsafe {
            read_volatile(addr_of!(CONTROL_TABLE.0[CHANNEL].control))
        };
        SgChain::state(live)
    }
}

/// Bus-fault interrupt handle of the transfer controller.
pub struct SgFaultIrq {
    _priv: (),
}

impl SgFaultIrq {
    pub(super) fn new() -> Self {
        Self { _priv: () }
    }

    /// Clear a latched controller bus fault and count it. The sample in
    /// flight is lost; the channel completes its next transfer normally.
    pub fn on_bus_error(&mut self) {
        // Note(unsafe): ERRCLR is the only register touched, and only from
        // this single interrupt context.
        let udma = unsafe { &*tm4c123x::UDMA::ptr() };
        if udma.errclr.read().bits() != 0 {
            udma.errclr.write(|w| unsafe { w.bits(1) });
            let total = FAULTS.record();
            log::warn!("transfer fault ({} total)", total);
        }
    }
}

/// Process-wide count of transfer faults since initialization.
pub fn transfer_faults() -> u32 {
    FAULTS.count()
}
