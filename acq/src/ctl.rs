//! Channel control structures for the µDMA controller (PL230).
//!
//! The controller executes fixed-size, four-word channel control structures
//! ("tasks") out of a RAM-resident control table. Scatter-gather mode chains
//! several tasks on one channel: the primary structure copies the task list
//! into the channel's alternate structure, which then executes each task in
//! turn. A task is single-shot; a persistently re-triggerable channel is built
//! by making the *last* task of the chain rewrite the primary control word
//! from a preloaded template, so the channel is armed again before the next
//! peripheral request arrives.
//!
//! Everything here is plain data: encodings and chain topology are pure and
//! verified on the host. The hardware-facing half (control table placement,
//! channel enables, fault interrupt) lives in the firmware crate.

use core::sync::atomic::{AtomicU32, Ordering};

use arbitrary_int::{u10, u4};
use bitbybit::{bitenum, bitfield};

/// Address increment applied after each element of a transfer.
#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum Increment {
    Byte = 0,
    HalfWord = 1,
    Word = 2,
    /// The address is not incremented; every element uses the programmed
    /// (end) address. Used for peripheral registers and single-word cells.
    None = 3,
}

/// Element width of a transfer. The value 3 is reserved by the controller.
#[bitenum(u2, exhaustive = false)]
#[derive(Debug, PartialEq)]
pub enum ElementSize {
    Byte = 0,
    HalfWord = 1,
    Word = 2,
}

/// Operating mode of a channel control word.
#[bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum TransferMode {
    Stop = 0,
    Basic = 1,
    AutoRequest = 2,
    PingPong = 3,
    MemoryScatterGather = 4,
    AlternateMemoryScatterGather = 5,
    PeripheralScatterGather = 6,
    AlternatePeripheralScatterGather = 7,
}

/// The DMACHCTL channel control word.
///
/// `transfer_count` carries N-1 for an N-element transfer and `arb_size` the
/// log2 of the arbitration burst, matching the register encoding.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct ChannelControl {
    #[bits(30..=31, rw)]
    dst_inc: Increment,
    #[bits(28..=29, rw)]
    dst_size: Option<ElementSize>,
    #[bits(26..=27, rw)]
    src_inc: Increment,
    #[bits(24..=25, rw)]
    src_size: Option<ElementSize>,
    #[bits(14..=17, rw)]
    arb_size: u4,
    #[bits(4..=13, rw)]
    transfer_count: u10,
    #[bit(3, rw)]
    next_use_burst: bool,
    #[bits(0..=2, rw)]
    mode: TransferMode,
}

impl ChannelControl {
    /// Number of elements the word describes.
    pub fn elements(&self) -> u32 {
        u32::from(self.transfer_count()) + 1
    }

    /// Control word for a single-word register-to-cell copy: both addresses
    /// fixed, one element per arbitration.
    pub fn single_word(mode: TransferMode) -> Self {
        Self::DEFAULT
            .with_src_size(ElementSize::Word)
            .with_src_inc(Increment::None)
            .with_dst_size(ElementSize::Word)
            .with_dst_inc(Increment::None)
            .with_arb_size(u4::new(0))
            .with_transfer_count(u10::new(0))
            .with_mode(mode)
    }
}

/// One four-word channel control structure as laid out in the control table.
///
/// `src_end`/`dst_end` hold the address of the *last* element touched by the
/// transfer, per the controller's end-pointer convention. Addresses are plain
/// words here; the firmware layer derives them from its statics.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct TransferTask {
    pub src_end: u32,
    pub dst_end: u32,
    pub control: ChannelControl,
    pub spare: u32,
}

impl TransferTask {
    pub const WORDS: usize = 4;

    pub const fn empty() -> Self {
        Self {
            src_end: 0,
            dst_end: 0,
            control: ChannelControl::DEFAULT,
            spare: 0,
        }
    }
}

/// The fixed two-task scatter-gather chain of the acquisition channel.
///
/// Task 1 lands one conversion result in the reading cell. Task 2 copies the
/// preloaded template control word back over the channel's primary control
/// word, returning the channel to [`SgState::Armed`] before the next
/// peripheral request. The template itself is never written by the chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SgChain {
    pub copy: TransferTask,
    pub rearm: TransferTask,
}

/// Re-arm progress of a scatter-gather channel, derived from the live primary
/// control word. The channel must always be back to `Armed` before the next
/// external trigger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SgState {
    Armed,
    Rearming,
}

impl SgChain {
    pub const TASKS: u32 = 2;

    /// Build the chain.
    ///
    /// * `result_reg` - address of the peripheral's conversion result register.
    /// * `reading` - address of the word cell receiving each result.
    /// * `template_control` - address of the control word inside the preloaded
    ///   template task.
    /// * `primary_control` - address of the channel's primary control word in
    ///   the control table.
    pub fn new(
        result_reg: u32,
        reading: u32,
        template_control: u32,
        primary_control: u32,
    ) -> Self {
        Self {
            copy: TransferTask {
                src_end: result_reg,
                dst_end: reading,
                control: ChannelControl::single_word(
                    TransferMode::AlternateMemoryScatterGather,
                ),
                spare: 0,
            },
            rearm: TransferTask {
                src_end: template_control,
                dst_end: primary_control,
                control: ChannelControl::single_word(
                    TransferMode::AlternatePeripheralScatterGather,
                ),
                spare: 0,
            },
        }
    }

    /// Control word of the preloaded template: copies the whole task list
    /// (two tasks, eight words) into the channel's alternate structure on
    /// each peripheral request.
    pub fn template_control() -> ChannelControl {
        ChannelControl::DEFAULT
            .with_src_size(ElementSize::Word)
            .with_src_inc(Increment::Word)
            .with_dst_size(ElementSize::Word)
            .with_dst_inc(Increment::Word)
            // Arbitrate after 4 words so the full reload happens in one
            // transaction per task.
            .with_arb_size(u4::new(2))
            .with_transfer_count(u10::new(
                (Self::TASKS * TransferTask::WORDS as u32 - 1) as u16,
            ))
            .with_mode(TransferMode::MemoryScatterGather)
    }

    /// Classify the live primary control word.
    ///
    /// Once the task list has executed to completion the primary word equals
    /// the template bit-for-bit; anything else means the chain is mid-flight
    /// (or was never loaded).
    pub fn state(live_primary: ChannelControl) -> SgState {
        if live_primary == Self::template_control() {
            SgState::Armed
        } else {
            SgState::Rearming
        }
    }
}

/// Monotonic count of controller bus faults.
///
/// Incremented from the fault interrupt, reset only at (re)initialization.
/// A fault costs the in-flight sample and nothing else; no retry is issued.
pub struct FaultCounter(AtomicU32);

impl FaultCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Record one fault. Returns the updated total.
    pub fn record(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

impl Default for FaultCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_encoding() {
        // Word size, no increment either side, one element, arbitration 1,
        // alternate memory scatter-gather: matches the documented DMACHCTL
        // field placement bit-for-bit.
        let ctl =
            ChannelControl::single_word(TransferMode::AlternateMemoryScatterGather);
        assert_eq!(
            ctl.raw_value(),
            (3 << 30) | (2 << 28) | (3 << 26) | (2 << 24) | 5
        );
        assert_eq!(ctl.elements(), 1);
    }

    #[test]
    fn template_encoding() {
        let ctl = SgChain::template_control();
        // Word copies with word increments, eight elements, arbitration 4.
        assert_eq!(
            ctl.raw_value(),
            (2 << 30) | (2 << 28) | (2 << 26) | (2 << 24) | (2 << 14) | (7 << 4) | 4
        );
        assert_eq!(ctl.elements(), 8);
        assert_eq!(ctl.mode(), TransferMode::MemoryScatterGather);
    }

    #[test]
    fn chain_topology() {
        let chain = SgChain::new(0x4003_8048, 0x2000_0100, 0x2000_0208, 0x2000_0388);
        // The re-arm task sources the template control word and targets the
        // primary control word, one fixed-address word each way.
        assert_eq!(chain.rearm.src_end, 0x2000_0208);
        assert_eq!(chain.rearm.dst_end, 0x2000_0388);
        assert_eq!(chain.rearm.control.elements(), 1);
        assert_eq!(chain.rearm.control.src_inc(), Increment::None);
        // The copy task never touches the template.
        assert_ne!(chain.copy.dst_end, chain.rearm.src_end);
        assert_eq!(
            chain.copy.control.mode(),
            TransferMode::AlternateMemoryScatterGather
        );
        assert_eq!(
            chain.rearm.control.mode(),
            TransferMode::AlternatePeripheralScatterGather
        );
    }

    #[test]
    fn state_classification() {
        let template = SgChain::template_control();
        assert_eq!(SgState::Armed, SgChain::state(template));
        // Any deviation (e.g. the post-completion stopped word) reads as
        // mid-re-arm.
        let stopped = template.with_mode(TransferMode::Stop);
        assert_eq!(SgState::Rearming, SgChain::state(stopped));
        assert_eq!(
            SgState::Rearming,
            SgChain::state(ChannelControl::new_with_raw_value(0))
        );
    }

    #[test]
    fn fault_counter() {
        let faults = FaultCounter::new();
        assert_eq!(faults.count(), 0);
        assert_eq!(faults.record(), 1);
        assert_eq!(faults.record(), 2);
        assert_eq!(faults.count(), 2);
        faults.reset();
        assert_eq!(faults.count(), 0);
    }
}
