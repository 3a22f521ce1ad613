//! Apple IIgs Emulator Core
//!
//! A cycle-stepped emulation core for the Apple IIgs: a WDC 65C816
//! interpreter, a bank-switched memory subsystem with page-granularity
//! address translation, shadowing and language-card semantics, an MMIO
//! dispatcher, and device state machines for the real-time clock, timers,
//! video generator, ADB, sound GLU, IWM disk controller, SCC, and game
//! port. This crate has no UI, no audio backend, and no disk-image file
//! I/O; callers supply host-side input and consume host-side output
//! through [`Machine`].
//!
//! # Architecture
//!
//! - `memory`: FPI RAM, Mega2 RAM, ROM, and language-card RAM backing stores
//! - `clock`: shared fast/Mega2 cycle timing
//! - `page_map`: precomputed per-bank, per-page address translation
//! - `softswitch`: the `$C000`-`$C08F` state-register bits that drive it
//! - `bus`: dispatches CPU reads/writes through the page map and MMIO
//! - `mmio`: `$C000`-`$C0FF` device dispatch and IRQ aggregation
//! - `devices`: per-device state machines (RTC, timers, VGC, ADB, sound,
//!   IWM, SCC, game port)
//! - `disk`: nibblized disk images and the drive bay the IWM operates on
//! - `cpu`: the 65C816 interpreter
//! - `config`: machine configuration (ROM size, video timing)
//! - `error`: crate-wide error and stop-reason types
//! - `ihex`: Intel HEX loader
//! - `input`: host input event posting
//! - `machine`: the top-level orchestrator tying all of the above together

pub mod bus;
pub mod clock;
pub mod config;
pub mod cpu;
pub mod devices;
pub mod disk;
pub mod error;
pub mod ihex;
pub mod input;
pub mod machine;
pub mod memory;
pub mod mmio;
pub mod page_map;
pub mod softswitch;

pub use config::MachineConfig;
pub use error::{MachineError, StopReason};
pub use machine::Machine;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_runs_after_loading_a_rom() {
        let mut machine = Machine::new(MachineConfig::new().with_fpi_bank_count(4)).unwrap();
        machine.load_rom(&vec![0u8; 0x20000]).unwrap();
        let reason = machine.run_cycles(1_000);
        assert_eq!(reason, StopReason::CyclesComplete);
    }

    #[test]
    fn oversized_fpi_bank_count_is_rejected_at_construction() {
        let err = Machine::new(MachineConfig::new().with_fpi_bank_count(0));
        assert!(matches!(err, Err(MachineError::InvalidBankCount { requested: 0 })));
    }
}
