//! Crate-wide error types.
//!
//! Mirrors the teacher's shape of small, enumerable failure modes rather than
//! a catch-all string error: callers pattern-match on these instead of
//! parsing messages.

use std::fmt;

/// Failures that can occur while constructing or loading a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// A ROM image didn't match any supported Apple IIgs ROM size.
    RomSizeUnsupported { bytes: usize },
    /// An FPI bank count outside the addressable range (1-256) was requested.
    InvalidBankCount { requested: usize },
    /// Intel HEX parsing failed.
    IntelHex(IntelHexError),
    /// A disk image could not be loaded by the IWM.
    Disk(DiskError),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::RomSizeUnsupported { bytes } => {
                write!(f, "unsupported ROM image size: {} bytes", bytes)
            }
            MachineError::InvalidBankCount { requested } => {
                write!(f, "invalid FPI bank count: {}", requested)
            }
            MachineError::IntelHex(e) => write!(f, "Intel HEX error: {}", e),
            MachineError::Disk(e) => write!(f, "disk error: {}", e),
        }
    }
}

impl std::error::Error for MachineError {}

impl From<IntelHexError> for MachineError {
    fn from(e: IntelHexError) -> Self {
        MachineError::IntelHex(e)
    }
}

impl From<DiskError> for MachineError {
    fn from(e: DiskError) -> Self {
        MachineError::Disk(e)
    }
}

/// Intel HEX record parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntelHexError {
    MissingColon { line: usize },
    OddLength { line: usize },
    BadHexDigit { line: usize },
    ChecksumMismatch { line: usize, expected: u8, actual: u8 },
    TruncatedRecord { line: usize },
    UnsupportedRecordType { line: usize, record_type: u8 },
}

impl fmt::Display for IntelHexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntelHexError::MissingColon { line } => write!(f, "line {}: missing ':'", line),
            IntelHexError::OddLength { line } => write!(f, "line {}: odd hex digit count", line),
            IntelHexError::BadHexDigit { line } => write!(f, "line {}: invalid hex digit", line),
            IntelHexError::ChecksumMismatch { line, expected, actual } => write!(
                f,
                "line {}: checksum mismatch (expected 0x{:02X}, got 0x{:02X})",
                line, expected, actual
            ),
            IntelHexError::TruncatedRecord { line } => write!(f, "line {}: truncated record", line),
            IntelHexError::UnsupportedRecordType { line, record_type } => {
                write!(f, "line {}: unsupported record type 0x{:02X}", line, record_type)
            }
        }
    }
}

impl std::error::Error for IntelHexError {}

/// Disk media failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskError {
    /// Nibble image byte count doesn't divide evenly into the requested track layout.
    MalformedNibbleImage,
    /// Attempted to insert a disk into a drive that already has one.
    DriveOccupied { drive: usize },
    /// Attempted to eject from a drive that has no disk.
    DriveEmpty { drive: usize },
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskError::MalformedNibbleImage => write!(f, "malformed nibble disk image"),
            DiskError::DriveOccupied { drive } => write!(f, "drive {} already has a disk", drive),
            DiskError::DriveEmpty { drive } => write!(f, "drive {} has no disk", drive),
        }
    }
}

impl std::error::Error for DiskError {}

/// Why [`crate::machine::Machine::run_cycles`] stopped early.
///
/// Analogous to the teacher's `StopReason`: most runs end with
/// `CyclesComplete`, the other variants are reserved for conditions a host
/// debugger cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ran the full requested cycle budget.
    CyclesComplete,
    /// CPU executed STP and cannot resume without a reset.
    Stopped,
    /// Fetched an opcode with no table entry (none currently, reserved for
    /// future WDM sub-opcode dispatch).
    UnimplementedOpcode(u8),
    /// A bus access fell outside of any mapped page.
    BusFault(u32),
}
