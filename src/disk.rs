//! Nibble disk images and the drive bay the IWM controller operates on.
//!
//! Grounded on `clem_iwm_insert_disk`/`clem_iwm_eject_disk` in
//! `clem_device.h`: disks are tracked as nibblized images (not raw sector
//! data) since that is what the IWM state machine actually reads and writes
//! a bit at a time, and drives are addressed by slot/drive-number pairs
//! rather than by file.

use crate::error::DiskError;

/// A single 5.25" or 3.5" disk image in nibblized form: a flat byte buffer
/// per track plus per-track bit counts, matching WOZ/NIB-style representations.
#[derive(Debug, Clone)]
pub struct NibbleDisk {
    pub tracks: Vec<Vec<u8>>,
    pub track_bit_counts: Vec<u32>,
    pub write_protected: bool,
}

impl NibbleDisk {
    pub fn blank_525(track_count: usize) -> Self {
        let tracks = vec![vec![0xFFu8; 0x1A00]; track_count];
        let track_bit_counts = vec![0x1A00 * 8; track_count];
        Self { tracks, track_bit_counts, write_protected: false }
    }

    pub fn from_nibble_bytes(tracks: Vec<Vec<u8>>) -> Result<Self, DiskError> {
        if tracks.is_empty() || tracks.iter().any(|t| t.is_empty()) {
            return Err(DiskError::MalformedNibbleImage);
        }
        let track_bit_counts = tracks.iter().map(|t| (t.len() * 8) as u32).collect();
        Ok(Self { tracks, track_bit_counts, write_protected: false })
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// One drive slot. `None` means no disk is inserted.
#[derive(Debug, Clone, Default)]
pub struct Drive {
    pub disk: Option<NibbleDisk>,
    pub track_index: usize,
    pub head_bit_position: u32,
    pub motor_on: bool,
}

impl Drive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_spinning(&self) -> bool {
        self.motor_on && self.disk.is_some()
    }
}

/// Placeholder for a future SmartPort hard-disk unit. Real SmartPort command
/// handling (block read/write over the same bus as IWM floppy access) is out
/// of scope for this crate; the type is reserved so a drive bay slot can be
/// extended without reshaping the bay itself.
#[derive(Debug, Clone, Default)]
pub struct SmartPortUnit {
    pub block_count: u32,
}

/// All drives the IWM controller can address: two 5.25" drives on the
/// internal port, two 3.5" drives, matching `ClemensDriveBay` in the
/// original.
#[derive(Debug, Clone, Default)]
pub struct DriveBay {
    pub slot5_525: [Drive; 2],
    pub slot5_35: [Drive; 2],
    pub smartport: [Option<SmartPortUnit>; 2],
}

impl DriveBay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, is_35: bool, drive_index: usize, disk: NibbleDisk) -> Result<(), DiskError> {
        let drive = self.drive_mut(is_35, drive_index)?;
        if drive.disk.is_some() {
            return Err(DiskError::DriveOccupied { drive: drive_index });
        }
        drive.disk = Some(disk);
        drive.track_index = 0;
        drive.head_bit_position = 0;
        Ok(())
    }

    pub fn eject(&mut self, is_35: bool, drive_index: usize) -> Result<NibbleDisk, DiskError> {
        let drive = self.drive_mut(is_35, drive_index)?;
        drive.disk.take().ok_or(DiskError::DriveEmpty { drive: drive_index })
    }

    fn drive_mut(&mut self, is_35: bool, drive_index: usize) -> Result<&mut Drive, DiskError> {
        let bay = if is_35 { &mut self.slot5_35 } else { &mut self.slot5_525 };
        bay.get_mut(drive_index).ok_or(DiskError::DriveEmpty { drive: drive_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_eject_round_trip() {
        let mut bay = DriveBay::new();
        let disk = NibbleDisk::blank_525(35);
        bay.insert(false, 0, disk).unwrap();
        assert!(bay.slot5_525[0].disk.is_some());
        let ejected = bay.eject(false, 0).unwrap();
        assert_eq!(ejected.track_count(), 35);
        assert!(bay.slot5_525[0].disk.is_none());
    }

    #[test]
    fn insert_into_occupied_drive_errors() {
        let mut bay = DriveBay::new();
        bay.insert(false, 0, NibbleDisk::blank_525(35)).unwrap();
        let err = bay.insert(false, 0, NibbleDisk::blank_525(35));
        assert!(matches!(err, Err(DiskError::DriveOccupied { drive: 0 })));
    }

    #[test]
    fn eject_empty_drive_errors() {
        let mut bay = DriveBay::new();
        assert!(matches!(bay.eject(true, 1), Err(DiskError::DriveEmpty { drive: 1 })));
    }

    #[test]
    fn from_nibble_bytes_rejects_empty_tracks() {
        assert!(matches!(
            NibbleDisk::from_nibble_bytes(vec![]),
            Err(DiskError::MalformedNibbleImage)
        ));
    }

    #[test]
    fn drive_spins_only_with_disk_and_motor_on() {
        let mut drive = Drive::new();
        assert!(!drive.is_spinning());
        drive.disk = Some(NibbleDisk::blank_525(35));
        drive.motor_on = true;
        assert!(drive.is_spinning());
    }
}
