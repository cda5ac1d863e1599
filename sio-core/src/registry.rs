//! Drive Registry
//!
//! Fixed mapping from drive numbers 1..=8 (device IDs 0x31..0x38 on the
//! bus) to attached [`DiskDrive`]s. The registry itself is plain data;
//! [`SharedDrives`] wraps it in a lock so the channel and the host-side
//! mount path (file-selection commands, front-panel selector) can address
//! the same drives.

use alloc::sync::Arc;
use spin::{Mutex, MutexGuard};

use crate::access::DriveAccess;
use crate::drive::DiskDrive;
use atari_images::{Density, DriveStatus, SectorPacket};

/// Addressable drive slots
pub const DRIVE_COUNT: usize = 8;

/// Drive-number keyed pool of emulated drives
pub struct DriveRegistry {
    drives: [Option<DiskDrive>; DRIVE_COUNT],
}

impl DriveRegistry {
    /// No drives attached
    pub fn new() -> Self {
        Self {
            drives: Default::default(),
        }
    }

    /// The common configuration: one empty drive as D1:
    pub fn single_drive() -> Self {
        let mut registry = Self::new();
        registry.attach(1, DiskDrive::new());
        registry
    }

    /// Attach a drive as number `drive` (1..=8), returning any previous
    /// occupant. Out-of-range numbers are ignored.
    pub fn attach(&mut self, drive: u8, disk_drive: DiskDrive) -> Option<DiskDrive> {
        let slot = self.slot(drive)?;
        self.drives[slot].replace(disk_drive)
    }

    /// Detach and return drive number `drive`
    pub fn detach(&mut self, drive: u8) -> Option<DiskDrive> {
        let slot = self.slot(drive)?;
        self.drives[slot].take()
    }

    pub fn contains(&self, drive: u8) -> bool {
        self.slot(drive)
            .map_or(false, |slot| self.drives[slot].is_some())
    }

    pub fn get_mut(&mut self, drive: u8) -> Option<&mut DiskDrive> {
        let slot = self.slot(drive)?;
        self.drives[slot].as_mut()
    }

    fn slot(&self, drive: u8) -> Option<usize> {
        (1..=DRIVE_COUNT as u8)
            .contains(&drive)
            .then(|| drive as usize - 1)
    }
}

impl Default for DriveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to a lock-guarded registry.
///
/// Implements [`DriveAccess`] by locking per operation, so one clone can sit
/// inside the channel while another serves the host application.
#[derive(Clone)]
pub struct SharedDrives(Arc<Mutex<DriveRegistry>>);

impl SharedDrives {
    pub fn new(registry: DriveRegistry) -> Self {
        Self(Arc::new(Mutex::new(registry)))
    }

    /// Lock the registry for direct manipulation
    pub fn lock(&self) -> MutexGuard<'_, DriveRegistry> {
        self.0.lock()
    }
}

impl DriveAccess for SharedDrives {
    fn owns(&mut self, drive: u8) -> bool {
        self.lock().contains(drive)
    }

    fn status(&mut self, drive: u8) -> Option<DriveStatus> {
        self.lock().get_mut(drive).map(|d| d.status())
    }

    fn read_sector(&mut self, drive: u8, sector: u32, out: &mut [u8]) -> Option<SectorPacket> {
        self.lock().get_mut(drive)?.read_sector(sector, out)
    }

    fn write_sector(&mut self, drive: u8, sector: u32, data: &[u8]) -> bool {
        self.lock()
            .get_mut(drive)
            .map_or(false, |d| d.write_sector(sector, data))
    }

    fn format(&mut self, drive: u8, density: Density) -> bool {
        self.lock()
            .get_mut(drive)
            .map_or(false, |d| d.format(density))
    }
}
