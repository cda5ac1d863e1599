//! Drive Access Capability
//!
//! The channel never touches drives directly; it goes through this trait so
//! the drive pool can live wherever the host wants it (typically behind the
//! shared registry lock, see [`crate::registry::SharedDrives`]).

use atari_images::{Density, DriveStatus, SectorPacket};

/// Abstract drive operations, keyed by drive number 1..=8
pub trait DriveAccess {
    /// A drive with this number is attached (it may still have no image)
    fn owns(&mut self, drive: u8) -> bool;

    /// The drive's current presented status
    fn status(&mut self, drive: u8) -> Option<DriveStatus>;

    /// Read a sector into `out`. `None` means no image is mounted or the
    /// read failed outright; the caller replies with an error frame.
    fn read_sector(&mut self, drive: u8, sector: u32, out: &mut [u8]) -> Option<SectorPacket>;

    /// Write a full sector; `false` on any failure
    fn write_sector(&mut self, drive: u8, sector: u32, data: &[u8]) -> bool;

    /// Re-format the mounted image; `false` on any failure
    fn format(&mut self, drive: u8, density: Density) -> bool;
}
