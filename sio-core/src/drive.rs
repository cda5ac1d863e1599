//! Virtual Disk Drive
//!
//! Wraps at most one mounted image and owns the status the drive presents
//! to the host. A drive with no image still answers STATUS (the host polls
//! empty drives at boot) but fails every sector operation.

use atari_images::{
    CommandStatus, Density, DiskImage, DriveStatus, HardwareStatus, SectorPacket, StatusFrame,
    SECTOR_SIZE_SD,
};
use log::{debug, warn};

/// One emulated drive slot
pub struct DiskDrive {
    status: DriveStatus,
    image: Option<DiskImage>,
}

impl DiskDrive {
    /// An empty drive presenting single-density geometry
    pub fn new() -> Self {
        Self {
            status: DriveStatus::new(SECTOR_SIZE_SD),
            image: None,
        }
    }

    /// Current status; the write-protect bit tracks the mounted image
    pub fn status(&mut self) -> DriveStatus {
        let protected = self.image.as_ref().map_or(false, |i| i.read_only());
        self.status
            .status_frame
            .command_status
            .set(CommandStatus::WRITE_PROTECT, protected);
        self.status
    }

    /// Motor-running bit presented while idle
    pub fn set_motor(&mut self, on: bool) {
        self.status
            .status_frame
            .command_status
            .set(CommandStatus::MOTOR_ON, on);
    }

    /// Mount an image, replacing any previous one
    pub fn set_image(&mut self, image: DiskImage) {
        debug!("mounting {} image", image.kind().name());
        self.image = Some(image);
        self.refresh_status();
    }

    /// Remove the mounted image, if any
    pub fn eject(&mut self) -> Option<DiskImage> {
        self.status = DriveStatus::new(SECTOR_SIZE_SD);
        self.image.take()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&DiskImage> {
        self.image.as_ref()
    }

    /// Rebuild the presented status from the mounted image
    fn refresh_status(&mut self) {
        let Some(image) = &self.image else { return };
        let mut frame = StatusFrame::new();
        frame
            .command_status
            .set(CommandStatus::ENHANCED_DENSITY, image.is_enhanced_density());
        frame
            .command_status
            .set(CommandStatus::DOUBLE_DENSITY, image.is_double_density());
        // active low on the wire: a writable drive reports the bit set
        frame
            .hardware_status
            .set(HardwareStatus::WRITE_PROTECTED, !image.read_only());
        self.status = DriveStatus {
            sector_size: image.sector_size(),
            status_frame: frame,
        };
    }

    /// Read a sector into `out`. Adopts any per-sector status frame the
    /// codec reports so the next STATUS query reflects it.
    pub fn read_sector(&mut self, sector: u32, out: &mut [u8]) -> Option<SectorPacket> {
        let image = self.image.as_mut()?;
        let packet = match image.read_sector(sector, out) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("sector {} read failed: {}", sector, err);
                return None;
            }
        };
        if let Some(frame) = packet.status_frame {
            self.status.status_frame = frame;
        }
        Some(packet)
    }

    pub fn write_sector(&mut self, sector: u32, data: &[u8]) -> bool {
        let Some(image) = self.image.as_mut() else {
            return false;
        };
        match image.write_sector(sector, data) {
            Ok(()) => true,
            Err(err) => {
                warn!("sector {} write failed: {}", sector, err);
                false
            }
        }
    }

    pub fn format(&mut self, density: Density) -> bool {
        let Some(image) = self.image.as_mut() else {
            return false;
        };
        match image.format(density) {
            Ok(()) => {
                self.refresh_status();
                true
            }
            Err(err) => {
                warn!("format failed: {}", err);
                false
            }
        }
    }
}

impl Default for DiskDrive {
    fn default() -> Self {
        Self::new()
    }
}
