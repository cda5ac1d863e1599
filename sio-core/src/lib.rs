//! Atari SIO Peripheral Emulator Core
//!
//! Emulates disk drives D1: through D8: and a file-selection device on the
//! Atari 8-bit serial bus. The host wires up three seams and pumps two
//! entry points:
//!
//! - [`SioPort`] — UART transmit, the COMMAND line and time
//! - [`DriveAccess`] / [`SharedDrives`] — the drive pool
//! - [`DriveControl`] — directory listing and mounting policy
//!
//! ```ignore
//! let drives = SharedDrives::new(DriveRegistry::single_drive());
//! let mut channel = SioChannel::new(port, drives.clone(), control);
//! loop {
//!     while let Some(byte) = uart.poll() {
//!         channel.on_byte(byte);
//!     }
//!     channel.run_cycle();
//! }
//! ```
//!
//! Image decoding lives in the `atari-images` crate, re-exported here.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod access;
mod channel;
mod control;
mod drive;
mod port;
mod registry;
pub mod sdrive;
pub mod wire;

pub use access::DriveAccess;
pub use channel::{SioChannel, DATA_FRAME_CAPACITY};
pub use control::{DriveControl, FileEntry, NullControl, FILE_NAME_LEN};
pub use drive::DiskDrive;
pub use port::SioPort;
pub use registry::{DriveRegistry, SharedDrives, DRIVE_COUNT};
pub use sdrive::{SDriveHandler, DEVICE_SDRIVE};

pub use atari_images::{
    CommandStatus, Density, DiskImage, DriveStatus, HardwareStatus, ImageError, ImageKind,
    MemVolume, SectorPacket, StatusFrame, Volume, VolumeError, MAX_SECTOR_SIZE, SECTOR_SIZE_DD,
    SECTOR_SIZE_SD,
};
