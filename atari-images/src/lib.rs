//! Atari 8-bit Disk Image Codecs
//!
//! Decoding and encoding of the disk-image formats an SIO disk-drive
//! emulator serves: ATR and XFD (plain sector dumps, writable), PRO and ATX
//! (copy-protection captures with per-sector controller status, read-only)
//! and XEX (an executable wrapped behind a boot loader, read-only).
//!
//! The crate is storage-agnostic: images live on a [`Volume`], an abstract
//! byte store the host backs with its filesystem. Nothing here knows about
//! the serial bus; the bus layer consumes [`SectorPacket`] metadata to frame
//! its replies.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod atr;
#[cfg(feature = "atx")]
mod atx;
mod image;
#[cfg(feature = "pro")]
pub mod pro;
mod status;
mod volume;
#[cfg(feature = "xex")]
mod xex;

pub use atr::{AtrHeader, ATR_HEADER_LEN, ATR_SIGNATURE};
pub use image::{
    Density, DiskImage, ImageError, ImageKind, FORMAT_SS_DD_35, FORMAT_SS_DD_40, FORMAT_SS_ED_35,
    FORMAT_SS_ED_40, FORMAT_SS_SD_35, FORMAT_SS_SD_40, MAX_SECTOR_SIZE, SECTOR_SIZE_DD,
    SECTOR_SIZE_SD,
};
pub use status::{
    CommandStatus, DriveStatus, HardwareStatus, SectorPacket, StatusFrame, DEFAULT_TIMEOUT_LSB,
};
pub use volume::{MemVolume, Volume, VolumeError};
