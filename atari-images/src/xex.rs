//! XEX Boot Shim
//!
//! An XEX file is a plain Atari executable, not a disk image. It is served
//! as a virtual disk by prepending a three-sector boot loader that pulls the
//! rest of the "disk" over the bus and feeds it to DOS's binary loader.
//! Bytes 9 and 10 of the loader are patched at mount with the payload
//! length (little-endian); sectors 4 and up map straight onto the file.
//!
//! Read-only by nature: there is no meaningful place for writes to land.

use crate::image::{ImageError, SECTOR_SIZE_SD};
use crate::status::SectorPacket;
use crate::volume::Volume;

/// Sectors occupied by the boot loader
pub(crate) const LOADER_SECTORS: u32 = 3;

/// Loader length in bytes
pub(crate) const LOADER_LEN: usize = (LOADER_SECTORS * SECTOR_SIZE_SD) as usize;

/// Offset of the little-endian payload length inside the loader
const PAYLOAD_LEN_OFFSET: usize = 9;

/// 6502 boot loader, three 128-byte boot sectors. The code reads sectors
/// 4.. through SIOV into a ring at $0700 and streams them to the binary
/// loader until the patched payload length is exhausted.
static KBOOT_LOADER: [u8; LOADER_LEN] = [
    0x00, 0x03, 0x00, 0x07, 0x14, 0x07, 0x4C, 0x14, 0x07, 0x00, 0x00, 0x00, 0xA9, 0x00, 0x85, 0x43,
    0x85, 0x44, 0x85, 0x49, 0xA9, 0x04, 0x85, 0x45, 0xA9, 0x00, 0x85, 0x46, 0xAD, 0x09, 0x07, 0x85,
    0x47, 0xAD, 0x0A, 0x07, 0x85, 0x48, 0xA9, 0x31, 0x8D, 0x00, 0x03, 0xA9, 0x01, 0x8D, 0x01, 0x03,
    0xA9, 0x52, 0x8D, 0x02, 0x03, 0xA9, 0x40, 0x8D, 0x03, 0x03, 0xA9, 0x80, 0x8D, 0x04, 0x03, 0xA9,
    0x07, 0x8D, 0x05, 0x03, 0xA9, 0x1F, 0x8D, 0x06, 0x03, 0xA9, 0x80, 0x8D, 0x08, 0x03, 0xA9, 0x00,
    0x8D, 0x09, 0x03, 0xA5, 0x45, 0x8D, 0x0A, 0x03, 0xA5, 0x46, 0x8D, 0x0B, 0x03, 0x20, 0x59, 0xE4,
    0x30, 0xF7, 0xE6, 0x45, 0xD0, 0x02, 0xE6, 0x46, 0xA0, 0x00, 0x84, 0x49, 0xB9, 0x80, 0x07, 0xC8,
    0x84, 0x49, 0x60, 0x20, 0x6F, 0x07, 0x85, 0x4A, 0x20, 0x6F, 0x07, 0x85, 0x4B, 0x25, 0x4A, 0xC9,
    0xFF, 0xF0, 0xF1, 0xA5, 0x4A, 0x85, 0x4C, 0xA5, 0x4B, 0x85, 0x4D, 0x20, 0x6F, 0x07, 0x85, 0x4E,
    0x20, 0x6F, 0x07, 0x85, 0x4F, 0xA0, 0x00, 0x20, 0x6F, 0x07, 0x91, 0x4C, 0xE6, 0x4C, 0xD0, 0x02,
    0xE6, 0x4D, 0xA5, 0x4C, 0xC5, 0x4E, 0xA5, 0x4D, 0xE5, 0x4F, 0x90, 0xEC, 0xA5, 0x47, 0x05, 0x48,
    0xF0, 0x06, 0x20, 0x77, 0x07, 0x4C, 0x73, 0x07, 0x6C, 0xE0, 0x02, 0xA5, 0x47, 0xD0, 0x02, 0xC6,
    0x48, 0xC6, 0x47, 0x60, 0xA9, 0x00, 0x8D, 0xE0, 0x02, 0x8D, 0xE1, 0x02, 0x60, 0xA2, 0xFF, 0x9A,
    0x20, 0x60, 0x07, 0xAD, 0xE0, 0x02, 0x0D, 0xE1, 0x02, 0xD0, 0x03, 0x4C, 0x73, 0x07, 0x6C, 0xE0,
    0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Patched loader for one mounted executable
#[derive(Debug)]
pub(crate) struct XexState {
    loader: [u8; LOADER_LEN],
}

impl XexState {
    /// Copy the loader and patch in the payload length
    pub(crate) fn new(payload_len: u64) -> Self {
        let mut loader = KBOOT_LOADER;
        loader[PAYLOAD_LEN_OFFSET] = (payload_len & 0xFF) as u8;
        loader[PAYLOAD_LEN_OFFSET + 1] = ((payload_len >> 8) & 0xFF) as u8;
        Self { loader }
    }

    /// Total sectors presented: the loader plus the payload rounded up
    pub(crate) fn sector_count(payload_len: u64) -> u64 {
        LOADER_SECTORS as u64 + payload_len.div_ceil(SECTOR_SIZE_SD as u64)
    }

    /// Read one 128-byte sector of the virtual disk
    pub(crate) fn read_sector(
        &self,
        volume: &mut dyn Volume,
        sector: u32,
        out: &mut [u8],
    ) -> Result<SectorPacket, ImageError> {
        if sector == 0 {
            return Err(ImageError::InvalidSector);
        }
        let data = &mut out[..SECTOR_SIZE_SD as usize];

        if sector <= LOADER_SECTORS {
            let start = (sector - 1) as usize * SECTOR_SIZE_SD as usize;
            data.copy_from_slice(&self.loader[start..start + SECTOR_SIZE_SD as usize]);
        } else {
            let payload_len = volume.len();
            if sector as u64 > Self::sector_count(payload_len) {
                return Err(ImageError::InvalidSector);
            }
            let offset = (sector as u64 - LOADER_SECTORS as u64 - 1) * SECTOR_SIZE_SD as u64;
            // the final sector of an odd-length file is zero-padded
            let avail = (payload_len - offset).min(SECTOR_SIZE_SD as u64) as usize;
            data.fill(0);
            volume.read_at(offset, &mut data[..avail])?;
        }

        Ok(SectorPacket::ok(SECTOR_SIZE_SD))
    }
}
