//! ATX Image Decoding
//!
//! ATX records a protected floppy as a database of track records, each
//! holding a list of physical sectors with the controller status captured
//! at imaging time. Tracks may carry duplicate sector numbers (weak-sector
//! protection) or miss sectors entirely; both must be reproduced faithfully.
//!
//! On mount the track database is flattened into a fixed 720-entry index
//! (40 tracks of 18 sectors); reads scan that index. Read-only.

use crate::image::{ImageError, SECTOR_SIZE_SD};
use crate::status::{CommandStatus, HardwareStatus, SectorPacket, StatusFrame};
use crate::volume::Volume;

/// File magic
pub(crate) const ATX_MAGIC: &[u8; 4] = b"AT8X";

/// Tracks on a 40-track single-density disk
const TRACK_COUNT: usize = 40;

/// Sector slots per track
const SECTORS_PER_TRACK: usize = 18;

/// Total index entries
const INDEX_SIZE: usize = TRACK_COUNT * SECTORS_PER_TRACK;

/// Sentinel sector number for unused index entries
const SECTOR_UNUSED: u16 = 60000;

/// Offset of the little-endian pointer to the first track record
const TRACK_LIST_PTR_OFFSET: u64 = 28;

/// Track record header bytes we decode
const TRACK_HEADER_LEN: usize = 24;

/// Sector list header bytes preceding the entries
const SECTOR_LIST_HEADER_LEN: u64 = 8;

/// Hardware status reported for a sector the imaged disk never had
/// (record-not-found asserted low)
const MISSING_SECTOR_STATUS: u8 = 0xF7;

/// One flattened index entry
#[derive(Debug, Clone, Copy)]
struct SectorEntry {
    /// Global 0-based sector number, or `SECTOR_UNUSED`
    sector_number: u16,
    /// Byte offset of the sector data in the file
    file_index: u32,
    /// Raw controller status captured at imaging time (active high)
    status: u8,
}

impl SectorEntry {
    const UNUSED: Self = Self {
        sector_number: SECTOR_UNUSED,
        file_index: 0,
        status: 0,
    };
}

/// Flattened sector index plus duplicate-alternation state
#[derive(Debug)]
pub(crate) struct AtxIndex {
    entries: alloc::boxed::Box<[SectorEntry; INDEX_SIZE]>,
    /// Serve the last duplicate instead of the first on the next read
    flip: bool,
}

fn u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl AtxIndex {
    /// Walk the track records and flatten them into the sector index
    pub(crate) fn parse(volume: &mut dyn Volume) -> Result<Self, ImageError> {
        let mut entries = alloc::boxed::Box::new([SectorEntry::UNUSED; INDEX_SIZE]);

        let mut ptr = [0u8; 4];
        volume.read_at(TRACK_LIST_PTR_OFFSET, &mut ptr)?;
        let mut pos = u32_le(&ptr) as u64;

        let file_len = volume.len();
        for _ in 0..TRACK_COUNT {
            if pos + TRACK_HEADER_LEN as u64 > file_len {
                break;
            }
            let mut header = [0u8; TRACK_HEADER_LEN];
            volume.read_at(pos, &mut header)?;

            let record_len = u32_le(&header[0..4]) as u64;
            if record_len == 0 {
                break;
            }
            let track = header[8] as usize;
            let sector_count = u16_le(&header[10..12]) as usize;
            let list_offset = u32_le(&header[20..24]) as u64;

            let mut entry = [0u8; 8];
            for slot in 0..sector_count {
                let entry_pos = pos + list_offset + SECTOR_LIST_HEADER_LEN + slot as u64 * 8;
                volume.read_at(entry_pos, &mut entry)?;

                if track >= TRACK_COUNT || slot >= SECTORS_PER_TRACK || entry[0] == 0 {
                    continue;
                }
                entries[track * SECTORS_PER_TRACK + slot] = SectorEntry {
                    sector_number: (track * SECTORS_PER_TRACK) as u16 + (entry[0] as u16 - 1),
                    file_index: (pos as u32).wrapping_add(u32_le(&entry[4..8])),
                    status: entry[1],
                };
            }

            pos += record_len;
        }

        Ok(Self {
            entries,
            flip: false,
        })
    }

    /// Read one sector by its 1-based bus sector number.
    ///
    /// Duplicate entries alternate first/last on successive reads; a sector
    /// the index does not contain reports record-not-found with zeroed data.
    pub(crate) fn read_sector(
        &mut self,
        volume: &mut dyn Volume,
        sector: u32,
        out: &mut [u8],
    ) -> Result<SectorPacket, ImageError> {
        if sector == 0 {
            return Err(ImageError::InvalidSector);
        }
        let target = (sector - 1) as u16;

        let mut first = None;
        let mut last = None;
        if target != SECTOR_UNUSED {
            for entry in self.entries.iter() {
                if entry.sector_number == target {
                    if first.is_none() {
                        first = Some(*entry);
                    }
                    last = Some(*entry);
                }
            }
        }

        let chosen = if self.flip { last } else { first };
        self.flip = !self.flip;

        let mut frame = StatusFrame::new();
        frame.command_status = CommandStatus::MOTOR_ON;

        let data = &mut out[..SECTOR_SIZE_SD as usize];
        let error = match chosen {
            Some(entry) => {
                volume.read_at(entry.file_index as u64, data)?;
                frame.hardware_status = HardwareStatus::from_bits_truncate(!entry.status);
                entry.status != 0
            }
            None => {
                data.fill(0);
                frame.hardware_status = HardwareStatus::from_bits_truncate(MISSING_SECTOR_STATUS);
                true
            }
        };

        Ok(SectorPacket {
            sector_size: SECTOR_SIZE_SD,
            error,
            status_frame: Some(frame),
            read_delay_ms: 0,
            paced: false,
        })
    }
}
