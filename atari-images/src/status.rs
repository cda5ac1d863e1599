//! Drive Controller Status Types
//!
//! A drive answers the STATUS command with a 4-byte frame that the host OS
//! inspects to learn density, write protection and the floppy controller's
//! last hardware state. The layout is bit-exact on the wire:
//! byte 0 command status, byte 1 WD179x hardware status, bytes 2-3 the
//! timeout the host should allow (LSB first).
//!
//! The copy-protection formats store captured hardware status per sector and
//! expect it echoed back verbatim, so the hardware byte here carries the raw
//! wire encoding: most WD179x condition bits are active LOW.

use bitflags::bitflags;

bitflags! {
    /// Command status byte (byte 0 of the status frame)
    pub struct CommandStatus: u8 {
        const INVALID_COMMAND_FRAME = 0x01;
        const INVALID_DATA_FRAME    = 0x02;
        const WRITE_FAILURE         = 0x04;
        const WRITE_PROTECT         = 0x08;
        const MOTOR_ON              = 0x10;
        const DOUBLE_DENSITY        = 0x20;
        const UNUSED                = 0x40;
        const ENHANCED_DENSITY      = 0x80;
    }
}

bitflags! {
    /// WD179x hardware status byte (byte 1 of the status frame)
    ///
    /// On the wire the condition bits are active LOW: a clear bit means the
    /// condition is asserted. A freshly captured "all fine" controller byte
    /// therefore reads 0xFF, not 0x00.
    pub struct HardwareStatus: u8 {
        const BUSY              = 0x01;
        const DATA_REQUEST      = 0x02;
        const DATA_LOST         = 0x04;
        const CRC_ERROR         = 0x08;
        const RECORD_NOT_FOUND  = 0x10;
        const RECORD_TYPE       = 0x20;
        const WRITE_PROTECTED   = 0x40;
        const NOT_READY         = 0x80;
    }
}

/// Conditions that mark a sector read as failed when asserted (low) in the
/// wire encoding.
pub(crate) const READ_ERROR_CONDITIONS: u8 = HardwareStatus::DATA_LOST.bits()
    | HardwareStatus::CRC_ERROR.bits()
    | HardwareStatus::RECORD_NOT_FOUND.bits();

/// Default timeout LSB reported to the host (SIO timeout units)
pub const DEFAULT_TIMEOUT_LSB: u8 = 0xE0;

/// 4-byte STATUS reply frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFrame {
    pub command_status: CommandStatus,
    pub hardware_status: HardwareStatus,
    pub timeout_lsb: u8,
    pub timeout_msb: u8,
}

impl StatusFrame {
    /// All condition bits clear, default timeout
    pub fn new() -> Self {
        Self {
            command_status: CommandStatus::empty(),
            hardware_status: HardwareStatus::empty(),
            timeout_lsb: DEFAULT_TIMEOUT_LSB,
            timeout_msb: 0,
        }
    }

    /// Wire encoding, in transmission order
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            self.command_status.bits(),
            self.hardware_status.bits(),
            self.timeout_lsb,
            self.timeout_msb,
        ]
    }

    /// Decode a frame captured from a disk image. Lossless: both bitfields
    /// cover all eight bits.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            command_status: CommandStatus::from_bits_truncate(bytes[0]),
            hardware_status: HardwareStatus::from_bits_truncate(bytes[1]),
            timeout_lsb: bytes[2],
            timeout_msb: bytes[3],
        }
    }
}

impl Default for StatusFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// A drive's presented state: its sector size plus the status frame the next
/// STATUS command will return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveStatus {
    pub sector_size: u32,
    pub status_frame: StatusFrame,
}

impl DriveStatus {
    pub fn new(sector_size: u32) -> Self {
        Self {
            sector_size,
            status_frame: StatusFrame::new(),
        }
    }
}

/// Result of a sector read.
///
/// The sector data itself is written into the caller's buffer; this carries
/// the metadata the bus layer needs to frame the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorPacket {
    /// Number of valid bytes in the caller's buffer
    pub sector_size: u32,
    /// The read failed at the media level; reply with an error byte but
    /// still transmit the data
    pub error: bool,
    /// Captured per-sector status. When present the drive must adopt it so
    /// the next STATUS query reports what the "hardware" saw.
    pub status_frame: Option<StatusFrame>,
    /// Extra settle delay before the completion byte, in milliseconds
    pub read_delay_ms: u32,
    /// Pad total service time to the copy-protection timing quantum
    pub paced: bool,
}

impl SectorPacket {
    /// Plain successful read
    pub fn ok(sector_size: u32) -> Self {
        Self {
            sector_size,
            error: false,
            status_frame: None,
            read_delay_ms: 0,
            paced: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let mut frame = StatusFrame::new();
        frame.command_status = CommandStatus::MOTOR_ON | CommandStatus::WRITE_PROTECT;
        frame.hardware_status = HardwareStatus::from_bits_truncate(0xF7);

        assert_eq!(frame.to_bytes(), [0x18, 0xF7, 0xE0, 0x00]);
        assert_eq!(StatusFrame::from_bytes(frame.to_bytes()), frame);
    }

    #[test]
    fn test_all_bits_survive_decode() {
        let frame = StatusFrame::from_bytes([0xFF, 0xFF, 0x12, 0x34]);
        assert_eq!(frame.to_bytes(), [0xFF, 0xFF, 0x12, 0x34]);
    }

    #[test]
    fn test_default_frame_is_quiet() {
        assert_eq!(StatusFrame::new().to_bytes(), [0x00, 0x00, 0xE0, 0x00]);
    }
}
