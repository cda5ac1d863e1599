//! Disk Image Codec
//!
//! Recognises a mounted file as one of the supported image formats and
//! serves sector reads and writes against it. Format detection inspects the
//! first 16 bytes where the format is structured (ATR, PRO, ATX) and falls
//! back to the filename extension for the headerless ones (XFD, XEX).

use alloc::boxed::Box;
use log::debug;

use crate::atr::{AtrHeader, ATR_HEADER_LEN};
#[cfg(feature = "atx")]
use crate::atx::{self, AtxIndex};
#[cfg(feature = "pro")]
use crate::pro::{self, ProState};
use crate::status::SectorPacket;
use crate::volume::{Volume, VolumeError};
#[cfg(feature = "xex")]
use crate::xex::XexState;

/// Single/enhanced density sector size
pub const SECTOR_SIZE_SD: u32 = 128;

/// Double density sector size
pub const SECTOR_SIZE_DD: u32 = 256;

/// Largest sector any supported image can produce
pub const MAX_SECTOR_SIZE: usize = 1024;

/// Raw body sizes of the standard single-sided layouts
pub const FORMAT_SS_SD_35: u64 = 80640;
pub const FORMAT_SS_SD_40: u64 = 92160;
pub const FORMAT_SS_ED_35: u64 = 116480;
pub const FORMAT_SS_ED_40: u64 = 133120;
pub const FORMAT_SS_DD_35: u64 = 160896;
pub const FORMAT_SS_DD_40: u64 = 183936;

/// Format density selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Density {
    Single = 1,
    Enhanced = 2,
    Double = 3,
}

impl Density {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Density::Single),
            2 => Some(Density::Enhanced),
            3 => Some(Density::Double),
            _ => None,
        }
    }
}

/// Recognised image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Atr,
    Xfd,
    Pro,
    Atx,
    Xex,
}

impl ImageKind {
    pub fn name(&self) -> &'static str {
        match self {
            ImageKind::Atr => "ATR",
            ImageKind::Xfd => "XFD",
            ImageKind::Pro => "PRO",
            ImageKind::Atx => "ATX",
            ImageKind::Xex => "XEX",
        }
    }
}

/// Codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// File matches no supported format
    UnrecognizedFormat,
    /// Structured header carries a geometry we cannot serve
    UnsupportedGeometry,
    /// Sector number outside the image
    InvalidSector,
    /// Buffer or payload length does not match the sector size
    BadLength,
    /// Write or format attempted on a read-only image
    ReadOnly,
    /// Backing volume failed
    Volume(VolumeError),
}

impl From<VolumeError> for ImageError {
    fn from(err: VolumeError) -> Self {
        ImageError::Volume(err)
    }
}

impl core::fmt::Display for ImageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ImageError::UnrecognizedFormat => write!(f, "Unrecognized image format"),
            ImageError::UnsupportedGeometry => write!(f, "Unsupported image geometry"),
            ImageError::InvalidSector => write!(f, "Sector outside image"),
            ImageError::BadLength => write!(f, "Length does not match sector size"),
            ImageError::ReadOnly => write!(f, "Image is read-only"),
            ImageError::Volume(err) => write!(f, "Volume error: {}", err),
        }
    }
}

/// Per-format decoding state
#[derive(Debug)]
enum Decoder {
    /// Raw sectors at a fixed stride after the header (ATR, XFD)
    Flat,
    #[cfg(feature = "pro")]
    Pro(ProState),
    #[cfg(feature = "atx")]
    Atx(AtxIndex),
    #[cfg(feature = "xex")]
    Xex(XexState),
}

/// One mounted disk image
pub struct DiskImage {
    volume: Box<dyn Volume>,
    kind: ImageKind,
    file_size: u64,
    header_size: u64,
    sector_size: u32,
    read_only: bool,
    decoder: Decoder,
}

impl core::fmt::Debug for DiskImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiskImage")
            .field("kind", &self.kind)
            .field("file_size", &self.file_size)
            .field("header_size", &self.header_size)
            .field("sector_size", &self.sector_size)
            .field("read_only", &self.read_only)
            .field("decoder", &self.decoder)
            .finish()
    }
}

fn ext_matches(filename: &str, ext: &[u8; 4]) -> bool {
    let bytes = filename.as_bytes();
    bytes.len() >= 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(ext)
}

impl DiskImage {
    /// Mount a volume, probing formats in order: ATR header, PRO header,
    /// ATX magic, then filename extension (XFD, XEX). The first match wins.
    pub fn mount(mut volume: Box<dyn Volume>, filename: &str) -> Result<Self, ImageError> {
        let file_size = volume.len();

        let mut header = [0u8; 16];
        let probe_len = file_size.min(16) as usize;
        volume.read_at(0, &mut header[..probe_len])?;

        match AtrHeader::parse(&header) {
            Ok(atr) => {
                let image = Self {
                    volume,
                    kind: ImageKind::Atr,
                    file_size,
                    header_size: ATR_HEADER_LEN,
                    sector_size: atr.sector_size as u32,
                    read_only: false,
                    decoder: Decoder::Flat,
                };
                image.log_mount(filename);
                return Ok(image);
            }
            // a valid signature with bad geometry is a rejection, not a
            // cue to try the other formats
            Err(ImageError::UnsupportedGeometry) => return Err(ImageError::UnsupportedGeometry),
            Err(_) => {}
        }

        #[cfg(feature = "pro")]
        if pro::probe(&header, file_size) {
            let image = Self {
                volume,
                kind: ImageKind::Pro,
                file_size,
                header_size: pro::FILE_HEADER_LEN,
                sector_size: SECTOR_SIZE_SD,
                read_only: true,
                decoder: Decoder::Pro(ProState::from_header(&header)),
            };
            image.log_mount(filename);
            return Ok(image);
        }

        #[cfg(feature = "atx")]
        if &header[0..4] == atx::ATX_MAGIC {
            let index = AtxIndex::parse(volume.as_mut())?;
            let image = Self {
                volume,
                kind: ImageKind::Atx,
                file_size,
                header_size: 0,
                sector_size: SECTOR_SIZE_SD,
                read_only: true,
                decoder: Decoder::Atx(index),
            };
            image.log_mount(filename);
            return Ok(image);
        }

        if ext_matches(filename, b".xfd") && file_size == FORMAT_SS_SD_40 {
            let image = Self {
                volume,
                kind: ImageKind::Xfd,
                file_size,
                header_size: 0,
                sector_size: SECTOR_SIZE_SD,
                read_only: false,
                decoder: Decoder::Flat,
            };
            image.log_mount(filename);
            return Ok(image);
        }

        #[cfg(feature = "xex")]
        if ext_matches(filename, b".xex") {
            let image = Self {
                volume,
                kind: ImageKind::Xex,
                file_size,
                header_size: 0,
                sector_size: SECTOR_SIZE_SD,
                read_only: true,
                decoder: Decoder::Xex(XexState::new(file_size)),
            };
            image.log_mount(filename);
            return Ok(image);
        }

        debug!("no codec claims {}", filename);
        Err(ImageError::UnrecognizedFormat)
    }

    fn log_mount(&self, filename: &str) {
        debug!(
            "mounted {} as {}: {}-byte sectors, {} sectors{}",
            filename,
            self.kind.name(),
            self.sector_size,
            self.sector_count(),
            if self.read_only { ", read-only" } else { "" },
        );
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Sectors this image presents on the bus
    pub fn sector_count(&self) -> u64 {
        match self.decoder {
            #[cfg(feature = "pro")]
            Decoder::Pro(_) => (self.file_size - self.header_size) / pro::SLOT_STRIDE,
            #[cfg(feature = "xex")]
            Decoder::Xex(_) => XexState::sector_count(self.file_size),
            _ => (self.file_size - self.header_size) / self.sector_size as u64,
        }
    }

    /// The image carries per-sector hardware status
    pub fn has_copy_protection(&self) -> bool {
        matches!(self.kind, ImageKind::Pro | ImageKind::Atx)
    }

    /// Image body matches a standard enhanced-density layout
    pub fn is_enhanced_density(&self) -> bool {
        self.file_size == FORMAT_SS_ED_35 + self.header_size
            || self.file_size == FORMAT_SS_ED_40 + self.header_size
    }

    /// Image body matches a standard double-density layout
    pub fn is_double_density(&self) -> bool {
        self.file_size == FORMAT_SS_DD_35 + self.header_size
            || self.file_size == FORMAT_SS_DD_40 + self.header_size
    }

    fn sector_offset(&self, sector: u32) -> Result<u64, ImageError> {
        if sector == 0 {
            return Err(ImageError::InvalidSector);
        }
        let offset = self.header_size + (sector as u64 - 1) * self.sector_size as u64;
        if offset + self.sector_size as u64 > self.file_size {
            return Err(ImageError::InvalidSector);
        }
        Ok(offset)
    }

    /// Read one sector into `out` (which must hold at least `sector_size`
    /// bytes) and return the reply metadata.
    pub fn read_sector(&mut self, sector: u32, out: &mut [u8]) -> Result<SectorPacket, ImageError> {
        if out.len() < self.sector_size as usize {
            return Err(ImageError::BadLength);
        }

        match self.decoder {
            Decoder::Flat => {
                let offset = self.sector_offset(sector)?;
                self.volume
                    .read_at(offset, &mut out[..self.sector_size as usize])?;
                Ok(SectorPacket::ok(self.sector_size))
            }
            #[cfg(feature = "pro")]
            Decoder::Pro(ref mut state) => {
                pro::read_sector(self.volume.as_mut(), state, sector, out)
            }
            #[cfg(feature = "atx")]
            Decoder::Atx(ref mut index) => index.read_sector(self.volume.as_mut(), sector, out),
            #[cfg(feature = "xex")]
            Decoder::Xex(ref state) => state.read_sector(self.volume.as_mut(), sector, out),
        }
    }

    /// Write one full sector
    pub fn write_sector(&mut self, sector: u32, data: &[u8]) -> Result<(), ImageError> {
        if self.read_only {
            return Err(ImageError::ReadOnly);
        }
        if data.len() != self.sector_size as usize {
            return Err(ImageError::BadLength);
        }
        let offset = self.sector_offset(sector)?;
        self.volume.write_at(offset, data)?;
        self.volume.flush()?;
        Ok(())
    }

    /// Rewrite the image as a blank single- or enhanced-density disk
    pub fn format(&mut self, density: Density) -> Result<(), ImageError> {
        if self.read_only {
            return Err(ImageError::ReadOnly);
        }

        let body_len = match density {
            Density::Enhanced => FORMAT_SS_ED_40,
            _ => FORMAT_SS_SD_40,
        };

        if self.kind == ImageKind::Atr {
            let header = AtrHeader::for_format(body_len, SECTOR_SIZE_SD as u16);
            self.volume.write_at(0, &header)?;
        }

        let zeros = [0u8; 512];
        let end = self.header_size + body_len;
        let mut offset = self.header_size;
        while offset < end {
            let chunk = (end - offset).min(zeros.len() as u64) as usize;
            self.volume.write_at(offset, &zeros[..chunk])?;
            offset += chunk as u64;
        }
        self.volume.set_len(end)?;
        self.volume.flush()?;

        self.sector_size = SECTOR_SIZE_SD;
        self.file_size = end;
        debug!("formatted {} image, {} sectors", self.kind.name(), self.sector_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::MemVolume;
    use alloc::vec;
    use alloc::vec::Vec;

    fn blank_atr(sector_size: u16, sectors: usize) -> Vec<u8> {
        let body = sector_size as usize * sectors;
        let mut data = AtrHeader::for_format(body as u64, sector_size).to_vec();
        data.resize(16 + body, 0);
        data
    }

    fn mount_atr(sector_size: u16, sectors: usize) -> DiskImage {
        let vol = MemVolume::with_data(blank_atr(sector_size, sectors));
        DiskImage::mount(Box::new(vol), "test.atr").unwrap()
    }

    #[test]
    fn test_mount_atr_by_header() {
        // extension deliberately wrong: the header decides
        let vol = MemVolume::with_data(blank_atr(256, 720));
        let image = DiskImage::mount(Box::new(vol), "misnamed.xfd").unwrap();
        assert_eq!(image.kind(), ImageKind::Atr);
        assert_eq!(image.sector_size(), 256);
        assert!(!image.read_only());
        assert_eq!(image.sector_count(), 720);
    }

    #[test]
    fn test_mount_xfd_by_name_and_size() {
        let vol = MemVolume::with_data(vec![0; FORMAT_SS_SD_40 as usize]);
        let image = DiskImage::mount(Box::new(vol), "GAME.XFD").unwrap();
        assert_eq!(image.kind(), ImageKind::Xfd);
        assert_eq!(image.sector_size(), 128);
        assert_eq!(image.sector_count(), 720);
    }

    #[test]
    fn test_xfd_needs_exact_size() {
        let vol = MemVolume::with_data(vec![0; 1000]);
        assert_eq!(
            DiskImage::mount(Box::new(vol), "short.xfd").unwrap_err(),
            ImageError::UnrecognizedFormat
        );
    }

    #[test]
    fn test_mount_xex_any_size() {
        let vol = MemVolume::with_data(vec![0xFF; 512]);
        let image = DiskImage::mount(Box::new(vol), "demo.xex").unwrap();
        assert_eq!(image.kind(), ImageKind::Xex);
        assert!(image.read_only());
        assert_eq!(image.sector_count(), 7);
    }

    #[test]
    fn test_reject_unknown() {
        let vol = MemVolume::with_data(vec![1, 2, 3, 4]);
        assert_eq!(
            DiskImage::mount(Box::new(vol), "junk.bin").unwrap_err(),
            ImageError::UnrecognizedFormat
        );
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut image = mount_atr(128, 720);
        let data = [0xAA; 128];
        image.write_sector(2, &data).unwrap();

        let mut buf = [0u8; 128];
        image.read_sector(2, &mut buf).unwrap();
        assert_eq!(buf, data);
        // neighbours untouched
        image.read_sector(1, &mut buf).unwrap();
        assert_eq!(buf, [0; 128]);
        image.read_sector(3, &mut buf).unwrap();
        assert_eq!(buf, [0; 128]);
    }

    #[test]
    fn test_sector_bounds() {
        let mut image = mount_atr(128, 4);
        let mut buf = [0u8; 128];
        assert_eq!(
            image.read_sector(0, &mut buf).unwrap_err(),
            ImageError::InvalidSector
        );
        assert!(image.read_sector(4, &mut buf).is_ok());
        assert_eq!(
            image.read_sector(5, &mut buf).unwrap_err(),
            ImageError::InvalidSector
        );
    }

    #[test]
    fn test_write_wrong_length() {
        let mut image = mount_atr(256, 8);
        assert_eq!(
            image.write_sector(1, &[0; 128]).unwrap_err(),
            ImageError::BadLength
        );
    }

    #[test]
    fn test_write_readonly_fails() {
        let vol = MemVolume::with_data(vec![0; 512]);
        let mut image = DiskImage::mount(Box::new(vol), "demo.xex").unwrap();
        assert_eq!(
            image.write_sector(4, &[0; 128]).unwrap_err(),
            ImageError::ReadOnly
        );
        assert_eq!(
            image.format(Density::Single).unwrap_err(),
            ImageError::ReadOnly
        );
    }

    #[test]
    fn test_format_single_density() {
        // a double-density image formatted back to single density
        let mut image = mount_atr(256, 720);
        image.format(Density::Single).unwrap();

        assert_eq!(image.sector_size(), 128);
        assert_eq!(image.sector_count(), 720);
        assert_eq!(image.file_size(), 16 + FORMAT_SS_SD_40);
        let mut buf = [0u8; 128];
        for sector in [1u32, 360, 720] {
            image.read_sector(sector, &mut buf).unwrap();
            assert_eq!(buf, [0; 128]);
        }
    }

    #[test]
    fn test_format_enhanced_marks_density() {
        let mut image = mount_atr(128, 720);
        assert!(!image.is_enhanced_density());
        image.format(Density::Enhanced).unwrap();
        assert!(image.is_enhanced_density());
        assert_eq!(image.sector_count(), 1040);
    }

    #[test]
    fn test_density_codes() {
        assert_eq!(Density::from_code(2), Some(Density::Enhanced));
        assert_eq!(Density::from_code(9), None);
    }
}
