//! File-Selection Device Handler
//!
//! Alongside the emulated drives the bus exposes one auxiliary device
//! (ID 0x71) that the host-side selector program talks to: identify the
//! firmware, list image files and mount them on drive slots. Directory
//! traversal itself lives in the host application behind
//! [`DriveControl`]; this handler only decodes the command set and shapes
//! the replies.
//!
//! Reply framing follows the same ACK/COMPLETE cadence as the drive
//! commands. The directory-listing frames are idiosyncratic (inherited
//! protocol): entry names are NUL-separated and the final checksum covers
//! only the name bytes.

use log::debug;

use crate::control::{DriveControl, FileEntry, FILE_NAME_LEN};
use crate::port::SioPort;
use crate::wire::{
    sio_checksum, CommandFrame, ACK, COMPLETE, DATA_FRAME_GAP_US, DELAY_T2_MS, DELAY_T5_MS,
};

/// Bus device ID of the file-selection device
pub const DEVICE_SDRIVE: u8 = 0x71;

/// Identification string, followed on the wire by its checksum
pub const IDENT: &[u8; 8] = b"SDrive01";

/// Entries in one directory-listing reply
const LIST_CHUNK: usize = 20;

pub const CMD_SDRIVE_GET20: u8 = 0xC0;
pub const CMD_SDRIVE_IDENT: u8 = 0xE0;
pub const CMD_SDRIVE_INIT: u8 = 0xE1;
pub const CMD_SDRIVE_CHDIR: u8 = 0xE3;
pub const CMD_SDRIVE_GET_ENTRIES: u8 = 0xEB;
pub const CMD_SDRIVE_SWAP_VDN: u8 = 0xEE;
pub const CMD_SDRIVE_GET_PARAMS: u8 = 0xEF;
pub const CMD_SDRIVE_MOUNT_D0: u8 = 0xF0;
pub const CMD_SDRIVE_MOUNT_D4: u8 = 0xF4;
pub const CMD_SDRIVE_CHROOT: u8 = 0xFE;
pub const CMD_SDRIVE_CHDIR_ENTRY: u8 = 0xFF;

/// Decoder for the file-selection command set
#[derive(Debug, Default)]
pub struct SDriveHandler;

impl SDriveHandler {
    pub fn new() -> Self {
        Self
    }

    /// This handler answers for `device`
    pub fn handles_device(&self, device: u8) -> bool {
        device == DEVICE_SDRIVE
    }

    /// `command` is part of the understood set
    pub fn is_valid_command(command: u8) -> bool {
        matches!(
            command,
            CMD_SDRIVE_IDENT
                | CMD_SDRIVE_INIT
                | CMD_SDRIVE_CHROOT
                | CMD_SDRIVE_SWAP_VDN
                | CMD_SDRIVE_GET_PARAMS
                | CMD_SDRIVE_GET_ENTRIES
                | CMD_SDRIVE_CHDIR
                | CMD_SDRIVE_CHDIR_ENTRY
                | CMD_SDRIVE_GET20
                | CMD_SDRIVE_MOUNT_D0..=CMD_SDRIVE_MOUNT_D4
        )
    }

    /// Human-readable command name for frame dumps
    pub fn command_label(command: u8) -> Option<&'static str> {
        Some(match command {
            CMD_SDRIVE_IDENT => "SDRIVE IDENT",
            CMD_SDRIVE_INIT => "SDRIVE INIT",
            CMD_SDRIVE_CHROOT => "SDRIVE CHROOT",
            CMD_SDRIVE_SWAP_VDN => "SDRIVE SWAP VDN",
            CMD_SDRIVE_GET_PARAMS => "SDRIVE GET PARAMS",
            CMD_SDRIVE_GET_ENTRIES => "SDRIVE GET ENTRIES",
            CMD_SDRIVE_CHDIR => "SDRIVE CHDIR",
            CMD_SDRIVE_CHDIR_ENTRY => "SDRIVE CHDIR ENTRY",
            CMD_SDRIVE_GET20 => "SDRIVE GET20",
            CMD_SDRIVE_MOUNT_D0..=CMD_SDRIVE_MOUNT_D4 => "SDRIVE MOUNT",
            _ => return None,
        })
    }

    /// Execute one validated command frame
    pub fn process<P: SioPort, C: DriveControl>(
        &mut self,
        frame: &CommandFrame,
        port: &mut P,
        control: &mut C,
    ) {
        match frame.command {
            CMD_SDRIVE_IDENT => self.cmd_ident(port),
            CMD_SDRIVE_INIT | CMD_SDRIVE_CHROOT | CMD_SDRIVE_SWAP_VDN => self.cmd_no_op(port),
            CMD_SDRIVE_GET_PARAMS => self.cmd_get_params(port),
            CMD_SDRIVE_GET_ENTRIES => self.cmd_get_entries(frame.aux1, port),
            CMD_SDRIVE_CHDIR => self.cmd_chdir(port),
            CMD_SDRIVE_CHDIR_ENTRY => self.cmd_chdir_entry(frame.aux_word(), port, control),
            CMD_SDRIVE_GET20 => self.cmd_get20(frame.aux_word(), port, control),
            CMD_SDRIVE_MOUNT_D0..=CMD_SDRIVE_MOUNT_D4 => self.cmd_mount(
                frame.command - CMD_SDRIVE_MOUNT_D0,
                frame.aux_word(),
                port,
                control,
            ),
            _ => {}
        }
    }

    fn accept<P: SioPort>(&self, port: &mut P) {
        port.delay_ms(DELAY_T2_MS);
        port.send(ACK);
    }

    fn complete<P: SioPort>(&self, port: &mut P) {
        port.delay_ms(DELAY_T5_MS);
        port.send(COMPLETE);
    }

    fn cmd_ident<P: SioPort>(&self, port: &mut P) {
        self.accept(port);
        self.complete(port);
        port.delay_us(DATA_FRAME_GAP_US);
        for &byte in IDENT {
            port.send(byte);
        }
        port.send(sio_checksum(IDENT));
        port.flush();
    }

    fn cmd_no_op<P: SioPort>(&self, port: &mut P) {
        self.accept(port);
        self.complete(port);
        port.flush();
    }

    fn cmd_get_params<P: SioPort>(&self, port: &mut P) {
        self.accept(port);
        self.complete(port);
        port.delay_us(DATA_FRAME_GAP_US);
        port.send(0x06);
        port.send(0x00);
        port.send(sio_checksum(&[0x06, 0x00]));
        port.flush();
    }

    /// `count` 12-byte blank entries plus the (zero) checksum
    fn cmd_get_entries<P: SioPort>(&self, count: u8, port: &mut P) {
        self.accept(port);
        self.complete(port);
        port.delay_us(DATA_FRAME_GAP_US);
        for _ in 0..count as usize * 12 {
            port.send(0x00);
        }
        port.send(0x00);
        port.flush();
    }

    fn cmd_chdir<P: SioPort>(&self, port: &mut P) {
        self.accept(port);
        self.complete(port);
        port.delay_us(DATA_FRAME_GAP_US);
        for _ in 0..14 {
            port.send(0x00);
        }
        port.send(0x00);
        port.flush();
    }

    /// Change-directory by entry index: the only CHDIR variant that reaches
    /// the host; the reply frame is the same either way
    fn cmd_chdir_entry<P: SioPort, C: DriveControl>(
        &self,
        index: u16,
        port: &mut P,
        control: &mut C,
    ) {
        control.change_dir(index);
        self.cmd_chdir(port);
    }

    /// Twenty directory entries from `start_index`. Each name is followed
    /// by a NUL; the trailing checksum covers the name bytes only.
    fn cmd_get20<P: SioPort, C: DriveControl>(&self, start_index: u16, port: &mut P, control: &mut C) {
        self.accept(port);
        self.complete(port);

        let mut entries = [FileEntry::default(); LIST_CHUNK];
        control.list_files(start_index, &mut entries);

        let mut names = [0u8; LIST_CHUNK * FILE_NAME_LEN];
        for (chunk, entry) in names.chunks_exact_mut(FILE_NAME_LEN).zip(&entries) {
            chunk.copy_from_slice(&entry.name);
        }

        port.delay_us(DATA_FRAME_GAP_US);
        for chunk in names.chunks_exact(FILE_NAME_LEN) {
            for &byte in chunk {
                port.send(byte);
            }
            port.send(0x00);
        }
        port.send(0x00);
        port.send(sio_checksum(&names));
        port.flush();
    }

    fn cmd_mount<P: SioPort, C: DriveControl>(
        &self,
        slot: u8,
        index: u16,
        port: &mut P,
        control: &mut C,
    ) {
        self.accept(port);
        debug!("mount request: file {} on slot {}", index, slot);
        control.mount_file(slot, index);
        self.complete(port);
        port.flush();
    }
}
