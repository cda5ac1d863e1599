//! SIO Channel State Machine
//!
//! The protocol engine. Two entry points drive it: [`SioChannel::run_cycle`]
//! (call as often as possible; watches the COMMAND line and the timeouts)
//! and [`SioChannel::on_byte`] (call for every received UART byte). All
//! replies, including their mandated delays, happen on the caller's stack.
//!
//! A command begins when the host pulls COMMAND low and clocks out a 5-byte
//! frame. The frame is validated, dispatched to a drive or the
//! file-selection handler, answered with the ACK / COMPLETE cadence, and
//! the channel then waits for COMMAND to rise before listening again.
//! Anything malformed that is not addressed to us is dropped silently;
//! malformed traffic addressed to us earns a NAK.

use log::{debug, trace};

use crate::access::DriveAccess;
use crate::control::DriveControl;
use crate::port::SioPort;
use crate::sdrive::{SDriveHandler, DEVICE_SDRIVE};
use crate::wire::{
    device_to_drive, sio_checksum, CommandFrame, ACK, CMD_FORMAT, CMD_FORMAT_MD, CMD_POLL,
    CMD_PUT, CMD_READ, CMD_STATUS, CMD_WRITE, COMMAND_FRAME_SIZE, COMPLETE, DATA_FRAME_GAP_US,
    DELAY_T2_MS, DELAY_T4_MS, DELAY_T5_MS, DEVICE_D1, DEVICE_D8, DEVICE_R1, ERR, NAK,
    PACED_READ_QUANTUM_MS, READ_CMD_TIMEOUT_MS, READ_FRAME_TIMEOUT_MS,
};
use atari_images::{Density, DriveStatus, MAX_SECTOR_SIZE, SECTOR_SIZE_SD};

/// Inbound data-frame capacity: the largest sector plus its checksum
pub const DATA_FRAME_CAPACITY: usize = MAX_SECTOR_SIZE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    /// Wait for the COMMAND line to be seen high once
    Init,
    /// Idle, ready for a falling edge
    WaitCmdStart,
    /// Accumulating the 5-byte command frame
    ReadCmd,
    /// Accumulating a write payload
    ReadDataFrame,
    /// Reply sent; wait for COMMAND to rise
    WaitCmdEnd,
}

struct PendingWrite {
    drive: u8,
    sector: u32,
    /// Payload plus its checksum byte
    expected: usize,
}

/// The SIO bus protocol engine
pub struct SioChannel<P: SioPort, A: DriveAccess, C: DriveControl> {
    port: P,
    drives: A,
    control: C,
    sdrive: SDriveHandler,
    state: ChannelState,
    state_since: u64,
    cmd_buf: [u8; COMMAND_FRAME_SIZE],
    cmd_len: usize,
    data_buf: heapless::Vec<u8, DATA_FRAME_CAPACITY>,
    pending_write: Option<PendingWrite>,
    sector_buf: [u8; MAX_SECTOR_SIZE],
}

/// Device IDs that may legitimately start a command frame. Stray bytes on a
/// shared bus would otherwise shift the frame and corrupt every following
/// command.
fn is_valid_device(device: u8) -> bool {
    matches!(device, DEVICE_D1..=DEVICE_D8 | DEVICE_R1 | DEVICE_SDRIVE)
}

fn is_drive_command(command: u8) -> bool {
    matches!(
        command,
        CMD_READ | CMD_WRITE | CMD_PUT | CMD_STATUS | CMD_FORMAT | CMD_FORMAT_MD
    )
}

impl<P: SioPort, A: DriveAccess, C: DriveControl> SioChannel<P, A, C> {
    pub fn new(port: P, drives: A, control: C) -> Self {
        Self {
            port,
            drives,
            control,
            sdrive: SDriveHandler::new(),
            state: ChannelState::Init,
            state_since: 0,
            cmd_buf: [0; COMMAND_FRAME_SIZE],
            cmd_len: 0,
            data_buf: heapless::Vec::new(),
            pending_write: None,
            sector_buf: [0; MAX_SECTOR_SIZE],
        }
    }

    /// Poll the COMMAND line, the timeouts and any completed frame
    pub fn run_cycle(&mut self) {
        match self.state {
            ChannelState::Init => {
                if !self.port.command_asserted() {
                    self.state = ChannelState::WaitCmdStart;
                }
            }
            ChannelState::WaitCmdStart => {
                if self.port.command_asserted() {
                    self.cmd_len = 0;
                    self.enter(ChannelState::ReadCmd);
                }
            }
            ChannelState::ReadCmd => {
                if self.cmd_len == COMMAND_FRAME_SIZE {
                    self.dispatch();
                } else if self.elapsed() > READ_CMD_TIMEOUT_MS {
                    debug!("command frame timeout");
                    self.state = ChannelState::WaitCmdStart;
                }
            }
            ChannelState::ReadDataFrame => {
                let expected = self.pending_write.as_ref().map_or(0, |w| w.expected);
                if self.data_buf.len() >= expected {
                    self.finish_data_frame();
                    self.state = ChannelState::WaitCmdEnd;
                } else if self.elapsed() > READ_FRAME_TIMEOUT_MS {
                    debug!("data frame timeout");
                    self.pending_write = None;
                    self.state = ChannelState::WaitCmdStart;
                }
            }
            ChannelState::WaitCmdEnd => {
                if !self.port.command_asserted() {
                    self.state = ChannelState::WaitCmdStart;
                }
            }
        }
    }

    /// Feed one received byte
    pub fn on_byte(&mut self, byte: u8) {
        match self.state {
            ChannelState::ReadCmd => {
                // command frames arrive only while COMMAND is held low; the
                // device check resynchronises against stray bus traffic
                if self.port.command_asserted()
                    && self.cmd_len < COMMAND_FRAME_SIZE
                    && (self.cmd_len > 0 || is_valid_device(byte))
                {
                    self.cmd_buf[self.cmd_len] = byte;
                    self.cmd_len += 1;
                    return;
                }
                trace!("ignoring {:02X}", byte);
            }
            ChannelState::ReadDataFrame => {
                // capacity always covers the expected payload
                let _ = self.data_buf.push(byte);
            }
            _ => trace!("ignoring {:02X} while idle", byte),
        }
    }

    fn enter(&mut self, state: ChannelState) {
        self.state = state;
        self.state_since = self.port.now_ms();
    }

    fn elapsed(&mut self) -> u64 {
        self.port.now_ms().saturating_sub(self.state_since)
    }

    /// Validate and route a complete command frame
    fn dispatch(&mut self) {
        let frame = CommandFrame::from_bytes(&self.cmd_buf);
        self.dump_frame(&frame);

        // a write command re-enters ReadDataFrame below
        self.state = ChannelState::WaitCmdEnd;

        if !frame.checksum_ok() {
            debug!(
                "command checksum mismatch: got {:02X}, computed {:02X}",
                frame.checksum,
                sio_checksum(&self.cmd_buf[..4])
            );
            return;
        }

        if let Some(drive) = device_to_drive(frame.device) {
            if !self.drives.owns(drive) {
                return;
            }
            if is_drive_command(frame.command) && self.valid_aux(&frame) {
                self.process_drive_command(drive, &frame);
            } else {
                self.port.send(NAK);
            }
        } else if self.sdrive.handles_device(frame.device) {
            if SDriveHandler::is_valid_command(frame.command) {
                self.sdrive
                    .process(&frame, &mut self.port, &mut self.control);
            } else {
                self.port.send(NAK);
            }
        }
        // anything else is another peripheral's conversation
    }

    /// Aux-byte validation hook. Nothing to constrain today: sector bounds
    /// are the codec's call.
    fn valid_aux(&self, _frame: &CommandFrame) -> bool {
        true
    }

    fn process_drive_command(&mut self, drive: u8, frame: &CommandFrame) {
        match frame.command {
            CMD_READ => self.cmd_read(drive, frame),
            CMD_WRITE | CMD_PUT => self.cmd_write(drive, frame),
            CMD_STATUS => self.cmd_status(drive),
            CMD_FORMAT => self.cmd_format(drive, Density::Single),
            CMD_FORMAT_MD => self.cmd_format(drive, Density::Enhanced),
            _ => {}
        }
    }

    fn sector_size_of(&mut self, drive: u8) -> usize {
        self.drives
            .status(drive)
            .map_or(SECTOR_SIZE_SD as usize, |s| s.sector_size as usize)
    }

    fn cmd_read(&mut self, drive: u8, frame: &CommandFrame) {
        let started = self.port.now_ms();
        self.port.delay_ms(DELAY_T2_MS);
        self.port.send(ACK);

        let packet = self
            .drives
            .read_sector(drive, frame.sector(), &mut self.sector_buf);
        let (len, good, settle_ms, paced) = match packet {
            Some(p) => (p.sector_size as usize, !p.error, p.read_delay_ms, p.paced),
            None => {
                // no image or hard failure: error plus a zeroed data frame
                let len = self.sector_size_of(drive);
                self.sector_buf[..len].fill(0);
                (len, false, 0, false)
            }
        };

        if settle_ms > 0 {
            self.port.delay_ms(settle_ms);
        }
        self.port.delay_ms(DELAY_T5_MS);
        self.port.send(if good { COMPLETE } else { ERR });

        self.port.delay_us(DATA_FRAME_GAP_US);
        for i in 0..len {
            self.port.send(self.sector_buf[i]);
        }
        self.port.send(sio_checksum(&self.sector_buf[..len]));
        self.port.flush();

        if paced {
            // protection loaders time sector reads; round the service time
            // up to the next quantum
            let elapsed = self.port.now_ms().saturating_sub(started);
            let over = elapsed % PACED_READ_QUANTUM_MS;
            if over != 0 {
                self.port.delay_ms((PACED_READ_QUANTUM_MS - over) as u32);
            }
        }
    }

    fn cmd_write(&mut self, drive: u8, frame: &CommandFrame) {
        self.port.delay_ms(DELAY_T2_MS);
        self.port.send(ACK);

        let expected = self.sector_size_of(drive) + 1;
        self.pending_write = Some(PendingWrite {
            drive,
            sector: frame.sector(),
            expected,
        });
        self.data_buf.clear();
        self.enter(ChannelState::ReadDataFrame);
    }

    fn finish_data_frame(&mut self) {
        let Some(write) = self.pending_write.take() else {
            return;
        };
        let payload_len = write.expected - 1;

        let received = self.data_buf[payload_len];
        if received == sio_checksum(&self.data_buf[..payload_len]) {
            self.port.delay_ms(DELAY_T4_MS);
            self.port.send(ACK);

            self.port.delay_ms(DELAY_T5_MS);
            let ok = self
                .drives
                .write_sector(write.drive, write.sector, &self.data_buf[..payload_len]);
            if !ok {
                debug!("write to drive {} failed", write.drive);
            }
            self.port.send(if ok { COMPLETE } else { ERR });
        } else {
            debug!("data frame checksum mismatch");
            self.port.delay_ms(DELAY_T4_MS);
            self.port.send(NAK);
        }
        self.port.flush();
    }

    fn cmd_status(&mut self, drive: u8) {
        self.port.delay_ms(DELAY_T2_MS);
        self.port.send(ACK);
        self.port.delay_ms(DELAY_T5_MS);
        self.port.send(COMPLETE);

        let status = self
            .drives
            .status(drive)
            .unwrap_or_else(|| DriveStatus::new(SECTOR_SIZE_SD));
        let bytes = status.status_frame.to_bytes();

        self.port.delay_us(DATA_FRAME_GAP_US);
        for &byte in &bytes {
            self.port.send(byte);
        }
        self.port.send(sio_checksum(&bytes));
        self.port.flush();
    }

    fn cmd_format(&mut self, drive: u8, density: Density) {
        self.port.delay_ms(DELAY_T2_MS);
        self.port.send(ACK);

        if self.drives.format(drive, density) {
            self.port.delay_ms(DELAY_T5_MS);
            self.port.send(COMPLETE);

            let len = match density {
                Density::Single => SECTOR_SIZE_SD as usize,
                _ => self.sector_size_of(drive),
            };
            // "no bad sectors" report: fence bytes around a zero interior
            self.sector_buf[..len].fill(0);
            self.sector_buf[0] = 0xFF;
            self.sector_buf[1] = 0xFF;
            self.sector_buf[len - 2] = 0xFF;
            self.sector_buf[len - 1] = 0xFF;

            self.port.delay_us(DATA_FRAME_GAP_US);
            for i in 0..len {
                self.port.send(self.sector_buf[i]);
            }
            self.port.send(sio_checksum(&self.sector_buf[..len]));
        } else {
            self.port.delay_ms(DELAY_T5_MS);
            self.port.send(ERR);
        }
        self.port.flush();
    }

    fn dump_frame(&self, frame: &CommandFrame) {
        let label = if frame.device == DEVICE_SDRIVE {
            SDriveHandler::command_label(frame.command).unwrap_or("??")
        } else {
            match frame.command {
                CMD_STATUS => "STATUS",
                CMD_POLL => "POLL",
                CMD_READ => "READ",
                CMD_WRITE => "WRITE",
                CMD_PUT => "PUT",
                CMD_FORMAT => "FORMAT",
                CMD_FORMAT_MD => "FORMAT MD",
                _ => "??",
            }
        };
        if matches!(frame.command, CMD_READ | CMD_WRITE | CMD_PUT)
            && frame.device != DEVICE_SDRIVE
        {
            debug!(
                "{:02X} {:02X} {:02X} {:02X} {:02X} : {} {}",
                frame.device,
                frame.command,
                frame.aux1,
                frame.aux2,
                frame.checksum,
                label,
                frame.sector()
            );
        } else {
            debug!(
                "{:02X} {:02X} {:02X} {:02X} {:02X} : {}",
                frame.device, frame.command, frame.aux1, frame.aux2, frame.checksum, label
            );
        }
    }
}
