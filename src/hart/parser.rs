//! # HART Frame Parser
//!
//! Incremental state machine turning a raw byte stream into complete
//! [`Frame`](crate::hart::frame::Frame) values. The machine walks
//! `NotInCommand -> Preamble -> StartDelimiter -> Address -> Command ->
//! DataLength -> Data -> Checksum` and re-arms itself after every completed
//! frame, so it can be fed arbitrary chunks and restarted mid-stream.
//!
//! Two reading modes exist: with preamble parsing the machine hunts for a run
//! of 0xFF bytes and silently resets when the run is shorter than two bytes;
//! without it (gateway relay path, where the preamble is already stripped)
//! the first byte fed is taken as the start delimiter.
//!
//! A checksum mismatch still completes the frame, with its data emptied.
//! Callers that need to distinguish the soft failure check for the empty
//! payload; discarding the frame instead would stall senders waiting on a
//! completion.

use crate::constants::{MIN_PREAMBLE_LENGTH, PREAMBLE_BYTE};
use crate::hart::address::Address;
use crate::hart::delimiter::{AddressType, Delimiter, FrameType};
use crate::hart::frame::Frame;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiveState {
    NotInCommand,
    Preamble,
    StartDelimiter,
    Address,
    Command,
    DataLength,
    Data,
    Checksum,
}

/// Incremental HART frame parser.
pub struct CommandParser {
    parse_preamble: bool,
    state: ReceiveState,
    index: usize,
    preamble_length: usize,
    delimiter: Delimiter,
    address: Address,
    command: u8,
    response_code: Vec<u8>,
    data: Vec<u8>,
    expected_response_code: usize,
    expected_data: usize,
}

impl CommandParser {
    /// Creates a parser. With `parse_preamble` the machine searches for the
    /// 0xFF run; without it the stream is expected to start at the delimiter.
    pub fn new(parse_preamble: bool) -> Self {
        CommandParser {
            parse_preamble,
            state: if parse_preamble {
                ReceiveState::NotInCommand
            } else {
                ReceiveState::Preamble
            },
            index: 0,
            preamble_length: 0,
            delimiter: Delimiter::new(0),
            address: Address::empty_short(),
            command: 0,
            response_code: Vec::new(),
            data: Vec::new(),
            expected_response_code: 0,
            expected_data: 0,
        }
    }

    /// Re-arms the state machine without changing the reading mode.
    pub fn reset(&mut self) {
        self.state = if self.parse_preamble {
            ReceiveState::NotInCommand
        } else {
            ReceiveState::Preamble
        };
        self.index = 0;
        self.preamble_length = 0;
        self.response_code.clear();
        self.data.clear();
        self.expected_response_code = 0;
        self.expected_data = 0;
    }

    /// Feeds a chunk of bytes, returning the last frame completed by it.
    pub fn parse_next_bytes(&mut self, bytes: &[u8]) -> Option<Frame> {
        let mut completed = None;
        for byte in bytes {
            if let Some(frame) = self.parse_byte(*byte) {
                completed = Some(frame);
            }
        }
        completed
    }

    /// Feeds one byte; returns a frame when this byte completes one.
    pub fn parse_byte(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            ReceiveState::NotInCommand => {
                if byte == PREAMBLE_BYTE {
                    self.state = ReceiveState::Preamble;
                    self.index = 1;
                }
                None
            }
            ReceiveState::Preamble => self.parse_preamble_byte(byte),
            ReceiveState::StartDelimiter => {
                self.parse_start_delimiter(byte);
                None
            }
            ReceiveState::Address => {
                self.parse_address_byte(byte);
                None
            }
            ReceiveState::Command => {
                self.command = byte;
                self.state = ReceiveState::DataLength;
                self.index = 0;
                None
            }
            ReceiveState::DataLength => {
                self.parse_data_length(byte);
                None
            }
            ReceiveState::Data => {
                self.parse_data_byte(byte);
                None
            }
            ReceiveState::Checksum => Some(self.finish_frame(byte)),
        }
    }

    fn parse_preamble_byte(&mut self, byte: u8) -> Option<Frame> {
        if byte == PREAMBLE_BYTE {
            self.index += 1;
            return None;
        }

        self.preamble_length = if self.parse_preamble { self.index } else { 0 };
        self.index = 0;

        if self.parse_preamble && self.preamble_length < MIN_PREAMBLE_LENGTH {
            self.reset();
            return None;
        }

        self.state = ReceiveState::StartDelimiter;
        self.parse_byte(byte)
    }

    fn parse_start_delimiter(&mut self, byte: u8) {
        self.delimiter = Delimiter::new(byte);
        self.address = match self.delimiter.address_type() {
            AddressType::Polling => Address::empty_short(),
            AddressType::Unique => Address::empty_long(),
        };
        self.state = ReceiveState::Address;
        self.index = 0;
    }

    fn parse_address_byte(&mut self, byte: u8) {
        self.address.set_byte(self.index, byte);
        self.index += 1;
        if self.index == self.address.byte_len() {
            self.state = ReceiveState::Command;
            self.index = 0;
        }
    }

    fn parse_data_length(&mut self, length: u8) {
        let is_request = self.delimiter.frame_type() == FrameType::MasterToFieldDevice;

        // Responses and burst frames start with the two code bytes, so a
        // length of 1 cannot fit their layout. Requests are all payload and
        // a single data byte is legal (write polling address and friends).
        if length == 1 && !is_request {
            self.reset();
            return;
        }

        if length == 0 {
            self.expected_response_code = 0;
            self.expected_data = 0;
            self.state = ReceiveState::Checksum;
        } else {
            if is_request {
                self.expected_response_code = 0;
                self.expected_data = length as usize;
            } else {
                self.expected_response_code = 2;
                self.expected_data = length as usize - 2;
            }
            self.state = ReceiveState::Data;
        }
        self.index = 0;
    }

    fn parse_data_byte(&mut self, byte: u8) {
        if self.index < self.expected_response_code {
            self.response_code.push(byte);
        } else {
            self.data.push(byte);
        }
        self.index += 1;
        if self.index == self.expected_response_code + self.expected_data {
            self.state = ReceiveState::Checksum;
        }
    }

    fn finish_frame(&mut self, received_checksum: u8) -> Frame {
        let mut frame = Frame {
            preamble_length: self.preamble_length,
            delimiter: self.delimiter,
            address: self.address.clone(),
            command: self.command,
            response_code: std::mem::take(&mut self.response_code),
            data: std::mem::take(&mut self.data),
        };

        if !frame.is_checksum_correct(received_checksum) {
            debug!(
                "checksum mismatch on command {}: expected {:#04x}, received {:#04x}",
                frame.command,
                frame.checksum(),
                received_checksum
            );
            frame.data = Vec::new();
        }

        self.reset();
        frame
    }
}
