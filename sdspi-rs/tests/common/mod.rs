//! An in-memory SDHC card that speaks the SPI-mode protocol byte by byte.

#![allow(dead_code)]

use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use sdspi_rs::{
    sdcard::{
        crc16,
        crc7,
        BLOCK_SIZE,
    },
    SdCard,
    SdCardOptions,
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
};

/// (15 + 1) * 512 KiB = 8 MiB
pub const TEST_C_SIZE: u32 = 15;
pub const TEST_MEMORY_SIZE: u64 = (TEST_C_SIZE as u64 + 1) * 512 * 1024;

pub const CID: [u8; 16] = [
    0x03, 0x53, 0x44, 0x53, 0x55, 0x33, 0x32, 0x47, 0x80, 0x12, 0x34, 0x56, 0x78, 0x01, 0x4a, 0x9b,
];

#[derive(Debug, PartialEq)]
pub struct BusError;

enum Mode {
    Command,
    Reading { next_block: u64 },
    WriteWait { block: u64, multi: bool },
    Receiving { block: u64, multi: bool, data: Vec<u8> },
}

pub struct CardState {
    pub storage: Vec<u8>,
    pub c_size: u32,
    /// Every command index received, CMD55 included.
    pub commands: Vec<u8>,
    pub stop_tokens: usize,
    pub delayed_ms: u64,
    pub exchanged: usize,

    pub cmd0_response: u8,
    pub app_cmd_response: Option<u8>,
    pub stop_response: Option<u8>,
    pub if_cond_echo: Option<u8>,
    pub version_one: bool,
    pub high_capacity: bool,
    pub acmd41_busy: u32,
    pub data_response: Option<u8>,
    pub read_token: Option<u8>,
    pub mute: bool,
    pub fail_after: Option<usize>,
    /// Hold the line low forever once a block has been programmed.
    pub stuck_busy: bool,

    selected: bool,
    idle: bool,
    app_cmd: bool,
    crc_on: bool,
    holding_busy: bool,
    frame: Vec<u8>,
    out: VecDeque<u8>,
    mode: Mode,
}

impl CardState {
    pub fn new(c_size: u32) -> CardState {
        let size = (c_size as usize + 1) * 512 * 1024;
        CardState {
            storage: (0..size).map(|i| (i % 251) as u8).collect(),
            c_size,
            commands: Vec::new(),
            stop_tokens: 0,
            delayed_ms: 0,
            exchanged: 0,
            cmd0_response: 0x01,
            app_cmd_response: None,
            stop_response: None,
            if_cond_echo: None,
            version_one: false,
            high_capacity: true,
            acmd41_busy: 3,
            data_response: None,
            read_token: None,
            mute: false,
            fail_after: None,
            stuck_busy: false,
            selected: false,
            idle: false,
            app_cmd: false,
            crc_on: false,
            holding_busy: false,
            frame: Vec::new(),
            out: VecDeque::new(),
            mode: Mode::Command,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn count(&self, index: u8) -> usize {
        self.commands.iter().filter(|&&c| c == index).count()
    }

    pub fn csd(&self) -> [u8; 16] {
        let c = self.c_size;
        let mut csd = [
            0x40,
            0x0e,
            0x00,
            0x32,
            0x5b,
            0x59,
            0x00,
            ((c >> 16) & 0x3f) as u8,
            (c >> 8) as u8,
            c as u8,
            0x7f,
            0x80,
            0x0a,
            0x40,
            0x00,
            0x00,
        ];
        csd[15] = crc7(&csd[..15]);
        csd
    }

    fn exchange(&mut self, input: u8) -> u8 {
        self.exchanged += 1;
        if !self.selected || self.mute {
            return 0xff;
        }
        if let Mode::Reading { next_block } = self.mode {
            if self.out.is_empty() {
                self.queue_block(next_block);
                self.mode = Mode::Reading {
                    next_block: next_block + 1,
                };
            }
        }
        let output = self.out.pop_front().unwrap_or(if self.holding_busy { 0x00 } else { 0xff });
        self.process(input);
        output
    }

    fn process(&mut self, input: u8) {
        match &mut self.mode {
            Mode::WriteWait { block, multi } => {
                let (block, multi) = (*block, *multi);
                match input {
                    0xfe if !multi => self.start_receiving(block, multi),
                    0xfc if multi => self.start_receiving(block, multi),
                    0xfd if multi => {
                        self.stop_tokens += 1;
                        self.mode = Mode::Command;
                        self.out.extend([0xff, 0x00, 0x00, 0x00].iter());
                    },
                    _ => (),
                }
            },
            Mode::Receiving { data, .. } => {
                data.push(input);
                if data.len() == BLOCK_SIZE + 2 {
                    self.finish_block();
                }
            },
            Mode::Command | Mode::Reading { .. } => {
                if self.frame.is_empty() && input & 0xc0 != 0x40 {
                    return;
                }
                self.frame.push(input);
                if self.frame.len() == 6 {
                    let frame = std::mem::take(&mut self.frame);
                    self.command(&frame);
                }
            },
        }
    }

    fn start_receiving(&mut self, block: u64, multi: bool) {
        self.mode = Mode::Receiving {
            block,
            multi,
            data: Vec::with_capacity(BLOCK_SIZE + 2),
        };
    }

    fn finish_block(&mut self) {
        let (block, multi, data) = match std::mem::replace(&mut self.mode, Mode::Command) {
            Mode::Receiving { block, multi, data } => (block, multi, data),
            _ => unreachable!(),
        };
        let crc = u16::from_be_bytes([data[BLOCK_SIZE], data[BLOCK_SIZE + 1]]);
        let token = match self.data_response {
            Some(token) => token,
            None if self.crc_on && crc != crc16(&data[..BLOCK_SIZE]) => 0x0b,
            None => {
                let start = block as usize * BLOCK_SIZE;
                self.storage[start..start + BLOCK_SIZE].copy_from_slice(&data[..BLOCK_SIZE]);
                0x05
            },
        };
        self.out.extend([token, 0x00, 0x00].iter());
        self.holding_busy = self.stuck_busy;
        if token & 0x0e == 0x04 && multi {
            self.mode = Mode::WriteWait {
                block: block + 1,
                multi,
            };
        }
    }

    fn queue_packet(&mut self, payload: &[u8]) {
        self.out.push_back(0xff);
        if let Some(token) = self.read_token {
            self.out.push_back(token);
            return;
        }
        self.out.push_back(0xfe);
        self.out.extend(payload.iter());
        self.out.extend(crc16(payload).to_be_bytes().iter());
    }

    fn queue_block(&mut self, block: u64) {
        let start = block as usize * BLOCK_SIZE;
        if start + BLOCK_SIZE > self.storage.len() {
            return;
        }
        let payload = self.storage[start..start + BLOCK_SIZE].to_vec();
        self.queue_packet(&payload);
    }

    fn command(&mut self, frame: &[u8]) {
        let index = frame[0] & 0x3f;
        let arg = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        self.commands.push(index);
        let app = std::mem::replace(&mut self.app_cmd, false);
        self.out.clear();
        if let Mode::Reading { .. } = self.mode {
            if index != 12 {
                return;
            }
        }

        // N_CR: one byte before the card answers
        self.out.push_back(0xff);

        if (self.crc_on || index == 0 || index == 8) && frame[5] != crc7(&frame[..5]) {
            self.out.push_back(self.idle_bit() | 0x08);
            return;
        }

        match (app, index) {
            (_, 0) => {
                self.idle = true;
                self.crc_on = false;
                self.mode = Mode::Command;
                self.out.push_back(self.cmd0_response);
            },
            (_, 55) => match self.app_cmd_response {
                Some(r1) => self.out.push_back(r1),
                None => {
                    self.app_cmd = true;
                    self.out.push_back(self.idle_bit());
                },
            },
            (true, 41) => {
                if self.acmd41_busy > 0 {
                    self.acmd41_busy -= 1;
                } else {
                    self.idle = false;
                }
                self.out.push_back(self.idle_bit());
            },
            (_, 8) if self.version_one => self.out.push_back(self.idle_bit() | 0x04),
            (_, 8) => {
                let echo = self.if_cond_echo.unwrap_or(arg as u8);
                let r7 = [self.idle_bit(), 0x00, 0x00, ((arg >> 8) & 0x0f) as u8, echo];
                self.out.extend(r7.iter());
            },
            (_, 59) => {
                self.crc_on = arg & 1 != 0;
                self.out.push_back(self.idle_bit());
            },
            (_, 58) => {
                let ocr = [
                    self.idle_bit(),
                    if self.high_capacity { 0xc0 } else { 0x80 },
                    0xff,
                    0x80,
                    0x00,
                ];
                self.out.extend(ocr.iter());
            },
            (_, 9) => {
                self.out.push_back(self.idle_bit());
                let csd = self.csd();
                self.queue_packet(&csd);
            },
            (_, 10) => {
                self.out.push_back(self.idle_bit());
                self.queue_packet(&CID);
            },
            (_, 12) => {
                self.mode = Mode::Command;
                self.out.push_back(self.stop_response.unwrap_or(0x00));
                self.out.extend([0x00, 0x00].iter());
            },
            (_, 13) => self.out.extend([self.idle_bit(), 0x00].iter()),
            (_, 17) => {
                self.out.push_back(self.idle_bit());
                self.queue_block(u64::from(arg));
            },
            (_, 18) => {
                self.out.push_back(self.idle_bit());
                self.mode = Mode::Reading {
                    next_block: u64::from(arg),
                };
            },
            (_, 24) | (_, 25) => {
                self.out.push_back(self.idle_bit());
                self.mode = Mode::WriteWait {
                    block: u64::from(arg),
                    multi: index == 25,
                };
            },
            _ => self.out.push_back(self.idle_bit() | 0x04),
        }
    }

    fn idle_bit(&self) -> u8 {
        if self.idle {
            0x01
        } else {
            0x00
        }
    }
}

pub type SharedCard = Rc<RefCell<CardState>>;

pub struct FakeSpi {
    card: SharedCard,
    received: u8,
}

impl FullDuplex<u8> for FakeSpi {
    type Error = BusError;

    fn read(&mut self) -> nb::Result<u8, BusError> {
        Ok(self.received)
    }

    fn send(&mut self, byte: u8) -> nb::Result<(), BusError> {
        let mut card = self.card.borrow_mut();
        if let Some(limit) = card.fail_after {
            if card.exchanged >= limit {
                return Err(nb::Error::Other(BusError));
            }
        }
        self.received = card.exchange(byte);
        Ok(())
    }
}

pub struct FakeCs(SharedCard);

impl OutputPin for FakeCs {
    type Error = void::Void;

    fn set_low(&mut self) -> Result<(), void::Void> {
        self.0.borrow_mut().selected = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), void::Void> {
        let mut card = self.0.borrow_mut();
        card.selected = false;
        card.frame.clear();
        Ok(())
    }
}

pub struct FakeDelay(SharedCard);

impl DelayMs<u32> for FakeDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().delayed_ms += u64::from(ms);
    }
}

pub type TestCard = SdCard<FakeSpi, FakeCs, FakeDelay>;

pub fn bus(state: CardState) -> (SharedCard, FakeSpi, FakeCs, FakeDelay) {
    let card = Rc::new(RefCell::new(state));
    (
        card.clone(),
        FakeSpi {
            card: card.clone(),
            received: 0xff,
        },
        FakeCs(card.clone()),
        FakeDelay(card),
    )
}

pub fn init_with(state: CardState, options: SdCardOptions) -> (SharedCard, Result<TestCard, sdspi_rs::SdCardError>) {
    let (card, spi, cs, delay) = bus(state);
    let sdcard = SdCard::new_with_options(spi, cs, delay, options).map_err(|e| e.error());
    (card, sdcard)
}

/// A freshly initialized 8 MiB card, with the init commands cleared from the log.
pub fn ready_card() -> (SharedCard, TestCard) {
    let (card, spi, cs, delay) = bus(CardState::new(TEST_C_SIZE));
    let sdcard = match SdCard::new(spi, cs, delay) {
        Ok(sdcard) => sdcard,
        Err(e) => panic!("init failed: {:?}", e),
    };
    card.borrow_mut().commands.clear();
    (card, sdcard)
}
