pub const BLOCK_SIZE: usize = 512;
pub(crate) const BLOCK_SHIFT: u32 = 9;

// Tokens
pub(crate) const DATA_START_BLOCK: u8 = 0xfe;
pub(crate) const WRITE_MULTIPLE_TOKEN: u8 = 0xfc;
pub(crate) const STOP_TRAN_TOKEN: u8 = 0xfd;
pub(crate) const IDLE_BYTE: u8 = 0xff;
pub(crate) const BUSY_BYTE: u8 = 0x00;

// R1 status bits
pub(crate) const R1_READY_STATE: u8 = 0x00;
pub(crate) const R1_IDLE_STATE: u8 = 0x01;
pub(crate) const R1_ERASE_RESET: u8 = 0x02;
pub(crate) const R1_ILLEGAL_COMMAND: u8 = 0x04;
pub(crate) const R1_CRC_ERROR: u8 = 0x08;
pub(crate) const R1_ERASE_SEQUENCE_ERROR: u8 = 0x10;
pub(crate) const R1_ADDRESS_ERROR: u8 = 0x20;
pub(crate) const R1_PARAMETER_ERROR: u8 = 0x40;

// Data response token, bits 3:1
pub(crate) const DATA_RES_MASK: u8 = 0x0e;
pub(crate) const DATA_RES_ACCEPTED: u8 = 0x05 & DATA_RES_MASK;
pub(crate) const DATA_RES_CRC_ERROR: u8 = 0x0b & DATA_RES_MASK;
pub(crate) const DATA_RES_WRITE_ERROR: u8 = 0x0d & DATA_RES_MASK;

// Read error token bits
pub(crate) const READ_ERR_GENERAL: u8 = 0x01;
pub(crate) const READ_ERR_CC: u8 = 0x02;
pub(crate) const READ_ERR_CARD_ECC: u8 = 0x04;
pub(crate) const READ_ERR_OUT_OF_RANGE: u8 = 0x08;

// CMD8: 2.7-3.6V supply, 0xAA check pattern
pub(crate) const SEND_IF_COND_ARG: u32 = 0x1aa;
pub(crate) const CHECK_PATTERN: u8 = 0xaa;
pub(crate) const VOLTAGE_ACCEPTED: u8 = 0x01;

// ACMD41 host capacity support, OCR card capacity status
pub(crate) const ACMD41_HCS: u32 = 0x4000_0000;
pub(crate) const OCR_CCS: u32 = 0x4000_0000;

// Fixed CRC bytes for the two commands that are always CRC-checked
pub(crate) const CMD0_CRC: u8 = 0x95;
pub(crate) const CMD8_CRC: u8 = 0x87;
pub(crate) const CRC_FILLER: u8 = 0xff;

pub(crate) const SD_POWER_UP_BYTES: usize = 10;
pub(crate) const SD_CMD0_RETRY_COUNT: u8 = 5;
pub(crate) const SD_POLL_ATTEMPTS: u32 = 1000;
pub(crate) const SD_POLL_INTERVAL_MS: u32 = 1;
pub(crate) const SD_INIT_ATTEMPTS: u32 = 2000;
