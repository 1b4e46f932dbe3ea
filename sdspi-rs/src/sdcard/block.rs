use super::{
    constants::*,
    crc::crc16,
    SdCard,
    SdCardError,
};
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use log::warn;

/// The atomic unit of storage addressing.
pub type Block = [u8; BLOCK_SIZE];

/// Check the data-response token the card sends after a written block.
pub(crate) fn check_data_response(token: u8) -> Result<(), SdCardError> {
    match token & DATA_RES_MASK {
        DATA_RES_ACCEPTED => Ok(()),
        DATA_RES_CRC_ERROR => Err(SdCardError::WriteCRCError),
        DATA_RES_WRITE_ERROR => Err(SdCardError::WriteError),
        _ => Err(SdCardError::WriteResponseUnknown),
    }
}

/// Classify a byte received where a data start token was expected.
pub(crate) fn read_token_error(token: u8) -> SdCardError {
    if token & 0xf0 != 0 || token & 0x0f == 0 {
        return SdCardError::UnexpectedToken;
    }
    match token {
        READ_ERR_GENERAL => SdCardError::ReadGeneralError,
        READ_ERR_CC => SdCardError::ReadCCError,
        READ_ERR_CARD_ECC => SdCardError::ReadCardECCFailed,
        READ_ERR_OUT_OF_RANGE => SdCardError::ReadOutOfRange,
        _ => SdCardError::ReadMultipleErrors,
    }
}

impl<SPI, CS, DELAY> SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    /// Send one block inside an open CMD24/CMD25 transfer and wait for the
    /// card to finish programming it.
    pub fn write_block(&mut self, data: &Block, blocks_in_transfer: u64) -> Result<(), SdCardError> {
        let token = if blocks_in_transfer > 1 {
            WRITE_MULTIPLE_TOKEN
        } else {
            DATA_START_BLOCK
        };
        self.transfer(token)?;
        self.write_bytes(data)?;

        let crc = if cfg!(feature = "crc") { crc16(data) } else { 0xffff };
        self.write_bytes(&crc.to_be_bytes())?;

        let response = self.wait_for_response()?;
        if let Err(e) = check_data_response(response) {
            warn!("block rejected with data response {:#04x}", response);
            return Err(e);
        }
        self.wait_until_not_busy()?;
        Ok(())
    }

    /// Receive one block inside an open CMD17/CMD18 transfer.
    pub fn read_block(&mut self, out: &mut Block) -> Result<(), SdCardError> {
        self.read_data(out)
    }

    /// Wait for the start token, then fill `buf` and consume the trailing CRC.
    pub(crate) fn read_data(&mut self, buf: &mut [u8]) -> Result<(), SdCardError> {
        let token = self.wait_for_response()?;
        if token != DATA_START_BLOCK {
            warn!("expected data start token, got {:#04x}", token);
            return Err(read_token_error(token));
        }

        buf.fill(IDLE_BYTE);
        self.transfer_bytes(buf)?;

        // These two bytes are always sent. They are either a valid CRC, or
        // junk, depending on whether CRC mode was enabled.
        let mut crc = [IDLE_BYTE; 2];
        self.transfer_bytes(&mut crc)?;
        if cfg!(feature = "crc") && u16::from_be_bytes(crc) != crc16(buf) {
            warn!("data CRC mismatch");
            return Err(SdCardError::DataCRCMismatch);
        }
        Ok(())
    }
}
