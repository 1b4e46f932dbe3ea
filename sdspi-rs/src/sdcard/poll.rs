use super::{
    constants::*,
    SdCard,
    SdCardError,
};
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use log::warn;

impl<SPI, CS, DELAY> SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    /// Clock out `0xff` until the card drives something else; returns that byte.
    pub fn wait_for_response(&mut self) -> Result<u8, SdCardError> {
        self.poll_until(|b| b != IDLE_BYTE)
    }

    /// Clock out `0xff` while the card holds the line low during programming.
    pub fn wait_until_not_busy(&mut self) -> Result<u8, SdCardError> {
        self.poll_until(|b| b != BUSY_BYTE)
    }

    fn poll_until<F>(&mut self, done: F) -> Result<u8, SdCardError>
    where
        F: Fn(u8) -> bool,
    {
        for _ in 0..self.options.poll_attempts {
            let byte = self.transfer(IDLE_BYTE)?;
            if done(byte) {
                return Ok(byte);
            }
            self.delay_ms(SD_POLL_INTERVAL_MS);
        }
        warn!("timed out after {} polls", self.options.poll_attempts);
        Err(SdCardError::Timeout)
    }
}
