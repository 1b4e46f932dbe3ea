use super::{
    constants::*,
    CardSpecificData,
    SdCardError,
};
use core::fmt;
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use log::debug;

/// Runtime knobs for a card session; `Default` uses the values from
/// [`constants`](super::constants).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdCardOptions {
    /// How many times CMD0 is sent before giving up on entering SPI mode.
    pub cmd0_retries: u8,
    /// Bytes polled (1 ms apart) while waiting for a response or for the card to go idle.
    pub poll_attempts: u32,
    /// ACMD41 attempts (1 ms apart) while waiting for the card to leave the idle state.
    pub init_attempts: u32,
}

impl Default for SdCardOptions {
    fn default() -> Self {
        SdCardOptions {
            cmd0_retries: SD_CMD0_RETRY_COUNT,
            poll_attempts: SD_POLL_ATTEMPTS,
            init_attempts: SD_INIT_ATTEMPTS,
        }
    }
}

/// A card that failed to come up. The bus, chip select and delay are kept so
/// the caller can retry or reuse them.
pub struct InitError<SPI, CS, DELAY> {
    error: SdCardError,
    spi: SPI,
    cs: CS,
    delay: DELAY,
}

impl<SPI, CS, DELAY> InitError<SPI, CS, DELAY> {
    #[inline(always)]
    pub fn error(&self) -> SdCardError {
        self.error
    }

    pub fn release(self) -> (SPI, CS, DELAY) {
        (self.spi, self.cs, self.delay)
    }
}

impl<SPI, CS, DELAY> fmt::Debug for InitError<SPI, CS, DELAY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitError").field("error", &self.error).finish()
    }
}

impl<SPI, CS, DELAY> From<InitError<SPI, CS, DELAY>> for SdCardError {
    fn from(e: InitError<SPI, CS, DELAY>) -> SdCardError {
        e.error
    }
}

/// An initialized SDHC/SDXC card on an SPI bus.
///
/// The card owns the bus, its chip-select pin and a delay source until it is
/// [released](SdCard::release). All calls are blocking and not reentrant; share
/// a card between contexts behind a `RefCell` or mutex.
pub struct SdCard<SPI, CS, DELAY> {
    pub(crate) options: SdCardOptions,
    pub(crate) csd: CardSpecificData,
    spi: SPI,
    cs: CS,
    delay: DELAY,
}

impl<SPI, CS, DELAY> SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    pub fn new(spi: SPI, cs: CS, delay: DELAY) -> Result<SdCard<SPI, CS, DELAY>, InitError<SPI, CS, DELAY>> {
        SdCard::new_with_options(spi, cs, delay, SdCardOptions::default())
    }

    pub fn new_with_options(
        spi: SPI,
        cs: CS,
        delay: DELAY,
        options: SdCardOptions,
    ) -> Result<SdCard<SPI, CS, DELAY>, InitError<SPI, CS, DELAY>> {
        let mut sdcard = SdCard {
            options,
            csd: CardSpecificData::default(),
            spi,
            cs,
            delay,
        };

        if let Err(error) = sdcard.start() {
            let (spi, cs, delay) = sdcard.release();
            return Err(InitError {
                error,
                spi,
                cs,
                delay,
            });
        }
        debug!(
            "SD card ready: c_size = {}, {} bytes",
            sdcard.csd.c_size(),
            sdcard.csd.memory_size()
        );

        Ok(sdcard)
    }

    fn start(&mut self) -> Result<(), SdCardError> {
        self.power_up()?;
        self.csd = self.with_selected(|card| card.initialize())?;
        Ok(())
    }

    /// End the session and hand back the bus, chip select and delay.
    pub fn release(self) -> (SPI, CS, DELAY) {
        (self.spi, self.cs, self.delay)
    }

    /// Total addressable bytes, computed from the CSD at init.
    #[inline(always)]
    pub fn memory_size(&self) -> u64 {
        self.csd.memory_size()
    }

    #[inline(always)]
    pub fn num_blocks(&self) -> u64 {
        self.csd.memory_size() >> BLOCK_SHIFT
    }

    #[inline(always)]
    pub fn card_specific_data(&self) -> &CardSpecificData {
        &self.csd
    }

    #[inline(always)]
    pub fn options(&self) -> &SdCardOptions {
        &self.options
    }

    /// Run `f` with chip select asserted; chip select is released whether or
    /// not `f` succeeds, and the first error wins.
    pub(crate) fn with_selected<T, F>(&mut self, f: F) -> Result<T, SdCardError>
    where
        F: FnOnce(&mut Self) -> Result<T, SdCardError>,
    {
        self.select()?;
        let res = f(self);
        let unselected = self.unselect();
        let value = res?;
        unselected?;
        Ok(value)
    }

    pub(crate) fn power_up(&mut self) -> Result<(), SdCardError> {
        // Need to hold CS and MOSI high for at least 74 clock cycles;
        // each transfer takes 8 clock cycles so repeating for 10 times is sufficient
        self.cs.set_high().map_err(|_| SdCardError::ChipSelect)?;
        for _ in 0..SD_POWER_UP_BYTES {
            self.transfer(IDLE_BYTE)?;
        }
        Ok(())
    }

    #[inline(always)]
    fn select(&mut self) -> Result<(), SdCardError> {
        // Set CS to low to indicate we're talking
        self.cs.set_low().map_err(|_| SdCardError::ChipSelect)
    }

    fn unselect(&mut self) -> Result<(), SdCardError> {
        // Set CS to high when we're all finished, then clock one more byte so
        // the card lets go of MISO
        self.cs.set_high().map_err(|_| SdCardError::ChipSelect)?;
        self.transfer(IDLE_BYTE)?;
        Ok(())
    }

    pub(crate) fn transfer(&mut self, byte: u8) -> Result<u8, SdCardError> {
        nb::block!(self.spi.send(byte)).map_err(|_| SdCardError::Transport)?;
        nb::block!(self.spi.read()).map_err(|_| SdCardError::Transport)
    }

    /// Exchange `buf` in place: each byte is sent and replaced by what the card drove back.
    pub(crate) fn transfer_bytes(&mut self, buf: &mut [u8]) -> Result<(), SdCardError> {
        for byte in buf.iter_mut() {
            *byte = self.transfer(*byte)?;
        }
        Ok(())
    }

    pub(crate) fn write_bytes(&mut self, buf: &[u8]) -> Result<(), SdCardError> {
        for byte in buf {
            self.transfer(*byte)?;
        }
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
