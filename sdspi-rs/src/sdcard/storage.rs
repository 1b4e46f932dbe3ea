use super::{
    SdCard,
    SdCardError,
};
use core::convert::TryFrom;
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use embedded_storage::{
    ReadStorage,
    Storage,
};

impl<SPI, CS, DELAY> ReadStorage for SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    type Error = SdCardError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), SdCardError> {
        SdCard::read(self, u64::from(offset), bytes)
    }

    fn capacity(&self) -> usize {
        usize::try_from(self.memory_size()).unwrap_or(usize::MAX)
    }
}

impl<SPI, CS, DELAY> Storage for SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), SdCardError> {
        SdCard::write(self, u64::from(offset), bytes)
    }
}
