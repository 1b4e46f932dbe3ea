use super::{
    cardinfo::CardSpecificData,
    cmd::{
        r1_error,
        Command,
        SdAppCommand,
        SdCommand,
    },
    constants::*,
    SdCard,
    SdCardError,
};
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use log::{
    debug,
    warn,
};

impl<SPI, CS, DELAY> SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    /// Walk a freshly powered card from reset to the ready state and read its
    /// CSD. Expects chip select to be asserted.
    pub(crate) fn initialize(&mut self) -> Result<CardSpecificData, SdCardError> {
        self.init_spi()?;
        self.check_sd_version()?;
        if cfg!(feature = "crc") {
            self.enable_crc()?;
        }
        self.wait_until_ready()?;
        self.check_sdhc()?;
        self.read_csd()
    }

    pub(crate) fn init_spi(&mut self) -> Result<(), SdCardError> {
        for attempt in 1..=self.options.cmd0_retries {
            match self.send_command(&Command::new(SdCommand::GoIdleState, 0)) {
                Ok(r) if r.r1() == R1_IDLE_STATE => {
                    debug!("SD card in SPI mode");
                    return Ok(());
                },
                Ok(r) => warn!("CMD0 attempt {} got {:#04x}", attempt, r.r1()),
                Err(SdCardError::Timeout) => warn!("CMD0 attempt {} timed out", attempt),
                Err(e) => return Err(e),
            }
        }
        Err(SdCardError::GoIdleFailed)
    }

    pub(crate) fn check_sd_version(&mut self) -> Result<(), SdCardError> {
        // Older (SDv1) cards won't recognize this command.  The argument
        // 0x1AA means 3.3V and check pattern of 0xAA; the SD card should return
        // the check pattern to ensure correct operation.
        let response = self.send_command(&Command::new(SdCommand::SendIfCond, SEND_IF_COND_ARG))?;
        if response.r1() & R1_ILLEGAL_COMMAND != 0 {
            warn!("CMD8 is an illegal command; SD version 1 cards are unsupported");
            return Err(SdCardError::SDVersionOneUnsupported);
        }
        if response.r1() != R1_IDLE_STATE {
            return Err(r1_error(response.r1()));
        }

        // CMD8 has a 40 bit response, and the last 8 bits should match the
        // check pattern.
        let echo = response.payload();
        if echo[3] != CHECK_PATTERN {
            warn!("CMD8 check pattern came back as {:#04x}", echo[3]);
            return Err(SdCardError::CardCheckPatternMismatch);
        }
        if echo[2] & 0x0f != VOLTAGE_ACCEPTED {
            warn!("CMD8 voltage not accepted: {:#04x}", echo[2]);
            return Err(SdCardError::UnsupportedVoltage);
        }
        Ok(())
    }

    pub(crate) fn enable_crc(&mut self) -> Result<(), SdCardError> {
        // By default in SPI mode only CMD0 and CMD8 are CRC-checked;
        // this command will enable it for all commands
        self.send_card_command(SdCommand::CRCOnOff, 1, R1_IDLE_STATE)?;
        Ok(())
    }

    /// Repeat ACMD41 (host supports SDHC) until the card leaves the idle state.
    pub(crate) fn wait_until_ready(&mut self) -> Result<(), SdCardError> {
        for _ in 0..self.options.init_attempts {
            let response = self.send_command(&Command::app(SdAppCommand::SendOpCondition, ACMD41_HCS))?;
            match response.r1() {
                R1_READY_STATE => return Ok(()),
                R1_IDLE_STATE => self.delay_ms(SD_POLL_INTERVAL_MS),
                b => {
                    warn!("ACMD41 answered {:#04x}", b);
                    return Err(r1_error(b));
                },
            }
        }
        warn!("card still idle after {} ACMD41 attempts", self.options.init_attempts);
        Err(SdCardError::Timeout)
    }

    pub(crate) fn check_sdhc(&mut self) -> Result<(), SdCardError> {
        let ocr = self.send_card_command(SdCommand::ReadOCR, 0, R1_READY_STATE)?.payload_u32();
        if ocr & OCR_CCS == 0 {
            warn!("standard capacity cards are unsupported (OCR = {:#010x})", ocr);
            return Err(SdCardError::StandardCapacityUnsupported);
        }
        debug!("SD card supports SDHC");
        Ok(())
    }

    pub(crate) fn read_csd(&mut self) -> Result<CardSpecificData, SdCardError> {
        self.send_card_command(SdCommand::SendCSD, 0, R1_READY_STATE)?;
        let mut csd = [0u8; 16];
        self.read_data(&mut csd)?;
        CardSpecificData::parse(&csd)
    }
}
