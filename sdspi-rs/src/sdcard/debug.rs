use super::{
    cardinfo::{
        CardId,
        CardSpecificData,
    },
    SdCardError,
};
use ufmt::{
    uDebug,
    uWrite,
    uwrite,
    Formatter,
};

impl uDebug for CardId {
    fn fmt<W>(&self, out: &mut Formatter<W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        uwrite!(
            out,
            "  Manufacturer ID:  {} ({})\n",
            self.manufacturer_name(),
            self.manufacturer_id()
        )?;
        uwrite!(
            out,
            "  OEM ID:           {}{}\n",
            self.oem_id().0 as char,
            self.oem_id().1 as char
        )?;
        uwrite!(out, "  Product name:     ")?;
        for c in self.product_name().iter() {
            out.write_char(*c as char)?;
        }
        out.write_char('\n')?;
        uwrite!(
            out,
            "  Product revision: {}.{}\n",
            self.product_revision().0,
            self.product_revision().1
        )?;
        uwrite!(out, "  Serial number:    {}\n", self.product_serial_num())?;
        uwrite!(
            out,
            "  Manufacture date: {}-{}\n",
            self.manufacturing_date().0,
            self.manufacturing_date().1
        )?;
        Ok(())
    }
}

impl uDebug for CardSpecificData {
    fn fmt<W>(&self, out: &mut Formatter<W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        uwrite!(out, "  CSD version:               {}\n", self.version())?;
        uwrite!(out, "  Max data transfer rate:    {} MHz\n", self.tran_speed_mhz())?;
        uwrite!(out, "  Supported command classes: ")?;
        for i in 0..12 {
            out.write_char((((self.supported_command_classes() >> (11 - i)) & 0x01) as u8 + b'0') as char)?;
        }
        out.write_char('\n')?;
        uwrite!(
            out,
            "  Max data read block size:  {}\n",
            self.max_read_block_len_bytes()
        )?;
        uwrite!(out, "  Card capacity:             {} MiB\n", self.capacity_mib())?;
        Ok(())
    }
}

fn error_name(e: SdCardError) -> &'static str {
    match e {
        SdCardError::Transport => "SPI transfer failed",
        SdCardError::ChipSelect => "chip select failed",
        SdCardError::EraseReset => "erase reset",
        SdCardError::IllegalCommand => "illegal command",
        SdCardError::CRCError => "command CRC error",
        SdCardError::EraseSequenceError => "erase sequence error",
        SdCardError::AddressError => "address error",
        SdCardError::ParameterError => "parameter error",
        SdCardError::UnexpectedResponse => "unexpected response",
        SdCardError::AppCommandRejected => "CMD55 rejected",
        SdCardError::GoIdleFailed => "card never entered idle state",
        SdCardError::SDVersionOneUnsupported => "SD version 1 unsupported",
        SdCardError::CardCheckPatternMismatch => "CMD8 check pattern mismatch",
        SdCardError::UnsupportedVoltage => "supply voltage not accepted",
        SdCardError::StandardCapacityUnsupported => "standard capacity card unsupported",
        SdCardError::UnsupportedCSDVersion => "CSD version unsupported",
        SdCardError::WriteCRCError => "write rejected: CRC error",
        SdCardError::WriteError => "write rejected: write error",
        SdCardError::WriteResponseUnknown => "write rejected: unknown data response",
        SdCardError::ReadGeneralError => "read error token: error",
        SdCardError::ReadCCError => "read error token: CC error",
        SdCardError::ReadCardECCFailed => "read error token: card ECC failed",
        SdCardError::ReadOutOfRange => "read error token: out of range",
        SdCardError::ReadMultipleErrors => "read error token: multiple errors",
        SdCardError::UnexpectedToken => "unexpected token",
        SdCardError::DataCRCMismatch => "data CRC mismatch",
        SdCardError::OutOfBounds => "access outside the card",
        SdCardError::Timeout => "timeout",
    }
}

impl uDebug for SdCardError {
    fn fmt<W>(&self, out: &mut Formatter<W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        uwrite!(out, "{} (error code {})", error_name(*self), *self as u8)
    }
}
