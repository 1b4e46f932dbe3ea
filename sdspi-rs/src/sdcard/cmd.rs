use super::{
    constants::*,
    crc::crc7,
    SdCard,
    SdCardError,
};
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use log::{
    trace,
    warn,
};

/// Set on a command index to mark it as an application command, which is
/// sent behind a CMD55 escape.
pub const APP_COMMAND_FLAG: u8 = 0x40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdCommand {
    GoIdleState = 0,
    SendIfCond = 8,
    SendCSD = 9,
    SendCID = 10,
    StopTransmission = 12,
    SendStatus = 13,
    ReadSingleBlock = 17,
    ReadMultipleBlock = 18,
    WriteBlock = 24,
    WriteMultipleBlock = 25,
    AppCommand = 55,
    ReadOCR = 58,
    CRCOnOff = 59,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdAppCommand {
    SendOpCondition = 41,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseType {
    R1,
    R2,
    R3,
    R7,
}

impl ResponseType {
    #[inline(always)]
    pub fn len(self) -> usize {
        match self {
            ResponseType::R1 => 1,
            ResponseType::R2 => 2,
            ResponseType::R3 | ResponseType::R7 => 5,
        }
    }
}

/// One command to send to the card: index (with [`APP_COMMAND_FLAG`] for
/// ACMDs), argument and the shape of the expected response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    index: u8,
    arg: u32,
    response: ResponseType,
}

impl Command {
    pub fn new(cmd: SdCommand, arg: u32) -> Command {
        let response = match cmd {
            SdCommand::SendIfCond => ResponseType::R7,
            SdCommand::ReadOCR => ResponseType::R3,
            SdCommand::SendStatus => ResponseType::R2,
            _ => ResponseType::R1,
        };
        Command {
            index: cmd as u8,
            arg,
            response,
        }
    }

    pub fn app(cmd: SdAppCommand, arg: u32) -> Command {
        Command {
            index: cmd as u8 | APP_COMMAND_FLAG,
            arg,
            response: ResponseType::R1,
        }
    }

    /// The 6-bit command index, without the application flag.
    #[inline(always)]
    pub fn index(&self) -> u8 {
        self.index & 0x3f
    }

    #[inline(always)]
    pub fn is_app(&self) -> bool {
        self.index & APP_COMMAND_FLAG != 0
    }

    #[inline(always)]
    pub fn arg(&self) -> u32 {
        self.arg
    }

    #[inline(always)]
    pub fn response_type(&self) -> ResponseType {
        self.response
    }

    /// Encode the command frame. Without `with_crc` only CMD0 and CMD8 carry a
    /// real CRC (the card always checks those two), every other frame gets a filler.
    pub fn frame(&self, with_crc: bool) -> [u8; 6] {
        // Command format is 01CCCCCCAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAARRRRRRR1
        // where C is the 6-bit command, A is the 32-bit argument, and R is the 7-bit CRC
        let arg = self.arg.to_be_bytes();
        let mut frame = [0x40 | self.index(), arg[0], arg[1], arg[2], arg[3], CRC_FILLER];
        frame[5] = if with_crc {
            crc7(&frame[..5])
        } else if self.index() == SdCommand::GoIdleState as u8 {
            CMD0_CRC
        } else if self.index() == SdCommand::SendIfCond as u8 {
            CMD8_CRC
        } else {
            CRC_FILLER
        };
        frame
    }
}

/// Response bytes captured after a command: the R1 status followed by any
/// extra bytes the response type carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response {
    bytes: [u8; 5],
    len: usize,
}

impl Response {
    #[inline(always)]
    pub fn r1(&self) -> u8 {
        self.bytes[0]
    }

    /// Everything after the R1 byte.
    #[inline(always)]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..self.len]
    }

    /// The 32-bit payload of an R3/R7 response (OCR or echoed interface condition).
    pub fn payload_u32(&self) -> u32 {
        u32::from_be_bytes([self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4]])
    }
}

/// Map an R1 status that isn't the one we were waiting for to an error.
pub(crate) fn r1_error(r1: u8) -> SdCardError {
    if r1 & 0x80 != 0 {
        SdCardError::UnexpectedResponse
    } else if r1 & R1_ILLEGAL_COMMAND != 0 {
        SdCardError::IllegalCommand
    } else if r1 & R1_CRC_ERROR != 0 {
        SdCardError::CRCError
    } else if r1 & R1_ERASE_RESET != 0 {
        SdCardError::EraseReset
    } else if r1 & R1_ERASE_SEQUENCE_ERROR != 0 {
        SdCardError::EraseSequenceError
    } else if r1 & R1_ADDRESS_ERROR != 0 {
        SdCardError::AddressError
    } else if r1 & R1_PARAMETER_ERROR != 0 {
        SdCardError::ParameterError
    } else {
        SdCardError::UnexpectedResponse
    }
}

impl<SPI, CS, DELAY> SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    /// Send a command and capture its response. Application commands are
    /// preceded by CMD55, which must answer with the idle status. Nothing is
    /// retried here.
    pub fn send_command(&mut self, cmd: &Command) -> Result<Response, SdCardError> {
        if cmd.is_app() {
            // Application-specific commands have to be preceded by CMD55 or they will error
            let app = self.send_command_helper(&Command::new(SdCommand::AppCommand, 0))?;
            if app.r1() != R1_IDLE_STATE {
                warn!("CMD55 rejected with {:#04x}", app.r1());
                return Err(SdCardError::AppCommandRejected);
            }
        }
        self.send_command_helper(cmd)
    }

    /// Send a command and require a specific R1 status.
    pub(crate) fn send_card_command(
        &mut self,
        cmd: SdCommand,
        arg: u32,
        expected: u8,
    ) -> Result<Response, SdCardError> {
        let response = self.send_command(&Command::new(cmd, arg))?;
        if response.r1() != expected {
            warn!("CMD{} answered {:#04x}, expected {:#04x}", cmd as u8, response.r1(), expected);
            return Err(r1_error(response.r1()));
        }
        Ok(response)
    }

    fn send_command_helper(&mut self, cmd: &Command) -> Result<Response, SdCardError> {
        let frame = cmd.frame(cfg!(feature = "crc"));
        trace!("CMD{} arg = {:#010x}", cmd.index(), cmd.arg());
        self.write_bytes(&frame)?;

        // The byte clocked out right after CMD12 is left over from the data stream
        if cmd.index() == SdCommand::StopTransmission as u8 {
            self.transfer(IDLE_BYTE)?;
        }

        let mut response = Response {
            bytes: [IDLE_BYTE; 5],
            len: cmd.response_type().len(),
        };
        response.bytes[0] = self.wait_for_response()?;
        for byte in response.bytes[1..response.len].iter_mut() {
            *byte = self.transfer(IDLE_BYTE)?;
        }
        Ok(response)
    }
}
