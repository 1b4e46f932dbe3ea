mod block;
mod cardinfo;
mod cmd;
mod constants;
mod crc;
mod debug;
mod init;
mod poll;
mod rwdata;
mod sdcard;
pub mod span;
mod storage;

pub use block::Block;
pub use cardinfo::{
    CardId,
    CardSpecificData,
};
pub use cmd::{
    Command,
    Response,
    ResponseType,
    SdAppCommand,
    SdCommand,
    APP_COMMAND_FLAG,
};
pub use constants::BLOCK_SIZE;
pub use crc::{
    crc16,
    crc7,
};
pub use sdcard::{
    InitError,
    SdCard,
    SdCardOptions,
};

/// Everything that can go wrong while talking to the card.
///
/// Discriminants are stable so a failure can be reported as `e as u8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdCardError {
    Transport = 1,
    ChipSelect,
    EraseReset,
    IllegalCommand,
    CRCError,
    EraseSequenceError,
    AddressError,
    ParameterError,
    UnexpectedResponse,
    AppCommandRejected,
    GoIdleFailed,
    SDVersionOneUnsupported,
    CardCheckPatternMismatch,
    UnsupportedVoltage,
    StandardCapacityUnsupported,
    UnsupportedCSDVersion,
    WriteCRCError,
    WriteError,
    WriteResponseUnknown,
    ReadGeneralError,
    ReadCCError,
    ReadCardECCFailed,
    ReadOutOfRange,
    ReadMultipleErrors,
    UnexpectedToken,
    DataCRCMismatch,
    OutOfBounds,
    Timeout,
}
