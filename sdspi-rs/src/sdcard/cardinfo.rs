use super::{
    cmd::SdCommand,
    constants::*,
    SdCard,
    SdCardError,
};
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};

pub struct CardId {
    manufacturer_id: u8,
    oem_id: (u8, u8),
    product_name: [u8; 5],
    product_revision: (u8, u8),
    product_serial_num: u32,
    manufacturing_date_year: u16,
    manufacturing_date_month: u8,
}

impl CardId {
    pub(crate) fn parse(data: &[u8; 16]) -> CardId {
        CardId {
            manufacturer_id: data[0],
            oem_id: (data[1], data[2]),
            product_name: [data[3], data[4], data[5], data[6], data[7]],
            product_revision: (data[8] >> 4, data[8] & 0x0f),
            product_serial_num: u32::from_be_bytes([data[9], data[10], data[11], data[12]]),
            manufacturing_date_year: 2000 + ((((data[13] & 0x0f) as u16) << 4) | (data[14] >> 4) as u16),
            manufacturing_date_month: data[14] & 0x0f,
        }
    }

    #[inline(always)]
    pub fn manufacturer_id(&self) -> u8 {
        self.manufacturer_id
    }

    pub fn manufacturer_name(&self) -> &'static str {
        match self.manufacturer_id {
            0x01 => "Panasonic",
            0x02 => "Toshiba",
            0x03 => "SanDisk",
            0x1b => "Samsung",
            0x1d => "AData",
            0x27 => "Phison",
            0x28 => "Lexar",
            0x31 => "Silicon Power",
            0x41 => "Kingston",
            0x74 => "Transcend",
            0x76 => "Patriot",
            0x82 => "Sony",
            0x9c => "Angelbird",
            _ => "Unknown",
        }
    }

    #[inline(always)]
    pub fn oem_id(&self) -> (u8, u8) {
        self.oem_id
    }

    #[inline(always)]
    pub fn product_name(&self) -> [u8; 5] {
        self.product_name
    }

    #[inline(always)]
    pub fn product_revision(&self) -> (u8, u8) {
        self.product_revision
    }

    #[inline(always)]
    pub fn product_serial_num(&self) -> u32 {
        self.product_serial_num
    }

    #[inline(always)]
    pub fn manufacturing_date(&self) -> (u16, u8) {
        (self.manufacturing_date_year, self.manufacturing_date_month)
    }
}

/// The parts of a version 2.0 CSD register this driver uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CardSpecificData {
    version: u8,
    tran_speed_mhz: u8,
    supported_command_classes: u16,
    max_read_block_len_bytes: usize,
    c_size: u32,
}

impl CardSpecificData {
    /// Decode the 16 CSD bytes; only CSD version 2.0 (SDHC/SDXC) is accepted.
    pub fn parse(data: &[u8; 16]) -> Result<CardSpecificData, SdCardError> {
        let version = (data[0] >> 6) + 1;
        if version != 2 {
            return Err(SdCardError::UnsupportedCSDVersion);
        }
        Ok(CardSpecificData {
            version,
            tran_speed_mhz: match data[3] {
                0x32 => 25,
                0x5a => 50,
                _ => 0,
            },
            supported_command_classes: ((data[4] as u16) << 4) | ((data[5] as u16) >> 4),
            max_read_block_len_bytes: match data[5] & 0x0f {
                0x09 => BLOCK_SIZE,
                _ => 0,
            },
            c_size: ((data[7] & 0x3f) as u32) << 16 | (data[8] as u32) << 8 | (data[9] as u32),
        })
    }

    #[inline(always)]
    pub fn version(&self) -> u8 {
        self.version
    }

    #[inline(always)]
    pub fn tran_speed_mhz(&self) -> u8 {
        self.tran_speed_mhz
    }

    #[inline(always)]
    pub fn supported_command_classes(&self) -> u16 {
        self.supported_command_classes
    }

    #[inline(always)]
    pub fn max_read_block_len_bytes(&self) -> usize {
        self.max_read_block_len_bytes
    }

    #[inline(always)]
    pub fn c_size(&self) -> u32 {
        self.c_size
    }

    /// `(c_size + 1) * 512 KiB`; zero until the card has been initialized.
    pub fn memory_size(&self) -> u64 {
        if self.version == 0 {
            return 0;
        }
        (self.c_size as u64 + 1) * 512 * 1024
    }

    #[inline(always)]
    pub fn capacity_mib(&self) -> u32 {
        (self.memory_size() >> 20) as u32
    }
}

impl<SPI, CS, DELAY> SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    pub fn read_card_id(&mut self) -> Result<CardId, SdCardError> {
        self.with_selected(|card| {
            card.send_card_command(SdCommand::SendCID, 0, R1_READY_STATE)?;
            let mut cid = [0u8; 16];
            card.read_data(&mut cid)?;
            Ok(CardId::parse(&cid))
        })
    }

    /// CMD13: the two status bytes of the R2 response, R1 first.
    pub fn card_status(&mut self) -> Result<u16, SdCardError> {
        self.with_selected(|card| {
            let response = card.send_card_command(SdCommand::SendStatus, 0, R1_READY_STATE)?;
            Ok(u16::from_be_bytes([response.r1(), response.payload()[0]]))
        })
    }
}
