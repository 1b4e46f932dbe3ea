use super::{
    block::Block,
    cmd::SdCommand,
    constants::*,
    span::{
        BlockSpan,
        Chunk,
    },
    SdCard,
    SdCardError,
};
use core::convert::TryFrom;
use embedded_hal::{
    blocking::delay::DelayMs,
    digital::v2::OutputPin,
    spi::FullDuplex,
};
use log::warn;

fn block_arg(block: u64) -> Result<u32, SdCardError> {
    u32::try_from(block).map_err(|_| SdCardError::OutOfBounds)
}

impl<SPI, CS, DELAY> SdCard<SPI, CS, DELAY>
where
    SPI: FullDuplex<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u32>,
{
    /// Read `buf.len()` bytes starting at byte `address`.
    pub fn read(&mut self, address: u64, buf: &mut [u8]) -> Result<(), SdCardError> {
        self.check_bounds(address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let span = BlockSpan::new(address, buf.len() as u64);
        self.with_selected(|card| card.read_span(span, buf))
    }

    /// Write `buf` starting at byte `address`. Blocks that are only partly
    /// covered are read back first so the bytes around `buf` are preserved.
    pub fn write(&mut self, address: u64, buf: &[u8]) -> Result<(), SdCardError> {
        self.check_bounds(address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let span = BlockSpan::new(address, buf.len() as u64);

        // The merges need their own reads, so they have to happen before the
        // write transfer is opened
        let head = match span.first_chunk() {
            Some(chunk) if !chunk.is_full() => Some(self.merge_block(&chunk, buf)?),
            _ => None,
        };
        let tail = match span.last_chunk() {
            Some(chunk) if span.num_blocks() > 1 && !chunk.is_full() => Some(self.merge_block(&chunk, buf)?),
            _ => None,
        };

        self.with_selected(|card| card.write_span(span, buf, head.as_ref(), tail.as_ref()))
    }

    fn check_bounds(&self, address: u64, len: usize) -> Result<(), SdCardError> {
        match address.checked_add(len as u64) {
            Some(end) if end <= self.memory_size() => Ok(()),
            _ => {
                warn!(
                    "access of {} bytes at {:#x} is outside the card ({} bytes)",
                    len,
                    address,
                    self.memory_size()
                );
                Err(SdCardError::OutOfBounds)
            },
        }
    }

    fn read_span(&mut self, span: BlockSpan, buf: &mut [u8]) -> Result<(), SdCardError> {
        let count = span.num_blocks();
        let cmd = if count == 1 {
            SdCommand::ReadSingleBlock
        } else {
            SdCommand::ReadMultipleBlock
        };
        self.send_card_command(cmd, block_arg(span.first_block())?, R1_READY_STATE)?;

        for chunk in span.chunks() {
            if chunk.is_full() {
                let block = <&mut Block>::try_from(&mut buf[chunk.buf_range]).map_err(|_| SdCardError::OutOfBounds)?;
                self.read_block(block)?;
            } else {
                let mut block = [0u8; BLOCK_SIZE];
                self.read_block(&mut block)?;
                buf[chunk.buf_range].copy_from_slice(&block[chunk.block_range]);
            }
        }

        if count > 1 {
            self.stop_read()?;
        }
        Ok(())
    }

    fn write_span(
        &mut self,
        span: BlockSpan,
        buf: &[u8],
        head: Option<&Block>,
        tail: Option<&Block>,
    ) -> Result<(), SdCardError> {
        let count = span.num_blocks();
        let cmd = if count == 1 {
            SdCommand::WriteBlock
        } else {
            SdCommand::WriteMultipleBlock
        };
        self.send_card_command(cmd, block_arg(span.first_block())?, R1_READY_STATE)?;

        for (i, chunk) in span.chunks().enumerate() {
            let merged = if i == 0 { head } else { tail };
            let data = match merged {
                Some(block) if !chunk.is_full() => block,
                _ => <&Block>::try_from(&buf[chunk.buf_range]).map_err(|_| SdCardError::OutOfBounds)?,
            };
            self.write_block(data, count)?;
        }

        if count > 1 {
            self.stop_write()?;
        }
        Ok(())
    }

    /// Read the whole block under `chunk` and splice the caller's bytes into it.
    fn merge_block(&mut self, chunk: &Chunk, buf: &[u8]) -> Result<Block, SdCardError> {
        let mut block = [0u8; BLOCK_SIZE];
        self.read(chunk.block << BLOCK_SHIFT, &mut block)?;
        block[chunk.block_range.clone()].copy_from_slice(&buf[chunk.buf_range.clone()]);
        Ok(block)
    }

    fn stop_read(&mut self) -> Result<(), SdCardError> {
        self.send_card_command(SdCommand::StopTransmission, 0, R1_READY_STATE)?;
        self.wait_until_not_busy()?;
        Ok(())
    }

    fn stop_write(&mut self) -> Result<(), SdCardError> {
        self.transfer(STOP_TRAN_TOKEN)?;
        self.transfer(IDLE_BYTE)?;
        self.wait_until_not_busy()?;
        Ok(())
    }
}
