//! Mapping of a byte range onto the 512-byte blocks it touches.

use super::constants::{
    BLOCK_SHIFT,
    BLOCK_SIZE,
};
use core::ops::Range;

/// Number of blocks touched by `[address, address + len)`. A range running
/// past the end of the address space stops at the last addressable byte.
pub fn block_count(address: u64, len: u64) -> u64 {
    if len == 0 {
        return 0;
    }
    let last = address.saturating_add(len - 1);
    (last >> BLOCK_SHIFT) - (address >> BLOCK_SHIFT) + 1
}

/// The part of one block covered by a byte range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Block index on the card.
    pub block: u64,
    /// Bytes of the block that are touched.
    pub block_range: Range<usize>,
    /// Matching bytes of the caller's buffer.
    pub buf_range: Range<usize>,
}

impl Chunk {
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.block_range.len() == BLOCK_SIZE
    }
}

/// The [`Chunk`]s of a byte range, first block to last.
#[derive(Clone, Debug)]
pub struct BlockSpan {
    address: u64,
    end: u64,
    first_block: u64,
    num_blocks: u64,
}

impl BlockSpan {
    pub fn new(address: u64, len: u64) -> BlockSpan {
        BlockSpan {
            address,
            end: address.saturating_add(len),
            first_block: address >> BLOCK_SHIFT,
            num_blocks: block_count(address, len),
        }
    }

    #[inline(always)]
    pub fn first_block(&self) -> u64 {
        self.first_block
    }

    #[inline(always)]
    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    pub fn chunk(&self, i: u64) -> Option<Chunk> {
        if i >= self.num_blocks {
            return None;
        }
        let block = self.first_block + i;
        let block_start = block << BLOCK_SHIFT;
        let start = self.address.max(block_start);
        let end = self.end.min(block_start.saturating_add(BLOCK_SIZE as u64));
        Some(Chunk {
            block,
            block_range: (start - block_start) as usize..(end - block_start) as usize,
            buf_range: (start - self.address) as usize..(end - self.address) as usize,
        })
    }

    #[inline(always)]
    pub fn first_chunk(&self) -> Option<Chunk> {
        self.chunk(0)
    }

    pub fn last_chunk(&self) -> Option<Chunk> {
        self.num_blocks.checked_sub(1).and_then(|i| self.chunk(i))
    }

    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.num_blocks).filter_map(move |i| self.chunk(i))
    }
}
