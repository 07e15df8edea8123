//! `PuffinStream` (§4.6): a seekable view over the puffed representation of
//! a DEFLATE byte sequence, puffing blocks on demand and caching a small
//! number of recently-puffed ones rather than materializing the whole
//! stream up front.
use crate::bit_writer::BitWriter;
use crate::discovery::{locate_blocks, BlockExtent};
use crate::errors::{ErrorOffset, PuffinError, Result};
use crate::huffer::Huffer;
use crate::options::PuffinOptions;
use crate::puff_io::PuffWriter;
use crate::puffer::Puffer;

/// Grows a scratch buffer geometrically until `locate_blocks` stops
/// reporting `InsufficientOutput`, since the puffed size of a stream isn't
/// known until it's been fully walked once.
fn locate_blocks_growing(deflate: &[u8]) -> Result<(Vec<BlockExtent>, usize)>
{
    let mut capacity = (deflate.len() * 2).max(64);

    loop
    {
        let mut scratch = vec![0_u8; capacity];
        match locate_blocks(deflate, &mut scratch)
        {
            Ok(extents) =>
            {
                let total = extents.last().map(|e| e.puff_byte_offset + e.puff_byte_length).unwrap_or(0);
                return Ok((extents, total));
            }
            Err(PuffinError::InsufficientOutput { .. }) if capacity < (1 << 30) =>
            {
                capacity *= 2;
            }
            Err(other) => return Err(other)
        }
    }
}

struct CachedBlock
{
    extent_index: usize,
    puff:         Vec<u8>
}

pub struct PuffinStream<'a>
{
    deflate: &'a [u8],
    extents: Vec<BlockExtent>,
    /// Total length of the puff-space view (sum of every block's puff bytes).
    total_len: usize,
    options: PuffinOptions,
    cache:   Vec<CachedBlock>
}

impl<'a> PuffinStream<'a>
{
    pub fn new(deflate: &'a [u8]) -> Result<PuffinStream<'a>>
    {
        PuffinStream::new_with_options(deflate, PuffinOptions::default())
    }

    pub fn new_with_options(deflate: &'a [u8], options: PuffinOptions) -> Result<PuffinStream<'a>>
    {
        let (extents, total_len) = locate_blocks_growing(deflate)?;
        log::debug!("PuffinStream indexed {} blocks, {total_len} puff bytes", extents.len());
        Ok(PuffinStream { deflate, extents, total_len, options, cache: Vec::new() })
    }

    /// Total length, in bytes, of the puff-space view of this stream.
    pub const fn len(&self) -> usize
    {
        self.total_len
    }

    pub const fn is_empty(&self) -> bool
    {
        self.total_len == 0
    }

    pub fn block_count(&self) -> usize
    {
        self.extents.len()
    }

    /// Read `buf.len()` puff-space bytes starting at `puff_offset`, puffing
    /// whichever blocks overlap the request (reusing the cache where
    /// possible) and copying the relevant slice of each into `buf`.
    pub fn read(&mut self, puff_offset: usize, buf: &mut [u8]) -> Result<usize>
    {
        if puff_offset >= self.total_len
        {
            return Ok(0);
        }

        let want_end = (puff_offset + buf.len()).min(self.total_len);
        let mut written = 0;

        let first = self
            .extents
            .partition_point(|e| e.puff_byte_offset + e.puff_byte_length <= puff_offset);

        for index in first..self.extents.len()
        {
            let extent = self.extents[index];
            if extent.puff_byte_offset >= want_end
            {
                break;
            }

            let block_puff = self.puffed_block(index)?;

            let block_start = extent.puff_byte_offset;
            let local_start = puff_offset.max(block_start) - block_start;
            let local_end = want_end.min(block_start + extent.puff_byte_length) - block_start;

            let dst_start = (block_start + local_start).saturating_sub(puff_offset);
            let slice = &block_puff[local_start..local_end];
            buf[dst_start..dst_start + slice.len()].copy_from_slice(slice);
            written += slice.len();
        }

        Ok(written)
    }

    /// Huff a single block's puff bytes (e.g. after a patch has been applied
    /// to it) back into `deflate_out`, starting at that block's original bit
    /// offset. The caller is responsible for assembling a full stream when
    /// a block's re-encoded bit length differs from its original extent;
    /// this only performs the one block's transcode.
    pub fn write_block(&self, extent_index: usize, puff_bytes: &[u8], deflate_out: &mut [u8]) -> Result<usize>
    {
        let extent = *self
            .extents
            .get(extent_index)
            .ok_or_else(|| PuffinError::invalid("block index out of range", ErrorOffset::default()))?;

        let limit = self.options.clamp_output_len(deflate_out.len());
        let mut huffer = Huffer::for_single_block(puff_bytes);
        let mut writer = BitWriter::new(&mut deflate_out[..limit]);
        huffer.huff_block(&mut writer)?;
        let bytes = writer.finish()?;

        log::debug!(
            "re-huffed block {extent_index} (originally at deflate bit {}) into {bytes} bytes",
            extent.deflate_bit_offset
        );

        Ok(bytes)
    }

    fn puffed_block(&mut self, index: usize) -> Result<&[u8]>
    {
        if let Some(pos) = self.cache.iter().position(|c| c.extent_index == index)
        {
            let cached = self.cache.remove(pos);
            self.cache.push(cached);
        }
        else
        {
            let extent = self.extents[index];
            let mut puffer = Puffer::from_bit_offset(self.deflate, extent.deflate_bit_offset)?;
            let mut buf = vec![0_u8; extent.puff_byte_length];
            {
                let mut writer = PuffWriter::new(&mut buf);
                puffer.puff_block(&mut writer)?;
            }

            if self.cache.len() >= self.options.stream_cache_blocks().max(1)
            {
                self.cache.remove(0);
            }
            self.cache.push(CachedBlock { extent_index: index, puff: buf });
        }

        let last = self.cache.len() - 1;
        Ok(&self.cache[last].puff)
    }
}
