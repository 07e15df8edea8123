//! DEFLATE -> puff transcoding (§4 Puffer).
//!
//! `Puffer` walks a raw DEFLATE stream block by block and re-expresses it as
//! puff: a byte-aligned token stream that is cheap to diff between two
//! versions of a compressed artifact, because a one-byte change upstream no
//! longer perturbs every downstream bit alignment the way raw DEFLATE's
//! variable-width Huffman codes do.
use crate::bit_reader::BitReader;
use crate::constants::{
    BLOCKTYPE_DYNAMIC, BLOCKTYPE_FIXED, BLOCKTYPE_RESERVED, BLOCKTYPE_UNCOMPRESSED, END_OF_BLOCK,
    DISTANCE_BASES, DISTANCE_EXTRA_BITS, LENGTH_BASES, LENGTH_EXTRA_BITS
};
use crate::errors::{ErrorOffset, PuffinError, Result};
use crate::huffman::{decode_dynamic_header, fixed_distance_table, fixed_litlen_table, HuffmanTable};
use crate::options::PuffinOptions;
use crate::puff_io::{encode_block_header, PuffWriter, COPY_TAG, END_OF_BLOCK_TAG, LITERAL_RUN_MAX};

/// Transcodes one DEFLATE stream into puff, a block at a time.
///
/// Construction allocates nothing beyond the borrowed input/output slices;
/// per-block Huffman tables are built on the stack as each dynamic header is
/// read and dropped once the block is fully transcoded.
pub struct Puffer<'a>
{
    reader:  BitReader<'a>,
    options: PuffinOptions
}

impl<'a> Puffer<'a>
{
    pub fn new(deflate: &'a [u8]) -> Puffer<'a>
    {
        Puffer::new_with_options(deflate, PuffinOptions::default())
    }

    pub fn new_with_options(deflate: &'a [u8], options: PuffinOptions) -> Puffer<'a>
    {
        Puffer { reader: BitReader::new(deflate), options }
    }

    /// Start scanning mid-stream at `bit_offset`, for puffing a single known
    /// block (`PuffinStream`'s on-demand path) without replaying every block
    /// before it. Error offsets reported by the returned `Puffer` are
    /// relative to `bit_offset`, not to the start of the original stream.
    pub fn from_bit_offset(deflate: &'a [u8], bit_offset: u64) -> Result<Puffer<'a>>
    {
        Ok(Puffer { reader: BitReader::new_at_bit_offset(deflate, bit_offset)?, options: PuffinOptions::default() })
    }

    /// Transcode the entire stream (every block up to and including the one
    /// whose BFINAL bit is set) into `out`, returning the number of puff
    /// bytes written. Stops with `InsufficientOutput` once
    /// `PuffinOptions::output_size_limit` bytes have been written, even if
    /// `out` itself is larger.
    pub fn puff_all(&mut self, out: &mut [u8]) -> Result<usize>
    {
        let limit = self.options.clamp_output_len(out.len());
        let mut writer = PuffWriter::new(&mut out[..limit]);

        loop
        {
            let is_final = self.puff_block(&mut writer)?;
            if is_final
            {
                break;
            }
        }

        Ok(writer.position())
    }

    /// Transcode a single DEFLATE block, returning whether it was the final
    /// block in the stream (BFINAL).
    pub fn puff_block(&mut self, puff: &mut PuffWriter) -> Result<bool>
    {
        let is_final = self.reader.get_bits(1)? != 0;
        let block_type = self.reader.get_bits(2)?;

        puff.write_byte(encode_block_header(is_final, block_type))?;

        match block_type
        {
            BLOCKTYPE_UNCOMPRESSED => self.puff_stored_block(puff)?,
            BLOCKTYPE_FIXED =>
            {
                self.puff_compressed_block(puff, fixed_litlen_table(), fixed_distance_table())?
            }
            BLOCKTYPE_DYNAMIC =>
            {
                let (litlen, dist) = decode_dynamic_header(&mut self.reader, puff)?;
                self.puff_compressed_block(puff, &litlen, &dist)?;
            }
            BLOCKTYPE_RESERVED =>
            {
                return Err(PuffinError::invalid(
                    "reserved block type 3",
                    ErrorOffset::at_bit(self.reader.bit_offset())
                ))
            }
            _ => unreachable!("get_bits(2) cannot return a value outside 0..=3")
        }

        Ok(is_final)
    }

    fn puff_stored_block(&mut self, puff: &mut PuffWriter) -> Result<()>
    {
        self.reader.skip_boundary_bits();

        let header = self.reader.read_raw_bytes(4)?;
        let len = u16::from_le_bytes([header[0], header[1]]);
        let nlen = u16::from_le_bytes([header[2], header[3]]);

        if len != !nlen
        {
            return Err(PuffinError::invalid(
                "stored block LEN does not match the one's complement of NLEN",
                ErrorOffset::at_byte(self.reader.offset())
            ));
        }

        puff.write_u16_le(len)?;
        let data = self.reader.read_raw_bytes(usize::from(len))?;
        puff.write_bytes(data)?;

        Ok(())
    }

    fn puff_compressed_block(
        &mut self, puff: &mut PuffWriter, litlen_table: &HuffmanTable, dist_table: &HuffmanTable
    ) -> Result<()>
    {
        let mut literal_run: Vec<u8> = Vec::with_capacity(LITERAL_RUN_MAX);

        loop
        {
            let symbol = litlen_table.decode(&mut self.reader)?;

            if symbol < END_OF_BLOCK
            {
                literal_run.push(symbol as u8);
                if literal_run.len() == LITERAL_RUN_MAX
                {
                    flush_literal_run(puff, &mut literal_run)?;
                }
                continue;
            }

            flush_literal_run(puff, &mut literal_run)?;

            if symbol == END_OF_BLOCK
            {
                puff.write_byte(END_OF_BLOCK_TAG)?;
                return Ok(());
            }

            let length = self.decode_length(symbol)?;
            let distance = self.decode_distance(dist_table)?;

            puff.write_byte(COPY_TAG)?;
            puff.write_byte((length - 3) as u8)?;
            puff.write_u16_le(distance - 1)?;
        }
    }

    fn decode_length(&mut self, symbol: u16) -> Result<u16>
    {
        let idx = usize::from(symbol - 257);
        let base = *LENGTH_BASES.get(idx).ok_or_else(|| {
            PuffinError::invalid("length/length symbol out of range", ErrorOffset::at_bit(self.reader.bit_offset()))
        })?;
        let extra_bits = LENGTH_EXTRA_BITS[idx];
        let extra = self.reader.get_bits(u32::from(extra_bits))? as u16;
        Ok(base + extra)
    }

    fn decode_distance(&mut self, dist_table: &HuffmanTable) -> Result<u16>
    {
        let symbol = dist_table.decode(&mut self.reader)?;
        let idx = usize::from(symbol);
        let base = *DISTANCE_BASES.get(idx).ok_or_else(|| {
            PuffinError::invalid("distance symbol out of range", ErrorOffset::at_bit(self.reader.bit_offset()))
        })?;
        let extra_bits = DISTANCE_EXTRA_BITS[idx];
        let extra = self.reader.get_bits(u32::from(extra_bits))? as u16;
        Ok(base + extra)
    }

    /// Byte offset into the source DEFLATE stream of the next unread byte,
    /// valid only when called at a block boundary.
    pub fn offset(&self) -> usize
    {
        self.reader.offset()
    }

    /// Bit-granular offset into the source DEFLATE stream, valid at any
    /// point (used by the block locator to record exact block extents).
    pub fn bit_offset(&self) -> u64
    {
        self.reader.bit_offset()
    }
}

fn flush_literal_run(puff: &mut PuffWriter, run: &mut Vec<u8>) -> Result<()>
{
    if run.is_empty()
    {
        return Ok(());
    }
    puff.write_byte((run.len() - 1) as u8)?;
    puff.write_bytes(run)?;
    run.clear();
    Ok(())
}
