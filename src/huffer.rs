//! Puff -> DEFLATE transcoding (§4 Huffer): the strict inverse of `Puffer`.
//!
//! Re-encoding is bit-exact with the original stream wherever the original
//! encoder's choices are fully determined by the DEFLATE format (block
//! headers, Huffman codes, stored-block lengths); the only freedom DEFLATE
//! leaves an encoder — the padding bits before a byte boundary — is always
//! written as zero here, matching puff's decision not to carry them (see the
//! Open Questions note in the design ledger).
use crate::bit_writer::BitWriter;
use crate::constants::{
    BLOCKTYPE_DYNAMIC, BLOCKTYPE_FIXED, BLOCKTYPE_UNCOMPRESSED, DISTANCE_BASES, DISTANCE_EXTRA_BITS,
    END_OF_BLOCK, LENGTH_BASES, LENGTH_EXTRA_BITS
};
use crate::errors::{ErrorOffset, PuffinError, Result};
use crate::huffman::{encode_dynamic_header, fixed_distance_table, fixed_litlen_table, HuffmanTable};
use crate::options::PuffinOptions;
use crate::puff_io::{decode_block_header, PuffReader, COPY_TAG, END_OF_BLOCK_TAG};

/// Transcodes puff back into a DEFLATE stream.
pub struct Huffer<'a>
{
    reader:  PuffReader<'a>,
    options: PuffinOptions
}

impl<'a> Huffer<'a>
{
    pub fn new(puff: &'a [u8]) -> Huffer<'a>
    {
        Huffer::new_with_options(puff, PuffinOptions::default())
    }

    pub fn new_with_options(puff: &'a [u8], options: PuffinOptions) -> Huffer<'a>
    {
        Huffer { reader: PuffReader::new(puff), options }
    }

    /// As `new`, scoped to a single block's puff bytes (`PuffinStream`'s
    /// on-demand write path). `puff` must contain exactly one block's worth
    /// of tokens, starting at its block-header byte.
    pub fn for_single_block(puff: &'a [u8]) -> Huffer<'a>
    {
        Huffer::new(puff)
    }

    /// Re-encode every block in the puff stream into `out`, returning the
    /// number of DEFLATE bytes written. Stops with `InsufficientOutput` once
    /// `PuffinOptions::output_size_limit` bytes have been written, even if
    /// `out` itself is larger.
    pub fn huff_all(&mut self, out: &mut [u8]) -> Result<usize>
    {
        let limit = self.options.clamp_output_len(out.len());
        let mut writer = BitWriter::new(&mut out[..limit]);

        loop
        {
            let is_final = self.huff_block(&mut writer)?;
            if is_final
            {
                break;
            }
        }

        writer.finish()
    }

    /// Re-encode a single block, returning whether it was the final block.
    pub fn huff_block(&mut self, writer: &mut BitWriter) -> Result<bool>
    {
        let header = self.reader.read_byte()?;
        let (is_final, block_type) = decode_block_header(header);

        writer.write_bits(1, u64::from(is_final))?;
        writer.write_bits(2, block_type)?;

        match block_type
        {
            BLOCKTYPE_UNCOMPRESSED => self.huff_stored_block(writer)?,
            BLOCKTYPE_FIXED =>
            {
                self.huff_compressed_block(writer, fixed_litlen_table(), fixed_distance_table())?
            }
            BLOCKTYPE_DYNAMIC =>
            {
                let (litlen, dist) = encode_dynamic_header(&mut self.reader, writer)?;
                self.huff_compressed_block(writer, &litlen, &dist)?;
            }
            _ =>
            {
                return Err(PuffinError::invalid(
                    "puff block header names an undefined block type",
                    ErrorOffset::at_byte(self.reader.position())
                ))
            }
        }

        Ok(is_final)
    }

    fn huff_stored_block(&mut self, writer: &mut BitWriter) -> Result<()>
    {
        writer.write_boundary_bits(0)?;

        let len = self.reader.read_u16_le()?;
        writer.write_raw_bytes(&len.to_le_bytes())?;
        writer.write_raw_bytes(&(!len).to_le_bytes())?;

        let data = self.reader.read_bytes(usize::from(len))?;
        writer.write_raw_bytes(data)?;

        Ok(())
    }

    fn huff_compressed_block(
        &mut self, writer: &mut BitWriter, litlen_table: &HuffmanTable, dist_table: &HuffmanTable
    ) -> Result<()>
    {
        loop
        {
            let tag = self.reader.read_byte()?;

            if tag == END_OF_BLOCK_TAG
            {
                let (code, len) = litlen_table.encode(END_OF_BLOCK)?;
                writer.write_bits(u32::from(len), u64::from(code))?;
                return Ok(());
            }

            if tag == COPY_TAG
            {
                let length = u16::from(self.reader.read_byte()?) + 3;
                let distance = self.reader.read_u16_le()? + 1;

                self.write_length(writer, litlen_table, length)?;
                self.write_distance(writer, dist_table, distance)?;
                continue;
            }

            let run_len = usize::from(tag) + 1;
            let literals = self.reader.read_bytes(run_len)?;
            for &byte in literals
            {
                let (code, len) = litlen_table.encode(u16::from(byte))?;
                writer.write_bits(u32::from(len), u64::from(code))?;
            }
        }
    }

    fn write_length(&self, writer: &mut BitWriter, litlen_table: &HuffmanTable, length: u16) -> Result<()>
    {
        // Bases are ascending and contiguous, so the matching code is the
        // last one whose base does not exceed `length`.
        let idx = LENGTH_BASES
            .iter()
            .rposition(|&base| base <= length)
            .ok_or_else(|| PuffinError::invalid("copy length has no matching length code", ErrorOffset::default()))?;

        let symbol = 257 + idx as u16;
        let (code, len) = litlen_table.encode(symbol)?;
        writer.write_bits(u32::from(len), u64::from(code))?;

        let extra_bits = LENGTH_EXTRA_BITS[idx];
        if extra_bits > 0
        {
            let extra = length - LENGTH_BASES[idx];
            writer.write_bits(u32::from(extra_bits), u64::from(extra))?;
        }

        Ok(())
    }

    fn write_distance(&self, writer: &mut BitWriter, dist_table: &HuffmanTable, distance: u16) -> Result<()>
    {
        let idx = DISTANCE_BASES
            .iter()
            .rposition(|&base| base <= distance)
            .ok_or_else(|| {
                PuffinError::invalid("copy distance has no matching distance code", ErrorOffset::default())
            })?;

        let (code, len) = dist_table.encode(idx as u16)?;
        writer.write_bits(u32::from(len), u64::from(code))?;

        let extra_bits = DISTANCE_EXTRA_BITS[idx];
        if extra_bits > 0
        {
            let extra = distance - DISTANCE_BASES[idx];
            writer.write_bits(u32::from(extra_bits), u64::from(extra))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::bit_writer::BitWriter;
    use crate::constants::BLOCKTYPE_FIXED;
    use crate::puffer::Puffer;

    fn deflate_fixed_block(literals: &[u8]) -> Vec<u8>
    {
        let mut raw = vec![0_u8; 64 + literals.len() * 2];
        let written;
        {
            let mut writer = BitWriter::new(&mut raw);
            writer.write_bits(1, 1).unwrap();
            writer.write_bits(2, BLOCKTYPE_FIXED).unwrap();

            let table = fixed_litlen_table();
            for &byte in literals
            {
                let (code, len) = table.encode(u16::from(byte)).unwrap();
                writer.write_bits(u32::from(len), u64::from(code)).unwrap();
            }
            let (code, len) = table.encode(END_OF_BLOCK).unwrap();
            writer.write_bits(u32::from(len), u64::from(code)).unwrap();

            written = writer.finish().unwrap();
        }
        raw.truncate(written);
        raw
    }

    #[test]
    fn puff_then_huff_reproduces_original_fixed_block()
    {
        let original = deflate_fixed_block(b"Hello, World!\n");

        let mut puff = [0_u8; 256];
        let puff_len = Puffer::new(&original).puff_all(&mut puff).unwrap();

        let mut roundtripped = vec![0_u8; original.len() + 8];
        let out_len = Huffer::new(&puff[..puff_len]).huff_all(&mut roundtripped).unwrap();

        assert_eq!(&roundtripped[..out_len], &original[..]);
    }

    #[test]
    fn puff_then_huff_reproduces_a_stored_block()
    {
        let payload = b"raw stored payload";
        let mut raw = vec![0_u8; payload.len() + 16];
        let written;
        {
            let mut writer = BitWriter::new(&mut raw);
            writer.write_bits(1, 1).unwrap();
            writer.write_bits(2, BLOCKTYPE_UNCOMPRESSED).unwrap();
            writer.write_boundary_bits(0).unwrap();
            writer.write_raw_bytes(&(payload.len() as u16).to_le_bytes()).unwrap();
            writer.write_raw_bytes(&(!(payload.len() as u16)).to_le_bytes()).unwrap();
            writer.write_raw_bytes(payload).unwrap();
            written = writer.bytes_written();
        }
        raw.truncate(written);

        let mut puff = [0_u8; 64];
        let puff_len = Puffer::new(&raw).puff_all(&mut puff).unwrap();

        let mut roundtripped = vec![0_u8; raw.len() + 8];
        let out_len = Huffer::new(&puff[..puff_len]).huff_all(&mut roundtripped).unwrap();

        assert_eq!(&roundtripped[..out_len], &raw[..]);
    }

    #[test]
    fn unknown_block_type_in_puff_header_is_rejected()
    {
        let puff = [0b111_u8]; // is_final=1, block_type=0b11 (reserved)
        let mut out = [0_u8; 8];
        let err = Huffer::new(&puff).huff_all(&mut out).unwrap_err();
        assert!(matches!(err, PuffinError::InvalidInput { .. }));
    }
}
