//! Stateless byte-offset-finding utilities (§4.7): locating the raw DEFLATE
//! region inside a gzip member or a ZIP local entry, and locating the block
//! boundaries within a single DEFLATE stream. None of these decompress;
//! they only report extents for `PuffinStream` or the transcoder to consume.
use crate::errors::{ErrorOffset, PuffinError, Result};
use crate::puff_io::PuffWriter;
use crate::puffer::Puffer;

/// A byte range within some buffer: `start..start + length`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ByteExtent
{
    pub start:  usize,
    pub length: usize
}

impl ByteExtent
{
    pub const fn end(&self) -> usize
    {
        self.start + self.length
    }
}

#[cfg(feature = "gzip")]
pub mod gzip
{
    use super::*;

    const MAGIC: [u8; 2] = [0x1F, 0x8B];
    const CM_DEFLATE: u8 = 8;

    const FLG_FTEXT: u8 = 0x01;
    const FLG_FHCRC: u8 = 0x02;
    const FLG_FEXTRA: u8 = 0x04;
    const FLG_FNAME: u8 = 0x08;
    const FLG_FCOMMENT: u8 = 0x10;

    /// A single gzip member: the DEFLATE payload extent plus the trailing
    /// CRC32/ISIZE footer's offset (RFC 1952 §2.3).
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct GzipMember
    {
        pub deflate: ByteExtent,
        /// Byte offset of the 4-byte CRC32 field (ISIZE follows immediately).
        pub footer_offset: usize
    }

    /// Walk one gzip member's header starting at `data[0]` and locate where
    /// its embedded DEFLATE stream begins. `data` need not contain the
    /// member's full compressed payload; only the header and footer are read.
    pub fn locate_member(data: &[u8]) -> Result<GzipMember>
    {
        if data.len() < 10
        {
            return Err(PuffinError::InsufficientInput {
                requested: 10,
                available: data.len(),
                offset:    ErrorOffset::at_byte(0)
            });
        }

        if data[0..2] != MAGIC
        {
            return Err(PuffinError::invalid("missing gzip magic bytes", ErrorOffset::at_byte(0)));
        }

        let cm = data[2];
        if cm != CM_DEFLATE
        {
            return Err(PuffinError::invalid_detail(
                format!("gzip member uses unsupported compression method {cm}"),
                ErrorOffset::at_byte(2)
            ));
        }

        let flg = data[3];
        let mut pos = 10_usize;

        if flg & FLG_FEXTRA != 0
        {
            let xlen = read_u16_le(data, pos)? as usize;
            pos += 2 + xlen;
        }
        if flg & FLG_FNAME != 0
        {
            pos = skip_cstring(data, pos)?;
        }
        if flg & FLG_FCOMMENT != 0
        {
            pos = skip_cstring(data, pos)?;
        }
        if flg & FLG_FHCRC != 0
        {
            pos += 2;
        }
        let _ = FLG_FTEXT; // not relevant to locating the stream; named for completeness.

        if pos > data.len()
        {
            return Err(PuffinError::InsufficientInput {
                requested: pos,
                available: data.len(),
                offset:    ErrorOffset::at_byte(data.len())
            });
        }

        if data.len() < pos + 8
        {
            return Err(PuffinError::InsufficientInput {
                requested: pos + 8,
                available: data.len(),
                offset:    ErrorOffset::at_byte(data.len())
            });
        }

        let footer_offset = data.len() - 8;
        let deflate = ByteExtent { start: pos, length: footer_offset - pos };

        log::debug!(
            "gzip member: header ends at byte {pos}, deflate stream is {} bytes, footer at byte {footer_offset}",
            deflate.length
        );

        Ok(GzipMember { deflate, footer_offset })
    }

    /// Verify the trailing CRC32 against the caller's decompressed buffer.
    /// Does not itself decompress: `decompressed` must already hold the
    /// puffed-and-huffed-back (or otherwise produced) original bytes.
    pub fn verify_crc32(data: &[u8], member: &GzipMember, decompressed: &[u8]) -> Result<bool>
    {
        let expected = read_u32_le(data, member.footer_offset)?;
        let actual = crc32fast::hash(decompressed);
        Ok(expected == actual)
    }

    fn read_u16_le(data: &[u8], pos: usize) -> Result<u16>
    {
        let bytes = data
            .get(pos..pos + 2)
            .ok_or_else(|| PuffinError::InsufficientInput { requested: 2, available: 0, offset: ErrorOffset::at_byte(pos) })?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32_le(data: &[u8], pos: usize) -> Result<u32>
    {
        let bytes = data
            .get(pos..pos + 4)
            .ok_or_else(|| PuffinError::InsufficientInput { requested: 4, available: 0, offset: ErrorOffset::at_byte(pos) })?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn skip_cstring(data: &[u8], pos: usize) -> Result<usize>
    {
        let rest = data
            .get(pos..)
            .ok_or_else(|| PuffinError::InsufficientInput { requested: 1, available: 0, offset: ErrorOffset::at_byte(pos) })?;
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| PuffinError::invalid("unterminated gzip FNAME/FCOMMENT field", ErrorOffset::at_byte(pos)))?;
        Ok(pos + nul + 1)
    }

    #[cfg(test)]
    mod tests
    {
        use super::*;

        #[test]
        fn locates_minimal_member_with_no_optional_fields()
        {
            let mut data = vec![0x1F, 0x8B, 0x08, 0x00, 0, 0, 0, 0, 0, 0xFF];
            data.extend_from_slice(b"deflate-bytes-here");
            data.extend_from_slice(&0xDEADBEEF_u32.to_le_bytes());
            data.extend_from_slice(&19_u32.to_le_bytes());

            let member = locate_member(&data).unwrap();
            assert_eq!(member.deflate.start, 10);
            assert_eq!(member.deflate.length, 19);
            assert_eq!(member.footer_offset, data.len() - 8);
        }

        #[test]
        fn skips_fname_field()
        {
            let mut data = vec![0x1F, 0x8B, 0x08, FLG_FNAME, 0, 0, 0, 0, 0, 0xFF];
            data.extend_from_slice(b"hello.txt\0");
            data.extend_from_slice(b"xx");
            data.extend_from_slice(&0_u32.to_le_bytes());
            data.extend_from_slice(&0_u32.to_le_bytes());

            let member = locate_member(&data).unwrap();
            assert_eq!(member.deflate.start, 10 + 10);
            assert_eq!(member.deflate.length, 2);
        }

        #[test]
        fn rejects_bad_magic()
        {
            let data = [0u8; 16];
            assert!(locate_member(&data).is_err());
        }
    }
}

#[cfg(feature = "zip")]
pub mod zip
{
    use super::*;

    const SIGNATURE: [u8; 4] = [b'P', b'K', 0x03, 0x04];
    const METHOD_STORED: u16 = 0;
    const METHOD_DEFLATE: u16 = 8;

    /// A single ZIP local file entry's payload extent, or `None` when the
    /// entry's compression method is anything other than `deflate`/`stored`.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ZipEntry
    {
        pub payload:         ByteExtent,
        /// `true` when method 8 (deflate); `false` when method 0 (stored,
        /// already byte-aligned and not meaningful to transcode).
        pub needs_transcode: bool
    }

    /// Parse a ZIP local file header (`PK\x03\x04`) at `data[0]` and locate
    /// its payload.
    pub fn locate_entry(data: &[u8]) -> Result<ZipEntry>
    {
        if data.len() < 30
        {
            return Err(PuffinError::InsufficientInput {
                requested: 30,
                available: data.len(),
                offset:    ErrorOffset::at_byte(0)
            });
        }

        if data[0..4] != SIGNATURE
        {
            return Err(PuffinError::invalid("missing ZIP local file header signature", ErrorOffset::at_byte(0)));
        }

        let method = u16::from_le_bytes([data[8], data[9]]);
        let compressed_size = u32::from_le_bytes([data[18], data[19], data[20], data[21]]) as usize;
        let name_len = u16::from_le_bytes([data[26], data[27]]) as usize;
        let extra_len = u16::from_le_bytes([data[28], data[29]]) as usize;

        let payload_start = 30 + name_len + extra_len;

        if payload_start + compressed_size > data.len()
        {
            return Err(PuffinError::InsufficientInput {
                requested: payload_start + compressed_size,
                available: data.len(),
                offset:    ErrorOffset::at_byte(data.len())
            });
        }

        let needs_transcode = match method
        {
            METHOD_DEFLATE => true,
            METHOD_STORED => false,
            other =>
            {
                return Err(PuffinError::invalid_detail(
                    format!("ZIP entry uses unsupported compression method {other}"),
                    ErrorOffset::at_byte(8)
                ))
            }
        };

        log::debug!("zip entry: payload at byte {payload_start}, {compressed_size} bytes, method {method}");

        Ok(ZipEntry { payload: ByteExtent { start: payload_start, length: compressed_size }, needs_transcode })
    }

}

/// One DEFLATE block's position in both the source bit stream and the puff
/// byte stream, as recorded by `locate_blocks`. `PuffinStream` indexes these
/// to map a random-access read in puff-space back to the DEFLATE bytes that
/// must be re-puffed to satisfy it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockExtent
{
    pub deflate_bit_offset: u64,
    pub deflate_bit_length: u64,
    pub puff_byte_offset:   usize,
    pub puff_byte_length:   usize
}

/// Run the `Puffer` bit-scanner over `deflate` purely for its side effect:
/// recording each block's extent in both streams. `puff_scratch` must be
/// large enough to hold the full puffed output; the bytes written there are
/// discarded by the caller if only the extents are wanted.
pub fn locate_blocks(deflate: &[u8], puff_scratch: &mut [u8]) -> Result<Vec<BlockExtent>>
{
    let mut puffer = Puffer::new(deflate);
    let mut writer = PuffWriter::new(puff_scratch);
    let mut extents = Vec::new();

    loop
    {
        let bit_start = puffer.bit_offset();
        let puff_start = writer.position();

        let is_final = puffer.puff_block(&mut writer)?;

        extents.push(BlockExtent {
            deflate_bit_offset: bit_start,
            deflate_bit_length: puffer.bit_offset() - bit_start,
            puff_byte_offset:   puff_start,
            puff_byte_length:   writer.position() - puff_start
        });

        if is_final
        {
            break;
        }
    }

    Ok(extents)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::bit_writer::BitWriter;
    use crate::constants::{BLOCKTYPE_FIXED, END_OF_BLOCK};
    use crate::huffman::fixed_litlen_table;

    #[test]
    fn locate_blocks_records_a_single_fixed_block()
    {
        let mut raw = [0_u8; 8];
        let written;
        {
            let mut bit_writer = BitWriter::new(&mut raw);
            bit_writer.write_bits(1, 1).unwrap();
            bit_writer.write_bits(2, BLOCKTYPE_FIXED).unwrap();
            let table = fixed_litlen_table();
            let (code, len) = table.encode(END_OF_BLOCK).unwrap();
            bit_writer.write_bits(u32::from(len), u64::from(code)).unwrap();
            written = bit_writer.finish().unwrap();
        }

        let mut puff_scratch = [0_u8; 32];
        let extents = locate_blocks(&raw[..written], &mut puff_scratch).unwrap();

        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0].deflate_bit_offset, 0);
        assert_eq!(extents[0].puff_byte_offset, 0);
    }
}
