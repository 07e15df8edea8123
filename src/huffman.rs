//! Canonical Huffman table construction, forward (decode) and reverse
//! (encode) tables, and the dynamic-header codec that moves code-length
//! sequences between the DEFLATE bit stream and puff bytes.
//!
//! The forward-table shape (`hcodes[1 << max_bits]`, a symbol plus a
//! valid-bit at bit 15, fanned out across every index whose low `len` bits
//! match a codeword) and the reverse table (`rcodes[symbol]`, the
//! bit-reversed canonical code) are the two representations this whole crate
//! is built around; see the module docs on `Puffer`/`Huffer` for how each
//! side uses them.
use std::sync::OnceLock;

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::constants::{
    fixed_distance_lengths, fixed_litlen_lengths, CODE_LENGTH_ORDER, MAX_CODEWORD_LENGTH,
    NUM_CODE_LENGTH_SYMS, PUFF_REPEAT_PREV_BASE, PUFF_REPEAT_PREV_RANGE_END,
    PUFF_REPEAT_ZERO_LONG_BASE, PUFF_REPEAT_ZERO_LONG_RANGE_END, PUFF_REPEAT_ZERO_SHORT_BASE,
    PUFF_REPEAT_ZERO_SHORT_RANGE_END
};
use crate::errors::{ErrorOffset, PuffinError, Result};
use crate::puff_io::{PuffReader, PuffWriter};

/// Bit 15 of a forward-table entry: set when the entry is a real codeword
/// rather than unused codespace.
const VALID_BIT: u16 = 0x8000;

/// A canonical Huffman code built from a per-symbol bit-length array,
/// scoped to a single DEFLATE block (§3 Lifecycle).
pub struct HuffmanTable
{
    /// The code-length array this table was built from; `decode` consults
    /// it to learn how many bits a looked-up symbol's codeword actually
    /// used, since the forward table itself stores only the symbol.
    lens:     Vec<u8>,
    max_bits: u32,
    hcodes:   Vec<u16>,
    rcodes:   Vec<u16>
}

impl HuffmanTable
{
    /// Build forward and reverse tables from `lens`.
    ///
    /// `allow_empty` permits an all-zero-length alphabet, producing a table
    /// that is valid to construct but an `InvalidInput` error to ever
    /// decode against (see §9: legal for the distance alphabet of a
    /// match-free dynamic block, illegal for literal/length).
    pub fn build(lens: &[u8], max_allowed_bits: u32, allow_empty: bool) -> Result<HuffmanTable>
    {
        let mut len_count = [0_u32; MAX_CODEWORD_LENGTH + 1];
        for &len in lens
        {
            len_count[usize::from(len)] += 1;
        }

        let max_bits = (1..=MAX_CODEWORD_LENGTH)
            .rev()
            .find(|&l| len_count[l] > 0)
            .unwrap_or(0) as u32;

        if max_bits == 0
        {
            return if allow_empty
            {
                Ok(HuffmanTable { lens: lens.to_vec(), max_bits: 1, hcodes: vec![0; 2], rcodes: vec![0; lens.len()] })
            }
            else
            {
                Err(PuffinError::invalid(
                    "code-length alphabet has no codes",
                    ErrorOffset::default()
                ))
            };
        }

        if max_bits > max_allowed_bits
        {
            return Err(PuffinError::invalid(
                "codeword length exceeds the alphabet's maximum",
                ErrorOffset::default()
            ));
        }

        // Kraft-inequality check (the classic `construct()` left-over-budget
        // test from zlib's puff.c): reject any length set whose codespace
        // usage exceeds 1, i.e. an oversubscribed code. Sets that use less
        // than the full codespace (e.g. a single-symbol alphabet) are legal.
        let mut left: i64 = 1;
        for len in 1..=max_bits as usize
        {
            left <<= 1;
            left -= i64::from(len_count[len]);
            if left < 0
            {
                return Err(PuffinError::invalid(
                    "oversubscribed Huffman code",
                    ErrorOffset::default()
                ));
            }
        }

        // InitHuffmanCodes: first canonical code per length, then assign
        // ascending by symbol, bit-reversed into `len` bits because the
        // bit stream is LSB-first while canonical codes are MSB-first.
        let mut next_code = [0_u16; MAX_CODEWORD_LENGTH + 1];
        for len in 1..=max_bits as usize
        {
            next_code[len] = (next_code[len - 1] + len_count[len - 1] as u16) << 1;
        }

        let mut rcodes = vec![0_u16; lens.len()];
        // (symbol, reversed code, len) pairs, built in ascending symbol
        // order, later sorted descending by length for the forward fill.
        let mut assigned: Vec<(u16, u16, u8)> = Vec::with_capacity(lens.len());

        for (sym, &len) in lens.iter().enumerate()
        {
            if len == 0
            {
                continue;
            }
            let code = next_code[usize::from(len)];
            next_code[usize::from(len)] += 1;
            let reversed = reverse_bits(code, len);
            rcodes[sym] = reversed;
            assigned.push((sym as u16, reversed, len));
        }

        // BuildHuffmanCodes: descending length so that, when two indices
        // would otherwise both be "empty", the longer (more specific) code
        // claims its slots first and shorter codes only fill what remains.
        assigned.sort_unstable_by(|a, b| b.2.cmp(&a.2));

        let mut hcodes = vec![0_u16; 1_usize << max_bits];
        for (sym, code, len) in assigned
        {
            let entry = sym | VALID_BIT;
            let code = usize::from(code);
            let len = u32::from(len);

            // The base slot for a canonical prefix-free code is never
            // claimed by another codeword, so it is always safe to write
            // unconditionally.
            hcodes[code] = entry;

            let fanout = 1_usize << (max_bits - len);
            for i in 1..fanout
            {
                let idx = (i << len) | code;
                if hcodes[idx] == 0
                {
                    hcodes[idx] = entry;
                }
            }
        }

        Ok(HuffmanTable { lens: lens.to_vec(), max_bits, hcodes, rcodes })
    }

    /// Decode the next symbol from `reader`, advancing past its codeword.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u16>
    {
        reader.cache_bits_lenient(self.max_bits);
        let peek = reader.peek_bits_padded(self.max_bits) as usize;
        let entry = self.hcodes[peek];

        if entry & VALID_BIT == 0
        {
            return Err(PuffinError::invalid(
                "no Huffman code matches these bits",
                ErrorOffset::at_bit(reader.bit_offset())
            ));
        }

        let symbol = entry & !VALID_BIT;
        let len = u32::from(self.lens[usize::from(symbol)]);
        reader.drop_bits_checked(len)?;

        Ok(symbol)
    }

    /// Look up the canonical (bit-reversed) code and bit length for `symbol`,
    /// for the Huffer to write out.
    pub fn encode(&self, symbol: u16) -> Result<(u16, u8)>
    {
        let len = *self
            .lens
            .get(usize::from(symbol))
            .ok_or_else(|| PuffinError::invalid("symbol out of range for this table", ErrorOffset::default()))?;

        if len == 0
        {
            return Err(PuffinError::invalid(
                "symbol has no assigned Huffman code",
                ErrorOffset::default()
            ));
        }

        Ok((self.rcodes[usize::from(symbol)], len))
    }

    pub fn num_symbols(&self) -> usize
    {
        self.lens.len()
    }
}

fn reverse_bits(code: u16, len: u8) -> u16
{
    let mut c = code;
    let mut r = 0_u16;
    for _ in 0..len
    {
        r = (r << 1) | (c & 1);
        c >>= 1;
    }
    r
}

static FIXED_LITLEN: OnceLock<HuffmanTable> = OnceLock::new();
static FIXED_DISTANCE: OnceLock<HuffmanTable> = OnceLock::new();

/// The fixed literal/length table (RFC 1951 3.2.6), built once and shared
/// by reference across every fixed-Huffman block (§3 Lifecycle).
pub fn fixed_litlen_table() -> &'static HuffmanTable
{
    FIXED_LITLEN.get_or_init(|| {
        HuffmanTable::build(&fixed_litlen_lengths(), MAX_CODEWORD_LENGTH as u32, false)
            .expect("the RFC 1951 fixed literal/length lengths are always a valid code")
    })
}

/// The fixed distance table (RFC 1951 3.2.6).
pub fn fixed_distance_table() -> &'static HuffmanTable
{
    FIXED_DISTANCE.get_or_init(|| {
        HuffmanTable::build(&fixed_distance_lengths(), MAX_CODEWORD_LENGTH as u32, false)
            .expect("the RFC 1951 fixed distance lengths are always a valid code")
    })
}

/// Decode a dynamic-block header from the DEFLATE bit stream, re-emitting it
/// verbatim (in puff's expanded form) into `puff`. Returns the literal/length
/// and distance tables the block's symbols are coded against.
pub fn decode_dynamic_header(
    reader: &mut BitReader, puff: &mut PuffWriter
) -> Result<(HuffmanTable, HuffmanTable)>
{
    let hlit = reader.get_bits(5)? as u16;
    let hdist = reader.get_bits(5)? as u16;
    let hclen = reader.get_bits(4)? as u16;

    let num_litlen = 257 + hlit;
    let num_dist = 1 + hdist;
    let num_clen = 4 + hclen;

    if num_litlen > 286
    {
        return Err(PuffinError::invalid(
            "HLIT implies more literal/length symbols than exist",
            ErrorOffset::at_bit(reader.bit_offset())
        ));
    }
    if num_dist > 30
    {
        return Err(PuffinError::invalid(
            "HDIST implies more distance symbols than exist",
            ErrorOffset::at_bit(reader.bit_offset())
        ));
    }

    puff.write_byte(hlit as u8)?;
    puff.write_byte(hdist as u8)?;
    puff.write_byte(hclen as u8)?;

    let mut code_lens = [0_u8; NUM_CODE_LENGTH_SYMS];
    for i in 0..usize::from(num_clen)
    {
        code_lens[usize::from(CODE_LENGTH_ORDER[i])] = reader.get_bits(3)? as u8;
    }

    for chunk in code_lens.chunks(2)
    {
        let high = chunk[0];
        let low = chunk.get(1).copied().unwrap_or(0);
        puff.write_byte((high << 4) | low)?;
    }

    let meta_table = HuffmanTable::build(&code_lens, 7, false)?;

    let litlen_lens = decode_code_length_sequence(reader, &meta_table, puff, usize::from(num_litlen))?;
    if litlen_lens.iter().all(|&l| l == 0)
    {
        return Err(PuffinError::invalid(
            "literal/length alphabet has no codes",
            ErrorOffset::at_bit(reader.bit_offset())
        ));
    }

    let dist_lens = decode_code_length_sequence(reader, &meta_table, puff, usize::from(num_dist))?;
    if dist_lens.iter().all(|&l| l == 0)
    {
        log::warn!("dynamic block declares an empty distance code table (no matches in this block)");
    }

    let litlen_table = HuffmanTable::build(&litlen_lens, MAX_CODEWORD_LENGTH as u32, false)?;
    let dist_table = HuffmanTable::build(&dist_lens, MAX_CODEWORD_LENGTH as u32, true)?;

    Ok((litlen_table, dist_table))
}

/// Strict inverse of `decode_dynamic_header`: read puff's expanded
/// dynamic-header bytes and re-emit the original bit stream.
pub fn encode_dynamic_header(
    puff: &mut PuffReader, writer: &mut BitWriter
) -> Result<(HuffmanTable, HuffmanTable)>
{
    let hlit = u16::from(puff.read_byte()?);
    let hdist = u16::from(puff.read_byte()?);
    let hclen = u16::from(puff.read_byte()?);

    writer.write_bits(5, u64::from(hlit))?;
    writer.write_bits(5, u64::from(hdist))?;
    writer.write_bits(4, u64::from(hclen))?;

    let num_litlen = 257 + hlit;
    let num_dist = 1 + hdist;
    let num_clen = 4 + hclen;

    let mut code_lens = [0_u8; NUM_CODE_LENGTH_SYMS];
    for i in 0..(NUM_CODE_LENGTH_SYMS + 1) / 2
    {
        let byte = puff.read_byte()?;
        code_lens[2 * i] = byte >> 4;
        if 2 * i + 1 < NUM_CODE_LENGTH_SYMS
        {
            code_lens[2 * i + 1] = byte & 0xF;
        }
    }

    for i in 0..usize::from(num_clen)
    {
        writer.write_bits(3, u64::from(code_lens[usize::from(CODE_LENGTH_ORDER[i])]))?;
    }

    let meta_table = HuffmanTable::build(&code_lens, 7, false)?;

    let litlen_lens = encode_code_length_sequence(puff, &meta_table, writer, usize::from(num_litlen))?;
    let dist_lens = encode_code_length_sequence(puff, &meta_table, writer, usize::from(num_dist))?;

    let litlen_table = HuffmanTable::build(&litlen_lens, MAX_CODEWORD_LENGTH as u32, false)?;
    let dist_table = HuffmanTable::build(&dist_lens, MAX_CODEWORD_LENGTH as u32, true)?;

    Ok((litlen_table, dist_table))
}

/// `BuildHuffmanCodeLengths`: decode `target_count` code lengths from the
/// bit stream via the meta table, re-emitting puff's expanded encoding
/// (values 0-15 verbatim, repeat markers biased into 16-19/20-27/28-155 so
/// the Huffer never has to re-read the extra bits from elsewhere).
fn decode_code_length_sequence(
    reader: &mut BitReader, meta_table: &HuffmanTable, puff: &mut PuffWriter, target_count: usize
) -> Result<Vec<u8>>
{
    let mut lens = vec![0_u8; target_count];
    let mut idx = 0;

    while idx < target_count
    {
        let sym = meta_table.decode(reader)?;

        match sym
        {
            0..=15 =>
            {
                lens[idx] = sym as u8;
                puff.write_byte(sym as u8)?;
                idx += 1;
            }
            16 =>
            {
                if idx == 0
                {
                    return Err(PuffinError::invalid(
                        "code 16 (repeat previous) with no previous length",
                        ErrorOffset::at_bit(reader.bit_offset())
                    ));
                }
                let extra = reader.get_bits(2)? as u8;
                let rep = 3 + extra as usize;
                check_repeat_fits(idx, rep, target_count, reader.bit_offset())?;
                let prev = lens[idx - 1];
                lens[idx..idx + rep].fill(prev);
                idx += rep;
                puff.write_byte(PUFF_REPEAT_PREV_BASE as u8 + extra)?;
            }
            17 =>
            {
                let extra = reader.get_bits(3)? as u8;
                let rep = 3 + extra as usize;
                check_repeat_fits(idx, rep, target_count, reader.bit_offset())?;
                lens[idx..idx + rep].fill(0);
                idx += rep;
                puff.write_byte(PUFF_REPEAT_ZERO_SHORT_BASE as u8 + extra)?;
            }
            18 =>
            {
                let extra = reader.get_bits(7)? as u8;
                let rep = 11 + extra as usize;
                check_repeat_fits(idx, rep, target_count, reader.bit_offset())?;
                lens[idx..idx + rep].fill(0);
                idx += rep;
                puff.write_byte(PUFF_REPEAT_ZERO_LONG_BASE as u8 + extra)?;
            }
            _ => unreachable!("meta alphabet only defines symbols 0..=18")
        }
    }

    Ok(lens)
}

/// Strict inverse of `decode_code_length_sequence`.
fn encode_code_length_sequence(
    puff: &mut PuffReader, meta_table: &HuffmanTable, writer: &mut BitWriter, target_count: usize
) -> Result<Vec<u8>>
{
    let mut lens = vec![0_u8; target_count];
    let mut idx = 0;

    while idx < target_count
    {
        let byte = puff.read_byte()?;

        match byte
        {
            0..=15 =>
            {
                let (code, len) = meta_table.encode(u16::from(byte))?;
                writer.write_bits(u32::from(len), u64::from(code))?;
                lens[idx] = byte;
                idx += 1;
            }
            16..=19 =>
            {
                let extra = byte - PUFF_REPEAT_PREV_BASE as u8;
                let (code, len) = meta_table.encode(16)?;
                writer.write_bits(u32::from(len), u64::from(code))?;
                writer.write_bits(2, u64::from(extra))?;

                if idx == 0
                {
                    return Err(PuffinError::invalid(
                        "puff code-length sequence repeats with no previous length",
                        ErrorOffset::default()
                    ));
                }
                let rep = 3 + extra as usize;
                check_repeat_fits(idx, rep, target_count, (puff.position() as u64) * 8)?;
                let prev = lens[idx - 1];
                lens[idx..idx + rep].fill(prev);
                idx += rep;
            }
            20..=27 =>
            {
                let extra = byte - PUFF_REPEAT_ZERO_SHORT_BASE as u8;
                let (code, len) = meta_table.encode(17)?;
                writer.write_bits(u32::from(len), u64::from(code))?;
                writer.write_bits(3, u64::from(extra))?;

                let rep = 3 + extra as usize;
                check_repeat_fits(idx, rep, target_count, (puff.position() as u64) * 8)?;
                lens[idx..idx + rep].fill(0);
                idx += rep;
            }
            28..=155 =>
            {
                let extra = byte - PUFF_REPEAT_ZERO_LONG_BASE as u8;
                let (code, len) = meta_table.encode(18)?;
                writer.write_bits(u32::from(len), u64::from(code))?;
                writer.write_bits(7, u64::from(extra))?;

                let rep = 11 + extra as usize;
                check_repeat_fits(idx, rep, target_count, (puff.position() as u64) * 8)?;
                lens[idx..idx + rep].fill(0);
                idx += rep;
            }
            _ =>
            {
                return Err(PuffinError::invalid(
                    "puff code-length byte out of the defined 0..=155 range",
                    ErrorOffset::default()
                ))
            }
        }
    }

    Ok(lens)
}

fn check_repeat_fits(idx: usize, rep: usize, target_count: usize, bit_offset: u64) -> Result<()>
{
    if idx + rep > target_count
    {
        return Err(PuffinError::invalid(
            "code-length repeat run overruns the alphabet",
            ErrorOffset::at_bit(bit_offset)
        ));
    }
    Ok(())
}

const _: () = assert!(PUFF_REPEAT_PREV_RANGE_END == 19);
const _: () = assert!(PUFF_REPEAT_ZERO_SHORT_RANGE_END == 27);
const _: () = assert!(PUFF_REPEAT_ZERO_LONG_RANGE_END == 155);

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::bit_writer::BitWriter;

    #[test]
    fn single_symbol_code_round_trips()
    {
        let lens = [1_u8, 0, 0];
        let table = HuffmanTable::build(&lens, 15, false).unwrap();

        let mut buf = [0_u8; 1];
        {
            let mut writer = BitWriter::new(&mut buf);
            let (code, len) = table.encode(0).unwrap();
            writer.write_bits(u32::from(len), u64::from(code)).unwrap();
            writer.finish().unwrap();
        }

        let mut reader = BitReader::new(&buf);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn oversubscribed_code_is_rejected()
    {
        let lens = [1_u8, 1, 1];
        let err = HuffmanTable::build(&lens, 15, false).unwrap_err();
        assert!(matches!(err, PuffinError::InvalidInput { .. }));
    }

    #[test]
    fn canonical_codes_decode_to_their_own_symbol()
    {
        // Two symbols of length 1, two of length 2: a complete code.
        let lens = [1_u8, 1, 2, 2];
        let table = HuffmanTable::build(&lens, 15, false).unwrap();

        for symbol in 0..4_u16
        {
            let (code, len) = table.encode(symbol).unwrap();
            let mut buf = [0_u8; 1];
            {
                let mut writer = BitWriter::new(&mut buf);
                writer.write_bits(u32::from(len), u64::from(code)).unwrap();
                writer.finish().unwrap();
            }
            let mut reader = BitReader::new(&buf);
            assert_eq!(table.decode(&mut reader).unwrap(), symbol);
        }
    }

    #[test]
    fn empty_alphabet_allowed_only_when_requested()
    {
        let lens = [0_u8; 30];
        assert!(HuffmanTable::build(&lens, 15, false).is_err());
        assert!(HuffmanTable::build(&lens, 15, true).is_ok());
    }

    #[test]
    fn fixed_tables_cover_every_symbol()
    {
        let litlen = fixed_litlen_table();
        for symbol in 0..288_u16
        {
            assert!(litlen.encode(symbol).is_ok());
        }
        let dist = fixed_distance_table();
        for symbol in 0..30_u16
        {
            assert!(dist.encode(symbol).is_ok());
        }
    }

    #[test]
    fn dynamic_header_round_trips() -> Result<()>
    {
        // Build a tiny dynamic block header by hand: HLIT=0 (257 litlen
        // syms), HDIST=0 (1 dist sym), HCLEN=15 (19 precode lens), all
        // precode lengths 0 except enough to encode a single-symbol
        // litlen/distance alphabet via repeat codes.
        let mut raw = [0_u8; 64];
        let mut litlen_lens = vec![0_u8; 257];
        litlen_lens[0] = 1;
        litlen_lens[256] = 1;
        let dist_lens = vec![0_u8; 1];

        // Directly exercise the meta/code-length machinery by constructing
        // a bit stream for: HLIT=0 HDIST=0 HCLEN=15, precode lens in
        // transmission order trivial (all code-length-alphabet symbols get
        // length 1 via a 1-bit code would be oversubscribed with 19
        // symbols, so instead give only symbols 0 and 18 nonzero lengths).
        let bits_written;
        {
            let mut writer = BitWriter::new(&mut raw);
            writer.write_bits(5, 0).unwrap(); // HLIT
            writer.write_bits(5, 0).unwrap(); // HDIST
            writer.write_bits(4, 15).unwrap(); // HCLEN -> num_clen = 19

            // precode lengths: symbol 0 -> len 1, symbol 18 -> len 1,
            // everything else -> 0. This is a valid (if unusual) complete
            // code over a 2-symbol alphabet.
            let mut precode_lens = [0_u8; 19];
            precode_lens[0] = 1;
            precode_lens[18] = 1;
            for i in 0..19
            {
                writer.write_bits(3, u64::from(precode_lens[CODE_LENGTH_ORDER[i] as usize])).unwrap();
            }

            let meta = HuffmanTable::build(&precode_lens, 7, false).unwrap();

            // litlen sequence: emit symbol 0 (len 1) once, then code 18 to
            // repeat zero 256 times (to reach 257 total), but one 18
            // code only covers up to 138 repeats, so split into two runs.
            let (c0, l0) = meta.encode(0).unwrap();
            writer.write_bits(u32::from(l0), u64::from(c0)).unwrap();

            // now 256 zero entries remain; emit via two code-18 runs.
            let (c18, l18) = meta.encode(18).unwrap();
            writer.write_bits(u32::from(l18), u64::from(c18)).unwrap();
            writer.write_bits(7, 127).unwrap(); // 11+127 = 138 repeats
            writer.write_bits(u32::from(l18), u64::from(c18)).unwrap();
            writer.write_bits(7, 107).unwrap(); // 11+107 = 118 repeats; 138+118=256

            // distance sequence: a single entry, length 1.
            litlen_lens[255] = 0; // keep as-is; just documents intent
            let (cd, ld) = meta.encode(0).unwrap();
            writer.write_bits(u32::from(ld), u64::from(cd)).unwrap();

            bits_written = writer.finish().unwrap();
        }

        let mut out_puff = [0_u8; 128];
        let mut reader = BitReader::new(&raw[..bits_written]);
        let mut puff_writer = PuffWriter::new(&mut out_puff);
        let (litlen_table, dist_table) = decode_dynamic_header(&mut reader, &mut puff_writer)?;

        assert!(litlen_table.encode(0).is_ok());
        assert!(litlen_table.encode(256).is_ok());
        assert!(dist_table.encode(0).is_ok());

        let puff_len = puff_writer.position();
        let mut out_deflate = [0_u8; 64];
        let mut puff_reader = PuffReader::new(&out_puff[..puff_len]);
        let mut deflate_writer = BitWriter::new(&mut out_deflate);
        let (litlen_table2, dist_table2) = encode_dynamic_header(&mut puff_reader, &mut deflate_writer)?;
        let reencoded_len = deflate_writer.finish().unwrap();

        assert_eq!(&out_deflate[..reencoded_len], &raw[..bits_written]);
        assert!(litlen_table2.encode(0).is_ok());
        assert!(dist_table2.encode(0).is_ok());

        Ok(())
    }
}
