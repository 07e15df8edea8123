//! RFC 1951 constants shared by `HuffmanTable`, `Puffer` and `Huffer`.

/// Number of symbols in the code-length (precode/meta) alphabet.
pub const NUM_CODE_LENGTH_SYMS: usize = 19;
/// Maximum number of literal/length symbols (0..=285 used, 286/287 reserved).
pub const NUM_LITLEN_SYMS: usize = 288;
/// Maximum number of distance symbols (0..=29 used, 30/31 reserved).
pub const NUM_DISTANCE_SYMS: usize = 30;
/// Maximum bit length of any canonical DEFLATE codeword.
pub const MAX_CODEWORD_LENGTH: usize = 15;
/// Maximum bit length of a code-length (precode) codeword.
pub const MAX_CODE_LENGTH_CODEWORD_LENGTH: usize = 7;

/// End-of-block literal/length symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Order in which the 19 code-length codeword lengths are stored in a
/// dynamic-block header (RFC 1951 3.2.7).
pub const CODE_LENGTH_ORDER: [u8; NUM_CODE_LENGTH_SYMS] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15
];

pub const BLOCKTYPE_UNCOMPRESSED: u64 = 0;
pub const BLOCKTYPE_FIXED: u64 = 1;
pub const BLOCKTYPE_DYNAMIC: u64 = 2;
pub const BLOCKTYPE_RESERVED: u64 = 3;

/// Base length for length codes 257..=285, indexed by `code - 257`.
pub const LENGTH_BASES: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258
];
/// Extra bits following each length code, indexed by `code - 257`.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0
];

/// Base distance for distance codes 0..=29.
pub const DISTANCE_BASES: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577
];
/// Extra bits following each distance code, indexed by the distance code.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13
];

/// The fixed literal/length codeword lengths (RFC 1951 3.2.6).
pub fn fixed_litlen_lengths() -> [u8; NUM_LITLEN_SYMS]
{
    let mut lens = [0_u8; NUM_LITLEN_SYMS];
    lens[0..144].fill(8);
    lens[144..256].fill(9);
    lens[256..280].fill(7);
    lens[280..288].fill(8);
    lens
}

/// The fixed distance codeword lengths (RFC 1951 3.2.6): all 5 bits.
pub fn fixed_distance_lengths() -> [u8; NUM_DISTANCE_SYMS]
{
    [5; NUM_DISTANCE_SYMS]
}

/// Puff's expanded code-length-sequence encoding biases (see `huffman.rs`).
///
/// Code 16 ("copy previous length 3-6 times") is re-emitted as `16 + extra`
/// where `extra` is the 2-bit repeat count, i.e. the range 16..=19.
pub const PUFF_REPEAT_PREV_BASE: u16 = 16;
pub const PUFF_REPEAT_PREV_RANGE_END: u16 = 19;
/// Code 17 ("repeat zero 3-10 times") becomes 20 + extra (3 bits): 20..=27.
pub const PUFF_REPEAT_ZERO_SHORT_BASE: u16 = 20;
pub const PUFF_REPEAT_ZERO_SHORT_RANGE_END: u16 = 27;
/// Code 18 ("repeat zero 11-138 times") becomes 28 + extra (7 bits): 28..=155.
pub const PUFF_REPEAT_ZERO_LONG_BASE: u16 = 28;
pub const PUFF_REPEAT_ZERO_LONG_RANGE_END: u16 = 155;
