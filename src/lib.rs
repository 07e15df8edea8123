//! A bidirectional transcoder between the DEFLATE (RFC 1951) compressed bit
//! stream and **puff**, a byte-aligned, diff-friendly restatement of the
//! same stream.
//!
//! DEFLATE is order- and Huffman-sensitive: a single byte changed in the
//! uncompressed input can perturb the bit alignment of everything that
//! follows, which makes binary patches between two compressed artifacts
//! (gzip blobs, ZIP members) much larger than the underlying change
//! warrants. Puffin expands a DEFLATE stream into puff before an external
//! differ touches it, and converts the patched puff buffer back into a
//! byte-identical DEFLATE stream afterward. The transcode in both
//! directions is exact — it does not recompress, canonicalize, or otherwise
//! second-guess the original encoder's choices.
//!
//! This crate is not a general-purpose compressor, a binary differ, or a
//! container-format library; see the module docs on [`discovery`] for the
//! narrow slice of container-format awareness it does carry.
pub mod bit_reader;
pub mod bit_writer;
pub mod constants;
pub mod discovery;
pub mod errors;
pub mod huffer;
pub mod huffman;
pub mod options;
pub mod puff_io;
pub mod puffer;
pub mod stream;

pub use errors::{PuffinError, Result};
pub use huffer::Huffer;
pub use options::PuffinOptions;
pub use puffer::Puffer;
pub use stream::PuffinStream;

/// Transcode an entire DEFLATE stream into puff. `out` must be large enough
/// to hold the puffed output; returns the number of bytes written.
pub fn puff(deflate: &[u8], out: &mut [u8]) -> Result<usize>
{
    Puffer::new(deflate).puff_all(out)
}

/// Transcode an entire puff buffer back into DEFLATE. `out` must be large
/// enough to hold the re-encoded bytes; returns the number of bytes written.
pub fn huff(puff_bytes: &[u8], out: &mut [u8]) -> Result<usize>
{
    Huffer::new(puff_bytes).huff_all(out)
}

/// As [`puff`], but grows an owned buffer instead of requiring the caller to
/// pre-size one. Convenient for callers without a tight allocation budget;
/// [`puff`] remains the zero-allocation entry point for streaming use.
pub fn puff_to_vec(deflate: &[u8]) -> Result<Vec<u8>>
{
    grow_until_it_fits(|out| puff(deflate, out), deflate.len())
}

/// As [`huff`], growing an owned buffer.
pub fn huff_to_vec(puff_bytes: &[u8]) -> Result<Vec<u8>>
{
    grow_until_it_fits(|out| huff(puff_bytes, out), puff_bytes.len())
}

fn grow_until_it_fits(mut attempt: impl FnMut(&mut [u8]) -> Result<usize>, size_hint: usize) -> Result<Vec<u8>>
{
    let mut capacity = (size_hint * 2).max(64);

    loop
    {
        let mut buf = vec![0_u8; capacity];
        match attempt(&mut buf)
        {
            Ok(written) =>
            {
                buf.truncate(written);
                return Ok(buf);
            }
            Err(PuffinError::InsufficientOutput { .. }) if capacity < (1 << 30) =>
            {
                capacity *= 2;
            }
            Err(other) => return Err(other)
        }
    }
}
