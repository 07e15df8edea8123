//! Configuration surface, in the shape of `zune_inflate::DeflateOptions`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PuffinOptions
{
    /// Upper bound on the number of bytes a single `puff`/`huff` call will
    /// write before giving up with `InsufficientOutput`, independent of the
    /// size of the caller-provided output buffer. `0` means unlimited (the
    /// buffer's own length is the only bound).
    output_size_limit: usize,
    /// Number of recently-puffed blocks `PuffinStream` keeps resident.
    stream_cache_blocks: usize
}

impl Default for PuffinOptions
{
    fn default() -> PuffinOptions
    {
        PuffinOptions { output_size_limit: 0, stream_cache_blocks: 8 }
    }
}

impl PuffinOptions
{
    pub const fn new() -> PuffinOptions
    {
        PuffinOptions { output_size_limit: 0, stream_cache_blocks: 8 }
    }

    pub const fn set_output_size_limit(mut self, limit: usize) -> PuffinOptions
    {
        self.output_size_limit = limit;
        self
    }

    pub const fn set_stream_cache_blocks(mut self, blocks: usize) -> PuffinOptions
    {
        self.stream_cache_blocks = blocks;
        self
    }

    pub const fn output_size_limit(&self) -> usize
    {
        self.output_size_limit
    }

    pub const fn stream_cache_blocks(&self) -> usize
    {
        self.stream_cache_blocks
    }

    /// Narrows `buf_len` (the caller-provided output buffer's length) down to
    /// `output_size_limit` when that limit is set and smaller, so a single
    /// transcode call gives up with `InsufficientOutput` once it has written
    /// `output_size_limit` bytes even if the buffer itself is larger.
    pub(crate) const fn clamp_output_len(&self, buf_len: usize) -> usize
    {
        if self.output_size_limit == 0 || self.output_size_limit >= buf_len
        {
            buf_len
        }
        else
        {
            self.output_size_limit
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_match_documented_values()
    {
        let options = PuffinOptions::default();
        assert_eq!(options.output_size_limit(), 0);
        assert_eq!(options.stream_cache_blocks(), 8);
    }

    #[test]
    fn builder_methods_chain()
    {
        let options = PuffinOptions::new().set_output_size_limit(4096).set_stream_cache_blocks(2);
        assert_eq!(options.output_size_limit(), 4096);
        assert_eq!(options.stream_cache_blocks(), 2);
    }

    #[test]
    fn clamp_output_len_narrows_only_when_limit_is_smaller()
    {
        let unlimited = PuffinOptions::default();
        assert_eq!(unlimited.clamp_output_len(4096), 4096);

        let limited = PuffinOptions::new().set_output_size_limit(16);
        assert_eq!(limited.clamp_output_len(4096), 16);
        assert_eq!(limited.clamp_output_len(8), 8);
    }
}
