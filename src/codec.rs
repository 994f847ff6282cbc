//! Pluggable sample compression and write options.

use std::io;

/// Caller-supplied sample compression (SF3 stores Vorbis streams).
///
/// Calls are issued one sample at a time: the next sample is encoded only
/// after the previous call returned.
pub trait SampleCodec {
    fn encode(&self, pcm: &[i16], sample_rate: u32) -> io::Result<Vec<u8>>;
    fn decode(&self, data: &[u8]) -> io::Result<Vec<i16>>;
}

/// Called after each sample is processed with `(name, index, total)`.
pub type Progress<'a> = &'a mut dyn FnMut(&str, usize, usize);

pub struct Sf2WriteOptions<'a> {
    /// Encode uncompressed samples with `codec` (writes an SF3 file).
    pub compress: bool,
    /// Decode compressed samples with `codec` and write plain 16-bit PCM.
    pub decompress: bool,
    /// Emit a `DMOD` chunk when the bank carries custom default modulators.
    pub write_default_modulators: bool,
    /// Emit the `xdta` chunk when indices or names exceed the SF2 limits.
    pub write_extended_limits: bool,
    pub codec: Option<&'a dyn SampleCodec>,
    pub progress: Option<Progress<'a>>,
}

impl Default for Sf2WriteOptions<'_> {
    fn default() -> Self {
        Self {
            compress: false,
            decompress: false,
            write_default_modulators: true,
            write_extended_limits: true,
            codec: None,
            progress: None,
        }
    }
}

pub struct DlsWriteOptions<'a> {
    /// Append custom default modulators to every instrument's global articulation.
    pub write_default_modulators: bool,
    /// Needed to decode compressed samples, DLS only stores PCM.
    pub codec: Option<&'a dyn SampleCodec>,
    pub progress: Option<Progress<'a>>,
}

impl Default for DlsWriteOptions<'_> {
    fn default() -> Self {
        Self {
            write_default_modulators: true,
            codec: None,
            progress: None,
        }
    }
}
