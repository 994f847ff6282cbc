use crate::codec::SampleCodec;
use std::cell::OnceCell;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum SampleType {
    #[default]
    Mono,
    Right,
    Left,
    Linked,
    RomMono,
    RomRight,
    RomLeft,
    RomLinked,
}

impl SampleType {
    /// `sfSampleType` bit marking an SF3 compressed sample.
    pub const COMPRESSED_FLAG: u16 = 0x10;

    pub fn from_u16(v: u16) -> Option<Self> {
        use SampleType::*;
        Some(match v & !Self::COMPRESSED_FLAG {
            1 => Mono,
            2 => Right,
            4 => Left,
            8 => Linked,
            0x8001 => RomMono,
            0x8002 => RomRight,
            0x8004 => RomLeft,
            0x8008 => RomLinked,
            _ => return None,
        })
    }

    pub fn to_u16(self) -> u16 {
        use SampleType::*;
        match self {
            Mono => 1,
            Right => 2,
            Left => 4,
            Linked => 8,
            RomMono => 0x8001,
            RomRight => 0x8002,
            RomLeft => 0x8004,
            RomLinked => 0x8008,
        }
    }

    #[inline]
    pub fn is_linked(self) -> bool {
        matches!(self, Self::Left | Self::Right | Self::Linked)
    }

    #[inline]
    pub fn is_rom(self) -> bool {
        matches!(
            self,
            Self::RomMono | Self::RomRight | Self::RomLeft | Self::RomLinked
        )
    }

    /// The type the other half of a stereo pair gets.
    pub fn partner(self) -> Self {
        use SampleType::*;
        match self {
            Left => Right,
            Right => Left,
            RomLeft => RomRight,
            RomRight => RomLeft,
            other => other,
        }
    }

    #[inline]
    pub fn unlinked(self) -> Self {
        match self.is_rom() {
            true => Self::RomMono,
            false => Self::Mono,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SampleData {
    Raw(Vec<i16>),
    Compressed(Vec<u8>),
}

impl Default for SampleData {
    #[inline]
    fn default() -> Self {
        Self::Raw(Vec::new())
    }
}

impl SampleData {
    /// Length in bytes, possibly when compressed
    #[inline]
    pub fn stored_len(&self) -> usize {
        match self {
            Self::Raw(s) => s.len() * 2,
            Self::Compressed(data) => data.len(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Sample {
    pub name: String,
    pub sample_rate: u32,
    pub original_key: u8,
    /// Pitch correction in cents.
    pub pitch_correction: i8,
    /// Loop points in sample frames, relative to the sample start.
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_type: SampleType,
    pub data: SampleData,
    pub(crate) linked_sample: Option<usize>,
    pub(crate) linked_to: Vec<usize>,
    decoded: OnceCell<Vec<i16>>,
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.sample_rate == other.sample_rate
            && self.original_key == other.original_key
            && self.pitch_correction == other.pitch_correction
            && self.loop_start == other.loop_start
            && self.loop_end == other.loop_end
            && self.sample_type == other.sample_type
            && self.data == other.data
            && self.linked_sample == other.linked_sample
            && self.linked_to == other.linked_to
    }
}

impl Sample {
    pub fn new(name: impl Into<String>, sample_rate: u32, pcm: Vec<i16>) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            original_key: 60,
            pitch_correction: 0,
            loop_start: 0,
            loop_end: 0,
            sample_type: SampleType::Mono,
            data: SampleData::Raw(pcm),
            linked_sample: None,
            linked_to: Vec::new(),
            decoded: OnceCell::new(),
        }
    }

    pub fn new_compressed(name: impl Into<String>, sample_rate: u32, data: Vec<u8>) -> Self {
        Self {
            data: SampleData::Compressed(data),
            ..Self::new(name, sample_rate, Vec::new())
        }
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        matches!(self.data, SampleData::Compressed(_))
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.sample_type.is_linked()
    }

    /// Index of the other half of a stereo pair.
    #[inline]
    pub fn linked_sample(&self) -> Option<usize> {
        self.linked_sample
    }

    /// Number of instrument zones referencing this sample.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.linked_to.len()
    }

    #[inline]
    pub fn linked_instruments(&self) -> &[usize] {
        &self.linked_to
    }

    /// 16-bit PCM of the sample, decoding compressed data on first access.
    ///
    /// Undecodable data falls back to silence.
    pub fn audio_data(&self, codec: Option<&dyn SampleCodec>) -> &[i16] {
        match &self.data {
            SampleData::Raw(pcm) => pcm,
            SampleData::Compressed(data) => self.decoded.get_or_init(|| {
                let decoded = match codec {
                    Some(codec) => codec.decode(data),
                    None => Err(crate::invalid_data("no sample codec available")),
                };
                decoded.unwrap_or_else(|e| {
                    log::warn!("failed to decode sample `{}`: {e}", self.name);
                    vec![0; (self.loop_end as usize).max(1)]
                })
            }),
        }
    }

    pub fn set_audio_data(&mut self, pcm: Vec<i16>) {
        self.data = SampleData::Raw(pcm);
        self.decoded = OnceCell::new();
    }

    pub fn set_compressed_data(&mut self, data: Vec<u8>) {
        self.data = SampleData::Compressed(data);
        self.decoded = OnceCell::new();
    }

    #[inline]
    pub(crate) fn link_to(&mut self, instrument: usize) {
        self.linked_to.push(instrument);
    }

    /// # Panics
    ///
    /// Panics when `instrument` never referenced this sample.
    pub(crate) fn unlink_from(&mut self, instrument: usize) {
        let pos = self
            .linked_to
            .iter()
            .position(|i| *i == instrument)
            .unwrap_or_else(|| {
                panic!(
                    "sample `{}` is not linked to instrument {instrument}",
                    self.name
                )
            });
        self.linked_to.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Failing;
    impl SampleCodec for Failing {
        fn encode(&self, _: &[i16], _: u32) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::Other, "nope"))
        }
        fn decode(&self, _: &[u8]) -> io::Result<Vec<i16>> {
            Err(io::Error::new(io::ErrorKind::Other, "nope"))
        }
    }

    #[test]
    fn undecodable_sample_is_silent() {
        let mut sample = Sample::new_compressed("x", 44100, vec![1, 2, 3]);
        sample.loop_end = 10;
        let pcm = sample.audio_data(Some(&Failing));
        assert_eq!(pcm, &[0; 10]);
    }

    /// Stores each sample as its high byte.
    struct HighBytes;
    impl SampleCodec for HighBytes {
        fn encode(&self, pcm: &[i16], _: u32) -> io::Result<Vec<u8>> {
            Ok(pcm.iter().map(|s| (*s >> 8) as u8).collect())
        }
        fn decode(&self, data: &[u8]) -> io::Result<Vec<i16>> {
            Ok(data.iter().map(|b| (*b as i8 as i16) << 8).collect())
        }
    }

    #[test]
    fn replacing_data_drops_the_decoded_cache() {
        let mut sample = Sample::new_compressed("x", 44100, vec![1, 0xff]);
        assert_eq!(sample.data.stored_len(), 2);
        assert_eq!(sample.audio_data(Some(&HighBytes)), &[0x100, -0x100]);

        sample.set_compressed_data(vec![2]);
        assert_eq!(sample.audio_data(Some(&HighBytes)), &[0x200]);

        sample.set_audio_data(vec![5, 6, 7]);
        assert!(!sample.is_compressed());
        assert_eq!(sample.data.stored_len(), 6);
        assert_eq!(sample.audio_data(None), &[5, 6, 7]);
    }

    #[test]
    fn types() {
        assert_eq!(SampleType::from_u16(0x14), Some(SampleType::Left));
        assert_eq!(SampleType::Left.partner(), SampleType::Right);
        assert!(SampleType::Linked.is_linked());
        assert!(!SampleType::RomLinked.is_linked());
        assert!(!SampleType::RomLeft.is_linked());
        assert!(!SampleType::RomMono.is_linked());
        assert_eq!(SampleType::RomLeft.unlinked(), SampleType::RomMono);
        assert_eq!(SampleType::from_u16(3), None);
    }

    #[test]
    #[should_panic]
    fn unlinking_unknown_instrument_panics() {
        Sample::new("x", 44100, Vec::new()).unlink_from(3);
    }
}
