//! Downloadable Sounds (`DLS `) banks.
//!
//! [`DlsBank`] mirrors the chunk structure of a DLS file. Conversion to and
//! from [`SoundBank`](crate::SoundBank) lives in `to_sf2`/`from_sf2`, and
//! the per-connection translation in [`articulator`].

pub mod articulator;
mod from_sf2;
mod read;
mod to_sf2;
mod write;

use crate::bank::BankInfo;

/// Connection sources (and controls) of DLS level 1 and 2.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DlsSource {
    None,
    ModLfo,
    KeyOnVelocity,
    KeyNumber,
    VolEnv,
    ModEnv,
    PitchWheel,
    PolyPressure,
    ChannelPressure,
    VibLfo,
    Cc(u8),
    /// RPN 0, pitch bend range.
    PitchBendRange,
    /// RPN 1.
    FineTune,
    /// RPN 2.
    CoarseTune,
    Unknown(u16),
}

impl DlsSource {
    pub fn from_u16(v: u16) -> Self {
        use DlsSource::*;
        match v {
            0x0000 => None,
            0x0001 => ModLfo,
            0x0002 => KeyOnVelocity,
            0x0003 => KeyNumber,
            0x0004 => VolEnv,
            0x0005 => ModEnv,
            0x0006 => PitchWheel,
            0x0007 => PolyPressure,
            0x0008 => ChannelPressure,
            0x0009 => VibLfo,
            0x0080..=0x00ff => Cc((v & 0x7f) as u8),
            0x0100 => PitchBendRange,
            0x0101 => FineTune,
            0x0102 => CoarseTune,
            v => Unknown(v),
        }
    }

    pub fn to_u16(self) -> u16 {
        use DlsSource::*;
        match self {
            None => 0x0000,
            ModLfo => 0x0001,
            KeyOnVelocity => 0x0002,
            KeyNumber => 0x0003,
            VolEnv => 0x0004,
            ModEnv => 0x0005,
            PitchWheel => 0x0006,
            PolyPressure => 0x0007,
            ChannelPressure => 0x0008,
            VibLfo => 0x0009,
            Cc(cc) => 0x0080 | (cc & 0x7f) as u16,
            PitchBendRange => 0x0100,
            FineTune => 0x0101,
            CoarseTune => 0x0102,
            Unknown(v) => v,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DlsDestination {
    None,
    Gain,
    Pitch,
    Pan,
    KeyNumber,
    Chorus,
    Reverb,
    ModLfoFrequency,
    ModLfoDelay,
    VibLfoFrequency,
    VibLfoDelay,
    VolEnvAttack,
    VolEnvDecay,
    VolEnvRelease,
    VolEnvSustain,
    VolEnvDelay,
    VolEnvHold,
    VolEnvShutdown,
    ModEnvAttack,
    ModEnvDecay,
    ModEnvRelease,
    ModEnvSustain,
    ModEnvDelay,
    ModEnvHold,
    FilterCutoff,
    FilterQ,
    Unknown(u16),
}

impl DlsDestination {
    const TABLE: [(u16, DlsDestination); 26] = {
        use DlsDestination::*;
        [
            (0x0000, None),
            (0x0001, Gain),
            (0x0003, Pitch),
            (0x0004, Pan),
            (0x0005, KeyNumber),
            (0x0080, Chorus),
            (0x0081, Reverb),
            (0x0104, ModLfoFrequency),
            (0x0105, ModLfoDelay),
            (0x0114, VibLfoFrequency),
            (0x0115, VibLfoDelay),
            (0x0206, VolEnvAttack),
            (0x0207, VolEnvDecay),
            (0x0209, VolEnvRelease),
            (0x020a, VolEnvSustain),
            (0x020b, VolEnvDelay),
            (0x020c, VolEnvHold),
            (0x020d, VolEnvShutdown),
            (0x030a, ModEnvAttack),
            (0x030b, ModEnvDecay),
            (0x030d, ModEnvRelease),
            (0x030e, ModEnvSustain),
            (0x030f, ModEnvDelay),
            (0x0310, ModEnvHold),
            (0x0500, FilterCutoff),
            (0x0501, FilterQ),
        ]
    };

    pub fn from_u16(v: u16) -> Self {
        Self::TABLE
            .iter()
            .find(|(id, _)| *id == v)
            .map_or(Self::Unknown(v), |(_, d)| *d)
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::Unknown(v) => v,
            d => Self::TABLE
                .iter()
                .find(|(_, t)| *t == d)
                .map_or(0, |(id, _)| *id),
        }
    }
}

bitflags::bitflags! {
    /// The `usTransform` word of a connection block.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TransformFlags: u16 {
        const OUTPUT = 0x000f;
        const CONTROL = 0x00f0;
        const CONTROL_BIPOLAR = 0x0100;
        const CONTROL_INVERT = 0x0200;
        const SOURCE = 0x3c00;
        const SOURCE_BIPOLAR = 0x4000;
        const SOURCE_INVERT = 0x8000;
    }
}

/// Curve, polarity and direction of one connection input.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct InputTransform {
    /// `CONN_TRN_*`: none, concave, convex or switch.
    pub curve: u8,
    pub bipolar: bool,
    pub invert: bool,
}

impl TransformFlags {
    #[inline]
    pub fn output(self) -> u8 {
        (self & Self::OUTPUT).bits() as u8
    }

    pub fn source(self) -> InputTransform {
        InputTransform {
            curve: ((self & Self::SOURCE).bits() >> 10) as u8,
            bipolar: self.contains(Self::SOURCE_BIPOLAR),
            invert: self.contains(Self::SOURCE_INVERT),
        }
    }

    pub fn control(self) -> InputTransform {
        InputTransform {
            curve: ((self & Self::CONTROL).bits() >> 4) as u8,
            bipolar: self.contains(Self::CONTROL_BIPOLAR),
            invert: self.contains(Self::CONTROL_INVERT),
        }
    }

    pub fn new(source: InputTransform, control: InputTransform, output: u8) -> Self {
        let mut bits = (output as u16 & 0xf)
            | (control.curve as u16 & 0xf) << 4
            | (source.curve as u16 & 0xf) << 10;
        bits |= (control.bipolar as u16) << 8 | (control.invert as u16) << 9;
        bits |= (source.bipolar as u16) << 14 | (source.invert as u16) << 15;
        Self::from_bits_retain(bits)
    }
}

/// Packs an integer amount into a 16.16 connection scale, saturating at the
/// 16-bit range.
#[inline]
pub fn to_scale(value: i32) -> i32 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) << 16
}

/// One DLS articulation entry: `source × control → destination` at `scale`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ConnectionBlock {
    pub source: DlsSource,
    pub control: DlsSource,
    pub destination: DlsDestination,
    pub transform: TransformFlags,
    /// 16.16 fixed point; the integer part is the SF2 sized amount.
    pub scale: i32,
}

impl ConnectionBlock {
    /// A block with no source or control, setting `destination` to `value`.
    pub fn fixed(destination: DlsDestination, value: i32) -> Self {
        Self {
            source: DlsSource::None,
            control: DlsSource::None,
            destination,
            transform: TransformFlags::empty(),
            scale: to_scale(value),
        }
    }

    /// Integer part of `scale`.
    #[inline]
    pub fn value(&self) -> i32 {
        self.scale >> 16
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Articulation {
    /// 1 for `lart`/`art1`, 2 for `lar2`/`art2`.
    pub level: u8,
    pub connections: Vec<ConnectionBlock>,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RegionOptions: u16 {
        const SELF_NON_EXCLUSIVE = 0x0001;
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WaveSampleOptions: u32 {
        const NO_TRUNCATION = 0x0001;
        const NO_COMPRESSION = 0x0002;
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WaveLinkOptions: u16 {
        const PHASE_MASTER = 0x0001;
        const MULTI_CHANNEL = 0x0002;
    }
}

pub const LOOP_FORWARD: u32 = 0;
pub const LOOP_RELEASE: u32 = 1;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WaveLoop {
    pub loop_type: u32,
    pub start: u32,
    pub length: u32,
}

/// Contents of a `wsmp` chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WaveSample {
    pub unity_note: u16,
    pub fine_tune: i16,
    /// Gain in 1/655360 dB.
    pub gain: i32,
    pub options: WaveSampleOptions,
    pub wave_loop: Option<WaveLoop>,
}

impl Default for WaveSample {
    fn default() -> Self {
        Self {
            unity_note: 60,
            fine_tune: 0,
            gain: 0,
            options: WaveSampleOptions::empty(),
            wave_loop: None,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WaveLink {
    pub options: WaveLinkOptions,
    pub phase_group: u16,
    pub channel: u32,
    /// Index into [`DlsBank::waves`], already resolved through `ptbl`.
    pub wave: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DlsRegion {
    pub key_range: (u16, u16),
    pub vel_range: (u16, u16),
    pub options: RegionOptions,
    pub key_group: u16,
    pub wave_sample: Option<WaveSample>,
    pub wave_link: WaveLink,
    pub articulation: Option<Articulation>,
}

impl Default for DlsRegion {
    fn default() -> Self {
        Self {
            key_range: (0, 127),
            vel_range: (0, 127),
            options: RegionOptions::empty(),
            key_group: 0,
            wave_sample: None,
            wave_link: WaveLink::default(),
            articulation: None,
        }
    }
}

/// `ulBank` bit marking a drum instrument.
pub const F_INSTRUMENT_DRUMS: u32 = 0x8000_0000;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DlsInstrument {
    pub name: String,
    /// `ulBank`: CC32 in bits 0-6, CC0 in bits 8-14, drums in bit 31.
    pub bank: u32,
    pub program: u32,
    pub regions: Vec<DlsRegion>,
    pub articulation: Option<Articulation>,
}

impl DlsInstrument {
    #[inline]
    pub fn bank_msb(&self) -> u8 {
        ((self.bank >> 8) & 0x7f) as u8
    }

    #[inline]
    pub fn bank_lsb(&self) -> u8 {
        (self.bank & 0x7f) as u8
    }

    #[inline]
    pub fn is_drum(&self) -> bool {
        self.bank & F_INSTRUMENT_DRUMS != 0
    }

    /// Level 1 instruments only carry `lart` articulation.
    pub fn is_level1(&self) -> bool {
        let levels = self
            .articulation
            .iter()
            .chain(self.regions.iter().filter_map(|r| r.articulation.as_ref()))
            .map(|a| a.level);
        let (mut any, mut all_level1) = (false, true);
        for level in levels {
            any = true;
            all_level1 &= level == 1;
        }
        any && all_level1
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DlsWave {
    pub name: String,
    pub sample_rate: u32,
    pub pcm: Vec<i16>,
    pub wave_sample: Option<WaveSample>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DlsBank {
    pub info: BankInfo,
    pub instruments: Vec<DlsInstrument>,
    pub waves: Vec<DlsWave>,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct ConnectionRecord {
    pub source: u16,
    pub control: u16,
    pub destination: u16,
    pub transform: u16,
    pub scale: i32,
}

impl From<&ConnectionBlock> for ConnectionRecord {
    fn from(c: &ConnectionBlock) -> Self {
        Self {
            source: c.source.to_u16(),
            control: c.control.to_u16(),
            destination: c.destination.to_u16(),
            transform: c.transform.bits(),
            scale: c.scale,
        }
    }
}

impl From<&ConnectionRecord> for ConnectionBlock {
    fn from(r: &ConnectionRecord) -> Self {
        Self {
            source: DlsSource::from_u16(r.source),
            control: DlsSource::from_u16(r.control),
            destination: DlsDestination::from_u16(r.destination),
            transform: TransformFlags::from_bits_retain(r.transform),
            scale: r.scale,
        }
    }
}

/// Shared header of `art1`/`art2` and `wsmp`: struct size, then a count.
#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct CountedHeader {
    pub size: u32,
    pub count: u32,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct RegionHeader {
    pub key_low: u16,
    pub key_high: u16,
    pub vel_low: u16,
    pub vel_high: u16,
    pub options: u16,
    pub key_group: u16,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct WaveSampleRecord {
    pub size: u32,
    pub unity_note: u16,
    pub fine_tune: i16,
    pub gain: i32,
    pub options: u32,
    pub loop_count: u32,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct WaveLoopRecord {
    pub size: u32,
    pub loop_type: u32,
    pub start: u32,
    pub length: u32,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct WaveLinkRecord {
    pub options: u16,
    pub phase_group: u16,
    pub channel: u32,
    pub table_index: u32,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct InstrumentHeaderRecord {
    pub regions: u32,
    pub bank: u32,
    pub program: u32,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

pub(crate) const WAVE_FORMAT_PCM: u16 = 1;
pub(crate) const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// Chunks found inside a `DLS ` form, an `ins ` list or a region list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DlsChunk {
    Colh,
    Vers,
    Dlid,
    Ptbl,
    Insh,
    Rgnh,
    Wsmp,
    Wlnk,
    Art1,
    Art2,
    Fmt,
    Data,
    List,
}

impl DlsChunk {
    pub fn from_fourcc(id: &crate::riff::FourCC) -> Option<Self> {
        Some(match id {
            b"colh" => Self::Colh,
            b"vers" => Self::Vers,
            b"dlid" => Self::Dlid,
            b"ptbl" => Self::Ptbl,
            b"insh" => Self::Insh,
            b"rgnh" => Self::Rgnh,
            b"wsmp" => Self::Wsmp,
            b"wlnk" => Self::Wlnk,
            b"art1" => Self::Art1,
            b"art2" => Self::Art2,
            b"fmt " => Self::Fmt,
            b"data" => Self::Data,
            b"LIST" => Self::List,
            _ => return None,
        })
    }
}

/// `LIST` sub-types of a DLS file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DlsList {
    Lins,
    Ins,
    Lrgn,
    Rgn,
    Rgn2,
    Lart,
    Lar2,
    Wvpl,
    Wave,
    Info,
}

impl DlsList {
    pub fn from_fourcc(id: &crate::riff::FourCC) -> Option<Self> {
        Some(match id {
            b"lins" => Self::Lins,
            b"ins " => Self::Ins,
            b"lrgn" => Self::Lrgn,
            b"rgn " => Self::Rgn,
            b"rgn2" => Self::Rgn2,
            b"lart" => Self::Lart,
            b"lar2" => Self::Lar2,
            b"wvpl" => Self::Wvpl,
            b"wave" => Self::Wave,
            b"INFO" => Self::Info,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_fields() {
        let source = InputTransform {
            curve: 1,
            bipolar: false,
            invert: true,
        };
        let control = InputTransform {
            curve: 3,
            bipolar: true,
            invert: false,
        };
        let t = TransformFlags::new(source, control, 2);
        assert_eq!(t.bits(), 0x8000 | 1 << 10 | 0x0100 | 3 << 4 | 2);
        assert_eq!(t.source(), source);
        assert_eq!(t.control(), control);
        assert_eq!(t.output(), 2);
    }

    #[test]
    fn source_ids() {
        assert_eq!(DlsSource::from_u16(0x0087), DlsSource::Cc(7));
        assert_eq!(DlsSource::Cc(91).to_u16(), 0x00db);
        assert_eq!(DlsSource::from_u16(0x0200), DlsSource::Unknown(0x0200));
        assert_eq!(DlsDestination::from_u16(0x020c), DlsDestination::VolEnvHold);
        assert_eq!(DlsDestination::VolEnvHold.to_u16(), 0x020c);
    }

    #[test]
    fn drum_bank() {
        let inst = DlsInstrument {
            bank: F_INSTRUMENT_DRUMS | 2 << 8 | 5,
            ..Default::default()
        };
        assert!(inst.is_drum());
        assert_eq!((inst.bank_msb(), inst.bank_lsb()), (2, 5));
    }
}
