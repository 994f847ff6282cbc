//! SF2 generators: typed, range-limited 16-bit synthesis parameters.

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u16)]
pub enum GeneratorType {
    StartAddrsOffset = 0,
    EndAddrOffset = 1,
    StartloopAddrsOffset = 2,
    EndloopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    Unused1 = 14,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    DelayModLfo = 21,
    FreqModLfo = 22,
    DelayVibLfo = 23,
    FreqVibLfo = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeyNumToModEnvHold = 31,
    KeyNumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeyNumToVolEnvHold = 39,
    KeyNumToVolEnvDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelRange = 44,
    StartloopAddrsCoarseOffset = 45,
    KeyNum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    Reserved2 = 49,
    EndloopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    Reserved3 = 55,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
    Unused5 = 59,
    EndOper = 60,
}

/// Inclusive value range and default of a generator type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GeneratorLimits {
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

const fn limits(min: i32, max: i32, default: i32) -> Option<GeneratorLimits> {
    Some(GeneratorLimits { min, max, default })
}

impl GeneratorType {
    pub const COUNT: usize = 61;

    pub const ALL: [GeneratorType; Self::COUNT] = {
        use GeneratorType::*;
        [
            StartAddrsOffset,
            EndAddrOffset,
            StartloopAddrsOffset,
            EndloopAddrsOffset,
            StartAddrsCoarseOffset,
            ModLfoToPitch,
            VibLfoToPitch,
            ModEnvToPitch,
            InitialFilterFc,
            InitialFilterQ,
            ModLfoToFilterFc,
            ModEnvToFilterFc,
            EndAddrsCoarseOffset,
            ModLfoToVolume,
            Unused1,
            ChorusEffectsSend,
            ReverbEffectsSend,
            Pan,
            Unused2,
            Unused3,
            Unused4,
            DelayModLfo,
            FreqModLfo,
            DelayVibLfo,
            FreqVibLfo,
            DelayModEnv,
            AttackModEnv,
            HoldModEnv,
            DecayModEnv,
            SustainModEnv,
            ReleaseModEnv,
            KeyNumToModEnvHold,
            KeyNumToModEnvDecay,
            DelayVolEnv,
            AttackVolEnv,
            HoldVolEnv,
            DecayVolEnv,
            SustainVolEnv,
            ReleaseVolEnv,
            KeyNumToVolEnvHold,
            KeyNumToVolEnvDecay,
            Instrument,
            Reserved1,
            KeyRange,
            VelRange,
            StartloopAddrsCoarseOffset,
            KeyNum,
            Velocity,
            InitialAttenuation,
            Reserved2,
            EndloopAddrsCoarseOffset,
            CoarseTune,
            FineTune,
            SampleId,
            SampleModes,
            Reserved3,
            ScaleTuning,
            ExclusiveClass,
            OverridingRootKey,
            Unused5,
            EndOper,
        ]
    };

    #[inline]
    pub fn from_u16(id: u16) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    #[inline]
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Value limits, `None` for types that carry no plain numeric value
    /// (ranges, indices and unused slots).
    pub fn limits(self) -> Option<GeneratorLimits> {
        use GeneratorType::*;
        match self {
            StartAddrsOffset | StartAddrsCoarseOffset => limits(0, 32768, 0),
            EndAddrOffset
            | StartloopAddrsOffset
            | EndloopAddrsOffset
            | EndAddrsCoarseOffset
            | StartloopAddrsCoarseOffset
            | EndloopAddrsCoarseOffset => limits(-32768, 32768, 0),
            ModLfoToPitch | VibLfoToPitch | ModEnvToPitch | ModLfoToFilterFc
            | ModEnvToFilterFc => limits(-12000, 12000, 0),
            InitialFilterFc => limits(1500, 13500, 13500),
            InitialFilterQ => limits(0, 960, 0),
            ModLfoToVolume => limits(-960, 960, 0),
            ChorusEffectsSend | ReverbEffectsSend => limits(0, 1000, 0),
            Pan => limits(-500, 500, 0),
            DelayModLfo | DelayVibLfo => limits(-12000, 5000, -12000),
            FreqModLfo | FreqVibLfo => limits(-16000, 4500, 0),
            DelayModEnv => limits(-32768, 5000, -32768),
            AttackModEnv => limits(-32768, 8000, -32768),
            HoldModEnv | DelayVolEnv | HoldVolEnv => limits(-12000, 5000, -12000),
            DecayModEnv | ReleaseModEnv | AttackVolEnv | DecayVolEnv | ReleaseVolEnv => {
                limits(-12000, 8000, -12000)
            }
            SustainModEnv => limits(0, 1000, 0),
            SustainVolEnv => limits(0, 1440, 0),
            KeyNumToModEnvHold | KeyNumToModEnvDecay | KeyNumToVolEnvHold
            | KeyNumToVolEnvDecay => limits(-1200, 1200, 0),
            KeyNum | Velocity | OverridingRootKey => limits(-1, 127, -1),
            InitialAttenuation => limits(0, 1440, 0),
            CoarseTune => limits(-120, 120, 0),
            FineTune => limits(-12700, 12700, 0),
            SampleModes => limits(0, 3, 0),
            ScaleTuning => limits(0, 1200, 100),
            ExclusiveClass => limits(0, 32767, 0),
            Unused1 | Unused2 | Unused3 | Unused4 | Unused5 | Reserved1 | Reserved2
            | Reserved3 | Instrument | KeyRange | VelRange | SampleId | EndOper => None,
        }
    }

    #[inline]
    pub fn default_value(self) -> i16 {
        self.limits().map(|l| l.default as i16).unwrap_or(0)
    }

    #[inline]
    pub fn is_range(self) -> bool {
        matches!(self, Self::KeyRange | Self::VelRange)
    }

    /// Generators that hold a reference to the zone's target.
    #[inline]
    pub fn is_index(self) -> bool {
        matches!(self, Self::Instrument | Self::SampleId)
    }

    pub fn name(self) -> &'static str {
        use GeneratorType::*;
        match self {
            StartAddrsOffset => "startAddrsOffset",
            EndAddrOffset => "endAddrOffset",
            StartloopAddrsOffset => "startloopAddrsOffset",
            EndloopAddrsOffset => "endloopAddrsOffset",
            StartAddrsCoarseOffset => "startAddrsCoarseOffset",
            ModLfoToPitch => "modLfoToPitch",
            VibLfoToPitch => "vibLfoToPitch",
            ModEnvToPitch => "modEnvToPitch",
            InitialFilterFc => "initialFilterFc",
            InitialFilterQ => "initialFilterQ",
            ModLfoToFilterFc => "modLfoToFilterFc",
            ModEnvToFilterFc => "modEnvToFilterFc",
            EndAddrsCoarseOffset => "endAddrsCoarseOffset",
            ModLfoToVolume => "modLfoToVolume",
            ChorusEffectsSend => "chorusEffectsSend",
            ReverbEffectsSend => "reverbEffectsSend",
            Pan => "pan",
            DelayModLfo => "delayModLFO",
            FreqModLfo => "freqModLFO",
            DelayVibLfo => "delayVibLFO",
            FreqVibLfo => "freqVibLFO",
            DelayModEnv => "delayModEnv",
            AttackModEnv => "attackModEnv",
            HoldModEnv => "holdModEnv",
            DecayModEnv => "decayModEnv",
            SustainModEnv => "sustainModEnv",
            ReleaseModEnv => "releaseModEnv",
            KeyNumToModEnvHold => "keyNumToModEnvHold",
            KeyNumToModEnvDecay => "keyNumToModEnvDecay",
            DelayVolEnv => "delayVolEnv",
            AttackVolEnv => "attackVolEnv",
            HoldVolEnv => "holdVolEnv",
            DecayVolEnv => "decayVolEnv",
            SustainVolEnv => "sustainVolEnv",
            ReleaseVolEnv => "releaseVolEnv",
            KeyNumToVolEnvHold => "keyNumToVolEnvHold",
            KeyNumToVolEnvDecay => "keyNumToVolEnvDecay",
            Instrument => "instrument",
            KeyRange => "keyRange",
            VelRange => "velRange",
            StartloopAddrsCoarseOffset => "startloopAddrsCoarseOffset",
            KeyNum => "keyNum",
            Velocity => "velocity",
            InitialAttenuation => "initialAttenuation",
            EndloopAddrsCoarseOffset => "endloopAddrsCoarseOffset",
            CoarseTune => "coarseTune",
            FineTune => "fineTune",
            SampleId => "sampleID",
            SampleModes => "sampleModes",
            ScaleTuning => "scaleTuning",
            ExclusiveClass => "exclusiveClass",
            OverridingRootKey => "overridingRootKey",
            EndOper => "endOper",
            Unused1 | Unused2 | Unused3 | Unused4 | Unused5 => "unused",
            Reserved1 | Reserved2 | Reserved3 => "reserved",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Generator {
    pub ty: GeneratorType,
    pub value: i16,
}

impl Generator {
    /// Creates a generator, clamping `value` into the type's limits.
    #[inline]
    pub fn new(ty: GeneratorType, value: i32) -> Self {
        let value = match ty.limits() {
            Some(l) => value.clamp(l.min, l.max),
            None => value,
        };
        Self::unclamped(ty, value)
    }

    /// Creates a generator without applying the type's limits.
    ///
    /// Used for values that are only valid together with a paired
    /// key-number scaling generator, and for values read from files.
    #[inline]
    pub fn unclamped(ty: GeneratorType, value: i32) -> Self {
        Self {
            ty,
            value: value.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
        }
    }

    /// Raw 16-bit amount as stored in a generator record.
    #[inline]
    pub fn amount(&self) -> u16 {
        self.value as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for (id, ty) in GeneratorType::ALL.iter().enumerate() {
            assert_eq!(ty.id() as usize, id);
            assert_eq!(GeneratorType::from_u16(id as u16), Some(*ty));
        }
        assert_eq!(GeneratorType::from_u16(61), None);
    }

    #[test]
    fn clamps_to_limits() {
        assert_eq!(Generator::new(GeneratorType::Pan, 900).value, 500);
        assert_eq!(Generator::new(GeneratorType::InitialFilterFc, 0).value, 1500);
        assert_eq!(Generator::new(GeneratorType::ScaleTuning, 50).value, 50);
        assert_eq!(Generator::unclamped(GeneratorType::HoldVolEnv, -12600).value, -12600);
        assert_eq!(Generator::new(GeneratorType::HoldVolEnv, -12600).value, -12000);
        assert_eq!(Generator::new(GeneratorType::StartAddrsOffset, 40000).value, i16::MAX);
    }

    #[test]
    fn defaults() {
        assert_eq!(GeneratorType::ScaleTuning.default_value(), 100);
        assert_eq!(GeneratorType::InitialFilterFc.default_value(), 13500);
        assert_eq!(GeneratorType::OverridingRootKey.default_value(), -1);
        assert_eq!(GeneratorType::Pan.default_value(), 0);
        assert_eq!(GeneratorType::SampleId.default_value(), 0);
    }
}
