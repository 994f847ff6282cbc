//! SF2 modulators: controller source, optional amount source and curve,
//! routed into a generator destination.

use crate::generator::GeneratorType;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ModulatorCurve {
    #[default]
    Linear = 0,
    Concave = 1,
    Convex = 2,
    Switch = 3,
}

impl ModulatorCurve {
    #[inline]
    pub fn from_bits(bits: u16) -> Self {
        match bits {
            1 => Self::Concave,
            2 => Self::Convex,
            3 => Self::Switch,
            _ => Self::Linear,
        }
    }
}

/// Indices of the non-CC (general controller palette) sources.
pub mod source {
    pub const NO_CONTROLLER: u8 = 0;
    pub const NOTE_ON_VELOCITY: u8 = 2;
    pub const NOTE_ON_KEY_NUM: u8 = 3;
    pub const POLY_PRESSURE: u8 = 10;
    pub const CHANNEL_PRESSURE: u8 = 13;
    pub const PITCH_WHEEL: u8 = 14;
    pub const PITCH_WHEEL_RANGE: u8 = 16;
    pub const LINK: u8 = 127;
}

/// A packed SF2 modulator source operand.
///
/// Bits 0-6 index, bit 7 CC flag, bit 8 direction, bit 9 polarity,
/// bits 10-15 curve type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ModulatorSource {
    pub index: u8,
    pub is_cc: bool,
    pub negative: bool,
    pub bipolar: bool,
    pub curve: ModulatorCurve,
}

impl ModulatorSource {
    pub const NONE: Self = Self {
        index: source::NO_CONTROLLER,
        is_cc: false,
        negative: false,
        bipolar: false,
        curve: ModulatorCurve::Linear,
    };

    #[inline]
    pub const fn general(index: u8) -> Self {
        Self {
            index,
            is_cc: false,
            negative: false,
            bipolar: false,
            curve: ModulatorCurve::Linear,
        }
    }

    #[inline]
    pub const fn cc(controller: u8) -> Self {
        Self {
            index: controller & 0x7f,
            is_cc: true,
            negative: false,
            bipolar: false,
            curve: ModulatorCurve::Linear,
        }
    }

    #[inline]
    pub const fn with_negative(mut self, negative: bool) -> Self {
        self.negative = negative;
        self
    }

    #[inline]
    pub const fn with_bipolar(mut self, bipolar: bool) -> Self {
        self.bipolar = bipolar;
        self
    }

    #[inline]
    pub const fn with_curve(mut self, curve: ModulatorCurve) -> Self {
        self.curve = curve;
        self
    }

    #[inline]
    pub fn from_u16(v: u16) -> Self {
        Self {
            index: (v & 0x7f) as u8,
            is_cc: v & 0x80 != 0,
            negative: v & 0x100 != 0,
            bipolar: v & 0x200 != 0,
            curve: ModulatorCurve::from_bits(v >> 10),
        }
    }

    #[inline]
    pub fn to_u16(self) -> u16 {
        (self.index as u16 & 0x7f)
            | (self.is_cc as u16) << 7
            | (self.negative as u16) << 8
            | (self.bipolar as u16) << 9
            | (self.curve as u16) << 10
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        !self.is_cc && self.index == source::NO_CONTROLLER
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum ModulatorTransform {
    #[default]
    Linear = 0,
    AbsoluteValue = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Modulator {
    pub source: ModulatorSource,
    pub secondary_source: ModulatorSource,
    pub destination: GeneratorType,
    pub amount: i16,
    pub transform: ModulatorTransform,
}

impl Modulator {
    #[inline]
    pub fn new(
        source: ModulatorSource,
        secondary_source: ModulatorSource,
        destination: GeneratorType,
        amount: i16,
    ) -> Self {
        Self {
            source,
            secondary_source,
            destination,
            amount,
            transform: ModulatorTransform::Linear,
        }
    }

    /// Builds a modulator from the five fields of an SF2 modulator record.
    ///
    /// Returns `None` when the destination is not a generator (linked
    /// modulators and garbage values).
    pub fn from_record(
        source: u16,
        destination: u16,
        amount: i16,
        amount_source: u16,
        transform: u16,
    ) -> Option<Self> {
        let destination = GeneratorType::from_u16(destination)?;
        Some(Self {
            source: ModulatorSource::from_u16(source),
            secondary_source: ModulatorSource::from_u16(amount_source),
            destination,
            amount,
            transform: match transform {
                2 => ModulatorTransform::AbsoluteValue,
                _ => ModulatorTransform::Linear,
            },
        })
    }

    /// Two modulators are identical when they route the same sources into
    /// the same destination with the same transform. The amount is compared
    /// only when asked to.
    #[inline]
    pub fn is_identical(&self, other: &Self, check_amount: bool) -> bool {
        self.source == other.source
            && self.secondary_source == other.secondary_source
            && self.destination == other.destination
            && self.transform == other.transform
            && (!check_amount || self.amount == other.amount)
    }
}

/// The implicit modulator set of SF2 2.04, applied to every instrument.
pub fn default_modulators() -> Vec<Modulator> {
    use crate::generator::GeneratorType::*;
    use source::*;
    use ModulatorCurve::*;
    let none = ModulatorSource::NONE;
    vec![
        Modulator::new(
            ModulatorSource::general(NOTE_ON_VELOCITY)
                .with_negative(true)
                .with_curve(Concave),
            none,
            InitialAttenuation,
            960,
        ),
        Modulator::new(
            ModulatorSource::general(NOTE_ON_VELOCITY).with_negative(true),
            none,
            InitialFilterFc,
            -2400,
        ),
        Modulator::new(
            ModulatorSource::general(CHANNEL_PRESSURE),
            none,
            VibLfoToPitch,
            50,
        ),
        Modulator::new(ModulatorSource::cc(1), none, VibLfoToPitch, 50),
        Modulator::new(
            ModulatorSource::cc(7).with_negative(true).with_curve(Concave),
            none,
            InitialAttenuation,
            960,
        ),
        Modulator::new(
            ModulatorSource::cc(10).with_bipolar(true),
            none,
            Pan,
            1000,
        ),
        Modulator::new(
            ModulatorSource::cc(11).with_negative(true).with_curve(Concave),
            none,
            InitialAttenuation,
            960,
        ),
        Modulator::new(ModulatorSource::cc(91), none, ReverbEffectsSend, 200),
        Modulator::new(ModulatorSource::cc(93), none, ChorusEffectsSend, 200),
        Modulator::new(
            ModulatorSource::general(PITCH_WHEEL).with_bipolar(true),
            ModulatorSource::general(PITCH_WHEEL_RANGE),
            FineTune,
            12700,
        ),
    ]
}

/// Modulators that silence the default vibrato routings, added to DLS
/// level 1 instruments which have no vibrato LFO.
pub fn dls1_vibrato_overrides() -> [Modulator; 2] {
    [
        Modulator::new(
            ModulatorSource::cc(1),
            ModulatorSource::NONE,
            GeneratorType::VibLfoToPitch,
            0,
        ),
        Modulator::new(
            ModulatorSource::general(source::CHANNEL_PRESSURE),
            ModulatorSource::NONE,
            GeneratorType::VibLfoToPitch,
            0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sources_match_the_sf2_table() {
        let mods = default_modulators();
        let packed: Vec<u16> = mods.iter().map(|m| m.source.to_u16()).collect();
        assert_eq!(
            packed,
            [0x0502, 0x0102, 0x000D, 0x0081, 0x0587, 0x028A, 0x058B, 0x00DB, 0x00DD, 0x020E]
        );
        assert_eq!(mods[9].secondary_source.to_u16(), 0x0010);
    }

    #[test]
    fn source_bits() {
        let src = ModulatorSource::from_u16(0x0587);
        assert_eq!(src.index, 7);
        assert!(src.is_cc);
        assert!(src.negative);
        assert!(!src.bipolar);
        assert_eq!(src.curve, ModulatorCurve::Concave);
        assert_eq!(src.to_u16(), 0x0587);
    }

    #[test]
    fn identity_ignores_amount_on_request() {
        let a = default_modulators()[3];
        let mut b = a;
        b.amount = 0;
        assert!(a.is_identical(&b, false));
        assert!(!a.is_identical(&b, true));
        assert!(dls1_vibrato_overrides()[0].is_identical(&a, false));
    }

    #[test]
    fn link_destinations_are_rejected() {
        assert!(Modulator::from_record(0x0081, 0x8001, 10, 0, 0).is_none());
        assert!(Modulator::from_record(0x0081, 17, 10, 0, 2).is_some());
    }
}
