//! Translation between DLS connection blocks and SF2 generators/modulators.
//!
//! A block with neither source nor control sets a generator. A block whose
//! source is an LFO, envelope or the key number and whose destination forms
//! an SF2 "X to Y" generator sets that generator, or becomes a modulator
//! driving it when a controller is attached. Everything else becomes a
//! modulator when both ends have an SF2 counterpart.

use super::{to_scale, ConnectionBlock, DlsDestination, DlsSource, InputTransform, TransformFlags};
use crate::{
    generator::GeneratorType,
    modulator::{source, Modulator, ModulatorCurve, ModulatorSource},
    zone::Zone,
};

/// Destinations that map one to one onto a generator.
const FIXED: [(DlsDestination, GeneratorType); 26] = {
    use DlsDestination as D;
    use GeneratorType as G;
    [
        (D::Gain, G::InitialAttenuation),
        (D::Pitch, G::FineTune),
        (D::Pan, G::Pan),
        (D::KeyNumber, G::KeyNum),
        (D::Chorus, G::ChorusEffectsSend),
        (D::Reverb, G::ReverbEffectsSend),
        (D::ModLfoFrequency, G::FreqModLfo),
        (D::ModLfoDelay, G::DelayModLfo),
        (D::VibLfoFrequency, G::FreqVibLfo),
        (D::VibLfoDelay, G::DelayVibLfo),
        (D::VolEnvDelay, G::DelayVolEnv),
        (D::VolEnvAttack, G::AttackVolEnv),
        (D::VolEnvHold, G::HoldVolEnv),
        (D::VolEnvDecay, G::DecayVolEnv),
        (D::VolEnvSustain, G::SustainVolEnv),
        (D::VolEnvRelease, G::ReleaseVolEnv),
        (D::ModEnvDelay, G::DelayModEnv),
        (D::ModEnvAttack, G::AttackModEnv),
        (D::ModEnvHold, G::HoldModEnv),
        (D::ModEnvDecay, G::DecayModEnv),
        (D::ModEnvSustain, G::SustainModEnv),
        (D::ModEnvRelease, G::ReleaseModEnv),
        (D::FilterCutoff, G::InitialFilterFc),
        (D::FilterQ, G::InitialFilterQ),
        // no SF2 counterpart, kept so both directions skip them the same way
        (D::VolEnvShutdown, G::EndOper),
        (D::None, G::EndOper),
    ]
};

/// `source → destination` pairs forming a single generator.
const COMBINED: [(DlsSource, DlsDestination, GeneratorType); 11] = {
    use DlsDestination as D;
    use DlsSource as S;
    use GeneratorType as G;
    [
        (S::ModLfo, D::Pitch, G::ModLfoToPitch),
        (S::VibLfo, D::Pitch, G::VibLfoToPitch),
        (S::ModLfo, D::FilterCutoff, G::ModLfoToFilterFc),
        (S::ModLfo, D::Gain, G::ModLfoToVolume),
        (S::ModEnv, D::Pitch, G::ModEnvToPitch),
        (S::ModEnv, D::FilterCutoff, G::ModEnvToFilterFc),
        (S::KeyNumber, D::Pitch, G::ScaleTuning),
        (S::KeyNumber, D::VolEnvHold, G::KeyNumToVolEnvHold),
        (S::KeyNumber, D::VolEnvDecay, G::KeyNumToVolEnvDecay),
        (S::KeyNumber, D::ModEnvHold, G::KeyNumToModEnvHold),
        (S::KeyNumber, D::ModEnvDecay, G::KeyNumToModEnvDecay),
    ]
};

/// Key scaling generators and the envelope stage they scale.
const KEY_SCALED: [(GeneratorType, GeneratorType); 4] = [
    (GeneratorType::KeyNumToVolEnvHold, GeneratorType::HoldVolEnv),
    (GeneratorType::KeyNumToVolEnvDecay, GeneratorType::DecayVolEnv),
    (GeneratorType::KeyNumToModEnvHold, GeneratorType::HoldModEnv),
    (GeneratorType::KeyNumToModEnvDecay, GeneratorType::DecayModEnv),
];

/// Largest key scaling that gets its absolute stage corrected.
const KEY_SCALING_CORRECTION_LIMIT: i32 = 120;

fn fixed_generator(dest: DlsDestination) -> Option<GeneratorType> {
    FIXED
        .iter()
        .find(|(d, _)| *d == dest)
        .map(|(_, g)| *g)
        .filter(|g| *g != GeneratorType::EndOper)
}

fn fixed_destination(ty: GeneratorType) -> Option<DlsDestination> {
    FIXED
        .iter()
        .find(|(_, g)| *g == ty && ty != GeneratorType::EndOper)
        .map(|(d, _)| *d)
}

fn combined_generator(src: DlsSource, dest: DlsDestination) -> Option<GeneratorType> {
    COMBINED
        .iter()
        .find(|(s, d, _)| *s == src && *d == dest)
        .map(|(_, _, g)| *g)
}

fn combined_routing(ty: GeneratorType) -> Option<(DlsSource, DlsDestination)> {
    COMBINED
        .iter()
        .find(|(_, _, g)| *g == ty)
        .map(|(s, d, _)| (*s, *d))
}

/// DLS `gain` in centibels to SF2 attenuation, with the E-MU 0.4 factor.
#[inline]
pub fn gain_to_attenuation(gain: i32) -> i32 {
    (-gain as f64 / 0.4).round() as i32
}

#[inline]
pub fn attenuation_to_gain(attenuation: i32) -> i32 {
    (-attenuation as f64 * 0.4).round() as i32
}

fn to_sf2_source(src: DlsSource, t: InputTransform) -> Option<ModulatorSource> {
    use source::*;
    let base = match src {
        DlsSource::None => return Some(ModulatorSource::NONE),
        DlsSource::KeyOnVelocity => ModulatorSource::general(NOTE_ON_VELOCITY),
        DlsSource::KeyNumber => ModulatorSource::general(NOTE_ON_KEY_NUM),
        DlsSource::PitchWheel => ModulatorSource::general(PITCH_WHEEL),
        DlsSource::PolyPressure => ModulatorSource::general(POLY_PRESSURE),
        DlsSource::ChannelPressure => ModulatorSource::general(CHANNEL_PRESSURE),
        DlsSource::PitchBendRange => ModulatorSource::general(PITCH_WHEEL_RANGE),
        DlsSource::Cc(cc) => ModulatorSource::cc(cc),
        _ => return None,
    };
    Some(
        base.with_curve(ModulatorCurve::from_bits(t.curve as u16))
            .with_bipolar(t.bipolar)
            .with_negative(t.invert),
    )
}

fn to_dls_source(src: ModulatorSource) -> Option<(DlsSource, InputTransform)> {
    use source::*;
    let dls = match (src.is_cc, src.index) {
        (true, cc) => DlsSource::Cc(cc),
        (false, NO_CONTROLLER) => return Some((DlsSource::None, InputTransform::default())),
        (false, NOTE_ON_VELOCITY) => DlsSource::KeyOnVelocity,
        (false, NOTE_ON_KEY_NUM) => DlsSource::KeyNumber,
        (false, PITCH_WHEEL) => DlsSource::PitchWheel,
        (false, POLY_PRESSURE) => DlsSource::PolyPressure,
        (false, CHANNEL_PRESSURE) => DlsSource::ChannelPressure,
        (false, PITCH_WHEEL_RANGE) => DlsSource::PitchBendRange,
        _ => return None,
    };
    let t = InputTransform {
        curve: src.curve as u8,
        bipolar: src.bipolar,
        invert: src.negative,
    };
    Some((dls, t))
}

#[inline]
fn clamp_amount(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Volume sources whose attenuation modulators are always inverted.
fn is_volume_source(src: &ModulatorSource) -> bool {
    match src.is_cc {
        true => src.index == 7 || src.index == 11,
        false => src.index == source::NOTE_ON_VELOCITY,
    }
}

/// Builds the modulator for a block with a controller attached.
fn to_modulator(block: &ConnectionBlock) -> Option<Modulator> {
    let value = block.value();
    // a controller scaling an LFO or envelope routing drives that routing's generator
    if let Some(ty) = combined_generator(block.source, block.destination) {
        if block.source != DlsSource::KeyNumber {
            let primary = to_sf2_source(block.control, block.transform.control())?;
            return Some(Modulator::new(primary, ModulatorSource::NONE, ty, clamp_amount(value)));
        }
    }

    let (src, src_t, ctrl, ctrl_t) = match block.source {
        DlsSource::None => (block.control, block.transform.control(), DlsSource::None, InputTransform::default()),
        s => (s, block.transform.source(), block.control, block.transform.control()),
    };
    let mut primary = to_sf2_source(src, src_t)?;
    let secondary = to_sf2_source(ctrl, ctrl_t)?;
    let dest = fixed_generator(block.destination)?;
    if block.transform.output() != 0 && primary.curve == ModulatorCurve::Linear {
        primary.curve = ModulatorCurve::from_bits(block.transform.output() as u16);
    }

    let amount = match dest {
        GeneratorType::InitialAttenuation => {
            if is_volume_source(&primary) && !primary.negative {
                log::debug!("inverting attenuation modulator source {primary:?}");
                primary.negative = true;
            }
            gain_to_attenuation(value).clamp(0, 960)
        }
        GeneratorType::SustainVolEnv | GeneratorType::SustainModEnv => -value,
        _ => value,
    };
    Some(Modulator::new(primary, secondary, dest, clamp_amount(amount)))
}

/// Applies connection blocks to `zone`.
///
/// Returns the static pitch offset in cents, which the caller folds into the
/// zone's tuning together with the wave sample fine tune.
pub fn connections_to_zone(connections: &[ConnectionBlock], zone: &mut Zone) -> i32 {
    let mut pitch = 0;
    let mut key_scaling = Vec::new();

    for block in connections {
        let value = block.value();
        let combined = match block.control {
            DlsSource::None => combined_generator(block.source, block.destination),
            _ => None,
        };
        match (block.source, block.control, combined) {
            (DlsSource::None, DlsSource::None, _) => match block.destination {
                DlsDestination::Pitch => pitch += value,
                DlsDestination::Gain => {
                    zone.set_generator(GeneratorType::InitialAttenuation, gain_to_attenuation(value), true)
                }
                DlsDestination::VolEnvSustain => {
                    zone.set_generator(GeneratorType::SustainVolEnv, 1000 - value, true)
                }
                DlsDestination::ModEnvSustain => {
                    zone.set_generator(GeneratorType::SustainModEnv, 1000 - value, true)
                }
                dest => match fixed_generator(dest) {
                    Some(ty) => zone.set_generator(ty, value, true),
                    None => log::warn!("skipping connection to unsupported destination {dest:?}"),
                },
            },
            (_, _, Some(GeneratorType::ScaleTuning)) => {
                zone.set_generator(GeneratorType::ScaleTuning, value / 128, true)
            }
            (_, _, Some(ty)) if KEY_SCALED.iter().any(|(k, _)| *k == ty) => {
                zone.set_generator(ty, value / -128, true);
                key_scaling.push((ty, value));
            }
            (_, _, Some(ty)) => zone.set_generator(ty, value, true),
            _ => match to_modulator(block) {
                Some(m) => zone.modulators.push(m),
                None => log::warn!(
                    "skipping connection {:?} x {:?} -> {:?}",
                    block.source,
                    block.control,
                    block.destination
                ),
            },
        }
    }

    // DLS scales envelope times by key/128, SF2 around key 60
    for (ty, amount) in key_scaling {
        let Some((_, stage)) = KEY_SCALED.iter().find(|(k, _)| *k == ty) else {
            continue;
        };
        let sf_value = amount / -128;
        if let Some(base) = zone.get_generator(*stage) {
            if sf_value <= KEY_SCALING_CORRECTION_LIMIT {
                // may leave the stage below its limit, the key scaling brings it back
                let correction = (60.0 / 128.0 * amount as f64).round() as i32;
                zone.set_generator(*stage, base as i32 + correction, false);
            }
        }
    }
    pitch
}

/// Generators carried by the region header and wave sample instead of
/// connection blocks.
pub fn is_region_generator(ty: GeneratorType) -> bool {
    use GeneratorType::*;
    ty.is_range()
        || ty.is_index()
        || matches!(
            ty,
            StartAddrsOffset
                | EndAddrOffset
                | StartloopAddrsOffset
                | EndloopAddrsOffset
                | StartAddrsCoarseOffset
                | EndAddrsCoarseOffset
                | StartloopAddrsCoarseOffset
                | EndloopAddrsCoarseOffset
                | FineTune
                | OverridingRootKey
                | InitialAttenuation
                | SampleModes
                | ExclusiveClass
        )
}

fn modulator_to_connection(m: &Modulator) -> Option<ConnectionBlock> {
    let (primary, primary_t) = to_dls_source(m.source)?;
    let (secondary, secondary_t) = to_dls_source(m.secondary_source)?;

    if let Some((src, dest)) = combined_routing(m.destination) {
        if src != DlsSource::KeyNumber && secondary == DlsSource::None {
            return Some(ConnectionBlock {
                source: src,
                control: primary,
                destination: dest,
                transform: TransformFlags::new(InputTransform::default(), primary_t, 0),
                scale: to_scale(m.amount as i32),
            });
        }
        return None;
    }

    let dest = fixed_destination(m.destination)?;
    let amount = match m.destination {
        GeneratorType::InitialAttenuation => attenuation_to_gain(m.amount as i32),
        GeneratorType::SustainVolEnv | GeneratorType::SustainModEnv => -(m.amount as i32),
        _ => m.amount as i32,
    };
    Some(ConnectionBlock {
        source: primary,
        control: secondary,
        destination: dest,
        transform: TransformFlags::new(primary_t, secondary_t, 0),
        scale: to_scale(amount),
    })
}

/// Converts the articulation part of a zone into connection blocks.
/// Generators in [`is_region_generator`] are left to the caller.
pub fn zone_to_connections(zone: &Zone) -> Vec<ConnectionBlock> {
    let mut out = Vec::new();
    for gen in &zone.generators {
        let value = gen.value as i32;
        match gen.ty {
            ty if is_region_generator(ty) => {}
            GeneratorType::CoarseTune => out.push(ConnectionBlock::fixed(DlsDestination::Pitch, value * 100)),
            GeneratorType::SustainVolEnv => {
                out.push(ConnectionBlock::fixed(DlsDestination::VolEnvSustain, 1000 - value))
            }
            GeneratorType::SustainModEnv => {
                out.push(ConnectionBlock::fixed(DlsDestination::ModEnvSustain, 1000 - value))
            }
            ty if KEY_SCALED.iter().any(|(s, _)| *s == ty) => {
                let Some((src, dest)) = combined_routing(ty) else { continue };
                out.push(ConnectionBlock {
                    source: src,
                    control: DlsSource::None,
                    destination: dest,
                    transform: TransformFlags::empty(),
                    scale: to_scale(value * -128),
                });
            }
            ty if KEY_SCALED.iter().any(|(_, stage)| *stage == ty) => {
                let Some(dest) = fixed_destination(ty) else { continue };
                let scaling = KEY_SCALED
                    .iter()
                    .find(|(_, stage)| *stage == ty)
                    .and_then(|(k, _)| zone.get_generator(*k))
                    .map_or(0, |v| v as i32);
                let value = match scaling <= KEY_SCALING_CORRECTION_LIMIT {
                    true => value + 60 * scaling,
                    false => value,
                };
                out.push(ConnectionBlock::fixed(dest, value));
            }
            GeneratorType::ScaleTuning => out.push(ConnectionBlock {
                source: DlsSource::KeyNumber,
                control: DlsSource::None,
                destination: DlsDestination::Pitch,
                transform: TransformFlags::empty(),
                scale: to_scale(value * 128),
            }),
            ty => match (combined_routing(ty), fixed_destination(ty)) {
                (Some((src, dest)), _) => out.push(ConnectionBlock {
                    source: src,
                    control: DlsSource::None,
                    destination: dest,
                    transform: TransformFlags::empty(),
                    scale: to_scale(value),
                }),
                (None, Some(dest)) => out.push(ConnectionBlock::fixed(dest, value)),
                (None, None) => log::debug!("{} has no DLS connection, dropping it", ty.name()),
            },
        }
    }

    for m in &zone.modulators {
        match modulator_to_connection(m) {
            Some(block) => out.push(block),
            None => log::warn!("modulator {:?} -> {} has no DLS connection", m.source, m.destination.name()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn block(source: DlsSource, control: DlsSource, destination: DlsDestination, value: i32) -> ConnectionBlock {
        ConnectionBlock {
            source,
            control,
            destination,
            transform: TransformFlags::empty(),
            scale: value << 16,
        }
    }

    #[test]
    fn mod_lfo_to_pitch_round_trips() {
        let original = block(DlsSource::ModLfo, DlsSource::None, DlsDestination::Pitch, 75);
        let mut zone = Zone::new();
        assert_eq!(connections_to_zone(&[original], &mut zone), 0);
        assert_eq!(zone.get_generator(GeneratorType::ModLfoToPitch), Some(75));
        assert_eq!(zone_to_connections(&zone), vec![original]);
    }

    #[test]
    fn gain_uses_emu_factor() {
        let mut zone = Zone::new();
        connections_to_zone(&[ConnectionBlock::fixed(DlsDestination::Gain, -400)], &mut zone);
        assert_eq!(zone.get_generator(GeneratorType::InitialAttenuation), Some(1000));
        assert_eq!(attenuation_to_gain(1000), -400);
    }

    #[test]
    fn key_scaling_corrects_the_stage() {
        let mut zone = Zone::new();
        let blocks = [
            ConnectionBlock::fixed(DlsDestination::VolEnvHold, -2000),
            block(DlsSource::KeyNumber, DlsSource::None, DlsDestination::VolEnvHold, -1280),
        ];
        connections_to_zone(&blocks, &mut zone);
        assert_eq!(zone.get_generator(GeneratorType::KeyNumToVolEnvHold), Some(10));
        assert_eq!(zone.get_generator(GeneratorType::HoldVolEnv), Some(-2600));

        let back = zone_to_connections(&zone);
        assert!(back.contains(&blocks[0]));
        assert!(back.contains(&blocks[1]));
    }

    #[test]
    fn corrected_stage_may_leave_its_limits() {
        let mut zone = Zone::new();
        let blocks = [
            ConnectionBlock::fixed(DlsDestination::VolEnvHold, -12000),
            block(DlsSource::KeyNumber, DlsSource::None, DlsDestination::VolEnvHold, -1280),
        ];
        connections_to_zone(&blocks, &mut zone);
        assert_eq!(zone.get_generator(GeneratorType::HoldVolEnv), Some(-12600));

        let back = zone_to_connections(&zone);
        assert!(back.contains(&blocks[0]));
        assert!(back.contains(&blocks[1]));
    }

    #[test]
    fn output_curve_reaches_linear_source() {
        let mut zone = Zone::new();
        let b = ConnectionBlock {
            transform: TransformFlags::new(InputTransform::default(), InputTransform::default(), 2),
            ..block(DlsSource::Cc(10), DlsSource::None, DlsDestination::Pan, 500)
        };
        connections_to_zone(&[b], &mut zone);
        assert_eq!(zone.modulators.len(), 1);
        let m = zone.modulators[0];
        assert_eq!(m.source, ModulatorSource::cc(10).with_curve(ModulatorCurve::Convex));
        assert_eq!((m.destination, m.amount), (GeneratorType::Pan, 500));
    }

    #[test]
    fn unmappable_connections_are_skipped() {
        let mut zone = Zone::new();
        let pitch = connections_to_zone(
            &[
                block(DlsSource::ModLfo, DlsSource::None, DlsDestination::Pan, 300),
                block(DlsSource::VibLfo, DlsSource::Cc(1), DlsDestination::Gain, 100),
                ConnectionBlock::fixed(DlsDestination::VolEnvShutdown, 10),
                ConnectionBlock::fixed(DlsDestination::Reverb, 150),
            ],
            &mut zone,
        );
        assert_eq!(pitch, 0);
        assert!(zone.modulators.is_empty());
        assert_eq!(zone.generators.len(), 1);
        assert_eq!(zone.get_generator(GeneratorType::ReverbEffectsSend), Some(150));
    }

    #[test]
    fn controller_on_lfo_becomes_a_modulator() {
        let mut zone = Zone::new();
        let original = block(DlsSource::VibLfo, DlsSource::Cc(1), DlsDestination::Pitch, 50);
        connections_to_zone(&[original], &mut zone);
        assert_eq!(
            zone.modulators,
            vec![Modulator::new(
                ModulatorSource::cc(1),
                ModulatorSource::NONE,
                GeneratorType::VibLfoToPitch,
                50
            )]
        );
        assert_eq!(zone_to_connections(&zone), vec![original]);
    }

    #[test]
    fn velocity_attenuation_is_inverted_and_clamped() {
        let mut zone = Zone::new();
        let concave = InputTransform {
            curve: 1,
            ..Default::default()
        };
        let b = ConnectionBlock {
            transform: TransformFlags::new(concave, InputTransform::default(), 0),
            ..block(DlsSource::KeyOnVelocity, DlsSource::None, DlsDestination::Gain, -960)
        };
        connections_to_zone(&[b], &mut zone);
        let m = zone.modulators[0];
        assert_eq!(m.destination, GeneratorType::InitialAttenuation);
        assert_eq!(m.amount, 960);
        assert!(m.source.negative);
        assert_eq!(m.source.curve, ModulatorCurve::Concave);
    }

    #[test]
    fn sustain_and_tuning() {
        let mut zone = Zone::new();
        let pitch = connections_to_zone(
            &[
                ConnectionBlock::fixed(DlsDestination::VolEnvSustain, 400),
                ConnectionBlock::fixed(DlsDestination::Pitch, -250),
                block(DlsSource::KeyNumber, DlsSource::None, DlsDestination::Pitch, 6400),
            ],
            &mut zone,
        );
        assert_eq!(pitch, -250);
        assert_eq!(zone.get_generator(GeneratorType::SustainVolEnv), Some(600));
        assert_eq!(zone.get_generator(GeneratorType::ScaleTuning), Some(50));
    }
}
