use super::{Instrument, InstrumentZone, SoundBank};
use crate::{
    generator::{Generator, GeneratorType},
    modulator::Modulator,
    zone::Zone,
};

type GeneratorTable = [Option<i16>; GeneratorType::COUNT];

/// Zone generators layered over the global zone's.
fn resolve_generators(global: &Zone, zone: &Zone) -> GeneratorTable {
    let mut table = [None; GeneratorType::COUNT];
    for gen in global.generators.iter().chain(&zone.generators) {
        table[gen.ty as usize] = Some(gen.value);
    }
    table
}

/// Zone modulators replacing identical global ones.
fn resolve_modulators(global: &Zone, zone: &Zone) -> Vec<Modulator> {
    let mut mods: Vec<Modulator> = global
        .modulators
        .iter()
        .filter(|g| !zone.modulators.iter().any(|m| m.is_identical(g, false)))
        .copied()
        .collect();
    mods.extend(zone.modulators.iter().copied());
    mods
}

/// Types SF2 forbids at preset level.
fn is_instrument_only(ty: GeneratorType) -> bool {
    use GeneratorType::*;
    matches!(
        ty,
        StartAddrsOffset
            | EndAddrOffset
            | StartloopAddrsOffset
            | EndloopAddrsOffset
            | StartAddrsCoarseOffset
            | EndAddrsCoarseOffset
            | StartloopAddrsCoarseOffset
            | KeyNum
            | Velocity
            | EndloopAddrsCoarseOffset
            | SampleModes
            | ExclusiveClass
            | OverridingRootKey
    )
}

impl SoundBank {
    /// Resolves a preset into a single instrument: preset and instrument
    /// ranges are intersected and preset offsets are added to instrument
    /// values. The result references this bank's samples and is not linked
    /// into the bank.
    pub fn flatten_preset(&self, preset: usize) -> Instrument {
        let preset = &self.presets[preset];
        let mut out = Instrument::new(preset.name.clone());

        for pz in &preset.zones {
            let preset_gens = resolve_generators(&preset.global_zone, &pz.zone);
            let preset_mods = resolve_modulators(&preset.global_zone, &pz.zone);
            let inst = &self.instruments[pz.instrument];
            let preset_key = pz.zone.key_range.intersect(&preset.global_zone.key_range);
            let preset_vel = pz.zone.vel_range.intersect(&preset.global_zone.vel_range);
            let (Some(preset_key), Some(preset_vel)) = (preset_key, preset_vel) else {
                continue;
            };

            for iz in &inst.zones {
                let key = iz
                    .zone
                    .key_range
                    .intersect(&inst.global_zone.key_range)
                    .and_then(|r| r.intersect(&preset_key));
                let vel = iz
                    .zone
                    .vel_range
                    .intersect(&inst.global_zone.vel_range)
                    .and_then(|r| r.intersect(&preset_vel));
                let (Some(key_range), Some(vel_range)) = (key, vel) else {
                    continue;
                };

                let inst_gens = resolve_generators(&inst.global_zone, &iz.zone);
                let mut zone = Zone {
                    key_range,
                    vel_range,
                    ..Zone::new()
                };
                for ty in GeneratorType::ALL {
                    if ty.is_range() || ty.is_index() || ty.limits().is_none() {
                        continue;
                    }
                    let offset = match is_instrument_only(ty) {
                        true => None,
                        false => preset_gens[ty as usize],
                    };
                    match (inst_gens[ty as usize], offset) {
                        (None, None) => {}
                        (value, offset) => {
                            let value = value.unwrap_or_else(|| ty.default_value()) as i32
                                + offset.unwrap_or(0) as i32;
                            zone.generators.push(Generator::new(ty, value));
                        }
                    }
                }

                zone.modulators = resolve_modulators(&inst.global_zone, &iz.zone);
                for m in &preset_mods {
                    match zone.modulators.iter_mut().find(|o| o.is_identical(m, false)) {
                        Some(o) => o.amount = o.amount.saturating_add(m.amount),
                        None => zone.modulators.push(*m),
                    }
                }

                out.zones.push(InstrumentZone {
                    zone,
                    sample: iz.sample,
                    use_count: 0,
                });
            }
        }
        out.globalize();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Preset, Range, Sample};

    #[test]
    fn preset_offsets_add_to_instrument_values() {
        use GeneratorType::{ReverbEffectsSend, SampleModes};
        let mut bank = SoundBank::new();
        let s = bank.add_sample(Sample::new("s", 44100, vec![0; 4]));
        let i = bank.add_instrument(Instrument::new("i"));
        let low = bank.create_instrument_zone(i, s);
        let high = bank.create_instrument_zone(i, s);
        let inst = &mut bank.instruments[i];
        inst.zones[low].zone.key_range = Range::new(0, 59);
        inst.zones[high].zone.key_range = Range::new(60, 127);
        inst.global_zone.set_generator(ReverbEffectsSend, 100, true);
        inst.zones[high].zone.set_generator(SampleModes, 1, true);

        let p = bank.add_preset(Preset::new("p", 0, 0));
        let z = bank.create_preset_zone(p, i);
        let pz = &mut bank.presets[p].zones[z].zone;
        pz.key_range = Range::new(48, 72);
        pz.set_generator(ReverbEffectsSend, 50, true);
        pz.set_generator(SampleModes, 3, false);

        let flat = bank.flatten_preset(p);
        assert_eq!(flat.zones.len(), 2);
        assert_eq!(flat.zones[0].zone.key_range, Range::new(48, 59));
        assert_eq!(flat.zones[1].zone.key_range, Range::new(60, 72));
        assert_eq!(flat.global_zone.get_generator(ReverbEffectsSend), Some(150));
        assert_eq!(flat.zones[1].zone.get_generator(SampleModes), Some(1));
        assert_eq!(flat.use_count(), 0);
    }
}
