use crate::{
    generator::GeneratorType,
    zone::{Zone, ZoneLike},
};
use std::collections::BTreeMap;

/// Types that stay per zone: they describe the zone's sample, not a
/// shared timbre.
fn is_zone_local(ty: GeneratorType) -> bool {
    use GeneratorType::*;
    ty.limits().is_none()
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
                | ExclusiveClass
                | SampleModes
                | InitialAttenuation
                | FineTune
                | CoarseTune
        )
}

/// Key-number scaling generators and the envelope stage each one corrects.
const KEY_SCALED: [(GeneratorType, GeneratorType); 4] = [
    (GeneratorType::KeyNumToVolEnvHold, GeneratorType::HoldVolEnv),
    (GeneratorType::KeyNumToVolEnvDecay, GeneratorType::DecayVolEnv),
    (GeneratorType::KeyNumToModEnvHold, GeneratorType::HoldModEnv),
    (GeneratorType::KeyNumToModEnvDecay, GeneratorType::DecayModEnv),
];

/// The other half of a key scaling pair.
fn key_scaling_partner(ty: GeneratorType) -> Option<GeneratorType> {
    KEY_SCALED.iter().find_map(|&(scaler, stage)| match ty {
        t if t == scaler => Some(stage),
        t if t == stage => Some(scaler),
        _ => None,
    })
}

/// Moves the most common generator values and the modulators present in
/// every zone into `global`, keeping each zone's effective values intact.
pub(crate) fn globalize_zones<Z: ZoneLike>(
    global: &mut Zone,
    zones: &mut [Z],
    default_of: impl Fn(GeneratorType) -> i16,
) {
    if zones.is_empty() {
        return;
    }

    for ty in GeneratorType::ALL {
        if is_zone_local(ty) {
            continue;
        }
        // a pair corrects itself per key, hoisting one half would split it
        if let Some(partner) = key_scaling_partner(ty) {
            if zones.iter().any(|z| z.zone().has_generator(partner)) {
                continue;
            }
        }

        let inherited = global.get_generator(ty).unwrap_or_else(|| default_of(ty));
        // value -> (occurrences, explicit occurrences)
        let mut tally = BTreeMap::<i16, (usize, usize)>::new();
        for zone in zones.iter() {
            let explicit = zone.zone().get_generator(ty);
            let entry = tally.entry(explicit.unwrap_or(inherited)).or_default();
            entry.0 += 1;
            entry.1 += explicit.is_some() as usize;
        }
        let mut best: Option<(i16, usize, usize)> = None;
        for (value, (count, explicit)) in tally {
            if best.map_or(true, |(_, c, _)| count > c) {
                best = Some((value, count, explicit));
            }
        }
        let Some((target, _, explicit)) = best else {
            continue;
        };
        if target == inherited && explicit == 0 {
            continue;
        }

        global.set_generator(ty, target as i32, false);
        for zone in zones.iter_mut() {
            let zone = zone.zone_mut();
            match zone.get_generator(ty) {
                Some(v) if v == target => zone.remove_generator(ty),
                Some(_) => {}
                None if target != inherited => zone.set_generator(ty, inherited as i32, false),
                None => {}
            }
        }
    }

    let Some((first, rest)) = zones.split_first() else {
        return;
    };
    let shared: Vec<_> = first
        .zone()
        .modulators
        .iter()
        .filter(|m| {
            rest.iter()
                .all(|z| z.zone().modulators.iter().any(|o| o.is_identical(m, true)))
        })
        .copied()
        .collect();
    for m in shared {
        log::trace!("globalizing modulator to {}", m.destination.name());
        global.modulators.retain(|g| !g.is_identical(&m, false));
        global.modulators.push(m);
        for zone in zones.iter_mut() {
            let mods = &mut zone.zone_mut().modulators;
            if let Some(pos) = mods.iter().position(|o| o.is_identical(&m, true)) {
                mods.remove(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Modulator, ModulatorSource};

    fn zone_with(gens: &[(GeneratorType, i32)]) -> Zone {
        let mut zone = Zone::new();
        for (ty, v) in gens {
            zone.set_generator(*ty, *v, true);
        }
        zone
    }

    #[test]
    fn keeps_effective_values() {
        use GeneratorType::*;
        let mut global = Zone::new();
        let mut zones = vec![
            zone_with(&[(ReverbEffectsSend, 200)]),
            zone_with(&[(ReverbEffectsSend, 200)]),
            zone_with(&[]),
        ];
        globalize_zones(&mut global, &mut zones, GeneratorType::default_value);
        assert_eq!(global.get_generator(ReverbEffectsSend), Some(200));
        assert_eq!(zones[0].get_generator(ReverbEffectsSend), None);
        assert_eq!(zones[2].get_generator(ReverbEffectsSend), Some(0));
    }

    #[test]
    fn skips_key_scaled_stages() {
        use GeneratorType::*;
        let mut global = Zone::new();
        let mut zones = vec![
            zone_with(&[(HoldVolEnv, 100), (KeyNumToVolEnvHold, 10)]),
            zone_with(&[(HoldVolEnv, 100)]),
        ];
        globalize_zones(&mut global, &mut zones, GeneratorType::default_value);
        assert!(global.is_empty());
        assert_eq!(zones[0].get_generator(KeyNumToVolEnvHold), Some(10));
        assert_eq!(zones[1].get_generator(HoldVolEnv), Some(100));
    }

    #[test]
    fn key_scaling_without_its_stage_is_shared() {
        use GeneratorType::*;
        let mut global = Zone::new();
        let mut zones = vec![
            zone_with(&[(KeyNumToModEnvDecay, 20)]),
            zone_with(&[(KeyNumToModEnvDecay, 20), (KeyNumToVolEnvHold, 5)]),
            zone_with(&[(KeyNumToModEnvDecay, 20), (HoldVolEnv, -1000)]),
        ];
        globalize_zones(&mut global, &mut zones, GeneratorType::default_value);
        assert_eq!(global.get_generator(KeyNumToModEnvDecay), Some(20));
        assert!(zones.iter().all(|z| !z.has_generator(KeyNumToModEnvDecay)));
        assert_eq!(global.get_generator(KeyNumToVolEnvHold), None);
        assert_eq!(zones[1].get_generator(KeyNumToVolEnvHold), Some(5));
    }

    #[test]
    fn modulators_need_equal_amounts() {
        let m = Modulator::new(
            ModulatorSource::cc(74),
            ModulatorSource::NONE,
            GeneratorType::InitialFilterFc,
            1200,
        );
        let other = Modulator { amount: 600, ..m };
        let mut global = Zone::new();
        let mut zones = vec![Zone::new(), Zone::new()];
        zones[0].modulators.push(m);
        zones[1].modulators.push(other);
        globalize_zones(&mut global, &mut zones, GeneratorType::default_value);
        assert!(global.modulators.is_empty());

        zones[1].modulators[0] = m;
        globalize_zones(&mut global, &mut zones, GeneratorType::default_value);
        assert_eq!(global.modulators, [m]);
        assert!(zones.iter().all(|z| z.modulators.is_empty()));
    }
}
