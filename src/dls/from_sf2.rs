use super::{
    articulator::{attenuation_to_gain, zone_to_connections},
    to_scale, Articulation, DlsBank, DlsInstrument, DlsRegion, DlsWave, RegionOptions, WaveLink,
    WaveLoop, WaveSample, F_INSTRUMENT_DRUMS, LOOP_FORWARD, LOOP_RELEASE,
};
use crate::{
    bank::{Instrument, InstrumentZone, Sample, SoundBank},
    codec::{DlsWriteOptions, SampleCodec},
    generator::GeneratorType,
    zone::{Range, Zone},
};

fn sample_to_wave(sample: &Sample, codec: Option<&dyn SampleCodec>) -> DlsWave {
    let wave_loop = (sample.loop_end > sample.loop_start).then(|| WaveLoop {
        loop_type: LOOP_FORWARD,
        start: sample.loop_start,
        length: sample.loop_end - sample.loop_start,
    });
    DlsWave {
        name: sample.name.clone(),
        sample_rate: sample.sample_rate,
        pcm: sample.audio_data(codec).to_vec(),
        wave_sample: Some(WaveSample {
            unity_note: sample.original_key as u16,
            fine_tune: sample.pitch_correction as i16,
            wave_loop,
            ..Default::default()
        }),
    }
}

/// `zone` over `global`, the way a synthesizer resolves them.
fn layered(global: &Zone, zone: &Zone) -> Zone {
    let mut out = global.clone();
    out.key_range = zone.key_range;
    out.vel_range = zone.vel_range;
    for gen in &zone.generators {
        out.set_generator(gen.ty, gen.value as i32, false);
    }
    out.modulators
        .retain(|g| !zone.modulators.iter().any(|m| m.is_identical(g, false)));
    out.modulators.extend(zone.modulators.iter().copied());
    out
}

#[inline]
fn dls_range(range: Range) -> (u16, u16) {
    match range.is_set() {
        true => (range.min.max(0) as u16, range.max.max(0) as u16),
        false => (0, 127),
    }
}

fn region_from_zone(flat: &Instrument, iz: &InstrumentZone, sample: &Sample) -> DlsRegion {
    let zone = layered(&flat.global_zone, &iz.zone);
    let get = |ty| zone.get_generator(ty).map(|v| v as i32);

    let unity_note = match get(GeneratorType::OverridingRootKey) {
        Some(key) if key >= 0 => key as u16,
        _ => sample.original_key as u16,
    };
    let fine_tune = get(GeneratorType::FineTune).unwrap_or(0) + sample.pitch_correction as i32;
    let gain = to_scale(attenuation_to_gain(get(GeneratorType::InitialAttenuation).unwrap_or(0)));

    let offset = |fine, coarse| get(fine).unwrap_or(0) as i64 + get(coarse).unwrap_or(0) as i64 * 32768;
    let wave_loop = match get(GeneratorType::SampleModes).unwrap_or(0) {
        mode @ (1 | 3) => {
            let start = sample.loop_start as i64
                + offset(GeneratorType::StartloopAddrsOffset, GeneratorType::StartloopAddrsCoarseOffset);
            let end = sample.loop_end as i64
                + offset(GeneratorType::EndloopAddrsOffset, GeneratorType::EndloopAddrsCoarseOffset);
            let start = start.max(0);
            (end > start).then(|| WaveLoop {
                loop_type: if mode == 3 { LOOP_RELEASE } else { LOOP_FORWARD },
                start: start as u32,
                length: (end - start) as u32,
            })
        }
        _ => None,
    };

    // a region articulation replaces the instrument's, so it carries both
    let articulation = match zone_to_connections(&iz.zone).is_empty() {
        true => None,
        false => Some(Articulation {
            level: 2,
            connections: zone_to_connections(&zone),
        }),
    };

    DlsRegion {
        key_range: dls_range(iz.zone.key_range),
        vel_range: dls_range(iz.zone.vel_range),
        options: RegionOptions::empty(),
        key_group: get(GeneratorType::ExclusiveClass).unwrap_or(0).clamp(0, u16::MAX as i32) as u16,
        wave_sample: Some(WaveSample {
            unity_note,
            fine_tune: fine_tune.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            gain,
            wave_loop,
            ..Default::default()
        }),
        wave_link: WaveLink {
            channel: 1,
            wave: iz.sample,
            ..Default::default()
        },
        articulation,
    }
}

impl DlsBank {
    /// Converts an SF2 bank: each preset is flattened into one DLS
    /// instrument, each sample becomes a wave.
    pub fn from_sound_bank(bank: &SoundBank, options: &mut DlsWriteOptions) -> Self {
        let mut out = DlsBank {
            info: bank.info.clone(),
            ..Default::default()
        };

        let total = bank.samples.len();
        for (i, sample) in bank.samples.iter().enumerate() {
            out.waves.push(sample_to_wave(sample, options.codec));
            if let Some(progress) = options.progress.as_deref_mut() {
                progress(&sample.name, i, total);
            }
        }

        let defaults = match options.write_default_modulators && bank.custom_default_modulators {
            true => zone_to_connections(&Zone {
                modulators: bank.default_modulators.clone(),
                ..Zone::new()
            }),
            false => Vec::new(),
        };

        for (i, preset) in bank.presets.iter().enumerate() {
            let flat = bank.flatten_preset(i);
            let mut connections = zone_to_connections(&flat.global_zone);
            connections.extend(defaults.iter().copied());

            let mut dls_bank = (preset.bank_lsb as u32 & 0x7f) | (preset.bank_msb as u32 & 0x7f) << 8;
            if preset.is_drum {
                dls_bank |= F_INSTRUMENT_DRUMS;
            }
            out.instruments.push(DlsInstrument {
                name: preset.name.clone(),
                bank: dls_bank,
                program: preset.program as u32,
                regions: flat
                    .zones
                    .iter()
                    .map(|iz| region_from_zone(&flat, iz, &bank.samples[iz.sample]))
                    .collect(),
                articulation: (!connections.is_empty()).then_some(Articulation {
                    level: 2,
                    connections,
                }),
            });
        }
        log::debug!(
            "flattened {} presets into DLS instruments",
            out.instruments.len()
        );
        out
    }
}

impl SoundBank {
    /// Writes the bank as a DLS level 2 file.
    pub fn write_dls(&self, mut options: DlsWriteOptions) -> std::io::Result<Vec<u8>> {
        DlsBank::from_sound_bank(self, &mut options).write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dls::ConnectionBlock, dls::DlsDestination, Preset};

    fn bank() -> SoundBank {
        let mut bank = SoundBank::new();
        let mut sample = Sample::new("tone", 32000, vec![1; 64]);
        sample.original_key = 69;
        sample.pitch_correction = -3;
        sample.loop_start = 8;
        sample.loop_end = 40;
        let s = bank.add_sample(sample);
        let i = bank.add_instrument(Instrument::new("lead"));
        let z = bank.create_instrument_zone(i, s);
        let zone = &mut bank.instruments[i].zones[z].zone;
        zone.key_range = Range::new(0, 90);
        zone.set_generator(GeneratorType::SampleModes, 1, true);
        zone.set_generator(GeneratorType::FineTune, 10, true);
        zone.set_generator(GeneratorType::CoarseTune, 2, true);
        zone.set_generator(GeneratorType::InitialAttenuation, 100, true);
        zone.set_generator(GeneratorType::EndloopAddrsOffset, -4, true);
        let mut preset = Preset::new("lead", 0, 7);
        preset.bank_msb = 3;
        let p = bank.add_preset(preset);
        bank.create_preset_zone(p, i);
        bank
    }

    #[test]
    fn region_parameters_move_into_wave_sample() {
        let dls = DlsBank::from_sound_bank(&bank(), &mut DlsWriteOptions::default());
        let inst = &dls.instruments[0];
        assert_eq!((inst.bank, inst.program), (3 << 8, 7));

        let region = &inst.regions[0];
        assert_eq!(region.key_range, (0, 90));
        let ws = region.wave_sample.as_ref().unwrap();
        assert_eq!(ws.unity_note, 69);
        assert_eq!(ws.fine_tune, 7);
        assert_eq!(ws.gain >> 16, -40);
        assert_eq!(
            ws.wave_loop,
            Some(WaveLoop {
                loop_type: LOOP_FORWARD,
                start: 8,
                length: 28
            })
        );

        let pitch = ConnectionBlock::fixed(DlsDestination::Pitch, 200);
        let in_instrument = inst.articulation.iter().flat_map(|a| &a.connections).any(|c| *c == pitch);
        let in_region = region.articulation.iter().flat_map(|a| &a.connections).any(|c| *c == pitch);
        assert!(in_instrument || in_region);
    }

    #[test]
    fn progress_reports_every_sample() {
        let mut seen = Vec::new();
        let mut progress = |name: &str, i: usize, total: usize| seen.push((name.to_owned(), i, total));
        let mut options = DlsWriteOptions {
            progress: Some(&mut progress),
            ..Default::default()
        };
        DlsBank::from_sound_bank(&bank(), &mut options);
        drop(options);
        assert_eq!(seen, vec![("tone".to_owned(), 0, 1)]);
    }
}
