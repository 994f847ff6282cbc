use super::{articulator::connections_to_zone, articulator::gain_to_attenuation, DlsBank, DlsInstrument, DlsWave, LOOP_RELEASE};
use crate::{
    bank::{Instrument, InstrumentZone, Preset, Sample, SoundBank},
    generator::GeneratorType,
    invalid_data,
    modulator::dls1_vibrato_overrides,
    zone::{Range, Zone},
};
use std::io;

fn wave_to_sample(wave: &DlsWave, index: usize) -> Sample {
    let name = match wave.name.is_empty() {
        true => format!("Sample {index}"),
        false => wave.name.clone(),
    };
    let mut sample = Sample::new(name, wave.sample_rate, wave.pcm.clone());
    if let Some(ws) = &wave.wave_sample {
        sample.original_key = ws.unity_note.min(127) as u8;
        sample.pitch_correction = ws.fine_tune.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
        if let Some(l) = ws.wave_loop {
            sample.loop_start = l.start;
            sample.loop_end = l.start.saturating_add(l.length);
        }
    }
    sample
}

/// Sets a sample address offset, spilling into the coarse (32768 frame)
/// generator when it does not fit.
fn set_address_offset(zone: &mut Zone, fine: GeneratorType, coarse: GeneratorType, offset: i64) {
    let coarse_value = offset / 32768;
    let fine_value = offset - coarse_value * 32768;
    if coarse_value != 0 {
        zone.set_generator(coarse, coarse_value as i32, false);
    }
    if fine_value != 0 {
        zone.set_generator(fine, fine_value as i32, false);
    }
}

/// Splits a cents offset into coarse (semitones, truncated) and fine tuning.
fn set_tuning(zone: &mut Zone, cents: i32) {
    let coarse = cents / 100;
    let fine = cents - coarse * 100;
    if coarse != 0 {
        zone.set_generator(GeneratorType::CoarseTune, coarse, true);
    }
    if fine != 0 {
        zone.set_generator(GeneratorType::FineTune, fine, true);
    }
}

impl DlsBank {
    fn convert_instrument(&self, bank: &SoundBank, dls: &DlsInstrument, index: usize) -> io::Result<Instrument> {
        let name = match dls.name.is_empty() {
            true => format!("Instrument {index}"),
            false => dls.name.clone(),
        };
        let mut instrument = Instrument::new(name);

        let global_pitch = match &dls.articulation {
            Some(art) => connections_to_zone(&art.connections, &mut instrument.global_zone),
            None => 0,
        };
        if dls.is_level1() {
            instrument.global_zone.modulators.extend(dls1_vibrato_overrides());
        }

        for region in &dls.regions {
            let wave = region.wave_link.wave;
            let sample = bank.samples.get(wave).ok_or_else(|| {
                invalid_data(format!("instrument `{}` references missing sample {wave}", instrument.name))
            })?;

            let mut zone = Zone::new();
            zone.key_range = Range::new(
                region.key_range.0.min(127) as i16,
                region.key_range.1.min(127) as i16,
            );
            if region.vel_range != (0, 127) {
                zone.vel_range = Range::new(
                    region.vel_range.0.min(127) as i16,
                    region.vel_range.1.min(127) as i16,
                );
            }
            if region.key_group != 0 {
                zone.set_generator(GeneratorType::ExclusiveClass, region.key_group as i32, true);
            }

            let mut pitch = match &region.articulation {
                Some(art) => connections_to_zone(&art.connections, &mut zone),
                None => global_pitch,
            };

            // the region's wave sample overrides the wave's own
            let wave_sample = region
                .wave_sample
                .as_ref()
                .or(self.waves[wave].wave_sample.as_ref());
            if let Some(ws) = wave_sample {
                pitch += ws.fine_tune as i32 - sample.pitch_correction as i32;
                if ws.unity_note != sample.original_key as u16 {
                    zone.set_generator(GeneratorType::OverridingRootKey, ws.unity_note as i32, true);
                }
                let attenuation = gain_to_attenuation(ws.gain >> 16);
                if attenuation != 0 {
                    let base = zone
                        .get_generator(GeneratorType::InitialAttenuation)
                        .or_else(|| instrument.global_zone.get_generator(GeneratorType::InitialAttenuation))
                        .unwrap_or(0);
                    zone.set_generator(GeneratorType::InitialAttenuation, base as i32 + attenuation, true);
                }
                if let Some(l) = ws.wave_loop {
                    let mode = match l.loop_type {
                        LOOP_RELEASE => 3,
                        _ => 1,
                    };
                    zone.set_generator(GeneratorType::SampleModes, mode, true);
                    let start = l.start as i64 - sample.loop_start as i64;
                    let end = l.start as i64 + l.length as i64 - sample.loop_end as i64;
                    set_address_offset(
                        &mut zone,
                        GeneratorType::StartloopAddrsOffset,
                        GeneratorType::StartloopAddrsCoarseOffset,
                        start,
                    );
                    set_address_offset(
                        &mut zone,
                        GeneratorType::EndloopAddrsOffset,
                        GeneratorType::EndloopAddrsCoarseOffset,
                        end,
                    );
                }
            }
            set_tuning(&mut zone, pitch);

            instrument.zones.push(InstrumentZone {
                zone,
                sample: wave,
                use_count: 0,
            });
        }
        instrument.globalize();
        Ok(instrument)
    }

    /// Converts into the SF2 model: every DLS instrument becomes one preset
    /// holding one instrument, and every wave one mono sample.
    pub fn to_sound_bank(&self) -> io::Result<SoundBank> {
        let mut bank = SoundBank::new();
        bank.info.name = self.info.name.clone();
        for (field, value) in self.info.fields() {
            bank.info.set_field(field, value);
        }

        for (i, wave) in self.waves.iter().enumerate() {
            bank.add_sample(wave_to_sample(wave, i));
        }

        for (i, dls) in self.instruments.iter().enumerate() {
            let instrument = self.convert_instrument(&bank, dls, i)?;
            let mut preset = Preset::new(instrument.name.clone(), 0, (dls.program & 0x7f) as u8);
            preset.bank_msb = dls.bank_msb();
            preset.bank_lsb = dls.bank_lsb();
            preset.is_drum = dls.is_drum();
            let inst = bank.add_instrument(instrument);
            let p = bank.add_preset(preset);
            bank.create_preset_zone(p, inst);
        }
        log::debug!(
            "converted {} DLS instruments into {} presets",
            self.instruments.len(),
            bank.presets.len()
        );
        Ok(bank)
    }
}

impl SoundBank {
    /// Parses a DLS file and converts it into an SF2 bank.
    pub fn read_dls(data: &[u8]) -> io::Result<Self> {
        DlsBank::read(data)?.to_sound_bank()
    }
}
