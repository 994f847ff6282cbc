use super::{Instrument, Preset, SoundBank};
use indexmap::IndexMap;

impl SoundBank {
    /// Appends the presets of `other` that do not collide with a preset of
    /// this bank on bank and program, along with what they reference.
    pub fn merge(&mut self, other: SoundBank) {
        let sample_offset = self.samples.len();
        let instrument_offset = self.instruments.len();

        for mut sample in other.samples {
            sample.linked_to.iter_mut().for_each(|i| *i += instrument_offset);
            if let Some(linked) = &mut sample.linked_sample {
                *linked += sample_offset;
            }
            self.samples.push(sample);
        }
        for mut instrument in other.instruments {
            // rebuilt below from the presets that survive
            instrument.linked_to.clear();
            for zone in &mut instrument.zones {
                zone.sample += sample_offset;
                zone.use_count = 0;
            }
            self.instruments.push(instrument);
        }
        for mut preset in other.presets {
            let collides = self.presets.iter().any(|p| {
                p.is_drum == preset.is_drum
                    && p.bank_msb == preset.bank_msb
                    && p.bank_lsb == preset.bank_lsb
                    && p.program == preset.program
            });
            if collides {
                log::debug!(
                    "skipping preset `{}` at {}:{}, already present",
                    preset.name,
                    preset.bank(),
                    preset.program
                );
                continue;
            }
            preset.zones.iter_mut().for_each(|z| z.instrument += instrument_offset);
            self.add_preset(preset);
        }

        for i in (instrument_offset..self.instruments.len()).rev() {
            if self.instruments[i].use_count() == 0 {
                self.delete_instrument(i);
            }
        }
        for s in (sample_offset..self.samples.len()).rev() {
            if self.samples[s].use_count() == 0 {
                self.delete_sample(s);
            }
        }
    }

    /// Copies a preset of `other` with everything it references into this
    /// bank and returns the new preset's index. Instruments and samples with
    /// a name already present here are reused.
    pub fn clone_preset_from(&mut self, other: &SoundBank, preset: usize) -> usize {
        let source = &other.presets[preset];
        let mut samples = IndexMap::<usize, usize>::new();
        let mut instruments = IndexMap::<usize, usize>::new();

        let new_preset = self.add_preset(Preset {
            zones: Vec::new(),
            ..source.clone()
        });

        for zone in &source.zones {
            let instrument = match instruments.get(&zone.instrument) {
                Some(i) => *i,
                None => {
                    let i = self.clone_instrument_from(other, zone.instrument, &mut samples);
                    instruments.insert(zone.instrument, i);
                    i
                }
            };
            let z = self.create_preset_zone(new_preset, instrument);
            self.presets[new_preset].zones[z].zone = zone.zone.clone();
        }
        new_preset
    }

    fn clone_instrument_from(
        &mut self,
        other: &SoundBank,
        instrument: usize,
        samples: &mut IndexMap<usize, usize>,
    ) -> usize {
        let source = &other.instruments[instrument];
        if let Some(existing) = self.instruments.iter().position(|i| i.name == source.name) {
            log::debug!("reusing instrument `{}`", source.name);
            return existing;
        }
        let new_instrument = self.add_instrument(Instrument {
            global_zone: source.global_zone.clone(),
            ..Instrument::new(source.name.clone())
        });
        for zone in &source.zones {
            let sample = self.clone_sample_from(other, zone.sample, samples);
            let z = self.create_instrument_zone(new_instrument, sample);
            self.instruments[new_instrument].zones[z].zone = zone.zone.clone();
        }
        new_instrument
    }

    fn clone_sample_from(
        &mut self,
        other: &SoundBank,
        sample: usize,
        samples: &mut IndexMap<usize, usize>,
    ) -> usize {
        if let Some(s) = samples.get(&sample) {
            return *s;
        }
        let source = &other.samples[sample];
        let index = match self.samples.iter().position(|s| s.name == source.name) {
            Some(existing) => existing,
            None => self.add_sample(source.clone()),
        };
        samples.insert(sample, index);

        if let Some(partner) = source.linked_sample {
            let partner_index = self.clone_sample_from(other, partner, samples);
            if self.samples[index].linked_sample.is_none()
                && self.samples[partner_index].linked_sample.is_none()
            {
                self.link_stereo(index, partner_index, source.sample_type);
            }
        }
        index
    }
}
