//! The sound bank object graph and its editing operations.
//!
//! Presets, instruments and samples live in flat vectors and refer to each
//! other by index. Back-references (`linked_to`) and zone use-counts are
//! maintained by the editing operations here, so entities should be wired
//! together through [`SoundBank`] rather than by pushing zones directly.

mod flatten;
mod globalize;
mod info;
mod instrument;
mod merge;
mod preset;
mod sample;
mod trim;

pub use info::{BankInfo, InfoField};
pub use instrument::{Instrument, InstrumentZone};
pub use preset::{Preset, PresetZone};
pub use sample::{Sample, SampleData, SampleType};
pub use trim::UsedNotes;

use crate::{
    modulator::{default_modulators, Modulator},
    zone::Zone,
};

#[derive(Clone, Debug, PartialEq)]
pub struct SoundBank {
    pub info: BankInfo,
    pub presets: Vec<Preset>,
    pub instruments: Vec<Instrument>,
    pub samples: Vec<Sample>,
    /// Modulators applied to every instrument in addition to its own.
    pub default_modulators: Vec<Modulator>,
    /// Set when `default_modulators` came from a `DMOD` chunk.
    pub custom_default_modulators: bool,
}

impl Default for SoundBank {
    fn default() -> Self {
        Self {
            info: BankInfo::default(),
            presets: Vec::new(),
            instruments: Vec::new(),
            samples: Vec::new(),
            default_modulators: default_modulators(),
            custom_default_modulators: false,
        }
    }
}

/// Shifts down indices above a removed element.
#[inline]
fn shift_index(index: &mut usize, removed: usize) {
    if *index > removed {
        *index -= 1;
    }
}

impl SoundBank {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample as mono and returns its index. Zones and
    /// [`link_stereo`](Self::link_stereo) establish its links.
    pub fn add_sample(&mut self, mut sample: Sample) -> usize {
        sample.linked_to.clear();
        sample.linked_sample = None;
        sample.sample_type = sample.sample_type.unlinked();
        self.samples.push(sample);
        self.samples.len() - 1
    }

    /// Adds an instrument, linking the samples its zones reference.
    ///
    /// # Panics
    ///
    /// Panics when a zone references a sample that does not exist.
    pub fn add_instrument(&mut self, mut instrument: Instrument) -> usize {
        let index = self.instruments.len();
        instrument.linked_to.clear();
        for zone in &mut instrument.zones {
            zone.use_count = 0;
            self.samples[zone.sample].link_to(index);
        }
        self.instruments.push(instrument);
        index
    }

    /// Adds a preset, linking the instruments its zones reference.
    ///
    /// # Panics
    ///
    /// Panics when a zone references an instrument that does not exist.
    pub fn add_preset(&mut self, preset: Preset) -> usize {
        let index = self.presets.len();
        let targets: Vec<_> = preset.zones.iter().map(|z| z.instrument).collect();
        self.presets.push(preset);
        for instrument in targets {
            self.link_instrument(instrument, index);
        }
        index
    }

    /// Appends a zone playing `sample` to `instrument` and returns the zone index.
    pub fn create_instrument_zone(&mut self, instrument: usize, sample: usize) -> usize {
        self.samples[sample].link_to(instrument);
        let inst = &mut self.instruments[instrument];
        inst.zones.push(InstrumentZone {
            zone: Zone::new(),
            sample,
            use_count: inst.linked_to.len(),
        });
        inst.zones.len() - 1
    }

    /// Appends a zone referencing `instrument` to `preset` and returns the zone index.
    pub fn create_preset_zone(&mut self, preset: usize, instrument: usize) -> usize {
        self.link_instrument(instrument, preset);
        let preset = &mut self.presets[preset];
        preset.zones.push(PresetZone {
            zone: Zone::new(),
            instrument,
        });
        preset.zones.len() - 1
    }

    fn link_instrument(&mut self, instrument: usize, preset: usize) {
        let inst = &mut self.instruments[instrument];
        inst.linked_to.push(preset);
        for zone in &mut inst.zones {
            zone.use_count += 1;
        }
    }

    fn unlink_instrument(&mut self, instrument: usize, preset: usize) {
        let inst = &mut self.instruments[instrument];
        match inst.linked_to.iter().position(|p| *p == preset) {
            Some(pos) => {
                inst.linked_to.remove(pos);
                for zone in &mut inst.zones {
                    zone.use_count = zone.use_count.saturating_sub(1);
                }
            }
            None => log::warn!(
                "instrument `{}` is not linked to preset {preset}",
                inst.name
            ),
        }
    }

    /// Drops one use of an instrument zone. The zone is removed once nothing
    /// uses it, or right away with `force`. Returns whether it was removed.
    pub fn delete_instrument_zone(&mut self, instrument: usize, index: usize, force: bool) -> bool {
        let zone = &mut self.instruments[instrument].zones[index];
        zone.use_count = zone.use_count.saturating_sub(1);
        if zone.use_count > 0 && !force {
            return false;
        }
        let zone = self.instruments[instrument].zones.remove(index);
        self.samples[zone.sample].unlink_from(instrument);
        true
    }

    pub fn delete_preset_zone(&mut self, preset: usize, index: usize) {
        let zone = self.presets[preset].zones.remove(index);
        self.unlink_instrument(zone.instrument, preset);
    }

    pub fn delete_preset(&mut self, preset: usize) {
        let removed = self.presets.remove(preset);
        for zone in &removed.zones {
            self.unlink_instrument(zone.instrument, preset);
        }
        for inst in &mut self.instruments {
            inst.linked_to.iter_mut().for_each(|p| shift_index(p, preset));
        }
    }

    /// # Panics
    ///
    /// Panics when a preset still references the instrument.
    pub fn delete_instrument(&mut self, instrument: usize) {
        let inst = &self.instruments[instrument];
        assert!(
            inst.use_count() == 0,
            "cannot delete instrument `{}` used by {} preset zones",
            inst.name,
            inst.use_count()
        );
        let removed = self.instruments.remove(instrument);
        for zone in &removed.zones {
            self.samples[zone.sample].unlink_from(instrument);
        }
        for preset in &mut self.presets {
            for zone in &mut preset.zones {
                shift_index(&mut zone.instrument, instrument);
            }
        }
        for sample in &mut self.samples {
            sample.linked_to.iter_mut().for_each(|i| shift_index(i, instrument));
        }
    }

    /// # Panics
    ///
    /// Panics when an instrument zone still references the sample.
    pub fn delete_sample(&mut self, sample: usize) {
        let s = &self.samples[sample];
        assert!(
            s.use_count() == 0,
            "cannot delete sample `{}` used by {} instrument zones",
            s.name,
            s.use_count()
        );
        self.unlink_stereo(sample);
        self.samples.remove(sample);
        for inst in &mut self.instruments {
            for zone in &mut inst.zones {
                shift_index(&mut zone.sample, sample);
            }
        }
        for s in &mut self.samples {
            if let Some(linked) = &mut s.linked_sample {
                shift_index(linked, sample);
            }
        }
    }

    /// Pairs two samples as a stereo pair; `a` gets `ty` and `b` its partner type.
    pub fn link_stereo(&mut self, a: usize, b: usize, ty: SampleType) {
        assert!(ty.is_linked(), "{ty:?} is not a stereo sample type");
        self.unlink_stereo(a);
        self.unlink_stereo(b);
        self.samples[a].sample_type = ty;
        self.samples[a].linked_sample = Some(b);
        self.samples[b].sample_type = ty.partner();
        self.samples[b].linked_sample = Some(a);
    }

    /// Breaks a stereo pair, turning both halves into mono samples.
    pub fn unlink_stereo(&mut self, sample: usize) {
        let s = &mut self.samples[sample];
        s.sample_type = s.sample_type.unlinked();
        if let Some(partner) = s.linked_sample.take() {
            let p = &mut self.samples[partner];
            if p.linked_sample == Some(sample) {
                p.linked_sample = None;
                p.sample_type = p.sample_type.unlinked();
            }
        }
    }

    /// Deletes instruments and samples nothing references, and instrument
    /// zones no preset reaches anymore.
    pub fn remove_unused_elements(&mut self) {
        for i in (0..self.instruments.len()).rev() {
            if self.instruments[i].use_count() == 0 {
                log::debug!("removing unused instrument `{}`", self.instruments[i].name);
                self.delete_instrument(i);
                continue;
            }
            let mut z = 0;
            while z < self.instruments[i].zones.len() {
                match self.instruments[i].zones[z].use_count {
                    0 => {
                        self.delete_instrument_zone(i, z, true);
                    }
                    _ => z += 1,
                }
            }
        }
        for s in (0..self.samples.len()).rev() {
            if self.samples[s].use_count() == 0 {
                log::debug!("removing unused sample `{}`", self.samples[s].name);
                self.delete_sample(s);
            }
        }
    }

    /// Sorts presets by drum flag, bank and program.
    pub fn flush(&mut self) {
        let mut order: Vec<usize> = (0..self.presets.len()).collect();
        order.sort_by_key(|&p| {
            let p = &self.presets[p];
            (p.is_drum, p.bank_msb, p.bank_lsb, p.program)
        });
        let mut new_index = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            new_index[old] = new;
        }
        let mut presets: Vec<Option<Preset>> = self.presets.drain(..).map(Some).collect();
        self.presets = order.iter().filter_map(|&old| presets[old].take()).collect();
        for inst in &mut self.instruments {
            inst.linked_to.iter_mut().for_each(|p| *p = new_index[*p]);
        }
    }

    /// Finds the preset a MIDI channel would select, falling back to bank 0
    /// (or any drum kit), then to the first preset.
    pub fn get_preset(&self, bank: u16, program: u8, is_drum: bool) -> Option<usize> {
        let find = |f: &dyn Fn(&Preset) -> bool| self.presets.iter().position(f);
        let exact = match is_drum {
            true => find(&|p| p.is_drum && p.program == program),
            false => find(&|p| !p.is_drum && p.bank_msb as u16 == bank && p.program == program),
        };
        exact
            .or_else(|| match is_drum {
                true => find(&|p| p.is_drum),
                false => find(&|p| !p.is_drum && p.bank_msb == 0 && p.program == program),
            })
            .or_else(|| {
                log::debug!("no preset for {bank}:{program}, using the first one");
                (!self.presets.is_empty()).then_some(0)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with_chain() -> SoundBank {
        let mut bank = SoundBank::new();
        let s = bank.add_sample(Sample::new("s", 44100, vec![0; 8]));
        let i = bank.add_instrument(Instrument::new("i"));
        bank.create_instrument_zone(i, s);
        let p = bank.add_preset(Preset::new("p", 0, 0));
        bank.create_preset_zone(p, i);
        bank
    }

    #[test]
    fn zone_use_counts_follow_presets() {
        let mut bank = bank_with_chain();
        let p2 = bank.add_preset(Preset::new("p2", 0, 1));
        bank.create_preset_zone(p2, 0);
        assert_eq!(bank.instruments[0].use_count(), 2);
        assert_eq!(bank.instruments[0].zones[0].use_count, 2);

        // zones added later inherit the current count
        bank.create_instrument_zone(0, 0);
        assert_eq!(bank.instruments[0].zones[1].use_count, 2);
        assert_eq!(bank.samples[0].use_count(), 2);

        assert!(!bank.delete_instrument_zone(0, 1, false));
        assert!(bank.delete_instrument_zone(0, 1, false));
        assert_eq!(bank.samples[0].use_count(), 1);
    }

    #[test]
    #[should_panic]
    fn deleting_used_instrument_panics() {
        bank_with_chain().delete_instrument(0);
    }

    #[test]
    fn delete_remaps_indices() {
        let mut bank = bank_with_chain();
        let s = bank.add_sample(Sample::new("s2", 44100, vec![0; 8]));
        let i = bank.add_instrument(Instrument::new("i2"));
        bank.create_instrument_zone(i, s);
        let p = bank.add_preset(Preset::new("p2", 0, 1));
        bank.create_preset_zone(p, i);

        bank.delete_preset(0);
        bank.remove_unused_elements();
        assert_eq!(bank.presets.len(), 1);
        assert_eq!(bank.instruments.len(), 1);
        assert_eq!(bank.samples.len(), 1);
        assert_eq!(bank.presets[0].zones[0].instrument, 0);
        assert_eq!(bank.instruments[0].zones[0].sample, 0);
        assert_eq!(bank.instruments[0].linked_presets(), &[0]);
        assert_eq!(bank.samples[0].linked_instruments(), &[0]);
    }

    #[test]
    fn stereo_pairs() {
        let mut bank = SoundBank::new();
        let l = bank.add_sample(Sample::new("L", 44100, vec![]));
        let r = bank.add_sample(Sample::new("R", 44100, vec![]));
        bank.link_stereo(l, r, SampleType::Left);
        assert_eq!(bank.samples[r].sample_type, SampleType::Right);
        assert_eq!(bank.samples[r].linked_sample(), Some(l));

        bank.delete_sample(l);
        assert_eq!(bank.samples[0].sample_type, SampleType::Mono);
        assert_eq!(bank.samples[0].linked_sample(), None);
    }

    #[test]
    fn flush_and_lookup() {
        let mut bank = SoundBank::new();
        let i = bank.add_instrument(Instrument::new("i"));
        for (bank_word, program) in [(128, 0), (1, 5), (0, 5), (0, 0)] {
            let p = bank.add_preset(Preset::new("p", bank_word, program));
            bank.create_preset_zone(p, i);
        }
        bank.flush();
        let order: Vec<_> = bank.presets.iter().map(|p| (p.bank(), p.program)).collect();
        assert_eq!(order, [(0, 0), (0, 5), (1, 5), (128, 0)]);
        assert_eq!(bank.instruments[0].linked_presets(), &[3, 2, 1, 0]);

        assert_eq!(bank.get_preset(1, 5, false), Some(2));
        assert_eq!(bank.get_preset(7, 5, false), Some(1));
        assert_eq!(bank.get_preset(0, 40, true), Some(3));
        assert_eq!(bank.get_preset(0, 99, false), Some(0));
    }
}
