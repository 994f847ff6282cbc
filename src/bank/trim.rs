use super::SoundBank;
use indexmap::{IndexMap, IndexSet};

/// Notes a song plays, keyed by the channel's bank and program.
#[derive(Clone, Debug, Default)]
pub struct UsedNotes {
    notes: IndexMap<(u16, u8, bool), IndexSet<(u8, u8)>>,
}

impl UsedNotes {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bank: u16, program: u8, is_drum: bool, key: u8, velocity: u8) {
        self.notes
            .entry((bank, program, is_drum))
            .or_default()
            .insert((key, velocity));
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((u16, u8, bool), &IndexSet<(u8, u8)>)> {
        self.notes.iter().map(|(k, v)| (*k, v))
    }
}

impl SoundBank {
    /// Deletes every preset, zone, instrument and sample that none of `used`
    /// can reach.
    pub fn trim(&mut self, used: &UsedNotes) {
        let mut per_preset = IndexMap::<usize, IndexSet<(u8, u8)>>::new();
        for ((bank, program, is_drum), notes) in used.iter() {
            if let Some(p) = self.get_preset(bank, program, is_drum) {
                per_preset.entry(p).or_default().extend(notes.iter().copied());
            }
        }

        for p in (0..self.presets.len()).rev() {
            match per_preset.get(&p) {
                Some(notes) => self.trim_preset(p, notes),
                None => {
                    log::debug!("deleting unused preset `{}`", self.presets[p].name);
                    self.delete_preset(p);
                }
            }
        }
        self.remove_unused_elements();
    }

    fn trim_preset(&mut self, preset: usize, notes: &IndexSet<(u8, u8)>) {
        let mut z = 0;
        while z < self.presets[preset].zones.len() {
            let zone = &self.presets[preset].zones[z];
            let instrument = zone.instrument;
            let hit: Vec<_> = notes
                .iter()
                .filter(|(k, v)| zone.zone.key_range.contains(*k) && zone.zone.vel_range.contains(*v))
                .copied()
                .collect();
            if hit.is_empty() {
                self.delete_preset_zone(preset, z);
                continue;
            }
            // every reference that cannot reach an instrument zone drops one use
            let mut iz = 0;
            while iz < self.instruments[instrument].zones.len() {
                let zone = &self.instruments[instrument].zones[iz].zone;
                let reached = hit
                    .iter()
                    .any(|(k, v)| zone.key_range.contains(*k) && zone.vel_range.contains(*v));
                if !reached && self.delete_instrument_zone(instrument, iz, false) {
                    continue;
                }
                iz += 1;
            }
            z += 1;
        }
    }
}
