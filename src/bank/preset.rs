use crate::zone::{Zone, ZoneLike};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PresetZone {
    pub zone: Zone,
    /// Index into [`SoundBank::instruments`](crate::SoundBank::instruments).
    pub instrument: usize,
}

impl ZoneLike for PresetZone {
    #[inline]
    fn zone(&self) -> &Zone {
        &self.zone
    }
    #[inline]
    fn zone_mut(&mut self) -> &mut Zone {
        &mut self.zone
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Preset {
    pub name: String,
    pub program: u8,
    pub bank_msb: u8,
    pub bank_lsb: u8,
    pub is_drum: bool,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
    pub global_zone: Zone,
    pub zones: Vec<PresetZone>,
}

impl Preset {
    pub fn new(name: impl Into<String>, sf2_bank: u16, program: u8) -> Self {
        let mut preset = Self {
            name: name.into(),
            program: program & 0x7f,
            ..Default::default()
        };
        preset.set_sf2_bank(sf2_bank);
        preset
    }

    /// Bank number as shown to users: 128 for percussion, the MSB otherwise.
    #[inline]
    pub fn bank(&self) -> u16 {
        match self.is_drum {
            true => 128,
            false => self.bank_msb as u16,
        }
    }

    /// The SF2 `wBank` word: MSB in bits 0-6, percussion in bit 7, LSB above.
    #[inline]
    pub fn sf2_bank(&self) -> u16 {
        (self.bank_msb as u16 & 0x7f) | (self.is_drum as u16) << 7 | (self.bank_lsb as u16 & 0x7f) << 8
    }

    #[inline]
    pub fn set_sf2_bank(&mut self, bank: u16) {
        self.bank_msb = (bank & 0x7f) as u8;
        self.is_drum = bank & 0x80 != 0;
        self.bank_lsb = ((bank >> 8) & 0x7f) as u8;
    }

    /// Hoists generators and modulators shared by the zones into the global zone.
    pub fn globalize(&mut self) {
        // preset generators are offsets, absent means zero
        super::globalize::globalize_zones(&mut self.global_zone, &mut self.zones, |_| 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_words() {
        let drums = Preset::new("Standard", 128, 0);
        assert!(drums.is_drum);
        assert_eq!(drums.bank(), 128);
        assert_eq!(drums.sf2_bank(), 128);

        let p = Preset::new("Piano 2", 0x0108, 1);
        assert_eq!((p.bank_msb, p.bank_lsb, p.is_drum), (8, 1, false));
        assert_eq!(p.bank(), 8);
        assert_eq!(p.sf2_bank(), 0x0108);
    }
}
