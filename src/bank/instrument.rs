use crate::{
    generator::GeneratorType,
    zone::{Zone, ZoneLike},
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstrumentZone {
    pub zone: Zone,
    /// Index into [`SoundBank::samples`](crate::SoundBank::samples).
    pub sample: usize,
    /// How many preset references reach this zone.
    pub use_count: usize,
}

impl ZoneLike for InstrumentZone {
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
pub struct Instrument {
    pub name: String,
    pub global_zone: Zone,
    pub zones: Vec<InstrumentZone>,
    pub(crate) linked_to: Vec<usize>,
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of preset zones referencing this instrument.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.linked_to.len()
    }

    /// Indices of the referencing presets, once per referencing zone.
    #[inline]
    pub fn linked_presets(&self) -> &[usize] {
        &self.linked_to
    }

    /// Hoists generators and modulators shared by the zones into the global zone.
    pub fn globalize(&mut self) {
        super::globalize::globalize_zones(
            &mut self.global_zone,
            &mut self.zones,
            GeneratorType::default_value,
        );
    }
}
