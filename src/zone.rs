use crate::{
    generator::{Generator, GeneratorType},
    modulator::Modulator,
};

/// Inclusive key or velocity range. `min == -1` marks an unset range.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Range {
    pub min: i16,
    pub max: i16,
}

impl Default for Range {
    #[inline]
    fn default() -> Self {
        Self::UNSET
    }
}

impl Range {
    pub const UNSET: Self = Self { min: -1, max: 127 };

    #[inline]
    pub const fn new(min: i16, max: i16) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.min != -1
    }

    #[inline]
    pub fn contains(&self, v: u8) -> bool {
        (self.min..=self.max).contains(&(v as i16))
    }

    /// Decodes the `lo | hi << 8` generator amount.
    #[inline]
    pub fn from_amount(amount: u16) -> Self {
        Self {
            min: (amount & 0x7f) as i16,
            max: ((amount >> 8) & 0x7f) as i16,
        }
    }

    #[inline]
    pub fn to_amount(&self) -> i16 {
        (self.min.clamp(0, 127) | self.max.clamp(0, 127) << 8) as i16
    }

    /// Intersection of two ranges, treating unset ranges as full.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if !self.is_set() {
            return Some(*other);
        }
        if !other.is_set() {
            return Some(*self);
        }
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Self { min, max })
    }
}

/// Generators and modulators scoped to a key and velocity range.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Zone {
    pub key_range: Range,
    pub vel_range: Range,
    pub generators: Vec<Generator>,
    pub modulators: Vec<Modulator>,
}

impl Zone {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
            && self.modulators.is_empty()
            && !self.key_range.is_set()
            && !self.vel_range.is_set()
    }

    /// Appends generators. Range generators set the zone's ranges instead
    /// and index generators are dropped, since the zone's target carries them.
    pub fn add_generators(&mut self, generators: impl IntoIterator<Item = Generator>) {
        for gen in generators {
            match gen.ty {
                GeneratorType::KeyRange => self.key_range = Range::from_amount(gen.amount()),
                GeneratorType::VelRange => self.vel_range = Range::from_amount(gen.amount()),
                GeneratorType::Instrument | GeneratorType::SampleId => {
                    log::debug!("dropping {} generator from zone", gen.ty.name());
                }
                _ => self.generators.push(gen),
            }
        }
    }

    #[inline]
    pub fn add_modulators(&mut self, modulators: impl IntoIterator<Item = Modulator>) {
        self.modulators.extend(modulators);
    }

    #[inline]
    pub fn get_generator(&self, ty: GeneratorType) -> Option<i16> {
        self.generators.iter().find(|g| g.ty == ty).map(|g| g.value)
    }

    #[inline]
    pub fn has_generator(&self, ty: GeneratorType) -> bool {
        self.generators.iter().any(|g| g.ty == ty)
    }

    /// Inserts or replaces the generator of type `ty`.
    ///
    /// # Panics
    ///
    /// Panics on range and index types, which have dedicated setters.
    pub fn set_generator(&mut self, ty: GeneratorType, value: i32, validate: bool) {
        assert!(
            !ty.is_range() && !ty.is_index(),
            "{} cannot be set as a plain generator",
            ty.name()
        );
        let gen = match validate {
            true => Generator::new(ty, value),
            false => Generator::unclamped(ty, value),
        };
        match self.generators.iter_mut().find(|g| g.ty == ty) {
            Some(g) => *g = gen,
            None => self.generators.push(gen),
        }
    }

    #[inline]
    pub fn remove_generator(&mut self, ty: GeneratorType) {
        self.generators.retain(|g| g.ty != ty);
    }

    /// Generators in serialization order: key range, then velocity range,
    /// then everything else in insertion order.
    pub fn write_generators(&self) -> Vec<Generator> {
        let mut gens = Vec::with_capacity(self.generators.len() + 2);
        if self.key_range.is_set() {
            gens.push(Generator::unclamped(
                GeneratorType::KeyRange,
                self.key_range.to_amount() as i32,
            ));
        }
        if self.vel_range.is_set() {
            gens.push(Generator::unclamped(
                GeneratorType::VelRange,
                self.vel_range.to_amount() as i32,
            ));
        }
        gens.extend(
            self.generators
                .iter()
                .filter(|g| !g.ty.is_range() && !g.ty.is_index())
                .copied(),
        );
        gens
    }
}

/// Access to the generator/modulator part of instrument and preset zones.
pub trait ZoneLike {
    fn zone(&self) -> &Zone;
    fn zone_mut(&mut self) -> &mut Zone;
}

impl ZoneLike for Zone {
    #[inline]
    fn zone(&self) -> &Zone {
        self
    }
    #[inline]
    fn zone_mut(&mut self) -> &mut Zone {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_not_stored_as_generators() {
        let mut zone = Zone::new();
        zone.add_generators([
            Generator::new(GeneratorType::Pan, 100),
            Generator::unclamped(GeneratorType::VelRange, 0x7f40),
            Generator::unclamped(GeneratorType::KeyRange, 0x3c24),
        ]);
        assert_eq!(zone.key_range, Range::new(36, 60));
        assert_eq!(zone.vel_range, Range::new(64, 127));
        assert_eq!(zone.generators.len(), 1);

        let written: Vec<_> = zone.write_generators().iter().map(|g| g.ty).collect();
        assert_eq!(
            written,
            [GeneratorType::KeyRange, GeneratorType::VelRange, GeneratorType::Pan]
        );
    }

    #[test]
    fn set_generator_upserts() {
        let mut zone = Zone::new();
        zone.set_generator(GeneratorType::Pan, 100, true);
        zone.set_generator(GeneratorType::Pan, 9000, true);
        assert_eq!(zone.generators, [Generator::new(GeneratorType::Pan, 500)]);
        zone.remove_generator(GeneratorType::Pan);
        assert!(zone.is_empty());
    }

    #[test]
    #[should_panic]
    fn set_generator_rejects_ranges() {
        Zone::new().set_generator(GeneratorType::KeyRange, 0, true);
    }

    #[test]
    fn range_intersection() {
        let a = Range::new(10, 50);
        assert_eq!(a.intersect(&Range::UNSET), Some(a));
        assert_eq!(a.intersect(&Range::new(40, 90)), Some(Range::new(40, 50)));
        assert_eq!(a.intersect(&Range::new(60, 90)), None);
        assert!(Range::UNSET.contains(0));
        assert!(!a.contains(51));
    }
}
