//! SoundFont 2 (`sfbk`) reading and writing.
//!
//! The `pdta` hydra is nine arrays of fixed-size records, each closed by a
//! terminal record. Banks that outgrow the 16-bit indices or 20-character
//! names carry a parallel `xdta` list inside `INFO` with the same nine
//! arrays holding high index words and name tails.

mod read;
mod write;

use crate::riff::FourCC;

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct PresetHeader {
    pub name: [u8; 20],
    pub program: u16,
    pub bank: u16,
    pub bag_index: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
}

#[derive(Clone, Copy, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct Bag {
    pub gen_index: u16,
    pub mod_index: u16,
}

#[derive(Clone, Copy, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct ModulatorRecord {
    pub source: u16,
    pub destination: u16,
    pub amount: i16,
    pub amount_source: u16,
    pub transform: u16,
}

#[derive(Clone, Copy, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct GeneratorRecord {
    pub ty: u16,
    pub amount: u16,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct InstrumentHeader {
    pub name: [u8; 20],
    pub bag_index: u16,
}

#[derive(Clone, Debug, Default)]
#[binrw::binrw]
#[brw(little)]
pub(crate) struct SampleHeader {
    pub name: [u8; 20],
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_key: u8,
    pub pitch_correction: i8,
    pub link: u16,
    pub sample_type: u16,
}

impl ModulatorRecord {
    pub fn from_modulator(m: &crate::Modulator) -> Self {
        Self {
            source: m.source.to_u16(),
            destination: m.destination.id(),
            amount: m.amount,
            amount_source: m.secondary_source.to_u16(),
            transform: m.transform as u16,
        }
    }

    pub fn to_modulator(&self) -> Option<crate::Modulator> {
        crate::Modulator::from_record(
            self.source,
            self.destination,
            self.amount,
            self.amount_source,
            self.transform,
        )
    }
}

/// Top-level lists of an `sfbk` form.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Sf2List {
    Info,
    Sdta,
    Pdta,
}

impl Sf2List {
    pub fn from_fourcc(id: &FourCC) -> Option<Self> {
        Some(match id {
            b"INFO" => Self::Info,
            b"sdta" => Self::Sdta,
            b"pdta" => Self::Pdta,
            _ => return None,
        })
    }
}

/// The nine hydra arrays, in the order they must be written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PdtaChunk {
    Phdr,
    Pbag,
    Pmod,
    Pgen,
    Inst,
    Ibag,
    Imod,
    Igen,
    Shdr,
}

impl PdtaChunk {
    pub const ALL: [PdtaChunk; 9] = [
        Self::Phdr,
        Self::Pbag,
        Self::Pmod,
        Self::Pgen,
        Self::Inst,
        Self::Ibag,
        Self::Imod,
        Self::Igen,
        Self::Shdr,
    ];

    pub fn from_fourcc(id: &FourCC) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.fourcc() == id)
    }

    pub fn fourcc(self) -> &'static FourCC {
        match self {
            Self::Phdr => b"phdr",
            Self::Pbag => b"pbag",
            Self::Pmod => b"pmod",
            Self::Pgen => b"pgen",
            Self::Inst => b"inst",
            Self::Ibag => b"ibag",
            Self::Imod => b"imod",
            Self::Igen => b"igen",
            Self::Shdr => b"shdr",
        }
    }

    pub fn record_size(self) -> usize {
        match self {
            Self::Phdr => 38,
            Self::Pbag | Self::Ibag | Self::Pgen | Self::Igen => 4,
            Self::Pmod | Self::Imod => 10,
            Self::Inst => 22,
            Self::Shdr => 46,
        }
    }
}

/// Sub-chunks of the SF2 `INFO` list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum InfoChunk {
    Ifil,
    Isng,
    Inam,
    Irom,
    Iver,
    Dmod,
    Text(crate::bank::InfoField),
}

impl InfoChunk {
    pub fn from_fourcc(id: &FourCC) -> Option<Self> {
        Some(match id {
            b"ifil" => Self::Ifil,
            b"isng" => Self::Isng,
            b"INAM" => Self::Inam,
            b"irom" => Self::Irom,
            b"iver" => Self::Iver,
            b"DMOD" => Self::Dmod,
            id => Self::Text(crate::bank::InfoField::from_fourcc(id)?),
        })
    }
}

/// SF2 limits on names and hydra indices.
pub(crate) const NAME_LEN: usize = 20;
pub(crate) const MAX_INDEX: usize = u16::MAX as usize;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::{read_record, write_record};

    #[test]
    fn record_sizes() {
        let mut w = Vec::new();
        write_record(&mut w, &PresetHeader::default()).unwrap();
        assert_eq!(w.len(), PdtaChunk::Phdr.record_size());
        w.clear();
        write_record(&mut w, &SampleHeader::default()).unwrap();
        assert_eq!(w.len(), PdtaChunk::Shdr.record_size());
        w.clear();
        write_record(&mut w, &InstrumentHeader::default()).unwrap();
        assert_eq!(w.len(), PdtaChunk::Inst.record_size());
        w.clear();
        write_record(&mut w, &ModulatorRecord::default()).unwrap();
        assert_eq!(w.len(), PdtaChunk::Pmod.record_size());
    }

    #[test]
    fn generator_record_layout() {
        let rec: GeneratorRecord = read_record(&hex_literal::hex!("2b00 2418")).unwrap();
        assert_eq!(rec.ty, 43);
        assert_eq!(rec.amount, 0x1824);
    }
}
