use super::{
    Bag, GeneratorRecord, InstrumentHeader, ModulatorRecord, PdtaChunk, PresetHeader,
    SampleHeader, MAX_INDEX, NAME_LEN,
};
use crate::{
    bank::{SampleData, SampleType, SoundBank},
    codec::Sf2WriteOptions,
    generator::GeneratorType,
    riff::{chunk, fixed_string, info_string, list, riff, write_record},
    zone::Zone,
};
use std::{borrow::Cow, io};

/// Serialized hydra arrays: the `pdta` records and their `xdta` shadows.
#[derive(Default)]
struct HydraWriter {
    low: [Vec<u8>; 9],
    high: [Vec<u8>; 9],
    /// Set when an index or name does not fit the plain SF2 fields.
    overflow: bool,
}

#[inline]
fn lo(v: usize) -> u16 {
    (v & 0xffff) as u16
}

#[inline]
fn hi(v: usize) -> u16 {
    (v >> 16) as u16
}

impl HydraWriter {
    fn push<T>(&mut self, which: PdtaChunk, low: &T, high: &T) -> io::Result<()>
    where
        T: for<'a> binrw::BinWrite<Args<'a> = ()>,
    {
        write_record(&mut self.low[which as usize], low)?;
        write_record(&mut self.high[which as usize], high)
    }

    fn check_name(&mut self, name: &str) {
        self.overflow |= name.chars().count() > NAME_LEN;
    }

    fn check_index(&mut self, index: usize) {
        self.overflow |= index > MAX_INDEX;
    }

    /// Writes the bag, generators and modulators of one zone.
    fn push_zone(
        &mut self,
        chunks: [PdtaChunk; 3],
        zone: &Zone,
        target: Option<(GeneratorType, usize)>,
        counts: &mut (usize, usize),
    ) -> io::Result<()> {
        let [bag, gen, modulator] = chunks;
        self.check_index(counts.0);
        self.check_index(counts.1);
        self.push(
            bag,
            &Bag {
                gen_index: lo(counts.0),
                mod_index: lo(counts.1),
            },
            &Bag {
                gen_index: hi(counts.0),
                mod_index: hi(counts.1),
            },
        )?;
        let gens = &mut self.low[gen as usize];
        for g in zone.write_generators() {
            write_record(gens, &GeneratorRecord { ty: g.ty.id(), amount: g.amount() })?;
            counts.0 += 1;
        }
        if let Some((ty, index)) = target {
            self.overflow |= index > MAX_INDEX;
            write_record(gens, &GeneratorRecord { ty: ty.id(), amount: lo(index) })?;
            counts.0 += 1;
        }
        let mods = &mut self.low[modulator as usize];
        for m in &zone.modulators {
            write_record(mods, &ModulatorRecord::from_modulator(m))?;
            counts.1 += 1;
        }
        Ok(())
    }

    /// Closes a zone list with the terminal bag, generator and modulator.
    fn finish_zones(&mut self, chunks: [PdtaChunk; 3], counts: (usize, usize)) -> io::Result<()> {
        let [bag, gen, modulator] = chunks;
        self.check_index(counts.0);
        self.check_index(counts.1);
        self.push(
            bag,
            &Bag {
                gen_index: lo(counts.0),
                mod_index: lo(counts.1),
            },
            &Bag {
                gen_index: hi(counts.0),
                mod_index: hi(counts.1),
            },
        )?;
        self.push(gen, &GeneratorRecord::default(), &GeneratorRecord::default())?;
        self.push(modulator, &ModulatorRecord::default(), &ModulatorRecord::default())
    }
}

const PRESET_ZONES: [PdtaChunk; 3] = [PdtaChunk::Pbag, PdtaChunk::Pgen, PdtaChunk::Pmod];
const INSTRUMENT_ZONES: [PdtaChunk; 3] = [PdtaChunk::Ibag, PdtaChunk::Igen, PdtaChunk::Imod];

/// Zones in write order: the global zone first when it carries anything.
fn zones_with_global<'a, Z: 'a>(
    global: &'a Zone,
    zones: &'a [Z],
    target: impl Fn(&'a Z) -> (&'a Zone, (GeneratorType, usize)) + 'a,
) -> impl Iterator<Item = (&'a Zone, Option<(GeneratorType, usize)>)> + 'a {
    (!global.is_empty())
        .then_some((global, None))
        .into_iter()
        .chain(zones.iter().map(move |z| {
            let (zone, t) = target(z);
            (zone, Some(t))
        }))
}

impl SoundBank {
    fn write_hydra(&self, hydra: &mut HydraWriter, shdr: &[SampleHeader]) -> io::Result<()> {
        use PdtaChunk::*;

        let mut counts = (0, 0);
        let mut bags = 0;
        for preset in &self.presets {
            hydra.check_name(&preset.name);
            hydra.check_index(bags);
            hydra.push(
                Phdr,
                &PresetHeader {
                    name: fixed_string(&preset.name, 0),
                    program: preset.program as u16,
                    bank: preset.sf2_bank(),
                    bag_index: lo(bags),
                    library: preset.library,
                    genre: preset.genre,
                    morphology: preset.morphology,
                },
                &PresetHeader {
                    name: fixed_string(&preset.name, NAME_LEN),
                    bag_index: hi(bags),
                    ..Default::default()
                },
            )?;
            let zones = zones_with_global(&preset.global_zone, &preset.zones, |z| {
                (&z.zone, (GeneratorType::Instrument, z.instrument))
            });
            for (zone, target) in zones {
                hydra.push_zone(PRESET_ZONES, zone, target, &mut counts)?;
                bags += 1;
            }
        }
        hydra.push(
            Phdr,
            &PresetHeader {
                name: fixed_string("EOP", 0),
                bag_index: lo(bags),
                ..Default::default()
            },
            &PresetHeader {
                bag_index: hi(bags),
                ..Default::default()
            },
        )?;
        hydra.finish_zones(PRESET_ZONES, counts)?;

        let mut counts = (0, 0);
        let mut bags = 0;
        for instrument in &self.instruments {
            hydra.check_name(&instrument.name);
            hydra.check_index(bags);
            hydra.push(
                Inst,
                &InstrumentHeader {
                    name: fixed_string(&instrument.name, 0),
                    bag_index: lo(bags),
                },
                &InstrumentHeader {
                    name: fixed_string(&instrument.name, NAME_LEN),
                    bag_index: hi(bags),
                },
            )?;
            let zones = zones_with_global(&instrument.global_zone, &instrument.zones, |z| {
                (&z.zone, (GeneratorType::SampleId, z.sample))
            });
            for (zone, target) in zones {
                hydra.push_zone(INSTRUMENT_ZONES, zone, target, &mut counts)?;
                bags += 1;
            }
        }
        hydra.push(
            Inst,
            &InstrumentHeader {
                name: fixed_string("EOI", 0),
                bag_index: lo(bags),
            },
            &InstrumentHeader {
                name: [0; 20],
                bag_index: hi(bags),
            },
        )?;
        hydra.finish_zones(INSTRUMENT_ZONES, counts)?;

        for (header, sample) in shdr.iter().zip(&self.samples) {
            hydra.check_name(&sample.name);
            let link = sample.linked_sample().unwrap_or(0);
            hydra.check_index(link);
            hydra.push(
                Shdr,
                &SampleHeader {
                    link: lo(link),
                    ..header.clone()
                },
                &SampleHeader {
                    name: fixed_string(&sample.name, NAME_LEN),
                    link: hi(link),
                    ..Default::default()
                },
            )?;
        }
        hydra.push(
            Shdr,
            &SampleHeader {
                name: fixed_string("EOS", 0),
                ..Default::default()
            },
            &SampleHeader::default(),
        )
    }

    /// Builds the `smpl` payload and the sample headers (without links).
    fn write_sample_data(
        &self,
        options: &mut Sf2WriteOptions,
    ) -> io::Result<(Vec<u8>, Vec<SampleHeader>, bool)> {
        let mut smpl = Vec::new();
        let mut headers = Vec::with_capacity(self.samples.len());
        let mut any_compressed = false;
        let total = self.samples.len();
        if options.compress && options.codec.is_none() {
            log::warn!("compression requested without a codec, writing raw samples");
        }

        for (index, sample) in self.samples.iter().enumerate() {
            let data: Cow<SampleData> = match (&sample.data, options.codec) {
                (SampleData::Compressed(_), codec) if options.decompress => {
                    Cow::Owned(SampleData::Raw(sample.audio_data(codec).to_vec()))
                }
                (SampleData::Raw(pcm), Some(codec)) if options.compress => {
                    match codec.encode(pcm, sample.sample_rate) {
                        Ok(bytes) => Cow::Owned(SampleData::Compressed(bytes)),
                        Err(e) => {
                            log::warn!("failed to compress sample `{}`: {e}", sample.name);
                            Cow::Borrowed(&sample.data)
                        }
                    }
                }
                (data, _) => Cow::Borrowed(data),
            };

            let mut sample_type = sample.sample_type.to_u16();
            let (start, end, loop_start, loop_end) = match data.as_ref() {
                SampleData::Raw(pcm) => {
                    let start = (smpl.len() / 2) as u32;
                    for s in pcm {
                        smpl.extend_from_slice(&s.to_le_bytes());
                    }
                    let end = start + pcm.len() as u32;
                    // zero sample points required after each sample
                    smpl.resize(smpl.len() + 46 * 2, 0);
                    (start, end, start + sample.loop_start, start + sample.loop_end)
                }
                SampleData::Compressed(bytes) => {
                    any_compressed = true;
                    sample_type |= SampleType::COMPRESSED_FLAG;
                    let start = smpl.len() as u32;
                    smpl.extend_from_slice(bytes);
                    if smpl.len() % 2 == 1 {
                        smpl.push(0);
                    }
                    (start, start + bytes.len() as u32, sample.loop_start, sample.loop_end)
                }
            };
            headers.push(SampleHeader {
                name: fixed_string(&sample.name, 0),
                start,
                end,
                loop_start,
                loop_end,
                sample_rate: sample.sample_rate,
                original_key: sample.original_key,
                pitch_correction: sample.pitch_correction,
                link: 0,
                sample_type,
            });
            if let Some(progress) = options.progress.as_deref_mut() {
                progress(&sample.name, index, total);
            }
        }
        Ok((smpl, headers, any_compressed))
    }

    fn write_sf2_info(
        &self,
        options: &Sf2WriteOptions,
        compressed: bool,
        xdta: Option<Vec<u8>>,
    ) -> io::Result<Vec<u8>> {
        let version = |(major, minor): (u16, u16)| {
            [major.to_le_bytes(), minor.to_le_bytes()].concat()
        };
        let ifil = match compressed {
            true => (3, 0),
            false if self.info.version.0 >= 3 => (2, 4),
            false => self.info.version,
        };
        let mut parts = vec![
            chunk(b"ifil", &version(ifil)),
            chunk(b"isng", &info_string(&self.info.sound_engine)),
            chunk(b"INAM", &info_string(&self.info.name)),
        ];
        if let Some(rom) = &self.info.rom_name {
            parts.push(chunk(b"irom", &info_string(rom)));
        }
        if let Some(v) = self.info.rom_version {
            parts.push(chunk(b"iver", &version(v)));
        }
        for (field, value) in self.info.fields() {
            parts.push(chunk(field.fourcc(), &info_string(value)));
        }
        if options.write_default_modulators && self.custom_default_modulators {
            let mut dmod = Vec::new();
            for m in &self.default_modulators {
                write_record(&mut dmod, &ModulatorRecord::from_modulator(m))?;
            }
            write_record(&mut dmod, &ModulatorRecord::default())?;
            parts.push(chunk(b"DMOD", &dmod));
        }
        if let Some(xdta) = xdta {
            parts.push(xdta);
        }
        Ok(list(b"INFO", parts))
    }

    /// Serializes the bank as SF2, or SF3 when samples end up compressed.
    pub fn write_sf2(&self, mut options: Sf2WriteOptions) -> io::Result<Vec<u8>> {
        let (smpl, shdr, compressed) = self.write_sample_data(&mut options)?;

        let mut hydra = HydraWriter::default();
        self.write_hydra(&mut hydra, &shdr)?;
        let pdta = list(
            b"pdta",
            PdtaChunk::ALL
                .iter()
                .map(|c| chunk(c.fourcc(), &hydra.low[*c as usize])),
        );

        let xdta = match (hydra.overflow, options.write_extended_limits) {
            (true, true) => {
                log::debug!("bank exceeds SF2 limits, writing xdta");
                Some(list(
                    b"xdta",
                    PdtaChunk::ALL
                        .iter()
                        .map(|c| chunk(c.fourcc(), &hydra.high[*c as usize])),
                ))
            }
            (true, false) => {
                log::warn!("bank exceeds SF2 limits, long names and large indices will be truncated");
                None
            }
            (false, _) => None,
        };

        let info = self.write_sf2_info(&options, compressed, xdta)?;
        let sdta = list(b"sdta", [chunk(b"smpl", &smpl)]);
        Ok(riff(b"sfbk", [info, sdta, pdta]))
    }
}
