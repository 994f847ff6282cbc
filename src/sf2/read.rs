use super::{
    Bag, GeneratorRecord, InfoChunk, InstrumentHeader, ModulatorRecord, PdtaChunk, PresetHeader,
    SampleHeader, Sf2List, NAME_LEN,
};
use crate::{
    bank::{Instrument, Preset, Sample, SampleType, SoundBank},
    convert_error,
    generator::{Generator, GeneratorType},
    invalid_data,
    modulator::Modulator,
    riff::{
        in_context, list_type, parse_riff_chunks, parse_riff_header, read_record, read_string,
        FourCC, LIST,
    },
    zone::Zone,
    ParseResult,
};
use itertools::Itertools;
use nom::{error::context, number::complete::le_u16};
use std::io;

#[derive(Default)]
struct Sf2Chunks<'a> {
    info: Vec<(FourCC, &'a [u8])>,
    smpl: Option<&'a [u8]>,
    pdta: [Option<&'a [u8]>; 9],
    xdta: [Option<&'a [u8]>; 9],
}

fn parse_hydra<'a>(data: &'a [u8], out: &mut [Option<&'a [u8]>; 9]) -> ParseResult<'a> {
    parse_riff_chunks(data, |id, chunk| {
        match PdtaChunk::from_fourcc(&id) {
            Some(c) => {
                out[c as usize].get_or_insert(chunk);
            }
            None => log::debug!("skipping hydra chunk {:?}", String::from_utf8_lossy(&id)),
        }
        Ok((&[], ()))
    })
}

fn parse_sf2_chunks(data: &[u8]) -> ParseResult<'_, Sf2Chunks<'_>> {
    let mut chunks = Sf2Chunks::default();
    let (data, _) = parse_riff_header(data, b"sfbk")?;
    parse_riff_chunks(data, |id, chunk| {
        if id != *LIST {
            return Ok((&[], ()));
        }
        let (chunk, ty) = list_type(chunk)?;
        match Sf2List::from_fourcc(&ty) {
            Some(Sf2List::Info) => {
                let res = parse_riff_chunks(chunk, |id, chunk| {
                    if id == *LIST {
                        let (rest, ty) = list_type(chunk)?;
                        if &ty == b"xdta" {
                            in_context(rest, "xdta", parse_hydra(rest, &mut chunks.xdta))?;
                        }
                    } else {
                        chunks.info.push((id, chunk));
                    }
                    Ok((&[], ()))
                });
                in_context(chunk, "INFO", res)?;
            }
            Some(Sf2List::Sdta) => {
                parse_riff_chunks(chunk, |id, chunk| {
                    match &id {
                        b"smpl" => {
                            chunks.smpl.get_or_insert(chunk);
                        }
                        b"sm24" => log::debug!("ignoring sm24 chunk, samples are read as 16-bit"),
                        _ => {}
                    }
                    Ok((&[], ()))
                })?;
            }
            Some(Sf2List::Pdta) => {
                in_context(chunk, "pdta", parse_hydra(chunk, &mut chunks.pdta))?;
            }
            None => log::debug!("skipping LIST {:?}", String::from_utf8_lossy(&ty)),
        }
        Ok((&[], ()))
    })?;
    Ok((&[], chunks))
}

/// The hydra arrays with terminal records included.
#[derive(Default)]
struct Hydra {
    phdr: Vec<PresetHeader>,
    pbag: Vec<Bag>,
    pmod: Vec<ModulatorRecord>,
    pgen: Vec<GeneratorRecord>,
    inst: Vec<InstrumentHeader>,
    ibag: Vec<Bag>,
    imod: Vec<ModulatorRecord>,
    igen: Vec<GeneratorRecord>,
    shdr: Vec<SampleHeader>,
}

fn read_records<T>(chunks: &[Option<&[u8]>; 9], which: PdtaChunk) -> io::Result<Vec<T>>
where
    T: for<'a> binrw::BinRead<Args<'a> = ()>,
{
    let data = chunks[which as usize].unwrap_or_default();
    data.chunks_exact(which.record_size())
        .map(|r| read_record(r).map_err(invalid_data))
        .collect()
}

impl Hydra {
    fn read(chunks: &[Option<&[u8]>; 9]) -> io::Result<Self> {
        use PdtaChunk::*;
        Ok(Self {
            phdr: read_records(chunks, Phdr)?,
            pbag: read_records(chunks, Pbag)?,
            pmod: read_records(chunks, Pmod)?,
            pgen: read_records(chunks, Pgen)?,
            inst: read_records(chunks, Inst)?,
            ibag: read_records(chunks, Ibag)?,
            imod: read_records(chunks, Imod)?,
            igen: read_records(chunks, Igen)?,
            shdr: read_records(chunks, Shdr)?,
        })
    }
}

/// Index and name views with the `xdta` high words and name tails folded in.
struct Extended<'a> {
    low: &'a Hydra,
    high: Option<Hydra>,
}

impl Extended<'_> {
    #[inline]
    fn high<T>(
        &self,
        f: impl Fn(&Hydra) -> &Vec<T>,
        i: usize,
        word: impl Fn(&T) -> u16,
    ) -> usize {
        self.high
            .as_ref()
            .and_then(|h| f(h).get(i))
            .map_or(0, |r| (word(r) as usize) << 16)
    }

    fn name(&self, low: &[u8; 20], high: Option<&[u8; 20]>) -> String {
        let mut name = read_string(low);
        if name.chars().count() == NAME_LEN {
            if let Some(tail) = high {
                name.push_str(&read_string(tail));
            }
        }
        name
    }

    fn preset_bag(&self, i: usize) -> usize {
        self.low.phdr[i].bag_index as usize + self.high(|h| &h.phdr, i, |r| r.bag_index)
    }

    fn preset_name(&self, i: usize) -> String {
        let tail = self.high.as_ref().and_then(|h| h.phdr.get(i)).map(|r| &r.name);
        self.name(&self.low.phdr[i].name, tail)
    }

    fn instrument_bag(&self, i: usize) -> usize {
        self.low.inst[i].bag_index as usize + self.high(|h| &h.inst, i, |r| r.bag_index)
    }

    fn instrument_name(&self, i: usize) -> String {
        let tail = self.high.as_ref().and_then(|h| h.inst.get(i)).map(|r| &r.name);
        self.name(&self.low.inst[i].name, tail)
    }

    fn sample_name(&self, i: usize) -> String {
        let tail = self.high.as_ref().and_then(|h| h.shdr.get(i)).map(|r| &r.name);
        self.name(&self.low.shdr[i].name, tail)
    }

    fn sample_link(&self, i: usize) -> usize {
        self.low.shdr[i].link as usize + self.high(|h| &h.shdr, i, |r| r.link)
    }

    /// `(generator, modulator)` start indices of a bag.
    fn bag(&self, preset: bool, i: usize) -> (usize, usize) {
        let (bags, pick): (&Vec<Bag>, fn(&Hydra) -> &Vec<Bag>) = match preset {
            true => (&self.low.pbag, |h| &h.pbag),
            false => (&self.low.ibag, |h| &h.ibag),
        };
        let b = bags[i];
        (
            b.gen_index as usize + self.high(pick, i, |r| r.gen_index),
            b.mod_index as usize + self.high(pick, i, |r| r.mod_index),
        )
    }
}

/// Generators and modulators of every zone in `bags`, with the index
/// generator's value pulled out.
fn read_zones(
    hydra: &Extended,
    preset: bool,
    bags: std::ops::Range<usize>,
) -> io::Result<Vec<(Zone, Option<u16>)>> {
    let (gens, mods, bag_count) = match preset {
        true => (&hydra.low.pgen, &hydra.low.pmod, hydra.low.pbag.len()),
        false => (&hydra.low.igen, &hydra.low.imod, hydra.low.ibag.len()),
    };
    let kind = if preset { "pbag" } else { "ibag" };
    if bags.end >= bag_count {
        return Err(invalid_data(format!("{kind} index {} out of range", bags.end)));
    }
    let index_type = match preset {
        true => GeneratorType::Instrument,
        false => GeneratorType::SampleId,
    };

    let mut zones = Vec::with_capacity(bags.len());
    for (bag, next) in bags.clone().zip(bags.start + 1..=bags.end) {
        let (gen_start, mod_start) = hydra.bag(preset, bag);
        let (gen_end, mod_end) = hydra.bag(preset, next);
        let gen_records = gens
            .get(gen_start..gen_end)
            .ok_or_else(|| invalid_data(format!("{kind} {bag} generators out of range")))?;
        let mod_records = mods
            .get(mod_start..mod_end)
            .ok_or_else(|| invalid_data(format!("{kind} {bag} modulators out of range")))?;

        let mut zone = Zone::new();
        let mut target = None;
        for rec in gen_records {
            match GeneratorType::from_u16(rec.ty) {
                Some(ty) if ty == index_type => {
                    target = Some(rec.amount);
                    // anything after the index generator is ignored
                    break;
                }
                Some(ty) => zone.add_generators([Generator::unclamped(ty, rec.amount as i16 as i32)]),
                None => log::warn!("skipping unknown generator {} in {kind} {bag}", rec.ty),
            }
        }
        for rec in mod_records {
            match rec.to_modulator() {
                Some(m) => zone.add_modulators([m]),
                None => log::warn!(
                    "skipping modulator with destination {:#06x} in {kind} {bag}",
                    rec.destination
                ),
            }
        }
        zones.push((zone, target));
    }
    Ok(zones)
}

fn read_info(bank: &mut SoundBank, info: &[(FourCC, &[u8])]) -> io::Result<()> {
    let mut has_ifil = false;
    let version = |chunk: &[u8]| -> io::Result<(u16, u16)> {
        let (chunk, major) = le_u16::<_, ()>(chunk).map_err(|_| invalid_data("short version chunk"))?;
        let (_, minor) = le_u16::<_, ()>(chunk).map_err(|_| invalid_data("short version chunk"))?;
        Ok((major, minor))
    };
    for (id, chunk) in info {
        match InfoChunk::from_fourcc(id) {
            Some(InfoChunk::Ifil) => {
                bank.info.version = version(chunk)?;
                has_ifil = true;
            }
            Some(InfoChunk::Iver) => bank.info.rom_version = Some(version(chunk)?),
            Some(InfoChunk::Isng) => bank.info.sound_engine = read_string(chunk),
            Some(InfoChunk::Inam) => bank.info.name = read_string(chunk),
            Some(InfoChunk::Irom) => bank.info.rom_name = Some(read_string(chunk)),
            Some(InfoChunk::Text(field)) => bank.info.set_field(field, read_string(chunk)),
            Some(InfoChunk::Dmod) => {
                let mut mods: Vec<Modulator> = Vec::new();
                for rec in chunk.chunks_exact(PdtaChunk::Pmod.record_size()) {
                    let rec: ModulatorRecord = read_record(rec).map_err(invalid_data)?;
                    if rec.source == 0 && rec.destination == 0 && rec.amount == 0 {
                        // terminal record
                        continue;
                    }
                    match rec.to_modulator() {
                        Some(m) => mods.push(m),
                        None => log::warn!("skipping default modulator to {:#06x}", rec.destination),
                    }
                }
                log::debug!("bank carries {} custom default modulators", mods.len());
                bank.default_modulators = mods;
                bank.custom_default_modulators = true;
            }
            None => log::debug!("skipping INFO chunk {:?}", String::from_utf8_lossy(id)),
        }
    }
    if !has_ifil {
        return Err(invalid_data("missing ifil chunk in INFO"));
    }
    Ok(())
}

fn read_samples(bank: &mut SoundBank, hydra: &Extended, smpl: &[u8]) -> io::Result<()> {
    let headers = &hydra.low.shdr;
    let count = headers.len().saturating_sub(1);
    let total_frames = smpl.len() / 2;
    let mut links = Vec::with_capacity(count);

    for (i, h) in headers.iter().take(count).enumerate() {
        let name = hydra.sample_name(i);
        let sample_type = SampleType::from_u16(h.sample_type).unwrap_or_else(|| {
            log::warn!("sample `{name}` has unknown type {:#06x}, reading as mono", h.sample_type);
            SampleType::Mono
        });
        let compressed = h.sample_type & SampleType::COMPRESSED_FLAG != 0;

        let mut sample = match compressed {
            true => {
                let start = (h.start as usize).min(smpl.len());
                let end = (h.end as usize).clamp(start, smpl.len());
                let mut sample = Sample::new_compressed(name, h.sample_rate, smpl[start..end].to_vec());
                // already relative to the decoded sample
                sample.loop_start = h.loop_start;
                sample.loop_end = h.loop_end;
                sample
            }
            false => {
                let start = (h.start as usize).min(total_frames);
                let end = (h.end as usize).clamp(start, total_frames);
                if end != h.end as usize {
                    log::warn!("sample `{name}` ends past the sample data");
                }
                let pcm = smpl[start * 2..end * 2]
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect();
                let mut sample = Sample::new(name, h.sample_rate, pcm);
                sample.loop_start = h.loop_start.saturating_sub(h.start);
                sample.loop_end = h.loop_end.saturating_sub(h.start);
                sample
            }
        };
        sample.original_key = h.original_key;
        sample.pitch_correction = h.pitch_correction;
        bank.add_sample(sample);
        links.push((sample_type, hydra.sample_link(i)));
    }

    for (i, (ty, partner)) in links.into_iter().enumerate() {
        if !ty.is_linked() {
            continue;
        }
        if let Some(current) = bank.samples[i].linked_sample() {
            if current != partner {
                log::warn!("sample `{}` is already paired", bank.samples[i].name);
            }
            continue;
        }
        let valid = partner < bank.samples.len()
            && partner != i
            && bank.samples[partner].linked_sample().is_none();
        if !valid {
            log::warn!(
                "sample `{}` links to unusable sample {partner}, reading as mono",
                bank.samples[i].name
            );
            continue;
        }
        bank.link_stereo(i, partner, ty);
    }
    Ok(())
}

impl SoundBank {
    /// Parses an SF2 (or SF3) file.
    pub fn read_sf2(data: &[u8]) -> io::Result<Self> {
        let (_, chunks) = context("sfbk", parse_sf2_chunks)(data)
            .map_err(|e| invalid_data(convert_error(data, e)))?;

        let mut bank = SoundBank::new();
        read_info(&mut bank, &chunks.info)?;

        let low = Hydra::read(&chunks.pdta)?;
        if low.phdr.is_empty() || low.inst.is_empty() || low.shdr.is_empty() {
            return Err(invalid_data("pdta is missing terminal records"));
        }
        let high = match chunks.xdta.iter().any(Option::is_some) {
            true => {
                let high = Hydra::read(&chunks.xdta)?;
                let matches = high.phdr.len() == low.phdr.len()
                    && high.pbag.len() == low.pbag.len()
                    && high.inst.len() == low.inst.len()
                    && high.ibag.len() == low.ibag.len()
                    && high.shdr.len() == low.shdr.len();
                if !matches {
                    log::warn!("xdta does not match pdta, ignoring it");
                }
                matches.then_some(high)
            }
            false => None,
        };
        let hydra = Extended { low: &low, high };

        let smpl = chunks.smpl.unwrap_or_default();
        read_samples(&mut bank, &hydra, smpl)?;
        log::debug!("read {} samples", bank.samples.len());

        for i in 0..low.inst.len() - 1 {
            let bags = hydra.instrument_bag(i)..hydra.instrument_bag(i + 1);
            let mut instrument = Instrument::new(hydra.instrument_name(i));
            let zones = read_zones(&hydra, false, bags)?;
            let mut targets = Vec::with_capacity(zones.len());
            for (i, (zone, sample)) in zones.into_iter().enumerate() {
                match sample {
                    Some(sample) => targets.push((zone, sample as usize)),
                    None if i == 0 => merge_global(&mut instrument.global_zone, zone),
                    None => log::warn!("ignoring zone {i} of instrument `{}` without a sample", instrument.name),
                }
            }
            let index = bank.add_instrument(instrument);
            for (zone, sample) in targets {
                if sample >= bank.samples.len() {
                    return Err(invalid_data(format!(
                        "instrument `{}` references missing sample {sample}",
                        bank.instruments[index].name
                    )));
                }
                let z = bank.create_instrument_zone(index, sample);
                bank.instruments[index].zones[z].zone = zone;
            }
        }
        log::debug!("read {} instruments", bank.instruments.len());

        for (i, (header, _)) in low.phdr.iter().tuple_windows().enumerate() {
            let bags = hydra.preset_bag(i)..hydra.preset_bag(i + 1);
            let mut preset = Preset::new(hydra.preset_name(i), header.bank, header.program as u8);
            preset.library = header.library;
            preset.genre = header.genre;
            preset.morphology = header.morphology;
            let zones = read_zones(&hydra, true, bags)?;
            let mut targets = Vec::with_capacity(zones.len());
            for (i, (zone, instrument)) in zones.into_iter().enumerate() {
                match instrument {
                    Some(instrument) => targets.push((zone, instrument as usize)),
                    None if i == 0 => merge_global(&mut preset.global_zone, zone),
                    None => log::warn!("ignoring zone {i} of preset `{}` without an instrument", preset.name),
                }
            }
            let index = bank.add_preset(preset);
            for (zone, instrument) in targets {
                if instrument >= bank.instruments.len() {
                    return Err(invalid_data(format!(
                        "preset `{}` references missing instrument {instrument}",
                        bank.presets[index].name
                    )));
                }
                let z = bank.create_preset_zone(index, instrument);
                bank.presets[index].zones[z].zone = zone;
            }
        }
        log::debug!("read {} presets", bank.presets.len());
        Ok(bank)
    }
}

/// Only the first zone of an instrument or preset may be global.
fn merge_global(global: &mut Zone, zone: Zone) {
    if zone.key_range.is_set() {
        global.key_range = zone.key_range;
    }
    if zone.vel_range.is_set() {
        global.vel_range = zone.vel_range;
    }
    for g in zone.generators {
        global.set_generator(g.ty, g.value as i32, false);
    }
    global.add_modulators(zone.modulators);
}
