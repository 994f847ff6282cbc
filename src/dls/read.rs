use super::{
    Articulation, ConnectionBlock, ConnectionRecord, CountedHeader, DlsBank, DlsChunk,
    DlsInstrument, DlsList, DlsRegion, DlsWave, InstrumentHeaderRecord, RegionHeader,
    RegionOptions, WaveFormat, WaveLink, WaveLinkOptions, WaveLinkRecord, WaveLoop,
    WaveLoopRecord, WaveSample, WaveSampleOptions, WaveSampleRecord, WAVE_FORMAT_EXTENSIBLE,
    WAVE_FORMAT_PCM,
};
use crate::{
    bank::{BankInfo, InfoField},
    convert_error, invalid_data, nom_context,
    riff::{in_context, list_type, parse_riff_chunks, parse_riff_header, read_record, read_string, FourCC, LIST},
    ParseResult,
};
use nom::{error::context, number::complete::le_u32};
use std::{collections::HashMap, io};

type NomErr<'a> = nom::Err<nom::error::VerboseError<&'a [u8]>>;

#[inline]
fn record<'a, T>(chunk: &'a [u8], ctx: &'static str) -> Result<T, NomErr<'a>>
where
    T: for<'b> binrw::BinRead<Args<'b> = ()>,
{
    read_record(chunk).map_err(|_| nom_context(chunk, ctx))
}

#[derive(Default)]
struct DlsChunks<'a> {
    colh: Option<u32>,
    ptbl: Vec<u32>,
    lins: Option<&'a [u8]>,
    wvpl: Option<&'a [u8]>,
    info: Option<&'a [u8]>,
}

fn parse_dls_chunks(data: &[u8]) -> ParseResult<'_, DlsChunks<'_>> {
    let mut chunks = DlsChunks::default();
    let (data, _) = parse_riff_header(data, b"DLS ")?;
    // pull out the pool data first, regions are resolved against it later
    parse_riff_chunks(data, |id, chunk| {
        match DlsChunk::from_fourcc(&id) {
            Some(DlsChunk::Colh) => {
                let (_, count) = le_u32(chunk)?;
                chunks.colh = Some(count);
            }
            Some(DlsChunk::Ptbl) => {
                let header: CountedHeader = record(chunk, "ptbl")?;
                let cues = chunk.get(header.size as usize..).unwrap_or_default();
                chunks.ptbl = cues
                    .chunks_exact(4)
                    .take(header.count as usize)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
            }
            Some(DlsChunk::List) => {
                let (chunk, ty) = list_type(chunk)?;
                match DlsList::from_fourcc(&ty) {
                    Some(DlsList::Lins) => {
                        chunks.lins.get_or_insert(chunk);
                    }
                    Some(DlsList::Wvpl) => {
                        chunks.wvpl.get_or_insert(chunk);
                    }
                    Some(DlsList::Info) => {
                        chunks.info.get_or_insert(chunk);
                    }
                    _ => log::debug!("skipping LIST {:?}", String::from_utf8_lossy(&ty)),
                }
            }
            _ => log::debug!("skipping chunk {:?}", String::from_utf8_lossy(&id)),
        }
        Ok((&[], ()))
    })?;
    Ok((&[], chunks))
}

/// Calls `f` with every text sub-chunk of an `INFO` list.
fn parse_info<'a>(chunk: &'a [u8], mut f: impl FnMut(&FourCC, String)) -> ParseResult<'a> {
    parse_riff_chunks(chunk, |id, chunk| {
        f(&id, read_string(chunk));
        Ok((&[], ()))
    })
}

/// Appends the connection blocks of every `art1`/`art2` chunk in a `lart`/`lar2` list.
fn parse_articulation<'a>(chunk: &'a [u8], level: u8, out: &mut Option<Articulation>) -> ParseResult<'a> {
    let art = out.get_or_insert_with(|| Articulation {
        level,
        connections: Vec::new(),
    });
    art.level = art.level.max(level);
    parse_riff_chunks(chunk, |id, chunk| {
        if matches!(DlsChunk::from_fourcc(&id), Some(DlsChunk::Art1 | DlsChunk::Art2)) {
            let header: CountedHeader = record(chunk, "art header")?;
            let blocks = chunk.get(header.size as usize..).unwrap_or_default();
            if blocks.len() / 12 < header.count as usize {
                log::warn!("articulator lists {} connections but holds {}", header.count, blocks.len() / 12);
            }
            for block in blocks.chunks_exact(12).take(header.count as usize) {
                let rec: ConnectionRecord = record(block, "connection block")?;
                art.connections.push(ConnectionBlock::from(&rec));
            }
        }
        Ok((&[], ()))
    })
}

#[inline]
fn articulation_level(ty: &FourCC) -> Option<u8> {
    match DlsList::from_fourcc(ty) {
        Some(DlsList::Lart) => Some(1),
        Some(DlsList::Lar2) => Some(2),
        _ => None,
    }
}

fn parse_wsmp(chunk: &[u8]) -> ParseResult<'_, WaveSample> {
    let h: WaveSampleRecord = record(chunk, "wsmp")?;
    let loops = chunk.get(h.size as usize..).unwrap_or_default();
    let wave_loop = match h.loop_count {
        0 => None,
        n => {
            if n > 1 {
                log::debug!("wsmp has {n} loops, keeping the first");
            }
            let l: WaveLoopRecord = record(loops, "wsmp loop")?;
            Some(WaveLoop {
                loop_type: l.loop_type,
                start: l.start,
                length: l.length,
            })
        }
    };
    Ok((
        &[],
        WaveSample {
            unity_note: h.unity_note,
            fine_tune: h.fine_tune,
            gain: h.gain,
            options: WaveSampleOptions::from_bits_retain(h.options),
            wave_loop,
        },
    ))
}

/// Parses a `rgn `/`rgn2` list. The wave link holds the raw `ptbl` index.
fn parse_region(chunk: &[u8]) -> ParseResult<'_, DlsRegion> {
    let mut region = DlsRegion::default();
    let mut linked = false;
    parse_riff_chunks(chunk, |id, chunk| {
        match DlsChunk::from_fourcc(&id) {
            Some(DlsChunk::Rgnh) => {
                let h: RegionHeader = record(chunk, "rgnh")?;
                region.key_range = (h.key_low, h.key_high);
                region.vel_range = (h.vel_low, h.vel_high);
                region.options = RegionOptions::from_bits_retain(h.options);
                region.key_group = h.key_group;
            }
            Some(DlsChunk::Wsmp) => region.wave_sample = Some(parse_wsmp(chunk)?.1),
            Some(DlsChunk::Wlnk) => {
                let l: WaveLinkRecord = record(chunk, "wlnk")?;
                region.wave_link = WaveLink {
                    options: WaveLinkOptions::from_bits_retain(l.options),
                    phase_group: l.phase_group,
                    channel: l.channel,
                    wave: l.table_index as usize,
                };
                linked = true;
            }
            Some(DlsChunk::List) => {
                let (chunk, ty) = list_type(chunk)?;
                if let Some(level) = articulation_level(&ty) {
                    parse_articulation(chunk, level, &mut region.articulation)?;
                }
            }
            _ => {}
        }
        Ok((&[], ()))
    })?;
    if !linked {
        return Err(nom_context(chunk, "region without wlnk"));
    }
    Ok((&[], region))
}

fn parse_instrument(chunk: &[u8]) -> ParseResult<'_, DlsInstrument> {
    let mut inst = DlsInstrument::default();
    let mut has_header = false;
    parse_riff_chunks(chunk, |id, chunk| {
        match DlsChunk::from_fourcc(&id) {
            Some(DlsChunk::Insh) => {
                if has_header {
                    return Err(nom_context(chunk, "duplicate insh"));
                }
                let h: InstrumentHeaderRecord = record(chunk, "insh")?;
                inst.bank = h.bank;
                inst.program = h.program;
                has_header = true;
            }
            Some(DlsChunk::List) => {
                let (chunk, ty) = list_type(chunk)?;
                match DlsList::from_fourcc(&ty) {
                    Some(DlsList::Lrgn) => {
                        parse_riff_chunks(chunk, |id, chunk| {
                            if id == *LIST {
                                let (chunk, ty) = list_type(chunk)?;
                                if matches!(DlsList::from_fourcc(&ty), Some(DlsList::Rgn | DlsList::Rgn2)) {
                                    inst.regions.push(in_context(chunk, "rgn ", parse_region(chunk))?.1);
                                }
                            }
                            Ok((&[], ()))
                        })?;
                    }
                    Some(DlsList::Lart) => parse_articulation(chunk, 1, &mut inst.articulation)?.1,
                    Some(DlsList::Lar2) => parse_articulation(chunk, 2, &mut inst.articulation)?.1,
                    Some(DlsList::Info) => {
                        parse_info(chunk, |id, s| {
                            if id == b"INAM" {
                                inst.name = s;
                            }
                        })?;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok((&[], ()))
    })?;
    if !has_header {
        return Err(nom_context(chunk, "instrument without insh"));
    }
    Ok((&[], inst))
}

/// Converts mono 8, 24 and 32-bit PCM to 16 bits.
fn decode_pcm(format: &WaveFormat, data: &[u8]) -> Option<Vec<i16>> {
    if !matches!(format.format_tag, WAVE_FORMAT_PCM | WAVE_FORMAT_EXTENSIBLE) {
        return None;
    }
    let width = (format.bits_per_sample as usize).div_ceil(8);
    if !(1..=4).contains(&width) || format.channels != 1 {
        return None;
    }
    Some(
        data.chunks_exact(width)
            .map(|f| match width {
                // 8-bit wave data is unsigned
                1 => (f[0] as i16 - 128) << 8,
                w => i16::from_le_bytes([f[w - 2], f[w - 1]]),
            })
            .collect(),
    )
}

fn parse_wave(chunk: &[u8]) -> ParseResult<'_, DlsWave> {
    let mut wave = DlsWave::default();
    let mut format = None;
    let mut data = None;
    parse_riff_chunks(chunk, |id, chunk| {
        match DlsChunk::from_fourcc(&id) {
            Some(DlsChunk::Fmt) => format = Some(record::<WaveFormat>(chunk, "fmt ")?),
            Some(DlsChunk::Data) => {
                data.get_or_insert(chunk);
            }
            Some(DlsChunk::Wsmp) => wave.wave_sample = Some(parse_wsmp(chunk)?.1),
            Some(DlsChunk::List) => {
                let (chunk, ty) = list_type(chunk)?;
                if DlsList::from_fourcc(&ty) == Some(DlsList::Info) {
                    parse_info(chunk, |id, s| {
                        if id == b"INAM" {
                            wave.name = s;
                        }
                    })?;
                }
            }
            _ => {}
        }
        Ok((&[], ()))
    })?;
    let format = format.ok_or_else(|| nom_context(chunk, "wave without fmt"))?;
    wave.sample_rate = format.sample_rate;
    wave.pcm = decode_pcm(&format, data.unwrap_or_default())
        .ok_or_else(|| nom_context(chunk, "unsupported wave format"))?;
    Ok((&[], wave))
}

struct ParsedDls {
    bank: DlsBank,
    colh: Option<u32>,
    ptbl: Vec<u32>,
    /// `wvpl` offset of each wave list, as `ptbl` stores it.
    offsets: HashMap<u32, usize>,
}

fn parse_dls(data: &[u8]) -> ParseResult<'_, ParsedDls> {
    let (_, chunks) = parse_dls_chunks(data)?;
    let mut bank = DlsBank {
        info: BankInfo::default(),
        ..Default::default()
    };
    if let Some(info) = chunks.info {
        parse_info(info, |id, s| match id {
            b"INAM" => bank.info.name = s,
            id => match InfoField::from_fourcc(id) {
                Some(field) => bank.info.set_field(field, s),
                None => log::debug!("skipping INFO chunk {:?}", String::from_utf8_lossy(id)),
            },
        })?;
    }

    if let Some(lins) = chunks.lins {
        let res = parse_riff_chunks(lins, |id, chunk| {
            if id == *LIST {
                let (chunk, ty) = list_type(chunk)?;
                if DlsList::from_fourcc(&ty) == Some(DlsList::Ins) {
                    bank.instruments.push(parse_instrument(chunk)?.1);
                }
            }
            Ok((&[], ()))
        });
        in_context(lins, "lins", res)?;
    }

    let mut offsets = HashMap::new();
    if let Some(wvpl) = chunks.wvpl {
        let base = wvpl.as_ptr() as usize;
        let res = parse_riff_chunks(wvpl, |id, chunk| {
            if id == *LIST {
                // the cue offset points at the LIST header
                let offset = chunk.as_ptr() as usize - base - 8;
                let (chunk, ty) = list_type(chunk)?;
                if DlsList::from_fourcc(&ty) == Some(DlsList::Wave) {
                    offsets.insert(offset as u32, bank.waves.len());
                    bank.waves.push(in_context(chunk, "wave", parse_wave(chunk))?.1);
                }
            }
            Ok((&[], ()))
        });
        in_context(wvpl, "wvpl", res)?;
    }

    Ok((
        &[],
        ParsedDls {
            bank,
            colh: chunks.colh,
            ptbl: chunks.ptbl,
            offsets,
        },
    ))
}

impl DlsBank {
    /// Parses a DLS level 1 or 2 file.
    pub fn read(data: &[u8]) -> io::Result<Self> {
        let (_, parsed) = context("DLS ", parse_dls)(data)
            .map_err(|e| invalid_data(convert_error(data, e)))?;
        let ParsedDls {
            mut bank,
            colh,
            ptbl,
            offsets,
        } = parsed;

        if let Some(colh) = colh {
            if colh as usize != bank.instruments.len() {
                log::warn!(
                    "colh lists {colh} instruments but the bank holds {}",
                    bank.instruments.len()
                );
            }
        }

        let wave_count = bank.waves.len();
        for inst in &mut bank.instruments {
            for region in &mut inst.regions {
                let index = region.wave_link.wave;
                let wave = match ptbl.get(index).and_then(|o| offsets.get(o)) {
                    Some(wave) => *wave,
                    None if index < wave_count => {
                        log::warn!("cue {index} of `{}` has no matching wave, using it as a wave index", inst.name);
                        index
                    }
                    None => {
                        return Err(invalid_data(format!(
                            "instrument `{}` references missing sample {index}",
                            inst.name
                        )))
                    }
                };
                region.wave_link.wave = wave;
            }
        }
        log::debug!(
            "read {} DLS instruments and {} waves",
            bank.instruments.len(),
            bank.waves.len()
        );
        Ok(bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_widths() {
        let mut format = WaveFormat {
            format_tag: WAVE_FORMAT_PCM,
            channels: 1,
            bits_per_sample: 8,
            ..Default::default()
        };
        assert_eq!(decode_pcm(&format, &[0x80, 0xff, 0x00]), Some(vec![0, 0x7f00, -0x8000]));
        format.bits_per_sample = 24;
        assert_eq!(decode_pcm(&format, &[0x12, 0x34, 0x56]), Some(vec![0x5634]));
        format.bits_per_sample = 32;
        assert_eq!(decode_pcm(&format, &[0, 0, 0xff, 0xff]), Some(vec![-1]));
        format.format_tag = 3;
        assert_eq!(decode_pcm(&format, &[0; 4]), None);
    }

    #[test]
    fn stereo_is_rejected() {
        let format = WaveFormat {
            format_tag: WAVE_FORMAT_PCM,
            channels: 2,
            bits_per_sample: 16,
            ..Default::default()
        };
        let data = hex_literal::hex!("0100 ffff 0200 feff");
        assert_eq!(decode_pcm(&format, &data), None);
    }

    #[test]
    fn instrument_count_mismatch_trusts_the_list() {
        let bank = DlsBank {
            instruments: vec![DlsInstrument {
                name: "Flute".into(),
                program: 73,
                regions: vec![DlsRegion {
                    key_range: (0, 127),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            waves: vec![DlsWave {
                name: "flute".into(),
                sample_rate: 11025,
                pcm: vec![10, -10, 20],
                wave_sample: None,
            }],
            ..Default::default()
        };
        let mut data = bank.write().unwrap();
        let colh = data.windows(4).position(|w| w == b"colh").unwrap();
        data[colh + 8..colh + 12].copy_from_slice(&5u32.to_le_bytes());

        let read = DlsBank::read(&data).unwrap();
        assert_eq!(read.instruments.len(), 1);
        assert_eq!(read.instruments[0].name, "Flute");
        assert_eq!(read.waves[0].pcm, [10, -10, 20]);
    }
}
