use super::{
    Articulation, ConnectionRecord, CountedHeader, DlsBank, DlsInstrument, DlsRegion, DlsWave,
    InstrumentHeaderRecord, RegionHeader, WaveFormat, WaveLinkRecord, WaveLoopRecord, WaveSample,
    WaveSampleRecord, WAVE_FORMAT_PCM,
};
use crate::{
    invalid_data,
    riff::{chunk, info_string, list, riff, write_record},
};
use std::io;

fn write_articulation(art: &Articulation) -> io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(8 + art.connections.len() * 12);
    write_record(
        &mut data,
        &CountedHeader {
            size: 8,
            count: art.connections.len() as u32,
        },
    )?;
    for c in &art.connections {
        write_record(&mut data, &ConnectionRecord::from(c))?;
    }
    Ok(match art.level {
        1 => list(b"lart", [chunk(b"art1", &data)]),
        _ => list(b"lar2", [chunk(b"art2", &data)]),
    })
}

fn write_wsmp(ws: &WaveSample) -> io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(36);
    write_record(
        &mut data,
        &WaveSampleRecord {
            size: 20,
            unity_note: ws.unity_note,
            fine_tune: ws.fine_tune,
            gain: ws.gain,
            options: ws.options.bits(),
            loop_count: ws.wave_loop.is_some() as u32,
        },
    )?;
    if let Some(l) = ws.wave_loop {
        write_record(
            &mut data,
            &WaveLoopRecord {
                size: 16,
                loop_type: l.loop_type,
                start: l.start,
                length: l.length,
            },
        )?;
    }
    Ok(chunk(b"wsmp", &data))
}

fn write_name(name: &str) -> Vec<u8> {
    list(b"INFO", [chunk(b"INAM", &info_string(name))])
}

fn write_region(region: &DlsRegion) -> io::Result<Vec<u8>> {
    let mut parts = Vec::with_capacity(4);
    let mut header = Vec::with_capacity(12);
    write_record(
        &mut header,
        &RegionHeader {
            key_low: region.key_range.0,
            key_high: region.key_range.1,
            vel_low: region.vel_range.0,
            vel_high: region.vel_range.1,
            options: region.options.bits(),
            key_group: region.key_group,
        },
    )?;
    parts.push(chunk(b"rgnh", &header));
    if let Some(ws) = &region.wave_sample {
        parts.push(write_wsmp(ws)?);
    }
    let mut link = Vec::with_capacity(12);
    write_record(
        &mut link,
        &WaveLinkRecord {
            options: region.wave_link.options.bits(),
            phase_group: region.wave_link.phase_group,
            channel: region.wave_link.channel,
            table_index: region.wave_link.wave as u32,
        },
    )?;
    parts.push(chunk(b"wlnk", &link));
    if let Some(art) = &region.articulation {
        parts.push(write_articulation(art)?);
    }
    Ok(list(b"rgn ", parts))
}

fn write_instrument(inst: &DlsInstrument) -> io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(12);
    write_record(
        &mut header,
        &InstrumentHeaderRecord {
            regions: inst.regions.len() as u32,
            bank: inst.bank,
            program: inst.program,
        },
    )?;
    let regions = inst
        .regions
        .iter()
        .map(write_region)
        .collect::<io::Result<Vec<_>>>()?;

    let mut parts = vec![chunk(b"insh", &header), list(b"lrgn", regions)];
    if let Some(art) = &inst.articulation {
        parts.push(write_articulation(art)?);
    }
    parts.push(write_name(&inst.name));
    Ok(list(b"ins ", parts))
}

fn write_wave(wave: &DlsWave) -> io::Result<Vec<u8>> {
    let byte_rate = wave.sample_rate.checked_mul(2).ok_or_else(|| {
        invalid_data(format!("sample rate {} of `{}` is too high", wave.sample_rate, wave.name))
    })?;
    let mut format = Vec::with_capacity(16);
    write_record(
        &mut format,
        &WaveFormat {
            format_tag: WAVE_FORMAT_PCM,
            channels: 1,
            sample_rate: wave.sample_rate,
            byte_rate,
            block_align: 2,
            bits_per_sample: 16,
        },
    )?;
    let mut parts = vec![chunk(b"fmt ", &format)];
    if let Some(ws) = &wave.wave_sample {
        parts.push(write_wsmp(ws)?);
    }
    let data: Vec<u8> = wave.pcm.iter().flat_map(|s| s.to_le_bytes()).collect();
    parts.push(chunk(b"data", &data));
    parts.push(write_name(&wave.name));
    Ok(list(b"wave", parts))
}

impl DlsBank {
    /// Serializes the bank as a `DLS ` form.
    pub fn write(&self) -> io::Result<Vec<u8>> {
        let colh = chunk(b"colh", &(self.instruments.len() as u32).to_le_bytes());
        let instruments = self
            .instruments
            .iter()
            .map(write_instrument)
            .collect::<io::Result<Vec<_>>>()?;
        let lins = list(b"lins", instruments);

        // cue offsets count from the end of the wvpl list type
        let mut cues = Vec::with_capacity(8 + self.waves.len() * 4);
        write_record(
            &mut cues,
            &CountedHeader {
                size: 8,
                count: self.waves.len() as u32,
            },
        )?;
        let mut waves = Vec::with_capacity(self.waves.len());
        let mut offset = 0u32;
        for wave in &self.waves {
            cues.extend_from_slice(&offset.to_le_bytes());
            let data = write_wave(wave)?;
            offset += data.len() as u32;
            waves.push(data);
        }
        let ptbl = chunk(b"ptbl", &cues);
        let wvpl = list(b"wvpl", waves);

        let mut info = vec![chunk(b"INAM", &info_string(&self.info.name))];
        for (field, value) in self.info.fields() {
            info.push(chunk(field.fourcc(), &info_string(value)));
        }
        let info = list(b"INFO", info);

        log::debug!(
            "writing {} DLS instruments and {} waves",
            self.instruments.len(),
            self.waves.len()
        );
        Ok(riff(b"DLS ", [colh, lins, ptbl, wvpl, info]))
    }
}
