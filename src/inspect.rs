use crate::{load_sound_bank, NameFilters, SampleData, SoundBank};
use std::path::PathBuf;

#[derive(clap::Args)]
pub struct Args {
    /// SF2, SF3 or DLS file to inspect
    input: PathBuf,
    /// Glob patterns to include preset, instrument and sample names
    #[arg(short, long)]
    include: Vec<String>,
    /// Glob patterns to exclude preset, instrument and sample names
    #[arg(short = 'x', long)]
    exclude: Vec<String>,
}

#[inline]
fn display_loop(start: u32, end: u32) -> String {
    match end > start {
        true => format!("{start: <8} {end: <8}"),
        false => format!("{: <8} {: <8}", "-", "-"),
    }
}

fn sample_hash(data: &SampleData) -> blake3::Hash {
    match data {
        SampleData::Raw(pcm) => {
            let mut hasher = blake3::Hasher::new();
            for s in pcm {
                hasher.update(&s.to_le_bytes());
            }
            hasher.finalize()
        }
        SampleData::Compressed(bytes) => blake3::hash(bytes),
    }
}

fn print_info(bank: &SoundBank) {
    let info = &bank.info;
    log::info!("Name:     {}", info.name);
    log::info!("Version:  {}.{:02}", info.version.0, info.version.1);
    log::info!("Engine:   {}", info.sound_engine);
    if let Some(rom) = &info.rom_name {
        let (major, minor) = info.rom_version.unwrap_or_default();
        log::info!("ROM:      {rom} {major}.{minor:02}");
    }
    for (field, value) in info.fields() {
        let id = String::from_utf8_lossy(field.fourcc());
        log::info!("{id}:     {value}");
    }
}

pub fn inspect(args: Args) -> std::io::Result<()> {
    let Args {
        input,
        include,
        exclude,
    } = args;
    let filters = NameFilters {
        includes: include,
        excludes: exclude,
    };
    let verbose = crate::is_log_level(log::LevelFilter::Debug);
    let data = std::fs::read(&input)?;
    let bank = load_sound_bank(&data)?;
    print_info(&bank);

    log::info!("Presets: {}", bank.presets.len());
    if !bank.presets.is_empty() {
        log::info!("  BANK:PROG ZONES NAME");
        for preset in &bank.presets {
            if !filters.matches(&preset.name) {
                continue;
            }
            let drum = if preset.is_drum { "D" } else { " " };
            log::info!(
                "  {drum}{:03}:{:03}   {: <5} {}",
                preset.bank(),
                preset.program,
                preset.zones.len(),
                preset.name
            );
            if verbose {
                for pz in &preset.zones {
                    log::debug!(
                        "      -> {} ({} generators, {} modulators)",
                        bank.instruments[pz.instrument].name,
                        pz.zone.generators.len(),
                        pz.zone.modulators.len()
                    );
                }
            }
        }
    }

    log::info!("Instruments: {}", bank.instruments.len());
    if !bank.instruments.is_empty() {
        log::info!("  USES ZONES GLOBAL NAME");
        for inst in &bank.instruments {
            if !filters.matches(&inst.name) {
                continue;
            }
            log::info!(
                "  {: <4} {: <5} {: <6} {}",
                inst.use_count(),
                inst.zones.len(),
                inst.global_zone.generators.len() + inst.global_zone.modulators.len(),
                inst.name
            );
        }
    }

    log::info!("Samples: {}", bank.samples.len());
    if !bank.samples.is_empty() {
        log::info!("  RATE   KEY TUNE LOOPSTART LOOPEND  TYPE       USES BYTES    HASH");
        for sample in &bank.samples {
            if !filters.matches(&sample.name) {
                continue;
            }
            let ty = format!("{:?}", sample.sample_type);
            let ty = match sample.is_compressed() {
                true => format!("{ty}*"),
                false => ty,
            };
            log::info!(
                "  {: <6} {: <3} {: <4} {} {ty: <10} {: <4} {: <8} 0x{} {}",
                sample.sample_rate,
                sample.original_key,
                sample.pitch_correction,
                display_loop(sample.loop_start, sample.loop_end),
                sample.use_count(),
                sample.data.stored_len(),
                sample_hash(&sample.data),
                sample.name
            );
        }
    }
    Ok(())
}
