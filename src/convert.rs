use crate::{load_sound_bank, DlsWriteOptions, Sf2WriteOptions, SoundBank};
use std::{
    io,
    path::{Path, PathBuf},
};

#[derive(clap::Args)]
pub struct Args {
    /// SF2, SF3 or DLS file to read
    input: PathBuf,
    /// File to write, format picked from the extension (.sf2, .sf3 or .dls)
    #[arg(short, long)]
    output: PathBuf,
    /// Write xdta for banks past the SF2 index and name limits
    #[arg(long, default_value_t = false)]
    extended_limits: bool,
    /// Do not write the bank's custom default modulators
    #[arg(long, default_value_t = false)]
    no_default_modulators: bool,
    /// Decompress SF3 samples to 16-bit PCM
    #[arg(long, default_value_t = false)]
    decompress: bool,
    /// Move shared generators and modulators into global zones before writing
    #[arg(short, long, default_value_t = false)]
    globalize: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum OutputFormat {
    Sf2,
    Sf3,
    Dls,
}

impl OutputFormat {
    fn from_path(path: &Path) -> io::Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("sf2") => Ok(Self::Sf2),
            Some("sf3") => Ok(Self::Sf3),
            Some("dls") => Ok(Self::Dls),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot pick an output format for `{}`", path.display()),
            )),
        }
    }
}

pub fn globalize_all(bank: &mut SoundBank) {
    for inst in &mut bank.instruments {
        inst.globalize();
    }
    for preset in &mut bank.presets {
        preset.globalize();
    }
}

pub fn convert(args: Args) -> io::Result<()> {
    let Args {
        input,
        output,
        extended_limits,
        no_default_modulators,
        decompress,
        globalize,
    } = args;
    let format = OutputFormat::from_path(&output)?;

    let data = std::fs::read(&input)?;
    let mut bank = load_sound_bank(&data)?;
    log::info!(
        "Read `{}`: {} presets, {} instruments, {} samples",
        bank.info.name,
        bank.presets.len(),
        bank.instruments.len(),
        bank.samples.len()
    );
    if globalize {
        globalize_all(&mut bank);
    }

    let mut progress = |name: &str, index: usize, total: usize| {
        log::debug!("[{}/{total}] {name}", index + 1);
    };
    let out = match format {
        OutputFormat::Sf2 | OutputFormat::Sf3 => bank.write_sf2(Sf2WriteOptions {
            compress: format == OutputFormat::Sf3,
            decompress,
            write_default_modulators: !no_default_modulators,
            write_extended_limits: extended_limits,
            codec: None,
            progress: Some(&mut progress),
        })?,
        OutputFormat::Dls => bank.write_dls(DlsWriteOptions {
            write_default_modulators: !no_default_modulators,
            codec: None,
            progress: Some(&mut progress),
        })?,
    };
    std::fs::write(&output, &out)?;
    log::info!("Wrote {} bytes to `{}`", out.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a/b.SF2")).unwrap(), OutputFormat::Sf2);
        assert_eq!(OutputFormat::from_path(Path::new("x.dls")).unwrap(), OutputFormat::Dls);
        assert!(OutputFormat::from_path(Path::new("x.wav")).is_err());
        assert!(OutputFormat::from_path(Path::new("noext")).is_err());
    }
}
