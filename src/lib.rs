pub mod bank;
pub mod codec;
pub mod convert;
pub mod dls;
pub mod generator;
pub mod inspect;
mod loader;
pub mod modulator;
pub mod riff;
pub mod sf2;
pub mod zone;

pub use bank::{
    BankInfo, Instrument, InstrumentZone, Preset, PresetZone, Sample, SampleData, SampleType,
    SoundBank, UsedNotes,
};
pub use codec::{DlsWriteOptions, SampleCodec, Sf2WriteOptions};
pub use generator::{Generator, GeneratorType};
pub use loader::load_sound_bank;
pub use modulator::{Modulator, ModulatorCurve, ModulatorSource, ModulatorTransform};
pub use zone::{Range, Zone, ZoneLike};

/// Include/exclude glob patterns applied to element names.
#[derive(Clone, Debug, Default)]
pub struct NameFilters {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl NameFilters {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
    pub fn matches(&self, s: &str) -> bool {
        if !self.includes.is_empty() && !self.includes.iter().any(|f| glob_match::glob_match(f, s))
        {
            return false;
        }
        !self.excludes.iter().any(|f| glob_match::glob_match(f, s))
    }
}

pub(crate) type ParseResult<'a, T = ()> =
    nom::IResult<&'a [u8], T, nom::error::VerboseError<&'a [u8]>>;

/// Fails with a context label so [`convert_error`] can name the chunk or field.
#[inline]
fn nom_context<'a>(
    input: &'a [u8],
    ctx: &'static str,
) -> nom::Err<nom::error::VerboseError<&'a [u8]>> {
    nom::Err::Error(nom::error::VerboseError {
        errors: vec![
            (input, nom::error::VerboseErrorKind::Nom(nom::error::ErrorKind::Fail)),
            (input, nom::error::VerboseErrorKind::Context(ctx)),
        ],
    })
}

fn convert_error<I: std::ops::Deref<Target = [u8]>>(
    input: I,
    e: nom::Err<nom::error::VerboseError<&[u8]>>,
) -> String {
    use std::fmt::Write;

    let e = match e {
        nom::Err::Incomplete(nom::Needed::Unknown) => return "Incomplete".into(),
        nom::Err::Incomplete(nom::Needed::Size(n)) => return format!("Need {n} more bytes"),
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
    };
    let base = input.as_ptr() as usize;
    let mut result = String::new();
    for (i, (substring, kind)) in e.errors.iter().enumerate() {
        let ptr = substring.as_ptr() as usize;
        let prefix = if i == 0 { "Parse error" } else { "," };
        // slices that do not point into the input were synthesized by a fallback
        let _ = if ptr >= base && ptr <= base + input.len() {
            write!(&mut result, "{prefix} at position 0x{:x}", ptr - base)
        } else {
            write!(&mut result, "{prefix} at unknown position")
        };
        let _ = match kind {
            nom::error::VerboseErrorKind::Char(c) => write!(&mut result, " (expected '{c}')"),
            nom::error::VerboseErrorKind::Context(context) => {
                write!(&mut result, " in {context}")
            }
            nom::error::VerboseErrorKind::Nom(err) => write!(&mut result, " ({err:?})"),
        };
    }
    result
}

#[inline]
fn invalid_data(args: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, args.to_string())
}

#[inline]
fn is_log_level(lvl: log::LevelFilter) -> bool {
    lvl <= log::STATIC_MAX_LEVEL && lvl <= log::max_level()
}
