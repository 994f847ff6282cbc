use crate::{bank::SoundBank, invalid_data};
use std::io;

/// Parses an SF2/SF3 or DLS file, telling them apart by the RIFF form type.
pub fn load_sound_bank(data: &[u8]) -> io::Result<SoundBank> {
    let form = data
        .get(8..12)
        .ok_or_else(|| invalid_data(format!("file too short for a RIFF header ({} bytes)", data.len())))?;
    if form.eq_ignore_ascii_case(b"DLS ") {
        log::debug!("loading DLS bank");
        SoundBank::read_dls(data)
    } else {
        log::debug!("loading SF2 bank");
        SoundBank::read_sf2(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input() {
        let err = load_sound_bank(b"RIFF").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unknown_form_reports_the_sf2_parser() {
        let err = load_sound_bank(b"RIFF\x04\0\0\0WAVE").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
