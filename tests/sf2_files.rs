use bankutil::{
    bank::InfoField, load_sound_bank, GeneratorType, Instrument, Modulator, ModulatorSource,
    Preset, Range, Sample, SampleType, Sf2WriteOptions, SoundBank,
};
use pretty_assertions::assert_eq;

fn wave(len: usize, step: i32) -> Vec<i16> {
    (0..len as i32).map(|i| ((i * step) % 4000 - 2000) as i16).collect()
}

fn demo_bank() -> SoundBank {
    let mut bank = SoundBank::new();
    bank.info.name = "Demo Bank".into();
    bank.info.set_field(InfoField::Copyright, "Public Domain");
    bank.info.set_field(InfoField::Software, "bankutil");

    let mut piano = Sample::new("Piano C4", 44100, wave(400, 37));
    piano.loop_start = 20;
    piano.loop_end = 380;
    piano.pitch_correction = -3;
    let piano = bank.add_sample(piano);
    let left = bank.add_sample(Sample::new("Pad L", 32000, wave(300, 11)));
    let right = bank.add_sample(Sample::new("Pad R", 32000, wave(300, 13)));
    bank.link_stereo(left, right, SampleType::Left);

    let mut inst = Instrument::new("Piano");
    inst.global_zone.set_generator(GeneratorType::ReleaseVolEnv, 1200, true);
    let inst = bank.add_instrument(inst);
    for (range, pan) in [(Range::new(0, 63), -200), (Range::new(64, 127), 200)] {
        let z = bank.create_instrument_zone(inst, piano);
        let zone = &mut bank.instruments[inst].zones[z].zone;
        zone.key_range = range;
        zone.set_generator(GeneratorType::Pan, pan, true);
        zone.set_generator(GeneratorType::SampleModes, 1, true);
        zone.modulators.push(Modulator::new(
            ModulatorSource::cc(74),
            ModulatorSource::NONE,
            GeneratorType::InitialFilterFc,
            -2400,
        ));
    }

    let pad = bank.add_instrument(Instrument::new("Pad"));
    for (sample, pan) in [(left, -500), (right, 500)] {
        let z = bank.create_instrument_zone(pad, sample);
        bank.instruments[pad].zones[z]
            .zone
            .set_generator(GeneratorType::Pan, pan, true);
    }

    let grand = bank.add_preset(Preset::new("Grand Piano", 0, 0));
    bank.create_preset_zone(grand, inst);
    let warm = bank.add_preset(Preset::new("Warm Pad", 1, 88));
    let z = bank.create_preset_zone(warm, pad);
    bank.presets[warm].zones[z].zone.vel_range = Range::new(1, 100);
    bank.presets[warm]
        .global_zone
        .set_generator(GeneratorType::ReverbEffectsSend, 300, true);
    let kit = bank.add_preset(Preset::new("Standard Kit", 128, 0));
    bank.create_preset_zone(kit, inst);
    bank
}

#[test]
fn write_then_read_keeps_the_bank() {
    let bank = demo_bank();
    let data = bank.write_sf2(Sf2WriteOptions::default()).unwrap();
    assert_eq!(&data[..4], b"RIFF");
    assert_eq!(&data[8..12], b"sfbk");

    let read = SoundBank::read_sf2(&data).unwrap();
    assert_eq!(read, bank);
    assert_eq!(read.instruments[0].use_count(), 2);
    assert_eq!(read.samples[1].linked_sample(), Some(2));
    assert_eq!(read.samples[2].sample_type, SampleType::Right);
}

#[test]
fn loader_picks_sf2() {
    let data = demo_bank().write_sf2(Sf2WriteOptions::default()).unwrap();
    let bank = load_sound_bank(&data).unwrap();
    assert_eq!(bank.presets.len(), 3);
    assert_eq!(bank.info.field(InfoField::Copyright), Some("Public Domain"));
}

#[test]
fn custom_default_modulators_need_the_option() {
    let mut bank = demo_bank();
    bank.default_modulators.truncate(3);
    bank.custom_default_modulators = true;

    let with = bank.write_sf2(Sf2WriteOptions::default()).unwrap();
    let read = SoundBank::read_sf2(&with).unwrap();
    assert!(read.custom_default_modulators);
    assert_eq!(read.default_modulators, bank.default_modulators);

    let without = bank
        .write_sf2(Sf2WriteOptions {
            write_default_modulators: false,
            ..Default::default()
        })
        .unwrap();
    let read = SoundBank::read_sf2(&without).unwrap();
    assert!(!read.custom_default_modulators);
    assert_eq!(read.default_modulators, SoundBank::new().default_modulators);
}

#[test]
fn long_names_need_extended_limits() {
    let mut bank = demo_bank();
    bank.presets[0].name = "Concert Grand Piano With Lid Open".into();

    let data = bank.write_sf2(Sf2WriteOptions::default()).unwrap();
    let read = SoundBank::read_sf2(&data).unwrap();
    assert_eq!(read.presets[0].name, "Concert Grand Piano With Lid Open");

    let data = bank
        .write_sf2(Sf2WriteOptions {
            write_extended_limits: false,
            ..Default::default()
        })
        .unwrap();
    let read = SoundBank::read_sf2(&data).unwrap();
    assert_eq!(read.presets[0].name, "Concert Grand Piano ");
}

/// One instrument whose zones hold more generators than a 16-bit bag index
/// can address.
fn huge_bank() -> SoundBank {
    let mut bank = SoundBank::new();
    let sample = bank.add_sample(Sample::new("Tick", 22050, wave(64, 5)));
    let inst = bank.add_instrument(Instrument::new("Dense"));
    let types: Vec<_> = GeneratorType::ALL
        .into_iter()
        .filter(|ty| !ty.is_range() && !ty.is_index())
        .filter_map(|ty| ty.limits().map(|l| (ty, l.max)))
        .collect();
    for key in 0..1400 {
        let z = bank.create_instrument_zone(inst, sample);
        let zone = &mut bank.instruments[inst].zones[z].zone;
        zone.key_range = Range::new((key % 128) as i16, (key % 128) as i16);
        for (ty, max) in &types {
            zone.set_generator(*ty, *max, true);
        }
    }
    let preset = bank.add_preset(Preset::new("Dense", 0, 0));
    bank.create_preset_zone(preset, inst);
    bank
}

#[test]
fn extended_limits_cover_large_banks() {
    let bank = huge_bank();
    let generators: usize = bank.instruments[0]
        .zones
        .iter()
        .map(|z| z.zone.generators.len() + 2)
        .sum();
    assert!(generators > u16::MAX as usize);

    let data = bank.write_sf2(Sf2WriteOptions::default()).unwrap();
    assert!(data.windows(4).any(|w| w == b"xdta"));
    let read = SoundBank::read_sf2(&data).unwrap();
    assert_eq!(read.instruments[0].zones.len(), 1400);
    assert_eq!(read.instruments[0].zones[1399], bank.instruments[0].zones[1399]);
    assert_eq!(read, bank);

    let data = bank
        .write_sf2(Sf2WriteOptions {
            write_extended_limits: false,
            ..Default::default()
        })
        .unwrap();
    assert!(!data.windows(4).any(|w| w == b"xdta"));
}

#[test]
fn wrapped_indices_without_xdta_are_rejected() {
    let data = huge_bank()
        .write_sf2(Sf2WriteOptions {
            write_extended_limits: false,
            ..Default::default()
        })
        .unwrap();
    let err = SoundBank::read_sf2(&data).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn small_banks_never_write_xdta() {
    let data = demo_bank().write_sf2(Sf2WriteOptions::default()).unwrap();
    assert!(!data.windows(4).any(|w| w == b"xdta"));
}

#[test]
fn later_zones_without_a_sample_are_ignored() {
    let mut bank = SoundBank::new();
    let s = bank.add_sample(Sample::new("Bell", 22050, wave(64, 9)));
    let inst = bank.add_instrument(Instrument::new("Bells"));
    for range in [Range::new(0, 59), Range::new(60, 127)] {
        let z = bank.create_instrument_zone(inst, s);
        bank.instruments[inst].zones[z].zone.key_range = range;
    }
    let p = bank.add_preset(Preset::new("Bells", 0, 14));
    bank.create_preset_zone(p, inst);
    let mut data = bank.write_sf2(Sf2WriteOptions::default()).unwrap();

    // turn the second zone's sample id into a pan generator
    let igen = data.windows(4).position(|w| w == b"igen").unwrap() + 8;
    let sample_ids: Vec<_> = (igen..)
        .step_by(4)
        .take_while(|at| data[*at..*at + 4] != [0u8; 4])
        .filter(|at| data[*at..*at + 2] == 53u16.to_le_bytes())
        .collect();
    assert_eq!(sample_ids.len(), 2);
    let at = sample_ids[1];
    data[at..at + 2].copy_from_slice(&17u16.to_le_bytes());
    data[at + 2..at + 4].copy_from_slice(&300i16.to_le_bytes());

    let read = SoundBank::read_sf2(&data).unwrap();
    let inst = &read.instruments[0];
    assert_eq!(inst.zones.len(), 1);
    assert_eq!(inst.zones[0].zone.key_range, Range::new(0, 59));
    assert_eq!(inst.global_zone.get_generator(GeneratorType::Pan), None);
    assert!(!inst.global_zone.key_range.is_set());
    assert_eq!(read.samples[0].use_count(), 1);
}

#[test]
fn truncated_file_is_rejected() {
    let data = demo_bank().write_sf2(Sf2WriteOptions::default()).unwrap();
    let err = SoundBank::read_sf2(&data[..data.len() / 3]).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
