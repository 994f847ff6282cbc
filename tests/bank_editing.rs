use bankutil::{
    convert::globalize_all, GeneratorType, Instrument, Preset, Range, Sample, Sf2WriteOptions,
    SoundBank, UsedNotes,
};
use pretty_assertions::assert_eq;

fn names<T>(items: &[T], name: impl Fn(&T) -> &str) -> Vec<String> {
    items.iter().map(|i| name(i).to_string()).collect()
}

fn reread(bank: &SoundBank) -> SoundBank {
    let data = bank.write_sf2(Sf2WriteOptions::default()).unwrap();
    SoundBank::read_sf2(&data).unwrap()
}

/// "Keys" splits two samples at middle C, "Bass" plays a third one.
fn band() -> SoundBank {
    let mut bank = SoundBank::new();
    let low = bank.add_sample(Sample::new("Keys Low", 44100, vec![1; 32]));
    let high = bank.add_sample(Sample::new("Keys High", 44100, vec![2; 32]));
    let bass = bank.add_sample(Sample::new("Bass", 44100, vec![3; 32]));

    let keys = bank.add_instrument(Instrument::new("Keys"));
    for (sample, range) in [(low, Range::new(0, 59)), (high, Range::new(60, 127))] {
        let z = bank.create_instrument_zone(keys, sample);
        bank.instruments[keys].zones[z].zone.key_range = range;
    }
    let bass_inst = bank.add_instrument(Instrument::new("Bass"));
    bank.create_instrument_zone(bass_inst, bass);

    let p = bank.add_preset(Preset::new("Keys", 0, 0));
    bank.create_preset_zone(p, keys);
    let p = bank.add_preset(Preset::new("Bass", 0, 33));
    bank.create_preset_zone(p, bass_inst);
    bank
}

#[test]
fn trim_keeps_what_a_song_plays() {
    let mut bank = reread(&band());
    let mut used = UsedNotes::new();
    used.insert(0, 0, false, 40, 100);
    used.insert(0, 0, false, 45, 64);
    bank.trim(&used);

    assert_eq!(names(&bank.presets, |p| &p.name), ["Keys"]);
    assert_eq!(names(&bank.instruments, |i| &i.name), ["Keys"]);
    assert_eq!(names(&bank.samples, |s| &s.name), ["Keys Low"]);
    assert_eq!(bank.instruments[0].zones.len(), 1);
    assert_eq!(bank.instruments[0].zones[0].sample, 0);
    assert_eq!(bank.samples[0].linked_instruments(), &[0]);
    assert_eq!(reread(&bank), bank);
}

#[test]
fn trim_follows_preset_fallback() {
    let mut bank = band();
    let mut used = UsedNotes::new();
    // no bank 5, the channel falls back to bank 0
    used.insert(5, 33, false, 30, 90);
    bank.trim(&used);
    assert_eq!(names(&bank.presets, |p| &p.name), ["Bass"]);
    assert_eq!(names(&bank.samples, |s| &s.name), ["Bass"]);
}

#[test]
#[should_panic]
fn deleting_a_sample_in_use_panics() {
    let mut bank = reread(&band());
    bank.delete_sample(2);
}

#[test]
fn merge_skips_colliding_presets() {
    let mut bank = band();
    let mut other = SoundBank::new();
    let s = other.add_sample(Sample::new("Organ", 22050, vec![4; 32]));
    let pad = other.add_sample(Sample::new("Pad", 22050, vec![5; 32]));
    for (name, sample, program) in [("Organ", s, 0), ("Pad", pad, 90)] {
        let i = other.add_instrument(Instrument::new(name));
        other.create_instrument_zone(i, sample);
        let p = other.add_preset(Preset::new(name, 0, program));
        other.create_preset_zone(p, i);
    }

    bank.merge(other);
    assert_eq!(names(&bank.presets, |p| &p.name), ["Keys", "Bass", "Pad"]);
    assert_eq!(names(&bank.instruments, |i| &i.name), ["Keys", "Bass", "Pad"]);
    assert_eq!(
        names(&bank.samples, |s| &s.name),
        ["Keys Low", "Keys High", "Bass", "Pad"]
    );
    assert_eq!(bank.presets[2].zones[0].instrument, 2);
    assert_eq!(bank.instruments[2].zones[0].sample, 3);
    assert_eq!(bank.instruments[2].use_count(), 1);
    assert_eq!(reread(&bank), bank);
}

#[test]
fn cloned_presets_share_instruments_by_name() {
    let source = band();
    let mut bank = SoundBank::new();
    let first = bank.clone_preset_from(&source, 1);
    let second = bank.clone_preset_from(&source, 1);

    assert_eq!((first, second), (0, 1));
    assert_eq!(names(&bank.instruments, |i| &i.name), ["Bass"]);
    assert_eq!(names(&bank.samples, |s| &s.name), ["Bass"]);
    assert_eq!(bank.instruments[0].use_count(), 2);
    assert_eq!(bank.instruments[0].zones[0].use_count, 2);
    assert_eq!(bank.presets[1].program, 33);
}

#[test]
fn globalize_hoists_the_common_value() {
    let mut bank = SoundBank::new();
    let s = bank.add_sample(Sample::new("Drop", 44100, vec![0; 16]));
    let inst = bank.add_instrument(Instrument::new("Drops"));
    for pan in [0, 0, 0, 500] {
        let z = bank.create_instrument_zone(inst, s);
        let zone = &mut bank.instruments[inst].zones[z].zone;
        zone.set_generator(GeneratorType::Pan, pan, true);
        zone.set_generator(GeneratorType::ReverbEffectsSend, 200, true);
    }
    let p = bank.add_preset(Preset::new("Drops", 0, 0));
    bank.create_preset_zone(p, inst);

    globalize_all(&mut bank);
    let inst = &bank.instruments[0];
    assert_eq!(inst.global_zone.get_generator(GeneratorType::Pan), Some(0));
    assert_eq!(inst.global_zone.get_generator(GeneratorType::ReverbEffectsSend), Some(200));
    let pans: Vec<_> = inst
        .zones
        .iter()
        .map(|z| z.zone.get_generator(GeneratorType::Pan))
        .collect();
    assert_eq!(pans, [None, None, None, Some(500)]);
    assert!(inst
        .zones
        .iter()
        .all(|z| !z.zone.has_generator(GeneratorType::ReverbEffectsSend)));
    assert_eq!(reread(&bank), bank);
}
