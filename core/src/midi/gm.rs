//! General MIDI level 1 instrument names (programs 0-127).

use crate::midi::U7;

const INSTRUMENTS: [&str; 128] = [
  // piano
  "acoustic-grand-piano",
  "bright-acoustic-piano",
  "electric-grand-piano",
  "honky-tonk-piano",
  "electric-piano-1",
  "electric-piano-2",
  "harpsichord",
  "clavinet",
  // chromatic percussion
  "celesta",
  "glockenspiel",
  "music-box",
  "vibraphone",
  "marimba",
  "xylophone",
  "tubular-bells",
  "dulcimer",
  // organ
  "drawbar-organ",
  "percussive-organ",
  "rock-organ",
  "church-organ",
  "reed-organ",
  "accordion",
  "harmonica",
  "tango-accordion",
  // guitar
  "acoustic-guitar-nylon",
  "acoustic-guitar-steel",
  "electric-guitar-jazz",
  "electric-guitar-clean",
  "electric-guitar-muted",
  "overdriven-guitar",
  "distortion-guitar",
  "guitar-harmonics",
  // bass
  "acoustic-bass",
  "electric-bass-finger",
  "electric-bass-pick",
  "fretless-bass",
  "slap-bass-1",
  "slap-bass-2",
  "synth-bass-1",
  "synth-bass-2",
  // strings
  "violin",
  "viola",
  "cello",
  "contrabass",
  "tremolo-strings",
  "pizzicato-strings",
  "orchestral-harp",
  "timpani",
  // ensemble
  "string-ensemble-1",
  "string-ensemble-2",
  "synth-strings-1",
  "synth-strings-2",
  "choir-aahs",
  "voice-oohs",
  "synth-choir",
  "orchestra-hit",
  // brass
  "trumpet",
  "trombone",
  "tuba",
  "muted-trumpet",
  "french-horn",
  "brass-section",
  "synth-brass-1",
  "synth-brass-2",
  // reed
  "soprano-sax",
  "alto-sax",
  "tenor-sax",
  "baritone-sax",
  "oboe",
  "english-horn",
  "bassoon",
  "clarinet",
  // pipe
  "piccolo",
  "flute",
  "recorder",
  "pan-flute",
  "blown-bottle",
  "shakuhachi",
  "whistle",
  "ocarina",
  // synth lead
  "lead-1-square",
  "lead-2-sawtooth",
  "lead-3-calliope",
  "lead-4-chiff",
  "lead-5-charang",
  "lead-6-voice",
  "lead-7-fifths",
  "lead-8-bass-lead",
  // synth pad
  "pad-1-new-age",
  "pad-2-warm",
  "pad-3-polysynth",
  "pad-4-choir",
  "pad-5-bowed",
  "pad-6-metallic",
  "pad-7-halo",
  "pad-8-sweep",
  // synth effects
  "fx-1-rain",
  "fx-2-soundtrack",
  "fx-3-crystal",
  "fx-4-atmosphere",
  "fx-5-brightness",
  "fx-6-goblins",
  "fx-7-echoes",
  "fx-8-sci-fi",
  // ethnic
  "sitar",
  "banjo",
  "shamisen",
  "koto",
  "kalimba",
  "bagpipe",
  "fiddle",
  "shanai",
  // percussive
  "tinkle-bell",
  "agogo",
  "steel-drums",
  "woodblock",
  "taiko-drum",
  "melodic-tom",
  "synth-drum",
  "reverse-cymbal",
  // sound effects
  "guitar-fret-noise",
  "breath-noise",
  "seashore",
  "bird-tweet",
  "telephone-ring",
  "helicopter",
  "applause",
  "gunshot",
];

const FAMILIES: [&str; 16] = [
  "Piano",
  "Chromatic Percussion",
  "Organ",
  "Guitar",
  "Bass",
  "Strings",
  "Ensemble",
  "Brass",
  "Reed",
  "Pipe",
  "Synth Lead",
  "Synth Pad",
  "Synth Effects",
  "Ethnic",
  "Percussive",
  "Sound Effects",
];

const ALIASES: &[(&str, &str)] = &[
  ("piano", "acoustic-grand-piano"),
  ("strings", "string-ensemble-1"),
  ("bass", "electric-bass-finger"),
  ("organ", "drawbar-organ"),
  ("guitar", "acoustic-guitar-nylon"),
  ("choir", "choir-aahs"),
  ("sax", "alto-sax"),
];

/// Lower case with spaces and underscores turned into hyphens.
pub fn normalize(name: &str) -> String {
  name
    .trim()
    .to_lowercase()
    .replace(|c: char| c == ' ' || c == '_', "-")
}

/// Looks up a program by exact name, then by alias, then by the first name containing it.
pub fn program_for(name: &str) -> Option<U7> {
  let normalized = normalize(name);
  if normalized.is_empty() {
    return None;
  }
  let exact = |wanted: &str| INSTRUMENTS.iter().position(|instrument| *instrument == wanted);
  exact(normalized.as_str())
    .or_else(|| {
      ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .and_then(|(_, target)| exact(*target))
    })
    .or_else(|| {
      INSTRUMENTS
        .iter()
        .position(|instrument| instrument.contains(normalized.as_str()))
    })
    .map(|program| program as U7)
}

pub fn name_for(program: U7) -> Option<&'static str> {
  INSTRUMENTS.get(usize::from(program)).cloned()
}

pub fn family_for(program: U7) -> Option<&'static str> {
  FAMILIES.get(usize::from(program) / 8).cloned()
}

/// Every program with its name, in program order.
pub fn instruments() -> impl Iterator<Item = (U7, &'static str)> {
  INSTRUMENTS
    .iter()
    .enumerate()
    .map(|(program, name)| (program as U7, *name))
}

#[cfg(test)]
mod test {

  use super::{family_for, name_for, program_for};

  #[test]
  pub fn exact_and_normalized() {
    assert_eq!(program_for("acoustic-grand-piano"), Some(0));
    assert_eq!(program_for("Electric Bass Finger"), Some(33));
    assert_eq!(program_for("string_ensemble_1"), Some(48));
  }

  #[test]
  pub fn alias_and_substring() {
    assert_eq!(program_for("strings"), Some(48));
    assert_eq!(program_for("cello"), Some(42));
    assert_eq!(program_for("trumpet"), Some(56));
    assert_eq!(program_for("grand"), Some(0));
    assert_eq!(program_for("theremin"), None);
    assert_eq!(program_for("  "), None);
  }

  #[test]
  pub fn names() {
    assert_eq!(name_for(33), Some("electric-bass-finger"));
    assert_eq!(name_for(128), None);
    assert_eq!(family_for(33), Some("Bass"));
  }
}
