//! General MIDI percussion key map (channel 10, keys 35-81).

use crate::midi::{gm::normalize, U7};

const FIRST_KEY: U7 = 35;

const DRUMS: [&str; 47] = [
  "acoustic-bass-drum",
  "bass-drum-1",
  "side-stick",
  "acoustic-snare",
  "hand-clap",
  "electric-snare",
  "low-floor-tom",
  "closed-hi-hat",
  "high-floor-tom",
  "pedal-hi-hat",
  "low-tom",
  "open-hi-hat",
  "low-mid-tom",
  "hi-mid-tom",
  "crash-cymbal-1",
  "high-tom",
  "ride-cymbal-1",
  "chinese-cymbal",
  "ride-bell",
  "tambourine",
  "splash-cymbal",
  "cowbell",
  "crash-cymbal-2",
  "vibraslap",
  "ride-cymbal-2",
  "hi-bongo",
  "low-bongo",
  "mute-hi-conga",
  "open-hi-conga",
  "low-conga",
  "high-timbale",
  "low-timbale",
  "high-agogo",
  "low-agogo",
  "cabasa",
  "maracas",
  "short-whistle",
  "long-whistle",
  "short-guiro",
  "long-guiro",
  "claves",
  "hi-wood-block",
  "low-wood-block",
  "mute-cuica",
  "open-cuica",
  "mute-triangle",
  "open-triangle",
];

const ALIASES: &[(&str, U7)] = &[
  ("kick", 36),
  ("snare", 38),
  ("hihat", 42),
  ("hi-hat", 42),
  ("open-hihat", 46),
  ("clap", 39),
  ("ride", 51),
  ("crash", 49),
  ("tom", 50),
];

/// Aliases preferred when rendering, by key.
const SHORT_NAMES: &[(U7, &str)] = &[(36, "kick"), (38, "snare"), (42, "hihat"), (49, "crash"), (51, "ride")];

pub fn drum_note(name: &str) -> Option<U7> {
  let normalized = normalize(name);
  if normalized.is_empty() {
    return None;
  }
  DRUMS
    .iter()
    .position(|drum| *drum == normalized)
    .map(|index| index as U7 + FIRST_KEY)
    .or_else(|| {
      ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, key)| *key)
    })
    .or_else(|| {
      DRUMS
        .iter()
        .position(|drum| drum.contains(normalized.as_str()))
        .map(|index| index as U7 + FIRST_KEY)
    })
}

pub fn drum_name(key: U7) -> Option<&'static str> {
  key
    .checked_sub(FIRST_KEY)
    .and_then(|index| DRUMS.get(usize::from(index)))
    .cloned()
}

/// Shortest known name for a percussion key: an alias first, then the GM name.
pub fn short_name(key: U7) -> Option<&'static str> {
  SHORT_NAMES
    .iter()
    .find(|(alias_key, _)| *alias_key == key)
    .map(|(_, name)| *name)
    .or_else(|| drum_name(key))
}

#[cfg(test)]
mod test {

  use super::{drum_name, drum_note, short_name};

  #[test]
  pub fn lookup() {
    assert_eq!(drum_note("kick"), Some(36));
    assert_eq!(drum_note("acoustic-snare"), Some(38));
    assert_eq!(drum_note("Closed Hi Hat"), Some(42));
    assert_eq!(drum_note("cowbell"), Some(56));
    assert_eq!(drum_note("triangle"), Some(80));
    assert_eq!(drum_note("gong"), None);
  }

  #[test]
  pub fn names() {
    assert_eq!(drum_name(35), Some("acoustic-bass-drum"));
    assert_eq!(drum_name(81), Some("open-triangle"));
    assert_eq!(drum_name(34), None);
    assert_eq!(drum_name(82), None);
    assert_eq!(short_name(36), Some("kick"));
    assert_eq!(short_name(56), Some("cowbell"));
  }
}
