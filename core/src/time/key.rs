use std::fmt;

use crate::time::TicksTime;

// indexed by the number of sharps plus seven
const MAJOR_TONICS: [&str; 15] = [
  "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_TONICS: [&str; 15] = [
  "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

/// A key signature as stored in MIDI files: sharps (negative for flats) and the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySignature {
  sharps: i8,
  minor: bool,
}

impl KeySignature {
  pub fn new(sharps: i8, minor: bool) -> Option<KeySignature> {
    if sharps < -7 || sharps > 7 {
      None
    } else {
      Some(KeySignature { sharps, minor })
    }
  }

  /// Parses `C-major`, `D-minor`, `Bb`, `F#m` or `Ebmin`.
  pub fn parse(text: &str) -> Option<KeySignature> {
    let text = text.trim();
    let (tonic, minor) = match text.find('-') {
      Some(index) => {
        let minor = match text[index + 1..].to_lowercase().as_str() {
          "major" | "maj" => false,
          "minor" | "min" | "m" => true,
          _ => return None,
        };
        (&text[..index], minor)
      }
      None => {
        let lower = text.to_lowercase();
        if lower.len() > 3 && lower.ends_with("min") {
          (&text[..text.len() - 3], true)
        } else if lower.len() > 3 && lower.ends_with("maj") {
          (&text[..text.len() - 3], false)
        } else if text.len() > 1 && text.ends_with('m') {
          (&text[..text.len() - 1], true)
        } else {
          (text, false)
        }
      }
    };

    let mut chars = tonic.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let tonic = format!("{}{}", letter, chars.as_str());
    let tonics = if minor { &MINOR_TONICS } else { &MAJOR_TONICS };
    let index = tonics.iter().position(|name| *name == tonic)?;
    KeySignature::new(index as i8 - 7, minor)
  }

  pub fn get_sharps(&self) -> i8 {
    self.sharps
  }

  pub fn is_minor(&self) -> bool {
    self.minor
  }

  pub fn tonic(&self) -> &'static str {
    let index = (self.sharps + 7) as usize;
    if self.minor {
      MINOR_TONICS[index]
    } else {
      MAJOR_TONICS[index]
    }
  }
}

impl fmt::Display for KeySignature {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mode = if self.minor { "minor" } else { "major" };
    write!(f, "{} {}", self.tonic(), mode)
  }
}

/// Key signature changes in ascending tick order. Songs start without one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyMap {
  entries: Vec<(TicksTime, KeySignature)>,
}

impl KeyMap {
  pub fn new() -> KeyMap {
    KeyMap::default()
  }

  pub fn entries(&self) -> &[(TicksTime, KeySignature)] {
    &self.entries
  }

  pub fn at(&self, tick: TicksTime) -> Option<KeySignature> {
    self
      .entries
      .iter()
      .take_while(|(t, _)| *t <= tick)
      .last()
      .map(|(_, key)| *key)
  }

  /// Inserts, overwrites or (with `None`) removes the change at `tick`, returning the previous one.
  pub fn set(&mut self, tick: TicksTime, key: Option<KeySignature>) -> Option<KeySignature> {
    match (self.entries.binary_search_by(|(t, _)| t.cmp(&tick)), key) {
      (Ok(index), Some(key)) => Some(std::mem::replace(&mut self.entries[index].1, key)),
      (Ok(index), None) => Some(self.entries.remove(index).1),
      (Err(index), Some(key)) => {
        self.entries.insert(index, (tick, key));
        None
      }
      (Err(_), None) => None,
    }
  }
}

#[cfg(test)]
mod test {

  use super::{KeyMap, KeySignature};
  use crate::time::TicksTime;

  #[test]
  pub fn parse() {
    assert_eq!(KeySignature::parse("C-major"), KeySignature::new(0, false));
    assert_eq!(KeySignature::parse("C"), KeySignature::new(0, false));
    assert_eq!(KeySignature::parse("D-minor"), KeySignature::new(-1, true));
    assert_eq!(KeySignature::parse("Dm"), KeySignature::new(-1, true));
    assert_eq!(KeySignature::parse("f#m"), KeySignature::new(3, true));
    assert_eq!(KeySignature::parse("Bb"), KeySignature::new(-2, false));
    assert_eq!(KeySignature::parse("Ebmin"), KeySignature::new(-6, true));
    assert_eq!(KeySignature::parse("E-maj"), KeySignature::new(4, false));
  }

  #[test]
  pub fn parse_rejects() {
    for text in &["", "H", "D#-major", "C-dorian", "Fb"] {
      assert_eq!(KeySignature::parse(text), None, "{}", text);
    }
    assert_eq!(KeySignature::new(8, false), None);
  }

  #[test]
  pub fn display() {
    assert_eq!(KeySignature::new(3, true).unwrap().to_string(), "F# minor");
    assert_eq!(KeySignature::new(-3, false).unwrap().to_string(), "Eb major");
  }

  #[test]
  pub fn map() {
    let d_minor = KeySignature::parse("Dm").unwrap();
    let f_major = KeySignature::parse("F").unwrap();
    let mut map = KeyMap::new();
    assert_eq!(map.at(TicksTime::zero()), None);
    assert_eq!(map.set(TicksTime::zero(), Some(d_minor)), None);
    assert_eq!(map.set(TicksTime::new(1920), Some(f_major)), None);
    assert_eq!(map.at(TicksTime::new(1919)), Some(d_minor));
    assert_eq!(map.at(TicksTime::new(1920)), Some(f_major));
    assert_eq!(map.set(TicksTime::new(1920), None), Some(f_major));
    assert_eq!(map.set(TicksTime::zero(), Some(f_major)), Some(d_minor));
    assert_eq!(map.entries().len(), 1);
  }
}
