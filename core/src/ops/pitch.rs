use crate::{
  midi::U7,
  ops::resolver::{ResolveError, ResolveResult},
  time::bars::strip_prefix_ignore_case,
};

const SHARP_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Semitone offset of a natural note name within an octave.
pub fn note_offset(letter: char) -> Option<i32> {
  match letter.to_ascii_uppercase() {
    'C' => Some(0),
    'D' => Some(2),
    'E' => Some(4),
    'F' => Some(5),
    'G' => Some(7),
    'A' => Some(9),
    'B' => Some(11),
    _ => None,
  }
}

/// Splits a leading accidental (`##`, `bb`, `#`, `b`) off `text`, returning its offset and the rest.
pub fn accidental(text: &str) -> (i32, &str) {
  if let Some(rest) = text.strip_prefix("##") {
    (2, rest)
  } else if let Some(rest) = text.strip_prefix("bb") {
    (-2, rest)
  } else if let Some(rest) = text.strip_prefix('#') {
    (1, rest)
  } else if let Some(rest) = text.strip_prefix('b') {
    (-1, rest)
  } else {
    (0, text)
  }
}

pub fn checked_key(value: i32, token: &str) -> ResolveResult<U7> {
  if value < 0 || value > 127 {
    Err(ResolveError::InvalidValue {
      key: "pitch".to_string(),
      value: token.to_string(),
      reason: format!("MIDI note {} is outside 0-127", value),
    })
  } else {
    Ok(value as U7)
  }
}

/// Key of the C starting `octave`, as a plain integer. Octaves far outside the MIDI range are
/// rejected here so later interval arithmetic cannot overflow.
pub fn octave_base(octave: i32, token: &str) -> ResolveResult<i32> {
  octave
    .checked_add(1)
    .and_then(|octave| octave.checked_mul(12))
    .filter(|base| base.abs() <= 256)
    .ok_or_else(|| ResolveError::InvalidValue {
      key: "octave".to_string(),
      value: token.to_string(),
      reason: format!("octave {} is outside the MIDI range", octave),
    })
}

/// Parses `C4`, `D#5`, `Bb3`, `F##4` (C4 is 60) or `midi:N`.
pub fn parse_pitch(token: &str) -> ResolveResult<U7> {
  let invalid = || ResolveError::InvalidPitch {
    token: token.to_string(),
  };

  if let Some(number) = strip_prefix_ignore_case(token, "midi:") {
    let value = number.parse::<i32>().map_err(|_| invalid())?;
    return checked_key(value, token);
  }

  let mut chars = token.chars();
  let offset = chars.next().and_then(note_offset).ok_or_else(invalid)?;
  let (shift, octave) = accidental(chars.as_str());
  let octave = octave.parse::<i32>().map_err(|_| invalid())?;
  checked_key(octave_base(octave, token)? + offset + shift, token)
}

/// Name of a key using sharps, as in `F#3`.
pub fn pitch_name(key: U7) -> String {
  format!(
    "{}{}",
    SHARP_NAMES[usize::from(key % 12)],
    i32::from(key / 12) - 1
  )
}

#[cfg(test)]
mod test {

  use super::{parse_pitch, pitch_name};
  use crate::ops::resolver::ResolveError;

  #[test]
  pub fn parse() {
    assert_eq!(parse_pitch("C4").unwrap(), 60);
    assert_eq!(parse_pitch("E2").unwrap(), 40);
    assert_eq!(parse_pitch("D#5").unwrap(), 75);
    assert_eq!(parse_pitch("Bb3").unwrap(), 58);
    assert_eq!(parse_pitch("F##4").unwrap(), 67);
    assert_eq!(parse_pitch("c-1").unwrap(), 0);
    assert_eq!(parse_pitch("midi:127").unwrap(), 127);
  }

  #[test]
  pub fn invalid() {
    for token in &["H2", "C", "C#x", "midi:abc", ""] {
      match parse_pitch(token) {
        Err(ResolveError::InvalidPitch { .. }) => {}
        other => panic!("{} parsed as {:?}", token, other),
      }
    }
    for token in &["G#9", "midi:128", "Cb-1", "C999999999", "C-999999999", "D2147483647"] {
      match parse_pitch(token) {
        Err(ResolveError::InvalidValue { .. }) => {}
        other => panic!("{} parsed as {:?}", token, other),
      }
    }
  }

  #[test]
  pub fn names() {
    assert_eq!(pitch_name(60), "C4");
    assert_eq!(pitch_name(40), "E2");
    assert_eq!(pitch_name(54), "F#3");
    assert_eq!(pitch_name(0), "C-1");
    for key in 0..=127u8 {
      assert_eq!(parse_pitch(&pitch_name(key)).unwrap(), key);
    }
  }
}
