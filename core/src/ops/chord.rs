use crate::{
  midi::U7,
  ops::{
    pitch::{checked_key, note_offset, octave_base, parse_pitch},
    resolver::{ResolveError, ResolveResult},
  },
};

const QUALITIES: &[(&str, &[i32])] = &[
  ("", &[0, 4, 7]),
  ("maj", &[0, 4, 7]),
  ("min", &[0, 3, 7]),
  ("m", &[0, 3, 7]),
  ("7", &[0, 4, 7, 10]),
  ("maj7", &[0, 4, 7, 11]),
  ("min7", &[0, 3, 7, 10]),
  ("m7", &[0, 3, 7, 10]),
  ("dim", &[0, 3, 6]),
  ("aug", &[0, 4, 8]),
  ("sus2", &[0, 2, 7]),
  ("sus4", &[0, 5, 7]),
  ("add9", &[0, 4, 7, 14]),
  ("min7b5", &[0, 3, 6, 10]),
  ("m7b5", &[0, 3, 6, 10]),
  ("dim7", &[0, 3, 6, 9]),
  ("9", &[0, 4, 7, 10, 14]),
  ("min9", &[0, 3, 7, 10, 14]),
  ("m9", &[0, 3, 7, 10, 14]),
  ("6", &[0, 4, 7, 9]),
  ("min6", &[0, 3, 7, 9]),
  ("m6", &[0, 3, 7, 9]),
];

pub fn intervals(quality: &str) -> Option<&'static [i32]> {
  QUALITIES
    .iter()
    .find(|(name, _)| *name == quality)
    .map(|(_, intervals)| *intervals)
}

/// Root pitch class and remaining text of a symbol such as `F#m7`.
fn root(symbol: &str) -> Option<(i32, &str)> {
  let mut chars = symbol.chars();
  let offset = chars.next().and_then(note_offset)?;
  let rest = chars.as_str();
  let (shift, rest) = if let Some(rest) = rest.strip_prefix('#') {
    (1, rest)
  } else if let Some(rest) = rest.strip_prefix('b') {
    (-1, rest)
  } else {
    (0, rest)
  };
  Some((offset + shift, rest))
}

/// Resolves a chord to its keys in ascending order.
///
/// Accepts `SYMBOL[/BASS][@OCTAVE]` (the octave is the root's, `default_octave` otherwise) or an
/// explicit comma separated list of pitches.
pub fn parse_chord(symbol: &str, default_octave: i32) -> ResolveResult<Vec<U7>> {
  let unknown = || ResolveError::UnknownChord {
    symbol: symbol.to_string(),
  };

  if symbol.contains(',') {
    let mut keys = symbol
      .split(',')
      .filter(|token| !token.is_empty())
      .map(parse_pitch)
      .collect::<ResolveResult<Vec<U7>>>()?;
    keys.sort();
    keys.dedup();
    return Ok(keys);
  }

  let (name, octave) = match symbol.rfind('@') {
    Some(index) => {
      let octave = symbol[index + 1..]
        .parse::<i32>()
        .map_err(|_| ResolveError::InvalidValue {
          key: "octave".to_string(),
          value: symbol[index + 1..].to_string(),
          reason: "not an integer".to_string(),
        })?;
      (&symbol[..index], octave)
    }
    None => (symbol, default_octave),
  };

  let (chord, bass) = match name.find('/') {
    Some(index) => (&name[..index], Some(&name[index + 1..])),
    None => (name, None),
  };

  let (root_class, quality) = root(chord).ok_or_else(unknown)?;
  let intervals = intervals(quality).ok_or_else(unknown)?;
  let root_key = octave_base(octave, symbol)? + root_class;

  let mut keys = Vec::with_capacity(intervals.len() + 1);
  if let Some(bass) = bass {
    let (bass_class, rest) = root(bass).ok_or_else(unknown)?;
    if !rest.is_empty() {
      return Err(unknown());
    }
    let below = (root_class - bass_class).rem_euclid(12);
    let below = if below == 0 { 12 } else { below };
    keys.push(checked_key(root_key - below, symbol)?);
  }
  for interval in intervals {
    keys.push(checked_key(root_key + interval, symbol)?);
  }
  Ok(keys)
}
