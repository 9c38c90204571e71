use crate::time::{bars::strip_prefix_ignore_case, Ppqn, TicksTime, TimeError, TimeResult};

/// Named note values as (name, numerator, denominator) of a quarter note.
const NOTE_VALUES: &[(&str, u64, u64)] = &[
  ("whole", 4, 1),
  ("1n", 4, 1),
  ("half", 2, 1),
  ("2n", 2, 1),
  ("quarter", 1, 1),
  ("4n", 1, 1),
  ("eighth", 1, 2),
  ("8th", 1, 2),
  ("8n", 1, 2),
  ("sixteenth", 1, 4),
  ("16th", 1, 4),
  ("16n", 1, 4),
  ("thirty-second", 1, 8),
  ("32nd", 1, 8),
  ("32n", 1, 8),
  ("triplet", 1, 3),
];

fn note_value(name: &str, ppqn: Ppqn) -> Option<u64> {
  NOTE_VALUES
    .iter()
    .find(|(value_name, _, _)| value_name.eq_ignore_ascii_case(name))
    .map(|(_, num, den)| u64::from(ppqn) * num / den)
}

/// Resolves a duration name, a `dotted-`/`triplet-` variant, `ticks:N` or a bare tick count.
///
/// Arithmetic is integer and truncating, but never yields less than one tick.
pub fn resolve_duration(name: &str, ppqn: Ppqn) -> TimeResult<TicksTime> {
  let name = name.trim();
  let unknown = || TimeError::UnknownDuration {
    name: name.to_string(),
  };

  let raw = strip_prefix_ignore_case(name, "ticks:").unwrap_or(name);
  if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
    return match raw.parse::<u64>() {
      Ok(ticks) if ticks > 0 => Ok(TicksTime::new(ticks)),
      _ => Err(unknown()),
    };
  }

  let ticks = if let Some(base) = strip_prefix_ignore_case(name, "dotted-") {
    note_value(base, ppqn).map(|ticks| ticks * 3 / 2)
  } else if let Some(base) = strip_prefix_ignore_case(name, "triplet-") {
    note_value(base, ppqn).map(|ticks| ticks * 2 / 3)
  } else {
    note_value(name, ppqn)
  };

  ticks.map(|ticks| TicksTime::new(ticks.max(1))).ok_or_else(unknown)
}
