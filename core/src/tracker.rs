//! Compact step grid view of notes.
//!
//! ```text
//! [Resolution: 16th]
//! [Track: Keys (electric-piano-1) | Range: 1.1-2.1]
//! Step 01: [C4_v100_4], [E4_v90_4], [G4_v90_4]
//! Step 03: [D5_v80_2]
//! ```
//!
//! Each token is `[PITCH_vVELOCITY_STEPS]` and appears once, at the step where the note starts.
//! Single track output parses back into the same events. The multi track view is read-only.

use std::collections::BTreeMap;

use failure::Fail;

use crate::{
  midi::{drums, U7, MAX_U7},
  ops::pitch::{parse_pitch, pitch_name},
  song::notes::Note,
  time::{Ppqn, SignatureMap, TickRange, TicksTime},
};

#[derive(Debug, Fail, PartialEq)]
pub enum TrackerError {
  #[fail(display = "Malformed tracker token '{}', expected [PITCH_vVEL_STEPS]", token)]
  MalformedToken { token: String },

  #[fail(display = "Malformed tracker line '{}', expected 'Step NN: tokens'", line)]
  MalformedLine { line: String },

  #[fail(display = "Unknown resolution '{}', use quarter, 8th, 16th or 32nd", name)]
  UnknownResolution { name: String },
}

pub type TrackerResult<T> = Result<T, TrackerError>;

pub const DEFAULT_RESOLUTION: &str = "16th";

/// One note on the grid. `step` is zero based, `duration` is counted in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerEvent {
  pub step: u64,
  pub key: U7,
  pub velocity: U7,
  pub duration: u64,
}

/// Notes of one track as handed to the formatters.
#[derive(Debug, Clone)]
pub struct Lane {
  pub name: String,
  pub percussion: bool,
  pub notes: Vec<Note>,
}

fn canonical_resolution(name: &str) -> Option<&'static str> {
  match name.trim().to_lowercase().as_str() {
    "quarter" | "4n" => Some("quarter"),
    "8th" | "8n" | "eighth" => Some("8th"),
    "16th" | "16n" | "sixteenth" => Some("16th"),
    "32nd" | "32n" | "thirty-second" => Some("32nd"),
    _ => None,
  }
}

pub fn resolution_label(name: &str) -> TrackerResult<&'static str> {
  canonical_resolution(name).ok_or_else(|| TrackerError::UnknownResolution {
    name: name.to_string(),
  })
}

/// Ticks per grid step, never less than one.
pub fn resolution_ticks(name: &str, ppqn: Ppqn) -> TrackerResult<TicksTime> {
  let divisor = match resolution_label(name)? {
    "quarter" => 1,
    "8th" => 2,
    "16th" => 4,
    _ => 8,
  };
  Ok(TicksTime::new((u64::from(ppqn) / divisor).max(1)))
}

/// The coarsest grid that every note start and end lands on, within one tick.
pub fn auto_resolution<'a, I>(notes: I, ppqn: Ppqn) -> &'static str
where
  I: IntoIterator<Item = &'a Note>,
{
  let notes: Vec<&Note> = notes.into_iter().collect();
  if notes.is_empty() {
    return DEFAULT_RESOLUTION;
  }
  let aligned = |tick: TicksTime, step: u64| {
    let rem = u64::from(tick) % step;
    rem.min(step - rem) <= 1
  };
  for name in &["quarter", "8th", "16th", "32nd"] {
    let step = match resolution_ticks(name, ppqn) {
      Ok(step) => u64::from(step),
      Err(_) => continue,
    };
    if notes
      .iter()
      .all(|note| aligned(note.start, step) && aligned(note.end(), step))
    {
      return name;
    }
  }
  DEFAULT_RESOLUTION
}

fn sounding_in(notes: &[Note], range: TickRange) -> impl Iterator<Item = &Note> {
  notes
    .iter()
    .filter(move |note| note.start < range.end && note.end() > range.start)
}

fn steps_of(length: TicksTime, step: TicksTime) -> u64 {
  let step = u64::from(step);
  (u64::from(length).saturating_add(step / 2) / step).max(1)
}

/// Tokens grouped by step, for the notes starting inside the range.
fn grid<F>(notes: &[Note], range: TickRange, step: TicksTime, name: F) -> BTreeMap<u64, Vec<String>>
where
  F: Fn(U7) -> String,
{
  let mut starting: Vec<&Note> = notes.iter().filter(|note| range.contains(note.start)).collect();
  starting.sort_by_key(|note| (note.start, note.key));

  let mut steps: BTreeMap<u64, Vec<String>> = BTreeMap::new();
  for note in starting {
    steps
      .entry((note.start - range.start) / step)
      .or_default()
      .push(format!(
        "{}_v{}_{}",
        name(note.key),
        note.velocity,
        steps_of(note.length, step)
      ));
  }
  steps
}

/// Renders one track. `label` is the track name, optionally followed by its instrument.
/// An empty range renders the headers only.
pub fn format_tracker(
  notes: &[Note],
  label: &str,
  range: TickRange,
  signatures: &SignatureMap,
  ppqn: Ppqn,
  resolution: Option<&str>,
) -> TrackerResult<String> {
  let resolution = match resolution {
    Some(name) => resolution_label(name)?,
    None => auto_resolution(sounding_in(notes, range), ppqn),
  };
  let step = resolution_ticks(resolution, ppqn)?;

  let mut lines = vec![
    format!("[Resolution: {}]", resolution),
    format!("[Track: {} | Range: {}]", label, range.display(signatures, ppqn)),
  ];
  for (index, tokens) in grid(notes, range, step, pitch_name) {
    let tokens: Vec<String> = tokens.into_iter().map(|token| format!("[{}]", token)).collect();
    lines.push(format!("Step {:02}: {}", index + 1, tokens.join(", ")));
  }
  Ok(lines.join("\n"))
}

/// Renders several tracks side by side, at most `max_lanes` of them.
pub fn format_tracker_multi(
  lanes: &[Lane],
  range: TickRange,
  signatures: &SignatureMap,
  ppqn: Ppqn,
  resolution: Option<&str>,
  max_lanes: usize,
) -> TrackerResult<String> {
  let shown = &lanes[..lanes.len().min(max_lanes.max(1))];
  let omitted = lanes.len() - shown.len();
  let names: Vec<&str> = shown.iter().map(|lane| lane.name.as_str()).collect();

  let resolution = match resolution {
    Some(name) => resolution_label(name)?,
    None => auto_resolution(
      shown.iter().flat_map(|lane| sounding_in(&lane.notes, range)),
      ppqn,
    ),
  };
  let step = resolution_ticks(resolution, ppqn)?;

  let mut steps: BTreeMap<u64, Vec<String>> = BTreeMap::new();
  for lane in shown {
    let lane_grid = if lane.percussion {
      grid(&lane.notes, range, step, |key| {
        drums::short_name(key)
          .map(str::to_string)
          .unwrap_or_else(|| pitch_name(key))
      })
    } else {
      grid(&lane.notes, range, step, pitch_name)
    };
    for (index, tokens) in lane_grid {
      steps
        .entry(index)
        .or_default()
        .push(format!("{}[{}]", lane.name, tokens.join(", ")));
    }
  }

  if steps.is_empty() {
    return Ok(format!("No notes on [{}] in range.", names.join(", ")));
  }

  let mut lines = vec![
    format!("[Resolution: {}]", resolution),
    format!(
      "[Tracks: {} | Range: {}]",
      names.join(", "),
      range.display(signatures, ppqn)
    ),
  ];
  for (index, groups) in steps {
    lines.push(format!("Step {:02}: {}", index + 1, groups.join(" ")));
  }
  if omitted > 0 {
    lines.push(format!("(+{} more tracks omitted)", omitted));
  }
  Ok(lines.join("\n"))
}

fn parse_token(token: &str) -> TrackerResult<(U7, U7, u64)> {
  let malformed = || TrackerError::MalformedToken {
    token: token.to_string(),
  };

  let inner = token
    .strip_prefix('[')
    .and_then(|rest| rest.strip_suffix(']'))
    .ok_or_else(malformed)?;
  let mut fields = inner.rsplitn(3, '_');
  let (duration, velocity, pitch) = match (fields.next(), fields.next(), fields.next()) {
    (Some(duration), Some(velocity), Some(pitch)) => (duration, velocity, pitch),
    _ => return Err(malformed()),
  };

  let key = parse_pitch(pitch).map_err(|_| malformed())?;
  let velocity = velocity
    .strip_prefix('v')
    .and_then(|value| value.parse::<U7>().ok())
    .filter(|value| *value <= MAX_U7)
    .ok_or_else(malformed)?;
  let duration = duration
    .parse::<u64>()
    .ok()
    .filter(|steps| *steps > 0)
    .ok_or_else(malformed)?;
  Ok((key, velocity, duration))
}

/// Parses the single track format. Blank lines and `[` header lines are skipped.
pub fn parse_tracker(text: &str) -> TrackerResult<Vec<TrackerEvent>> {
  let mut events = Vec::new();
  for line in text.lines().map(str::trim) {
    if line.is_empty() || line.starts_with('[') {
      continue;
    }
    let malformed = || TrackerError::MalformedLine {
      line: line.to_string(),
    };

    let mut parts = line.splitn(2, ':');
    let (label, tokens) = match (parts.next(), parts.next()) {
      (Some(label), Some(tokens)) => (label.trim(), tokens),
      _ => return Err(malformed()),
    };
    let number = label
      .get(..4)
      .filter(|word| word.eq_ignore_ascii_case("step"))
      .and_then(|_| label[4..].trim().parse::<u64>().ok())
      .filter(|number| *number > 0)
      .ok_or_else(malformed)?;

    for token in tokens.split(',').map(str::trim).filter(|token| !token.is_empty()) {
      let (key, velocity, duration) = parse_token(token)?;
      events.push(TrackerEvent {
        step: number - 1,
        key,
        velocity,
        duration,
      });
    }
  }
  events.sort_by_key(|event| (event.step, event.key));
  Ok(events)
}

#[cfg(test)]
mod test {

  use super::{
    auto_resolution, format_tracker, format_tracker_multi, parse_tracker, resolution_ticks, Lane, TrackerError,
    TrackerEvent,
  };
  use crate::{
    song::notes::{Note, NoteId},
    time::{Signature, SignatureMap, TickRange, TicksTime},
  };

  fn note(id: u64, key: u8, velocity: u8, start: u64, length: u64) -> Note {
    Note {
      id: NoteId::new(id),
      key,
      velocity,
      start: TicksTime::new(start),
      length: TicksTime::new(length),
    }
  }

  fn two_bars() -> TickRange {
    TickRange::new(TicksTime::zero(), TicksTime::new(3840))
  }

  #[test]
  pub fn resolutions() {
    assert_eq!(resolution_ticks("16th", 480).unwrap(), TicksTime::new(120));
    assert_eq!(resolution_ticks("Quarter", 480).unwrap(), TicksTime::new(480));
    assert_eq!(resolution_ticks("32n", 480).unwrap(), TicksTime::new(60));
    assert_eq!(
      resolution_ticks("5th", 480),
      Err(TrackerError::UnknownResolution {
        name: "5th".to_string()
      })
    );
  }

  #[test]
  pub fn auto_resolution_picks_coarsest_grid() {
    let quarters = vec![note(1, 60, 90, 0, 480), note(2, 62, 90, 961, 479)];
    assert_eq!(auto_resolution(&quarters, 480), "quarter");
    let eighths = vec![note(1, 60, 90, 240, 240)];
    assert_eq!(auto_resolution(&eighths, 480), "8th");
    let odd = vec![note(1, 60, 90, 7, 13)];
    assert_eq!(auto_resolution(&odd, 480), "16th");
    assert_eq!(auto_resolution(&Vec::<Note>::new(), 480), "16th");
  }

  #[test]
  pub fn format() {
    let signatures = SignatureMap::new(Signature::default());
    let notes = vec![
      note(1, 64, 90, 0, 480),
      note(2, 60, 100, 0, 480),
      note(3, 74, 80, 240, 240),
    ];
    let text = format_tracker(&notes, "Keys", two_bars(), &signatures, 480, Some("16th")).unwrap();
    assert_eq!(
      text,
      "[Resolution: 16th]\n\
       [Track: Keys | Range: 1.1-3.1]\n\
       Step 01: [C4_v100_4], [E4_v90_4]\n\
       Step 03: [D5_v80_2]"
    );
  }

  #[test]
  pub fn format_empty_range_keeps_headers() {
    let signatures = SignatureMap::new(Signature::default());
    let text = format_tracker(&[], "Keys", two_bars(), &signatures, 480, None).unwrap();
    assert_eq!(text, "[Resolution: 16th]\n[Track: Keys | Range: 1.1-3.1]");
    assert!(parse_tracker(&text).unwrap().is_empty());
  }

  #[test]
  pub fn round_trip() {
    let signatures = SignatureMap::new(Signature::default());
    let notes = vec![
      note(1, 40, 90, 0, 240),
      note(2, 47, 70, 360, 120),
      note(3, 43, 127, 1920, 1440),
      note(4, 0, 1, 3720, 120),
    ];
    let text = format_tracker(&notes, "Bass", two_bars(), &signatures, 480, Some("16th")).unwrap();
    let events = parse_tracker(&text).unwrap();
    assert_eq!(
      events,
      vec![
        TrackerEvent {
          step: 0,
          key: 40,
          velocity: 90,
          duration: 2
        },
        TrackerEvent {
          step: 3,
          key: 47,
          velocity: 70,
          duration: 1
        },
        TrackerEvent {
          step: 16,
          key: 43,
          velocity: 127,
          duration: 12
        },
        TrackerEvent {
          step: 31,
          key: 0,
          velocity: 1,
          duration: 1
        },
      ]
    );

    let step = 120;
    let rebuilt: Vec<Note> = events
      .iter()
      .enumerate()
      .map(|(id, event)| {
        note(
          id as u64,
          event.key,
          event.velocity,
          event.step * step,
          event.duration * step,
        )
      })
      .collect();
    let again = format_tracker(&rebuilt, "Bass", two_bars(), &signatures, 480, Some("16th")).unwrap();
    assert_eq!(again, text);
  }

  #[test]
  pub fn parse_accepts_flats_and_spacing() {
    let events = parse_tracker("  step 2 : [Bb3_v64_1],[C#4_v10_3]\n\n").unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].key, 58);
    assert_eq!(events[0].step, 1);
    assert_eq!(events[1].key, 61);
  }

  #[test]
  pub fn parse_errors() {
    assert_eq!(
      parse_tracker("Step 01: [C4_v100]"),
      Err(TrackerError::MalformedToken {
        token: "[C4_v100]".to_string()
      })
    );
    assert!(parse_tracker("Step 01: [C4_v200_1]").is_err());
    assert!(parse_tracker("Step 01: [C4_v100_0]").is_err());
    assert!(parse_tracker("Step 01: [H4_v100_1]").is_err());
    assert!(parse_tracker("Step 00: [C4_v100_1]").is_err());
    assert!(parse_tracker("Beat 01: [C4_v100_1]").is_err());
    assert!(parse_tracker("C4_v100_1").is_err());
  }

  #[test]
  pub fn multi() {
    let signatures = SignatureMap::new(Signature::default());
    let lanes = vec![
      Lane {
        name: "Drums".to_string(),
        percussion: true,
        notes: vec![note(1, 36, 100, 0, 120), note(2, 38, 90, 480, 120)],
      },
      Lane {
        name: "Bass".to_string(),
        percussion: false,
        notes: vec![note(3, 40, 90, 0, 240)],
      },
      Lane {
        name: "Pad".to_string(),
        percussion: false,
        notes: vec![],
      },
    ];
    let text = format_tracker_multi(&lanes, two_bars(), &signatures, 480, Some("16th"), 2).unwrap();
    assert_eq!(
      text,
      "[Resolution: 16th]\n\
       [Tracks: Drums, Bass | Range: 1.1-3.1]\n\
       Step 01: Drums[kick_v100_1] Bass[E2_v90_2]\n\
       Step 05: Drums[snare_v90_1]\n\
       (+1 more tracks omitted)"
    );

    let empty = format_tracker_multi(&lanes[2..], two_bars(), &signatures, 480, None, 4).unwrap();
    assert_eq!(empty, "No notes on [Pad] in range.");
  }
}
