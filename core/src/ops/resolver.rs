//! Turns parsed operations into fully typed commands against the current song.
//!
//! Resolution only reads the song. Every reference (track names, positions, ranges, pitches,
//! instruments) is checked here, so a command that resolves can be executed without surprises.

use failure::Fail;

use crate::{
  config::Config,
  midi::{drums, gm, U4, U7, MAX_U7},
  ops::{
    chord::parse_chord,
    parser::{ParseError, ParsedOp, Verb},
    pitch::parse_pitch,
    velocity::parse_velocity,
    ErrorKind, OpResult,
  },
  song::{
    notes::Note,
    track::{Instrument, Track, PERCUSSION_CHANNEL},
    Song,
  },
  time::{
    resolve_duration, resolve_position, resolve_range, KeySignature, Signature, Tempo, TickRange, TicksTime,
  },
  tracker,
};

#[derive(Debug, Fail, PartialEq)]
pub enum ResolveError {
  #[fail(display = "Unknown track '{}'{}", name, hint)]
  UnknownTrack { name: String, hint: String },

  #[fail(display = "A track named '{}' already exists", name)]
  DuplicateTrack { name: String },

  #[fail(display = "Unknown instrument '{}' (see 'instruments')", name)]
  UnknownInstrument { name: String },

  #[fail(display = "Unknown chord '{}'", symbol)]
  UnknownChord { symbol: String },

  #[fail(display = "Unknown marker '{}'", label)]
  UnknownMarker { label: String },

  #[fail(display = "Cannot parse pitch '{}'", token)]
  InvalidPitch { token: String },

  #[fail(display = "Invalid {} '{}': {}", key, value, reason)]
  InvalidValue {
    key: String,
    value: String,
    reason: String,
  },

  #[fail(display = "Unknown action '{}' for '{}'", action, verb)]
  UnknownAction { verb: String, action: String },

  #[fail(display = "No notes on track '{}' match the selection", track)]
  NoNotes { track: String },
}

pub type ResolveResult<T> = Result<T, ResolveError>;

impl ResolveError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ResolveError::UnknownTrack { .. }
      | ResolveError::UnknownInstrument { .. }
      | ResolveError::UnknownChord { .. }
      | ResolveError::UnknownMarker { .. }
      | ResolveError::NoNotes { .. } => ErrorKind::UnresolvedReference,
      ResolveError::DuplicateTrack { .. }
      | ResolveError::InvalidPitch { .. }
      | ResolveError::InvalidValue { .. } => ErrorKind::InvalidValue,
      ResolveError::UnknownAction { .. } => ErrorKind::MalformedOperation,
    }
  }
}

fn invalid<V: ToString>(key: &str, value: V, reason: &str) -> ResolveError {
  ResolveError::InvalidValue {
    key: key.to_string(),
    value: value.to_string(),
    reason: reason.to_string(),
  }
}

/// A resolved operation, ready to be turned into mutation primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  AddTrack {
    name: String,
    channel: U4,
    instrument: Instrument,
  },
  RemoveTrack {
    track: String,
  },
  AddNotes {
    track: String,
    label: String,
    keys: Vec<U7>,
    start: TicksTime,
    length: TicksTime,
    velocity: U7,
  },
  RemoveNotes {
    track: String,
    notes: Vec<Note>,
  },
  SetVelocity {
    track: String,
    notes: Vec<Note>,
    velocity: U7,
  },
  VelocityRamp {
    track: String,
    range: TickRange,
    from: U7,
    to: U7,
  },
  CopyRange {
    source: String,
    range: TickRange,
    dest: String,
    dest_start: TicksTime,
    transpose: i32,
  },
  MoveNotes {
    track: String,
    notes: Vec<Note>,
    to: TicksTime,
  },
  TransposeNotes {
    track: String,
    notes: Vec<Note>,
    semitones: i32,
  },
  QuantizeNotes {
    track: String,
    notes: Vec<Note>,
    grid: TicksTime,
  },
  RepeatNotes {
    track: String,
    notes: Vec<Note>,
    to: Option<TicksTime>,
    count: u32,
  },
  SetTempo {
    tick: TicksTime,
    tempo: Tempo,
  },
  SetSignature {
    tick: TicksTime,
    signature: Signature,
  },
  SetKey {
    tick: TicksTime,
    key: KeySignature,
  },
  AddMarker {
    tick: TicksTime,
    label: String,
  },
  RemoveMarker {
    label: String,
  },
  SetTitle {
    title: String,
  },
  SetInstrument {
    track: String,
    channel: U4,
    instrument: Instrument,
  },
  SetTrackState {
    track: String,
    mute: bool,
    solo: bool,
  },
  ImportNotes {
    track: String,
    notes: Vec<(U7, U7, TicksTime, TicksTime)>,
  },
}

pub struct Resolver<'a> {
  song: &'a Song,
  config: &'a Config,
}

impl<'a> Resolver<'a> {
  pub fn new(song: &'a Song, config: &'a Config) -> Resolver<'a> {
    Resolver { song, config }
  }

  /// Resolves an operation. `block` holds the body lines of a tracker import.
  pub fn resolve(&self, op: &ParsedOp, block: Option<&str>) -> OpResult<Command> {
    match op.verb {
      Verb::Track => self.resolve_track(op),
      Verb::Note => {
        let track = self.track(op.require("track")?)?;
        let pitch = op.require("pitch")?;
        let key = self.pitch_for(track, pitch)?;
        Ok(Command::AddNotes {
          track: track.get_name().to_string(),
          label: pitch.to_string(),
          keys: vec![key],
          start: self.position(op.require("at")?)?,
          length: self.duration(op.get("dur"))?,
          velocity: self.velocity(op.get("vel"))?,
        })
      }
      Verb::Chord => {
        let track = self.track(op.require("track")?)?;
        let symbol = op.require("chord")?;
        let octave = match op.get("octave") {
          Some(octave) => octave
            .parse::<i32>()
            .map_err(|_| invalid("octave", octave, "not an integer"))?,
          None => self.config.session.chord_octave,
        };
        Ok(Command::AddNotes {
          track: track.get_name().to_string(),
          label: symbol.to_string(),
          keys: parse_chord(symbol, octave)?,
          start: self.position(op.require("at")?)?,
          length: self.duration(op.get("dur"))?,
          velocity: self.velocity(op.get("vel"))?,
        })
      }
      Verb::Remove => {
        let track = self.track(op.require("track")?)?;
        Ok(Command::RemoveNotes {
          track: track.get_name().to_string(),
          notes: self.select_notes(track, op)?,
        })
      }
      Verb::Velocity => {
        let track = self.track(op.require("track")?)?;
        Ok(Command::SetVelocity {
          track: track.get_name().to_string(),
          velocity: parse_velocity(op.require("vel")?)?,
          notes: self.select_notes(track, op)?,
        })
      }
      Verb::Crescendo | Verb::Decrescendo => {
        let track = self.track(op.require("track")?)?;
        let (soft, loud) = (49, 96);
        let (default_from, default_to) = if op.verb == Verb::Crescendo {
          (soft, loud)
        } else {
          (loud, soft)
        };
        Ok(Command::VelocityRamp {
          track: track.get_name().to_string(),
          range: self.range(op.require("range")?)?,
          from: op.get("from").map(parse_velocity).transpose()?.unwrap_or(default_from),
          to: op.get("to").map(parse_velocity).transpose()?.unwrap_or(default_to),
        })
      }
      Verb::Copy => {
        let source = self.track(op.require("track")?)?;
        let dest = match op.get("dest") {
          Some(dest) => self.track(dest)?,
          None => source,
        };
        let transpose = match op.get("transpose") {
          Some(value) => parse_semitones("transpose", value)?,
          None => 0,
        };
        Ok(Command::CopyRange {
          source: source.get_name().to_string(),
          range: self.range(op.require("range")?)?,
          dest: dest.get_name().to_string(),
          dest_start: self.position(op.require("to")?)?,
          transpose,
        })
      }
      Verb::Move => {
        let track = self.track(op.require("track")?)?;
        let to = self.position(op.require("to")?)?;
        Ok(Command::MoveNotes {
          track: track.get_name().to_string(),
          notes: self.selected_notes(track, op)?,
          to,
        })
      }
      Verb::Transpose => {
        let track = self.track(op.require("track")?)?;
        let semitones = parse_semitones("semitones", op.require("semitones")?)?;
        Ok(Command::TransposeNotes {
          track: track.get_name().to_string(),
          notes: self.selected_notes(track, op)?,
          semitones,
        })
      }
      Verb::Quantize => {
        let track = self.track(op.require("track")?)?;
        let grid = self.duration(op.get("grid"))?;
        Ok(Command::QuantizeNotes {
          track: track.get_name().to_string(),
          notes: self.selected_notes(track, op)?,
          grid,
        })
      }
      Verb::Repeat => {
        let track = self.track(op.require("track")?)?;
        op.require("range")?;
        let count = match op.get("count") {
          Some(count) => count
            .parse::<u32>()
            .ok()
            .filter(|count| *count >= 1 && *count <= MAX_REPEATS)
            .ok_or_else(|| invalid("count", count, "expected 1-128"))?,
          None => 1,
        };
        let to = match op.get("to") {
          Some(to) => Some(self.position(to)?),
          None => None,
        };
        Ok(Command::RepeatNotes {
          track: track.get_name().to_string(),
          notes: self.selected_notes(track, op)?,
          to,
          count,
        })
      }
      Verb::Tempo => {
        let bpm = op.require("bpm")?;
        let tempo = bpm
          .parse::<f64>()
          .ok()
          .and_then(Tempo::new)
          .ok_or_else(|| invalid("tempo", bpm, "BPM must be a number greater than zero"))?;
        Ok(Command::SetTempo {
          tick: self.optional_position(op.get("at"))?,
          tempo,
        })
      }
      Verb::TimeSig => {
        let text = op.require("signature")?;
        let signature = Signature::parse(text).ok_or_else(|| {
          invalid("time signature", text, "expected N/D with D a power of two")
        })?;
        let tick = self.optional_position(op.get("at"))?;
        let ppqn = self.song.get_ppqn();
        let mut signatures = self.song.signatures().clone();
        signatures.set(tick, Some(signature));
        if !self.song.signatures().is_bar_start(tick, ppqn) || !signatures.is_aligned(ppqn) {
          let at = op.get("at").unwrap_or("1.1");
          return Err(invalid("at", at, "time signature changes must start a bar").into());
        }
        Ok(Command::SetSignature { tick, signature })
      }
      Verb::KeySig => {
        let text = op.require("key")?;
        let key = KeySignature::parse(text)
          .ok_or_else(|| invalid("key", text, "expected a key such as C-major, F#m or Bb-minor"))?;
        Ok(Command::SetKey {
          tick: self.optional_position(op.get("at"))?,
          key,
        })
      }
      Verb::Marker => Ok(Command::AddMarker {
        tick: self.position(op.require("at")?)?,
        label: op.require("label")?.to_string(),
      }),
      Verb::Unmark => {
        let label = op.require("label")?;
        self
          .song
          .marker(label)
          .ok_or_else(|| ResolveError::UnknownMarker {
            label: label.to_string(),
          })?;
        Ok(Command::RemoveMarker {
          label: label.to_string(),
        })
      }
      Verb::Title => Ok(Command::SetTitle {
        title: op.require("title")?.to_string(),
      }),
      Verb::Program => {
        let track = self.track(op.require("track")?)?;
        let instrument = self.instrument(op.require("instrument")?)?;
        let channel = match (instrument, track.get_instrument()) {
          (Instrument::Percussion, _) => PERCUSSION_CHANNEL,
          (Instrument::Program(_), Instrument::Percussion) => self.free_channel()?,
          (Instrument::Program(_), Instrument::Program(_)) => track.get_channel(),
        };
        Ok(Command::SetInstrument {
          track: track.get_name().to_string(),
          channel,
          instrument,
        })
      }
      Verb::Mute => {
        let track = self.track(op.require("track")?)?;
        Ok(Command::SetTrackState {
          track: track.get_name().to_string(),
          mute: !track.is_mute(),
          solo: track.is_solo(),
        })
      }
      Verb::Solo => {
        let track = self.track(op.require("track")?)?;
        Ok(Command::SetTrackState {
          track: track.get_name().to_string(),
          mute: track.is_mute(),
          solo: !track.is_solo(),
        })
      }
      Verb::Tracker => self.resolve_tracker_import(op, block),
    }
  }

  fn resolve_track(&self, op: &ParsedOp) -> OpResult<Command> {
    let action = op.require("action")?;
    match action.to_lowercase().as_str() {
      "add" => {
        let name = op.require("name")?;
        if name == "*" || name.contains(|c: char| c == ',' || c == '[' || c == ']') {
          return Err(invalid("track name", name, "must not be '*' or contain ',', '[' or ']'").into());
        }
        if self.song.track_index(name).is_some() {
          return Err(
            ResolveError::DuplicateTrack {
              name: name.to_string(),
            }
            .into(),
          );
        }
        let instrument = match (op.get("program"), op.get("instrument").or_else(|| op.get("kind"))) {
          (Some(program), _) => Instrument::Program(
            program
              .parse::<U7>()
              .ok()
              .filter(|program| *program <= MAX_U7)
              .ok_or_else(|| invalid("program", program, "expected 0-127"))?,
          ),
          (None, Some(name)) => self.instrument(name)?,
          (None, None) => Instrument::Program(0),
        };
        let channel = match op.get("ch") {
          Some(channel) => parse_channel(channel)?,
          None if instrument == Instrument::Percussion => PERCUSSION_CHANNEL,
          None => self.free_channel()?,
        };
        Ok(Command::AddTrack {
          name: name.to_string(),
          channel,
          instrument,
        })
      }
      "remove" => {
        let track = self.track(op.require("name")?)?;
        Ok(Command::RemoveTrack {
          track: track.get_name().to_string(),
        })
      }
      _ => Err(
        ResolveError::UnknownAction {
          verb: "track".to_string(),
          action: action.to_string(),
        }
        .into(),
      ),
    }
  }

  fn resolve_tracker_import(&self, op: &ParsedOp, block: Option<&str>) -> OpResult<Command> {
    let track = self.track(op.require("track")?)?;
    let action = op.require("action")?;
    if !action.eq_ignore_ascii_case("import") {
      return Err(
        ResolveError::UnknownAction {
          verb: "tracker".to_string(),
          action: action.to_string(),
        }
        .into(),
      );
    }
    let block = block.ok_or_else(|| ParseError::UnterminatedBlock {
      header: format!("tracker {} import", track.get_name()),
    })?;
    let start = self.position(op.require("at")?)?;
    let resolution = tracker::resolution_ticks(
      op.get("res").unwrap_or(self.config.tracker.resolution.as_str()),
      self.song.get_ppqn(),
    )?;
    let mut notes = Vec::new();
    for event in tracker::parse_tracker(block)? {
      let onset = resolution
        .checked_mul(event.step)
        .and_then(|offset| start.checked_add(offset));
      let length = resolution.checked_mul(event.duration);
      match (onset, length) {
        (Some(onset), Some(length)) if onset.checked_add(length).is_some() => {
          notes.push((event.key, event.velocity, onset, length))
        }
        _ => {
          let reason = "places a note past the last representable tick";
          return Err(invalid("step", event.step + 1, reason).into());
        }
      }
    }
    Ok(Command::ImportNotes {
      track: track.get_name().to_string(),
      notes,
    })
  }

  /// Looks up a track, suggesting the closest existing name when there is no match.
  pub fn track(&self, name: &str) -> ResolveResult<&'a Track> {
    self.song.track(name).ok_or_else(|| {
      let hint = closest_name(name, self.song.tracks().iter().map(Track::get_name))
        .map(|suggestion| format!(" (did you mean '{}'?)", suggestion))
        .unwrap_or_default();
      ResolveError::UnknownTrack {
        name: name.to_string(),
        hint,
      }
    })
  }

  pub fn position(&self, address: &str) -> OpResult<TicksTime> {
    Ok(resolve_position(
      address,
      self.song.signatures(),
      self.song.get_ppqn(),
    )?)
  }

  fn optional_position(&self, address: Option<&str>) -> OpResult<TicksTime> {
    address.map_or(Ok(TicksTime::zero()), |address| self.position(address))
  }

  pub fn range(&self, expr: &str) -> OpResult<TickRange> {
    Ok(resolve_range(expr, self.song.signatures(), self.song.get_ppqn())?)
  }

  fn duration(&self, name: Option<&str>) -> OpResult<TicksTime> {
    Ok(resolve_duration(name.unwrap_or("quarter"), self.song.get_ppqn())?)
  }

  fn velocity(&self, text: Option<&str>) -> ResolveResult<U7> {
    text.map_or(Ok(self.config.session.velocity.min(MAX_U7)), parse_velocity)
  }

  /// Pitch names, `midi:N`, and on percussion tracks also drum names such as `kick`.
  pub fn pitch_for(&self, track: &Track, token: &str) -> ResolveResult<U7> {
    match parse_pitch(token) {
      Err(ResolveError::InvalidPitch { .. }) if track.is_percussion() => {
        drums::drum_note(token).ok_or_else(|| ResolveError::InvalidPitch {
          token: token.to_string(),
        })
      }
      other => other,
    }
  }

  /// Configured overrides first, then the GM table. `drums` and `percussion` select the kit.
  pub fn instrument(&self, name: &str) -> ResolveResult<Instrument> {
    let normalized = gm::normalize(name);
    if normalized == "drums" || normalized == "percussion" {
      return Ok(Instrument::Percussion);
    }
    self
      .config
      .instruments
      .iter()
      .find(|(alias, _)| gm::normalize(alias) == normalized)
      .map(|(_, program)| (*program).min(MAX_U7))
      .or_else(|| gm::program_for(name))
      .map(Instrument::Program)
      .ok_or_else(|| ResolveError::UnknownInstrument {
        name: name.to_string(),
      })
  }

  fn free_channel(&self) -> ResolveResult<U4> {
    self
      .song
      .next_free_channel()
      .ok_or_else(|| invalid("ch", "auto", "all 15 melodic channels are in use, pass ch:1-16"))
  }

  /// Like `select_notes`, but an empty selection is an error.
  fn selected_notes(&self, track: &Track, op: &ParsedOp) -> OpResult<Vec<Note>> {
    let notes = self.select_notes(track, op)?;
    if notes.is_empty() {
      return Err(
        ResolveError::NoNotes {
          track: track.get_name().to_string(),
        }
        .into(),
      );
    }
    Ok(notes)
  }

  /// Notes starting in `range:` (everywhere when absent) with the `pitch:` key when given.
  fn select_notes(&self, track: &Track, op: &ParsedOp) -> OpResult<Vec<Note>> {
    let range = match op.get("range") {
      Some(expr) => Some(self.range(expr)?),
      None => None,
    };
    let key = match op.get("pitch") {
      Some(pitch) => Some(self.pitch_for(track, pitch)?),
      None => None,
    };
    Ok(
      track
        .notes()
        .iter()
        .filter(|note| range.map_or(true, |range| range.contains(note.start)))
        .filter(|note| key.map_or(true, |key| note.key == key))
        .cloned()
        .collect(),
    )
  }
}

const MAX_REPEATS: u32 = 128;

/// Signed semitone offsets such as `+5` or `-12`.
fn parse_semitones(key: &str, value: &str) -> ResolveResult<i32> {
  value
    .trim_start_matches('+')
    .parse::<i32>()
    .ok()
    .filter(|semitones| semitones.abs() <= 127)
    .ok_or_else(|| invalid(key, value, "expected semitones within -127..127"))
}

/// Channels are written 1-16 and stored 0-15.
pub fn parse_channel(text: &str) -> ResolveResult<U4> {
  match text.parse::<u8>() {
    Ok(channel) if channel >= 1 && channel <= 16 => Ok(channel - 1),
    _ => Err(invalid("ch", text, "expected a channel between 1 and 16")),
  }
}

fn edit_distance(a: &str, b: &str) -> usize {
  let b: Vec<char> = b.chars().collect();
  let mut previous: Vec<usize> = (0..=b.len()).collect();
  for (i, ca) in a.chars().enumerate() {
    let mut current = vec![i + 1; b.len() + 1];
    for (j, cb) in b.iter().enumerate() {
      let substitution = previous[j] + if ca == *cb { 0 } else { 1 };
      current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
    }
    previous = current;
  }
  previous[b.len()]
}

/// Best candidate within a small edit distance, or one containing the name.
pub fn closest_name<'b, I>(name: &str, candidates: I) -> Option<&'b str>
where
  I: Iterator<Item = &'b str>,
{
  let wanted = name.to_lowercase();
  let limit = (wanted.chars().count() / 3).max(2);
  candidates
    .map(|candidate| {
      let lower = candidate.to_lowercase();
      let distance = if lower.contains(&wanted) || wanted.contains(&lower) {
        0
      } else {
        edit_distance(&wanted, &lower)
      };
      (distance, candidate)
    })
    .filter(|(distance, _)| *distance <= limit)
    .min_by_key(|(distance, _)| *distance)
    .map(|(_, candidate)| candidate)
}
