//! Builders for the song's mutation primitives.
//!
//! Each builder validates against the current song and produces a [`Change`]: the mutation to
//! commit plus a short description for the history. Derived operations (velocity ramps and range
//! copies) are expanded here into a single deterministic mutation, so redoing them never depends
//! on state that may have changed in between.

use log::debug;

use crate::{
  midi::{U4, U7},
  song::{
    marker::Marker,
    mutation::Mutation,
    notes::{Key, Note},
    track::{Instrument, Track},
    Song, SongError, SongResult,
  },
  time::{BarsTime, KeySignature, Signature, Tempo, TickRange, TicksTime},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
  pub description: String,
  pub mutation: Mutation,
}

impl Change {
  fn new<T>(description: T, mutation: Mutation) -> Change
  where
    T: Into<String>,
  {
    Change {
      description: description.into(),
      mutation,
    }
  }
}

fn position(song: &Song, tick: TicksTime) -> BarsTime {
  BarsTime::from_ticks(tick, song.signatures(), song.get_ppqn())
}

fn existing_track<'a>(song: &'a Song, name: &str) -> SongResult<&'a Track> {
  song.track(name).ok_or_else(|| SongError::TrackNotFound {
    name: name.to_string(),
  })
}

fn checked_start(track: &str, start: TicksTime, length: TicksTime) -> SongResult<TicksTime> {
  match start.checked_add(length) {
    Some(_) => Ok(start),
    None => Err(SongError::TickOverflow {
      track: track.to_string(),
    }),
  }
}

/// Earliest start and latest end of a selection, or `None` when it is empty.
fn extent(notes: &[Note]) -> Option<(TicksTime, TicksTime)> {
  let first = notes.iter().map(|note| note.start).min()?;
  let last = notes.iter().map(|note| note.end()).max()?;
  Some((first, last))
}

pub fn add_track(song: &Song, track: Track) -> SongResult<Change> {
  if song.track_index(track.get_name()).is_some() {
    return Err(SongError::DuplicateTrack {
      name: track.get_name().to_string(),
    });
  }
  Ok(Change::new(
    format!("add track {}", track.get_name()),
    Mutation::InsertTrack {
      index: song.tracks().len(),
      track,
    },
  ))
}

pub fn remove_track(song: &Song, name: &str) -> SongResult<Change> {
  let track = existing_track(song, name)?;
  Ok(Change::new(
    format!("remove track {}", track.get_name()),
    Mutation::RemoveTrack {
      name: track.get_name().to_string(),
    },
  ))
}

pub fn add_note(
  song: &mut Song,
  track: &str,
  key: Key,
  velocity: U7,
  start: TicksTime,
  length: TicksTime,
) -> SongResult<Change> {
  let name = existing_track(song, track)?.get_name().to_string();
  let start = checked_start(&name, start, length)?;
  let note = Note {
    id: song.allocate_note_id(),
    key,
    velocity,
    start,
    length,
  };
  Ok(Change::new(
    format!(
      "add note {} to {} at {}",
      crate::ops::pitch::pitch_name(key),
      name,
      position(song, start)
    ),
    Mutation::InsertNotes {
      track: name,
      notes: vec![note],
    },
  ))
}

/// Batched insertion used by block imports. Each entry is (key, velocity, start, length).
pub fn add_notes(
  song: &mut Song,
  track: &str,
  notes: Vec<(Key, U7, TicksTime, TicksTime)>,
) -> SongResult<Change> {
  let name = existing_track(song, track)?.get_name().to_string();
  for (_, _, start, length) in notes.iter() {
    checked_start(&name, *start, *length)?;
  }
  let notes: Vec<Note> = notes
    .into_iter()
    .map(|(key, velocity, start, length)| Note {
      id: song.allocate_note_id(),
      key,
      velocity,
      start,
      length,
    })
    .collect();
  Ok(Change::new(
    format!("add {} notes to {}", notes.len(), name),
    Mutation::InsertNotes { track: name, notes },
  ))
}

pub fn remove_note(song: &Song, track: &str, note: &Note) -> SongResult<Change> {
  let target = existing_track(song, track)?;
  if !target.notes().contains(note.id) {
    return Err(SongError::NoteNotFound {
      track: target.get_name().to_string(),
      id: note.id.get_value(),
    });
  }
  Ok(Change::new(
    format!(
      "remove note {} from {} at {}",
      crate::ops::pitch::pitch_name(note.key),
      target.get_name(),
      position(song, note.start)
    ),
    Mutation::RemoveNotes {
      track: target.get_name().to_string(),
      ids: vec![note.id],
    },
  ))
}

pub fn set_note_velocity(song: &Song, track: &str, note: &Note, velocity: U7) -> SongResult<Change> {
  let target = existing_track(song, track)?;
  if !target.notes().contains(note.id) {
    return Err(SongError::NoteNotFound {
      track: target.get_name().to_string(),
      id: note.id.get_value(),
    });
  }
  Ok(Change::new(
    format!(
      "velocity {} for {} on {} at {}",
      velocity,
      crate::ops::pitch::pitch_name(note.key),
      target.get_name(),
      position(song, note.start)
    ),
    Mutation::SetVelocities {
      track: target.get_name().to_string(),
      changes: vec![(note.id, velocity)],
    },
  ))
}

pub fn set_tempo_at(song: &Song, tick: TicksTime, tempo: Tempo) -> Change {
  Change::new(
    format!("tempo {} at {}", tempo, position(song, tick)),
    Mutation::SetTempo {
      tick,
      tempo: Some(tempo),
    },
  )
}

pub fn set_time_signature_at(song: &Song, tick: TicksTime, signature: Signature) -> Change {
  Change::new(
    format!("time signature {} at {}", signature, position(song, tick)),
    Mutation::SetSignature {
      tick,
      signature: Some(signature),
    },
  )
}

/// Markers stay sorted by tick; a new marker goes after the ones already at its tick.
pub fn add_marker(song: &Song, tick: TicksTime, label: &str) -> Change {
  let index = song
    .markers()
    .iter()
    .position(|marker| marker.tick > tick)
    .unwrap_or_else(|| song.markers().len());
  Change::new(
    format!("marker {} at {}", label, position(song, tick)),
    Mutation::InsertMarker {
      index,
      marker: Marker::new(tick, label),
    },
  )
}

pub fn remove_marker(song: &Song, label: &str) -> SongResult<Change> {
  let index = song
    .markers()
    .iter()
    .position(|marker| marker.label == label)
    .ok_or_else(|| SongError::MarkerNotFound {
      label: label.to_string(),
    })?;
  Ok(Change::new(
    format!("remove marker {}", label),
    Mutation::RemoveMarker { index },
  ))
}

pub fn set_title(title: &str) -> Change {
  Change::new(
    format!("title {}", title),
    Mutation::SetTitle {
      title: title.to_string(),
    },
  )
}

pub fn set_instrument(song: &Song, track: &str, channel: U4, instrument: Instrument) -> SongResult<Change> {
  let target = existing_track(song, track)?;
  Ok(Change::new(
    format!("instrument of {}", target.get_name()),
    Mutation::SetInstrument {
      track: target.get_name().to_string(),
      channel,
      instrument,
    },
  ))
}

pub fn set_track_state(song: &Song, track: &str, mute: bool, solo: bool) -> SongResult<Change> {
  let target = existing_track(song, track)?;
  Ok(Change::new(
    format!("{} mute:{} solo:{}", target.get_name(), mute, solo),
    Mutation::SetTrackState {
      track: target.get_name().to_string(),
      mute,
      solo,
    },
  ))
}

/// Linear velocity interpolation over the notes starting inside `range`.
pub fn apply_velocity_ramp(
  song: &Song,
  track: &str,
  range: TickRange,
  from: U7,
  to: U7,
) -> SongResult<Change> {
  let target = existing_track(song, track)?;
  let span = f64::from(range.length());
  let changes: Vec<_> = target
    .notes()
    .starting_in(range)
    .map(|note| {
      let progress = f64::from(note.start - range.start) / span;
      let value = f64::from(from) + (f64::from(to) - f64::from(from)) * progress;
      (note.id, value.round().max(0.0).min(127.0) as U7)
    })
    .collect();
  Ok(Change::new(
    format!(
      "velocity ramp {}->{} over {} note(s) on {}",
      from,
      to,
      changes.len(),
      target.get_name()
    ),
    Mutation::SetVelocities {
      track: target.get_name().to_string(),
      changes,
    },
  ))
}

/// Copies the notes starting inside `range` so that `range.start` lands on `dest_start`.
/// Notes transposed out of the MIDI range are dropped.
pub fn copy_range(
  song: &mut Song,
  source: &str,
  range: TickRange,
  dest: &str,
  dest_start: TicksTime,
  transpose: i32,
) -> SongResult<Change> {
  let source_track = existing_track(song, source)?;
  let source_name = source_track.get_name().to_string();
  let dest_name = existing_track(song, dest)?.get_name().to_string();

  let originals: Vec<Note> = source_track.notes().starting_in(range).cloned().collect();
  let mut dropped = 0usize;
  let mut notes = Vec::with_capacity(originals.len());
  for original in originals {
    let key = i32::from(original.key) + transpose;
    if key < 0 || key > 127 {
      dropped += 1;
      continue;
    }
    let start = dest_start
      .checked_add(original.start - range.start)
      .ok_or_else(|| SongError::TickOverflow {
        track: dest_name.clone(),
      })?;
    notes.push(Note {
      id: song.allocate_note_id(),
      key: key as Key,
      velocity: original.velocity,
      start: checked_start(&dest_name, start, original.length)?,
      length: original.length,
    });
  }
  if dropped > 0 {
    debug!("Dropped {} note(s) transposed out of range while copying {}", dropped, source_name);
  }

  Ok(Change::new(
    format!(
      "copy {} note(s) from {} {} to {} at {}{}",
      notes.len(),
      source_name,
      range.display(song.signatures(), song.get_ppqn()),
      dest_name,
      position(song, dest_start),
      if transpose != 0 {
        format!(" transposed {:+}", transpose)
      } else {
        String::new()
      }
    ),
    Mutation::InsertNotes {
      track: dest_name,
      notes,
    },
  ))
}

pub fn set_key_at(song: &Song, tick: TicksTime, key: KeySignature) -> Change {
  Change::new(
    format!("key {} at {}", key, position(song, tick)),
    Mutation::SetKey { tick, key: Some(key) },
  )
}

/// Shifts the selection so that its earliest note starts at `to`, keeping relative timing.
pub fn move_notes(song: &Song, track: &str, notes: &[Note], to: TicksTime) -> SongResult<Change> {
  let name = existing_track(song, track)?.get_name().to_string();
  let first = extent(notes).map_or_else(TicksTime::zero, |(first, _)| first);
  let mut moved = Vec::with_capacity(notes.len());
  for note in notes {
    let start = to
      .checked_add(note.start - first)
      .ok_or_else(|| SongError::TickOverflow { track: name.clone() })?;
    moved.push(Note {
      start: checked_start(&name, start, note.length)?,
      ..*note
    });
  }
  Ok(Change::new(
    format!("move {} note(s) on {} to {}", moved.len(), name, position(song, to)),
    Mutation::UpdateNotes {
      track: name,
      notes: moved,
    },
  ))
}

/// Shifts the pitch of the selection. Notes that would leave the MIDI range stay where they are.
pub fn transpose_notes(song: &Song, track: &str, notes: &[Note], semitones: i32) -> SongResult<Change> {
  let name = existing_track(song, track)?.get_name().to_string();
  let mut skipped = 0usize;
  let mut transposed = Vec::with_capacity(notes.len());
  for note in notes {
    match i32::from(note.key).checked_add(semitones) {
      Some(key) if key >= 0 && key <= 127 => transposed.push(Note {
        key: key as Key,
        ..*note
      }),
      _ => skipped += 1,
    }
  }
  if skipped > 0 {
    debug!("Kept {} note(s) on {} that would leave the MIDI range", skipped, name);
  }
  Ok(Change::new(
    format!("transpose {} note(s) on {} by {:+}", transposed.len(), name, semitones),
    Mutation::UpdateNotes {
      track: name,
      notes: transposed,
    },
  ))
}

/// Snaps note starts to the nearest multiple of `grid`, ties rounding up.
pub fn quantize_notes(song: &Song, track: &str, notes: &[Note], grid: TicksTime) -> SongResult<Change> {
  let name = existing_track(song, track)?.get_name().to_string();
  let step = u64::from(grid).max(1);
  let snapped: Vec<Note> = notes
    .iter()
    .filter_map(|note| {
      let start = u64::from(note.start);
      let remainder = start % step;
      let below = start - remainder;
      let nearest = if remainder >= step - remainder {
        below
          .checked_add(step)
          .filter(|above| above.checked_add(u64::from(note.length)).is_some())
          .unwrap_or(below)
      } else {
        below
      };
      if nearest == start {
        None
      } else {
        Some(Note {
          start: TicksTime::new(nearest),
          ..*note
        })
      }
    })
    .collect();
  Ok(Change::new(
    format!(
      "quantize {} of {} note(s) on {} to {} ticks",
      snapped.len(),
      notes.len(),
      name,
      step
    ),
    Mutation::UpdateNotes {
      track: name,
      notes: snapped,
    },
  ))
}

/// Appends `count` back to back copies of the selection, the first one starting at `to`
/// (by default right where the selection ends).
pub fn repeat_notes(
  song: &mut Song,
  track: &str,
  notes: &[Note],
  to: Option<TicksTime>,
  count: u32,
) -> SongResult<Change> {
  let name = existing_track(song, track)?.get_name().to_string();
  let (first, last) = match extent(notes) {
    Some(extent) => extent,
    None => (TicksTime::zero(), TicksTime::zero()),
  };
  let span = last - first;
  let to = to.unwrap_or(last);
  let overflow = || SongError::TickOverflow { track: name.clone() };

  let mut copies = Vec::with_capacity(notes.len() * count as usize);
  for repetition in 0..u64::from(count) {
    let base = span
      .checked_mul(repetition)
      .and_then(|offset| to.checked_add(offset))
      .ok_or_else(overflow)?;
    for note in notes {
      let start = base.checked_add(note.start - first).ok_or_else(overflow)?;
      copies.push(Note {
        id: song.allocate_note_id(),
        start: checked_start(&name, start, note.length)?,
        ..*note
      });
    }
  }
  Ok(Change::new(
    format!(
      "repeat {} note(s) on {} {} time(s) from {}",
      notes.len(),
      name,
      count,
      position(song, to)
    ),
    Mutation::InsertNotes {
      track: name,
      notes: copies,
    },
  ))
}
