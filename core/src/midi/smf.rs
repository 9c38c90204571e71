//! Standard MIDI File persistence on top of `midly`.
//!
//! Songs are written as format 1: a conductor track with the title, time and key signatures,
//! tempo changes and markers, followed by one track per song track. Reading accepts format 0
//! and 1, renames tracks so they can be addressed by operations and moves time signature
//! changes that fall inside a bar to the next bar line.

use std::{
  collections::{HashMap, VecDeque},
  fs,
  path::Path,
};

use failure::Fail;
use log::{debug, info};
use midly::{
  num::{u15, u24, u28, u4, u7},
  Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};

use crate::{
  midi::{U4, U7},
  song::{
    marker::Marker,
    notes::Note,
    track::{Instrument, Track, PERCUSSION_CHANNEL},
    Song,
  },
  time::{KeySignature, Signature, Tempo, TicksTime},
};

const MAX_DELTA: u64 = 0x0fff_ffff;

#[derive(Debug, Fail)]
pub enum SmfError {
  #[fail(display = "Failed to encode the song: {}", cause)]
  Encode { cause: String },

  #[fail(display = "Failed to decode the MIDI file: {}", cause)]
  Decode { cause: String },

  #[fail(display = "Unsupported timing: {}", timing)]
  UnsupportedTiming { timing: String },

  #[fail(display = "{}: {}", path, cause)]
  Io { path: String, cause: String },
}

pub type SmfResult<T> = Result<T, SmfError>;

type TimedEvents<'a> = Vec<(u64, u8, TrackEventKind<'a>)>;

/// Encodes the whole song in memory.
pub fn encode(song: &Song) -> SmfResult<Vec<u8>> {
  let ppqn = song.get_ppqn();
  if ppqn == 0 || ppqn > 0x7fff {
    return Err(SmfError::UnsupportedTiming {
      timing: format!("{} ticks per quarter", ppqn),
    });
  }

  let mut smf = Smf::new(Header::new(
    Format::Parallel,
    Timing::Metrical(u15::new(ppqn as u16)),
  ));
  smf.tracks.push(into_track(conductor_events(song))?);
  for track in song.tracks() {
    smf.tracks.push(into_track(track_events(track))?);
  }

  let mut buffer = Vec::new();
  smf
    .write(&mut buffer)
    .map_err(|err| SmfError::Encode {
      cause: err.to_string(),
    })?;
  Ok(buffer)
}

fn conductor_events(song: &Song) -> TimedEvents {
  let mut events = TimedEvents::new();
  events.push((
    0,
    0,
    TrackEventKind::Meta(MetaMessage::TrackName(song.get_title().as_bytes())),
  ));
  for (tick, signature) in song.signatures().entries() {
    let note_value_pow2 = signature.get_note_value().trailing_zeros() as u8;
    events.push((
      u64::from(*tick),
      1,
      TrackEventKind::Meta(MetaMessage::TimeSignature(
        signature.get_num_beats(),
        note_value_pow2,
        24,
        8,
      )),
    ));
  }
  for (tick, key) in song.keys().entries() {
    events.push((
      u64::from(*tick),
      1,
      TrackEventKind::Meta(MetaMessage::KeySignature(key.get_sharps(), key.is_minor())),
    ));
  }
  for (tick, tempo) in song.tempos().entries() {
    events.push((
      u64::from(*tick),
      2,
      TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo.micros_per_quarter()))),
    ));
  }
  for marker in song.markers() {
    events.push((
      u64::from(marker.tick),
      3,
      TrackEventKind::Meta(MetaMessage::Marker(marker.label.as_bytes())),
    ));
  }
  events
}

fn track_events(track: &Track) -> TimedEvents {
  let channel = u4::new(track.get_channel());
  let mut events = TimedEvents::new();
  events.push((
    0,
    0,
    TrackEventKind::Meta(MetaMessage::TrackName(track.get_name().as_bytes())),
  ));
  if let Instrument::Program(program) = track.get_instrument() {
    events.push((
      0,
      1,
      TrackEventKind::Midi {
        channel,
        message: MidiMessage::ProgramChange {
          program: u7::new(program),
        },
      },
    ));
  }
  for note in track.notes().iter() {
    events.push((
      u64::from(note.start),
      3,
      TrackEventKind::Midi {
        channel,
        message: MidiMessage::NoteOn {
          key: u7::new(note.key),
          vel: u7::new(note.velocity),
        },
      },
    ));
    // note offs sort before note ons at the same tick
    events.push((
      u64::from(note.end()),
      2,
      TrackEventKind::Midi {
        channel,
        message: MidiMessage::NoteOff {
          key: u7::new(note.key),
          vel: u7::new(0),
        },
      },
    ));
  }
  events
}

fn into_track(mut events: TimedEvents) -> SmfResult<Vec<TrackEvent>> {
  events.sort_by_key(|(tick, order, _)| (*tick, *order));
  let mut track = Vec::with_capacity(events.len() + 1);
  let mut last = 0u64;
  for (tick, _, kind) in events {
    let delta = tick - last;
    if delta > MAX_DELTA {
      return Err(SmfError::Encode {
        cause: format!("gap of {} ticks does not fit a delta time", delta),
      });
    }
    track.push(TrackEvent {
      delta: u28::new(delta as u32),
      kind,
    });
    last = tick;
  }
  track.push(TrackEvent {
    delta: u28::new(0),
    kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
  });
  Ok(track)
}

struct DecodedTrack {
  name: Option<String>,
  channel: Option<U4>,
  program: Option<U7>,
  notes: Vec<(U7, U7, u64, u64)>,
}

/// Builds a song at version 0 from SMF bytes.
pub fn decode(data: &[u8]) -> SmfResult<Song> {
  let smf = Smf::parse(data).map_err(|err| SmfError::Decode {
    cause: err.to_string(),
  })?;
  let ppqn = match smf.header.timing {
    Timing::Metrical(ticks) if ticks.as_int() > 0 => u32::from(ticks.as_int()),
    Timing::Metrical(_) => {
      return Err(SmfError::UnsupportedTiming {
        timing: "zero ticks per quarter".to_string(),
      })
    }
    Timing::Timecode(fps, subframe) => {
      return Err(SmfError::UnsupportedTiming {
        timing: format!("timecode {:?} / {}", fps, subframe),
      })
    }
  };

  let mut song = Song::new("Untitled", ppqn, Tempo::default(), Signature::default());
  let mut title: Option<String> = None;
  let mut markers = Vec::new();

  for (index, events) in smf.tracks.iter().enumerate() {
    let mut tick = 0u64;
    let mut decoded = DecodedTrack {
      name: None,
      channel: None,
      program: None,
      notes: Vec::new(),
    };
    let mut pending: HashMap<(U4, U7), VecDeque<(u64, U7)>> = HashMap::new();

    for event in events.iter() {
      tick += u64::from(event.delta.as_int());
      match event.kind {
        TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
          decoded.name = Some(String::from_utf8_lossy(bytes).trim().to_string());
        }
        TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
          if let Some(tempo) = Tempo::from_micros_per_quarter(micros.as_int()) {
            song.tempos_mut().set(TicksTime::new(tick), Some(tempo));
          }
        }
        TrackEventKind::Meta(MetaMessage::TimeSignature(num_beats, note_value_pow2, _, _)) => {
          let note_value = 1u8.checked_shl(u32::from(note_value_pow2)).unwrap_or(0);
          if let Some(signature) = Signature::parse(&format!("{}/{}", num_beats, note_value)) {
            song.signatures_mut().set(TicksTime::new(tick), Some(signature));
          }
        }
        TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
          if let Some(key) = KeySignature::new(sharps, minor) {
            song.keys_mut().set(TicksTime::new(tick), Some(key));
          }
        }
        TrackEventKind::Meta(MetaMessage::Marker(bytes)) => {
          markers.push(Marker::new(
            TicksTime::new(tick),
            String::from_utf8_lossy(bytes).trim(),
          ));
        }
        TrackEventKind::Midi { channel, message } => {
          let channel = channel.as_int();
          decoded.channel.get_or_insert(channel);
          match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
              pending
                .entry((channel, key.as_int()))
                .or_insert_with(VecDeque::new)
                .push_back((tick, vel.as_int()));
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
              let key = key.as_int();
              if let Some((start, velocity)) = pending
                .get_mut(&(channel, key))
                .and_then(|queue| queue.pop_front())
              {
                decoded.notes.push((key, velocity, start, (tick - start).max(1)));
              }
            }
            MidiMessage::ProgramChange { program } => {
              decoded.program.get_or_insert(program.as_int());
            }
            _ => {}
          }
        }
        _ => {}
      }
    }

    // notes never released end with the track
    for ((_, key), queue) in pending {
      for (start, velocity) in queue {
        decoded.notes.push((key, velocity, start, (tick - start).max(1)));
      }
    }

    if decoded.notes.is_empty() && decoded.channel.is_none() {
      if title.is_none() {
        title = decoded.name.take();
      }
      continue;
    }
    add_decoded_track(&mut song, index, decoded);
  }

  if let Some(title) = title.filter(|title| !title.is_empty()) {
    song.set_title(title);
  }
  markers.sort_by_key(|marker| marker.tick);
  song.markers_mut().extend(markers);

  let moved = song.signatures_mut().align_to_bars(ppqn);
  if moved > 0 {
    debug!("Moved {} time signature change(s) to the next bar line", moved);
  }

  debug!(
    "Decoded {} track(s) with {} note(s)",
    song.tracks().len(),
    song.note_count()
  );
  Ok(song)
}

/// Track names as operations can address them: one token, without list or lane syntax.
fn track_name(raw: &str) -> String {
  let kept: String = raw
    .chars()
    .filter(|c| !(*c == ',' || *c == '[' || *c == ']'))
    .collect();
  kept.split_whitespace().collect::<Vec<&str>>().join("-")
}

fn add_decoded_track(song: &mut Song, index: usize, mut decoded: DecodedTrack) {
  let channel = decoded.channel.unwrap_or(0);
  let instrument = if channel == PERCUSSION_CHANNEL {
    Instrument::Percussion
  } else {
    Instrument::Program(decoded.program.unwrap_or(0))
  };

  let base = decoded
    .name
    .take()
    .map(|name| track_name(&name))
    .filter(|name| !name.is_empty() && name != "*")
    .unwrap_or_else(|| format!("Track-{}", index));
  let mut name = base.clone();
  let mut suffix = 2;
  while song.track_index(&name).is_some() {
    name = format!("{}-{}", base, suffix);
    suffix += 1;
  }

  decoded
    .notes
    .sort_by_key(|(key, velocity, start, length)| (*start, *key, *velocity, *length));
  let notes: Vec<Note> = decoded
    .notes
    .into_iter()
    .map(|(key, velocity, start, length)| Note {
      id: song.allocate_note_id(),
      key,
      velocity,
      start: TicksTime::new(start),
      length: TicksTime::new(length),
    })
    .collect();

  let mut track = Track::new(name, channel, instrument);
  track.notes_mut().add_notes(notes);
  song.tracks_mut().push(track);
}

/// Writes the song atomically with respect to the model: it is fully encoded before the file is touched.
pub fn save(song: &Song, path: &Path) -> SmfResult<()> {
  let data = encode(song)?;
  fs::write(path, &data).map_err(|err| SmfError::Io {
    path: path.display().to_string(),
    cause: err.to_string(),
  })?;
  info!("Saved {} bytes to {}", data.len(), path.display());
  Ok(())
}

pub fn open(path: &Path) -> SmfResult<Song> {
  let data = fs::read(path).map_err(|err| SmfError::Io {
    path: path.display().to_string(),
    cause: err.to_string(),
  })?;
  let song = decode(&data)?;
  info!("Opened {} ({} tracks)", path.display(), song.tracks().len());
  Ok(song)
}

#[cfg(test)]
mod test {

  use super::{decode, encode, open, save, track_name};
  use crate::{
    song::{
      marker::Marker,
      notes::{Note, NoteId},
      track::{Instrument, Track},
      Song,
    },
    time::{KeySignature, Signature, Tempo, TicksTime},
  };

  fn song() -> Song {
    let mut song = Song::new("Round Trip", 480, Tempo::new(96.0).unwrap(), Signature::new(3, 4));
    song
      .tempos_mut()
      .set(TicksTime::new(1440), Tempo::new(120.0));
    song.markers_mut().push(Marker::new(TicksTime::new(1440), "B"));

    let mut bass = Track::new("Bass", 0, Instrument::Program(33));
    bass.notes_mut().add_notes(vec![
      Note {
        id: NoteId::new(1),
        key: 40,
        velocity: 90,
        start: TicksTime::zero(),
        length: TicksTime::new(480),
      },
      Note {
        id: NoteId::new(2),
        key: 40,
        velocity: 80,
        start: TicksTime::new(480),
        length: TicksTime::new(240),
      },
    ]);
    let mut drums = Track::new("Drums", 9, Instrument::Percussion);
    drums.notes_mut().add_note(Note {
      id: NoteId::new(3),
      key: 36,
      velocity: 100,
      start: TicksTime::zero(),
      length: TicksTime::new(120),
    });
    song.tracks_mut().push(bass);
    song.tracks_mut().push(drums);
    song
  }

  fn notes(song: &Song) -> Vec<(String, u64, u8, u8, u64)> {
    song
      .tracks()
      .iter()
      .flat_map(|track| {
        track.notes().iter().map(move |note| {
          (
            track.get_name().to_string(),
            u64::from(note.start),
            note.key,
            note.velocity,
            u64::from(note.length),
          )
        })
      })
      .collect()
  }

  #[test]
  pub fn encode_decode() {
    let original = song();
    let decoded = decode(&encode(&original).unwrap()).unwrap();

    assert_eq!(decoded.get_title(), "Round Trip");
    assert_eq!(decoded.get_ppqn(), 480);
    assert_eq!(decoded.signatures().entries(), original.signatures().entries());
    assert_eq!(decoded.tempos().entries().len(), 2);
    assert_eq!(decoded.markers(), original.markers());
    assert_eq!(notes(&decoded), notes(&original));
    assert_eq!(decoded.tracks()[0].get_instrument(), Instrument::Program(33));
    assert_eq!(decoded.tracks()[1].get_instrument(), Instrument::Percussion);
    assert_eq!(decoded.get_version(), 0);
  }

  #[test]
  pub fn decode_garbage() {
    assert!(decode(b"not a midi file").is_err());
  }

  #[test]
  pub fn save_and_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.mid");
    save(&song(), &path).unwrap();
    let reopened = open(&path).unwrap();
    assert_eq!(notes(&reopened), notes(&song()));
    assert!(open(&dir.path().join("missing.mid")).is_err());
  }

  #[test]
  pub fn names() {
    assert_eq!(track_name("Lead Synth [1], A"), "Lead-Synth-1-A");
    assert_eq!(track_name("  Bass\tGuitar "), "Bass-Guitar");
    assert_eq!(track_name("[,]"), "");
  }

  #[test]
  pub fn decoded_names_are_addressable() {
    let mut song = Song::new("Names", 480, Tempo::default(), Signature::default());
    for (channel, name) in ["Lead Synth", "Lead-Synth", "*", "Pads, [A]"].iter().enumerate() {
      let mut track = Track::new(*name, channel as u8, Instrument::Program(0));
      track.notes_mut().add_note(Note {
        id: NoteId::new(channel as u64 + 1),
        key: 60,
        velocity: 90,
        start: TicksTime::zero(),
        length: TicksTime::new(480),
      });
      song.tracks_mut().push(track);
    }
    let decoded = decode(&encode(&song).unwrap()).unwrap();
    let names: Vec<&str> = decoded.tracks().iter().map(|track| track.get_name()).collect();
    assert_eq!(names, vec!["Lead-Synth", "Lead-Synth-2", "Track-3", "Pads-A"]);
  }

  #[test]
  pub fn key_signatures_round_trip() {
    let mut original = song();
    original
      .keys_mut()
      .set(TicksTime::zero(), KeySignature::parse("F#m"));
    original
      .keys_mut()
      .set(TicksTime::new(1440), KeySignature::parse("A"));
    let decoded = decode(&encode(&original).unwrap()).unwrap();
    assert_eq!(decoded.keys(), original.keys());
  }

  #[test]
  pub fn signature_changes_inside_a_bar_move_to_the_next_bar() {
    let mut original = Song::new("Odd", 480, Tempo::default(), Signature::default());
    original
      .signatures_mut()
      .set(TicksTime::new(960), Some(Signature::new(3, 4)));
    let decoded = decode(&encode(&original).unwrap()).unwrap();
    assert_eq!(
      decoded.signatures().entries(),
      &[
        (TicksTime::zero(), Signature::new(4, 4)),
        (TicksTime::new(1920), Signature::new(3, 4)),
      ]
    );
  }
}
