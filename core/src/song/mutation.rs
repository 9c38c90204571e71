use std::fmt;

use crate::{
  midi::{U4, U7},
  song::{
    marker::Marker,
    notes::{Note, NoteId},
    track::{Instrument, Track},
    Song, SongError, SongResult,
  },
  time::{KeySignature, Signature, Tempo, TicksTime},
};

/// A change to the song expressed as data. Applying a mutation returns the mutation that undoes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
  InsertTrack {
    index: usize,
    track: Track,
  },
  RemoveTrack {
    name: String,
  },
  InsertNotes {
    track: String,
    notes: Vec<Note>,
  },
  RemoveNotes {
    track: String,
    ids: Vec<NoteId>,
  },
  UpdateNotes {
    track: String,
    notes: Vec<Note>,
  },
  SetVelocities {
    track: String,
    changes: Vec<(NoteId, U7)>,
  },
  SetTempo {
    tick: TicksTime,
    tempo: Option<Tempo>,
  },
  SetSignature {
    tick: TicksTime,
    signature: Option<Signature>,
  },
  SetKey {
    tick: TicksTime,
    key: Option<KeySignature>,
  },
  InsertMarker {
    index: usize,
    marker: Marker,
  },
  RemoveMarker {
    index: usize,
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
}

impl Song {
  /// Applies a mutation and returns its inverse. Nothing is modified when an error is returned.
  pub(crate) fn apply(&mut self, mutation: &Mutation) -> SongResult<Mutation> {
    match mutation {
      Mutation::InsertTrack { index, track } => {
        if self.track_index(track.get_name()).is_some() {
          return Err(SongError::DuplicateTrack {
            name: track.get_name().to_string(),
          });
        }
        let index = (*index).min(self.tracks().len());
        self.tracks_mut().insert(index, track.clone());
        Ok(Mutation::RemoveTrack {
          name: track.get_name().to_string(),
        })
      }

      Mutation::RemoveTrack { name } => {
        let index = self.track_index(name).ok_or_else(|| SongError::TrackNotFound {
          name: name.clone(),
        })?;
        let track = self.tracks_mut().remove(index);
        Ok(Mutation::InsertTrack { index, track })
      }

      Mutation::InsertNotes { track, notes } => {
        check_ends(track, notes)?;
        let target = self.track_mut(track)?;
        target.notes_mut().add_notes(notes.clone());
        Ok(Mutation::RemoveNotes {
          track: track.clone(),
          ids: notes.iter().map(|note| note.id).collect(),
        })
      }

      Mutation::RemoveNotes { track, ids } => {
        let target = self.track_mut(track)?;
        if let Some(missing) = ids.iter().find(|id| !target.notes().contains(**id)) {
          return Err(SongError::NoteNotFound {
            track: track.clone(),
            id: missing.get_value(),
          });
        }
        let notes = ids
          .iter()
          .filter_map(|id| target.notes_mut().remove_note(*id))
          .collect();
        Ok(Mutation::InsertNotes {
          track: track.clone(),
          notes,
        })
      }

      Mutation::UpdateNotes { track, notes } => {
        check_ends(track, notes)?;
        let target = self.track_mut(track)?;
        if let Some(missing) = notes.iter().find(|note| !target.notes().contains(note.id)) {
          return Err(SongError::NoteNotFound {
            track: track.clone(),
            id: missing.id.get_value(),
          });
        }
        let previous = notes
          .iter()
          .filter_map(|note| target.notes_mut().replace_note(*note))
          .collect();
        Ok(Mutation::UpdateNotes {
          track: track.clone(),
          notes: previous,
        })
      }

      Mutation::SetVelocities { track, changes } => {
        let target = self.track_mut(track)?;
        if let Some((missing, _)) = changes.iter().find(|(id, _)| !target.notes().contains(*id)) {
          return Err(SongError::NoteNotFound {
            track: track.clone(),
            id: missing.get_value(),
          });
        }
        let mut previous: Vec<(NoteId, U7)> = changes
          .iter()
          .filter_map(|(id, velocity)| {
            target
              .notes_mut()
              .set_velocity(*id, *velocity)
              .map(|old| (*id, old))
          })
          .collect();
        previous.reverse();
        Ok(Mutation::SetVelocities {
          track: track.clone(),
          changes: previous,
        })
      }

      Mutation::SetTempo { tick, tempo } => {
        let previous = self.tempos_mut().set(*tick, *tempo);
        Ok(Mutation::SetTempo {
          tick: *tick,
          tempo: previous,
        })
      }

      Mutation::SetSignature { tick, signature } => {
        let previous = self.signatures_mut().set(*tick, *signature);
        Ok(Mutation::SetSignature {
          tick: *tick,
          signature: previous,
        })
      }

      Mutation::SetKey { tick, key } => {
        let previous = self.keys_mut().set(*tick, *key);
        Ok(Mutation::SetKey {
          tick: *tick,
          key: previous,
        })
      }

      Mutation::InsertMarker { index, marker } => {
        let index = (*index).min(self.markers().len());
        self.markers_mut().insert(index, marker.clone());
        Ok(Mutation::RemoveMarker { index })
      }

      Mutation::RemoveMarker { index } => {
        if *index >= self.markers().len() {
          return Err(SongError::MarkerIndex { index: *index });
        }
        let marker = self.markers_mut().remove(*index);
        Ok(Mutation::InsertMarker {
          index: *index,
          marker,
        })
      }

      Mutation::SetTitle { title } => {
        let previous = self.set_title(title.as_str());
        Ok(Mutation::SetTitle { title: previous })
      }

      Mutation::SetInstrument {
        track,
        channel,
        instrument,
      } => {
        let target = self.track_mut(track)?;
        let inverse = Mutation::SetInstrument {
          track: track.clone(),
          channel: target.get_channel(),
          instrument: target.get_instrument(),
        };
        target.set_channel(*channel);
        target.set_instrument(*instrument);
        Ok(inverse)
      }

      Mutation::SetTrackState { track, mute, solo } => {
        let target = self.track_mut(track)?;
        let inverse = Mutation::SetTrackState {
          track: track.clone(),
          mute: target.is_mute(),
          solo: target.is_solo(),
        };
        target.set_state(*mute, *solo);
        Ok(inverse)
      }
    }
  }
}

fn check_ends(track: &str, notes: &[Note]) -> SongResult<()> {
  if notes.iter().all(|note| note.start.checked_add(note.length).is_some()) {
    Ok(())
  } else {
    Err(SongError::TickOverflow {
      track: track.to_string(),
    })
  }
}

impl fmt::Display for Mutation {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Mutation::InsertTrack { track, .. } => write!(f, "insert track {}", track.get_name()),
      Mutation::RemoveTrack { name } => write!(f, "remove track {}", name),
      Mutation::InsertNotes { track, notes } => write!(f, "insert {} note(s) on {}", notes.len(), track),
      Mutation::RemoveNotes { track, ids } => write!(f, "remove {} note(s) from {}", ids.len(), track),
      Mutation::UpdateNotes { track, notes } => write!(f, "update {} note(s) on {}", notes.len(), track),
      Mutation::SetVelocities { track, changes } => {
        write!(f, "set {} velocities on {}", changes.len(), track)
      }
      Mutation::SetTempo { tick, tempo: Some(tempo) } => write!(f, "tempo {} at tick {}", tempo, tick),
      Mutation::SetTempo { tick, tempo: None } => write!(f, "clear tempo at tick {}", tick),
      Mutation::SetSignature {
        tick,
        signature: Some(signature),
      } => write!(f, "time signature {} at tick {}", signature, tick),
      Mutation::SetSignature { tick, signature: None } => {
        write!(f, "clear time signature at tick {}", tick)
      }
      Mutation::SetKey { tick, key: Some(key) } => write!(f, "key {} at tick {}", key, tick),
      Mutation::SetKey { tick, key: None } => write!(f, "clear key at tick {}", tick),
      Mutation::InsertMarker { marker, .. } => write!(f, "marker {} at tick {}", marker.label, marker.tick),
      Mutation::RemoveMarker { index } => write!(f, "remove marker #{}", index),
      Mutation::SetTitle { title } => write!(f, "title {}", title),
      Mutation::SetInstrument { track, .. } => write!(f, "instrument of {}", track),
      Mutation::SetTrackState { track, mute, solo } => {
        write!(f, "{} mute={} solo={}", track, mute, solo)
      }
    }
  }
}

#[cfg(test)]
mod test {

  use super::Mutation;
  use crate::{
    song::{
      marker::Marker,
      notes::{Note, NoteId},
      track::{Instrument, Track},
      Song, SongError,
    },
    time::{KeySignature, Signature, Tempo, TicksTime},
  };

  fn song_with_bass() -> Song {
    let mut song = Song::new("Test", 480, Tempo::default(), Signature::default());
    song
      .apply(&Mutation::InsertTrack {
        index: 0,
        track: Track::new("Bass", 0, Instrument::Program(33)),
      })
      .unwrap();
    song
  }

  fn note(id: u64, key: u8, start: u64) -> Note {
    Note {
      id: NoteId::new(id),
      key,
      velocity: 90,
      start: TicksTime::new(start),
      length: TicksTime::new(480),
    }
  }

  #[test]
  pub fn remove_track_inverse_restores_snapshot() {
    let mut song = song_with_bass();
    song
      .apply(&Mutation::InsertNotes {
        track: "Bass".to_string(),
        notes: vec![note(1, 40, 0)],
      })
      .unwrap();
    let before = song.tracks().to_vec();
    let inverse = song
      .apply(&Mutation::RemoveTrack {
        name: "Bass".to_string(),
      })
      .unwrap();
    assert!(song.tracks().is_empty());
    song.apply(&inverse).unwrap();
    assert_eq!(song.tracks(), &before[..]);
  }

  #[test]
  pub fn duplicate_track_is_rejected() {
    let mut song = song_with_bass();
    let result = song.apply(&Mutation::InsertTrack {
      index: 1,
      track: Track::new("bass", 1, Instrument::Program(0)),
    });
    assert_eq!(
      result,
      Err(SongError::DuplicateTrack {
        name: "bass".to_string()
      })
    );
    assert_eq!(song.tracks().len(), 1);
  }

  #[test]
  pub fn remove_notes_validates_before_mutating() {
    let mut song = song_with_bass();
    song
      .apply(&Mutation::InsertNotes {
        track: "Bass".to_string(),
        notes: vec![note(1, 40, 0)],
      })
      .unwrap();
    let result = song.apply(&Mutation::RemoveNotes {
      track: "Bass".to_string(),
      ids: vec![NoteId::new(1), NoteId::new(2)],
    });
    assert!(result.is_err());
    assert_eq!(song.note_count(), 1);
  }

  #[test]
  pub fn set_velocities_inverse() {
    let mut song = song_with_bass();
    song
      .apply(&Mutation::InsertNotes {
        track: "Bass".to_string(),
        notes: vec![note(1, 40, 0), note(2, 43, 480)],
      })
      .unwrap();
    let inverse = song
      .apply(&Mutation::SetVelocities {
        track: "Bass".to_string(),
        changes: vec![(NoteId::new(1), 10), (NoteId::new(2), 20)],
      })
      .unwrap();
    song.apply(&inverse).unwrap();
    let velocities: Vec<u8> = song.tracks()[0].notes().iter().map(|n| n.velocity).collect();
    assert_eq!(velocities, vec![90, 90]);
  }

  #[test]
  pub fn tempo_and_markers() {
    let mut song = song_with_bass();
    let tick = TicksTime::new(1920);
    let inverse = song
      .apply(&Mutation::SetTempo {
        tick,
        tempo: Tempo::new(90.0),
      })
      .unwrap();
    assert_eq!(inverse, Mutation::SetTempo { tick, tempo: None });
    song.apply(&inverse).unwrap();
    assert_eq!(song.tempos().entries().len(), 1);

    let inverse = song
      .apply(&Mutation::InsertMarker {
        index: 0,
        marker: Marker::new(tick, "chorus"),
      })
      .unwrap();
    assert_eq!(song.marker("chorus").map(|m| m.tick), Some(tick));
    song.apply(&inverse).unwrap();
    assert!(song.markers().is_empty());
  }

  #[test]
  pub fn update_notes_moves_and_restores() {
    let mut song = song_with_bass();
    song
      .apply(&Mutation::InsertNotes {
        track: "Bass".to_string(),
        notes: vec![note(1, 40, 0), note(2, 43, 480)],
      })
      .unwrap();
    let before = song.tracks()[0].notes().clone();
    let inverse = song
      .apply(&Mutation::UpdateNotes {
        track: "Bass".to_string(),
        notes: vec![note(1, 45, 1920)],
      })
      .unwrap();
    let starts: Vec<u64> = song.tracks()[0].notes().iter().map(|n| u64::from(n.start)).collect();
    assert_eq!(starts, vec![480, 1920]);
    song.apply(&inverse).unwrap();
    assert_eq!(song.tracks()[0].notes(), &before);
  }

  #[test]
  pub fn update_notes_validates_before_mutating() {
    let mut song = song_with_bass();
    song
      .apply(&Mutation::InsertNotes {
        track: "Bass".to_string(),
        notes: vec![note(1, 40, 0)],
      })
      .unwrap();
    let result = song.apply(&Mutation::UpdateNotes {
      track: "Bass".to_string(),
      notes: vec![note(1, 41, 0), note(9, 41, 0)],
    });
    assert!(result.is_err());
    assert_eq!(song.tracks()[0].notes().iter().next().map(|n| n.key), Some(40));
  }

  #[test]
  pub fn notes_ending_past_the_last_tick_are_rejected() {
    let mut song = song_with_bass();
    let result = song.apply(&Mutation::InsertNotes {
      track: "Bass".to_string(),
      notes: vec![note(1, 40, u64::max_value() - 100)],
    });
    assert_eq!(
      result,
      Err(SongError::TickOverflow {
        track: "Bass".to_string()
      })
    );
    assert_eq!(song.note_count(), 0);
  }

  #[test]
  pub fn set_key_inverse() {
    let mut song = song_with_bass();
    let tick = TicksTime::zero();
    let key = KeySignature::parse("Dm");
    let inverse = song.apply(&Mutation::SetKey { tick, key }).unwrap();
    assert_eq!(inverse, Mutation::SetKey { tick, key: None });
    assert_eq!(song.keys().at(TicksTime::new(960)), key);
    song.apply(&inverse).unwrap();
    assert!(song.keys().entries().is_empty());
  }
}
