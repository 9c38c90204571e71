use std::collections::BTreeMap;

use failure::Fail;
use log::debug;

use crate::song::{Change, Mutation, Song, SongError};

#[derive(Debug, Fail, PartialEq)]
pub enum HistoryError {
  #[fail(display = "Nothing to undo")]
  NothingToUndo,

  #[fail(display = "Nothing to redo")]
  NothingToRedo,

  #[fail(display = "Unknown checkpoint '{}'", label)]
  UnknownCheckpoint { label: String },

  #[fail(
    display = "Checkpoint '{}' (version {}) was on a branch discarded by a later change",
    label, version
  )]
  CheckpointUnreachable { label: String, version: u64 },

  #[fail(display = "{}", cause)]
  Rejected { cause: SongError },
}

pub type HistoryResult<T> = Result<T, HistoryError>;

impl From<SongError> for HistoryError {
  fn from(cause: SongError) -> Self {
    HistoryError::Rejected { cause }
  }
}

/// A committed change: the mutation that made it and the mutation that reverts it.
#[derive(Debug, Clone)]
pub struct Event {
  serial: u64,
  version: u64,
  description: String,
  forward: Mutation,
  inverse: Mutation,
}

impl Event {
  pub fn get_serial(&self) -> u64 {
    self.serial
  }

  /// Version of the song right after this event was applied.
  pub fn get_version(&self) -> u64 {
    self.version
  }

  pub fn get_description(&self) -> &str {
    self.description.as_str()
  }

  pub fn forward(&self) -> &Mutation {
    &self.forward
  }

  pub fn inverse(&self) -> &Mutation {
    &self.inverse
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
  version: u64,
  // serial of the event that produced `version`, none for the empty song
  serial: Option<u64>,
}

impl Checkpoint {
  pub fn get_version(&self) -> u64 {
    self.version
  }
}

/// Linear undo/redo history. The song version always equals the number of applied events.
#[derive(Debug, Default)]
pub struct History {
  done: Vec<Event>,
  undone: Vec<Event>,
  checkpoints: BTreeMap<String, Checkpoint>,
  next_serial: u64,
}

impl History {
  pub fn new() -> History {
    History::default()
  }

  pub fn version(&self) -> u64 {
    self.done.len() as u64
  }

  pub fn can_undo(&self) -> bool {
    !self.done.is_empty()
  }

  pub fn can_redo(&self) -> bool {
    !self.undone.is_empty()
  }

  /// Applies the change to the song and records it, discarding anything that could be redone.
  pub fn commit(&mut self, song: &mut Song, change: Change) -> HistoryResult<u64> {
    let inverse = song.apply(&change.mutation)?;
    let version = self.version() + 1;
    self.next_serial += 1;
    if !self.undone.is_empty() {
      debug!("Discarding {} undone event(s)", self.undone.len());
      self.undone.clear();
    }
    debug!("v{}: {}", version, change.description);
    self.done.push(Event {
      serial: self.next_serial,
      version,
      description: change.description,
      forward: change.mutation,
      inverse,
    });
    song.set_version(version);
    Ok(version)
  }

  pub fn undo(&mut self, song: &mut Song) -> HistoryResult<&Event> {
    let event = self.done.pop().ok_or(HistoryError::NothingToUndo)?;
    if let Err(err) = song.apply(&event.inverse) {
      self.done.push(event);
      return Err(err.into());
    }
    debug!("Undo v{}: {}", event.version, event.description);
    song.set_version(self.version());
    self.undone.push(event);
    self.undone.last().ok_or(HistoryError::NothingToUndo)
  }

  pub fn redo(&mut self, song: &mut Song) -> HistoryResult<&Event> {
    let mut event = self.undone.pop().ok_or(HistoryError::NothingToRedo)?;
    match song.apply(&event.forward) {
      Ok(inverse) => event.inverse = inverse,
      Err(err) => {
        self.undone.push(event);
        return Err(err.into());
      }
    }
    debug!("Redo v{}: {}", event.version, event.description);
    self.done.push(event);
    song.set_version(self.version());
    self.done.last().ok_or(HistoryError::NothingToRedo)
  }

  /// Names the current version. Re-using a label moves it.
  pub fn checkpoint(&mut self, label: &str) -> u64 {
    let checkpoint = Checkpoint {
      version: self.version(),
      serial: self.done.last().map(|event| event.serial),
    };
    debug!("Checkpoint '{}' at v{}", label, checkpoint.version);
    self.checkpoints.insert(label.to_string(), checkpoint);
    checkpoint.version
  }

  pub fn checkpoints(&self) -> impl Iterator<Item = (&str, &Checkpoint)> {
    self
      .checkpoints
      .iter()
      .map(|(label, checkpoint)| (label.as_str(), checkpoint))
  }

  /// Undoes or redoes until the song is back at the checkpoint's version.
  pub fn restore(&mut self, song: &mut Song, label: &str) -> HistoryResult<u64> {
    let checkpoint = *self
      .checkpoints
      .get(label)
      .ok_or_else(|| HistoryError::UnknownCheckpoint {
        label: label.to_string(),
      })?;

    if !self.is_reachable(&checkpoint) {
      return Err(HistoryError::CheckpointUnreachable {
        label: label.to_string(),
        version: checkpoint.version,
      });
    }

    while self.version() > checkpoint.version {
      self.undo(song)?;
    }
    while self.version() < checkpoint.version {
      self.redo(song)?;
    }
    Ok(self.version())
  }

  /// Undoes until the version of a checkpoint, which must not be ahead of the current one.
  pub fn undo_to(&mut self, song: &mut Song, label: &str) -> HistoryResult<u64> {
    let checkpoint = *self
      .checkpoints
      .get(label)
      .ok_or_else(|| HistoryError::UnknownCheckpoint {
        label: label.to_string(),
      })?;
    if checkpoint.version > self.version() || !self.is_reachable(&checkpoint) {
      return Err(HistoryError::CheckpointUnreachable {
        label: label.to_string(),
        version: checkpoint.version,
      });
    }
    while self.version() > checkpoint.version {
      self.undo(song)?;
    }
    Ok(self.version())
  }

  pub fn redo_depth(&self) -> usize {
    self.undone.len()
  }

  /// Most recent applied events, newest first.
  pub fn recent(&self, count: usize) -> impl Iterator<Item = &Event> {
    self.done.iter().rev().take(count)
  }

  fn is_reachable(&self, checkpoint: &Checkpoint) -> bool {
    if checkpoint.version == 0 {
      return true;
    }
    let index = (checkpoint.version - 1) as usize;
    let event = if index < self.done.len() {
      self.done.get(index)
    } else {
      // `undone` is a stack, the next event to redo is last
      let offset = index - self.done.len();
      self
        .undone
        .len()
        .checked_sub(offset + 1)
        .and_then(|position| self.undone.get(position))
    };
    event.map(|event| Some(event.serial)) == Some(checkpoint.serial)
  }
}
