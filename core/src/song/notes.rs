use std::collections::{BTreeMap, HashMap};

use crate::{
  midi::U7,
  time::{TickRange, TicksTime},
};

pub type Key = U7;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct NoteId(u64);

impl NoteId {
  pub fn new(id: u64) -> NoteId {
    NoteId(id)
  }

  pub fn get_value(&self) -> u64 {
    self.0
  }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Note {
  pub id: NoteId,
  pub key: Key,
  pub velocity: U7,
  pub start: TicksTime,
  pub length: TicksTime,
}

impl Note {
  pub fn end(&self) -> TicksTime {
    self.start + self.length
  }
}

/// The notes of a track indexed by start tick. Notes sharing a start tick are kept in
/// (key, id) order so iteration is always tick ascending then pitch ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesClip {
  notes: BTreeMap<TicksTime, Vec<Note>>,
  index: HashMap<NoteId, TicksTime>,
}

impl NotesClip {
  pub fn new() -> NotesClip {
    NotesClip::default()
  }

  pub fn len(&self) -> usize {
    self.index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }

  pub fn contains(&self, id: NoteId) -> bool {
    self.index.contains_key(&id)
  }

  pub fn get(&self, id: NoteId) -> Option<&Note> {
    let start = self.index.get(&id)?;
    self.notes.get(start)?.iter().find(|note| note.id == id)
  }

  pub fn add_note(&mut self, note: Note) -> &mut Self {
    if let Some(previous) = self.index.insert(note.id, note.start) {
      self.remove_from_tick(previous, note.id);
    }
    let tick_notes = self.notes.entry(note.start).or_insert_with(Vec::new);
    let position = tick_notes
      .iter()
      .position(|other| (other.key, other.id) > (note.key, note.id))
      .unwrap_or_else(|| tick_notes.len());
    tick_notes.insert(position, note);
    self
  }

  pub fn add_notes(&mut self, notes: Vec<Note>) -> &mut Self {
    notes.into_iter().for_each(|note| {
      self.add_note(note);
    });
    self
  }

  pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
    let start = self.index.remove(&id)?;
    self.remove_from_tick(start, id)
  }

  /// Replaces the note with the same id, moving it when its start changed. Returns the previous
  /// version, or `None` (leaving the clip untouched) when there is no such note.
  pub fn replace_note(&mut self, note: Note) -> Option<Note> {
    let previous = *self.get(note.id)?;
    self.add_note(note);
    Some(previous)
  }

  /// Overwrites the velocity of a note, returning the previous one.
  pub fn set_velocity(&mut self, id: NoteId, velocity: U7) -> Option<U7> {
    let start = self.index.get(&id)?;
    let note = self
      .notes
      .get_mut(start)?
      .iter_mut()
      .find(|note| note.id == id)?;
    let previous = note.velocity;
    note.velocity = velocity;
    Some(previous)
  }

  pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Note> + 'a {
    self.notes.values().flat_map(|tick_notes| tick_notes.iter())
  }

  /// Notes whose start tick lies in `[range.start, range.end)`.
  pub fn starting_in<'a>(&'a self, range: TickRange) -> impl Iterator<Item = &'a Note> + 'a {
    self
      .notes
      .range(range.start..range.end)
      .flat_map(|(_tick, tick_notes)| tick_notes.iter())
  }

  /// Notes sounding at some point of `[range_start, range_end)`.
  pub fn notes_range<'a>(
    &'a self,
    range_start: TicksTime,
    range_end: TicksTime,
  ) -> impl Iterator<Item = &'a Note> + 'a {
    self
      .notes
      .range(..range_end)
      .flat_map(|(_tick, tick_notes)| tick_notes.iter())
      .filter(move |note| note.end() > range_start)
  }

  pub fn first_start(&self) -> Option<TicksTime> {
    self.notes.keys().next().cloned()
  }

  pub fn last_end(&self) -> Option<TicksTime> {
    self.iter().map(Note::end).max()
  }

  fn remove_from_tick(&mut self, tick: TicksTime, id: NoteId) -> Option<Note> {
    let tick_notes = self.notes.get_mut(&tick)?;
    let position = tick_notes.iter().position(|note| note.id == id)?;
    let note = tick_notes.remove(position);
    if tick_notes.is_empty() {
      self.notes.remove(&tick);
    }
    Some(note)
  }
}
