use failure::Fail;

pub mod marker;
pub mod mutation;
pub mod notes;
pub mod primitives;
pub mod track;

use crate::{
  midi::U4,
  time::{KeyMap, Ppqn, Signature, SignatureMap, Tempo, TempoMap, TicksTime},
};

use self::{
  marker::Marker,
  notes::NoteId,
  track::{Track, PERCUSSION_CHANNEL},
};

pub use self::mutation::Mutation;
pub use self::primitives::Change;

#[derive(Debug, Fail, PartialEq)]
pub enum SongError {
  #[fail(display = "Track '{}' not found", name)]
  TrackNotFound { name: String },

  #[fail(display = "A track named '{}' already exists", name)]
  DuplicateTrack { name: String },

  #[fail(display = "Note #{} not found on track '{}'", id, track)]
  NoteNotFound { track: String, id: u64 },

  #[fail(display = "Marker '{}' not found", label)]
  MarkerNotFound { label: String },

  #[fail(display = "No marker at index {}", index)]
  MarkerIndex { index: usize },

  #[fail(display = "A note on track '{}' would end past the last representable tick", track)]
  TickOverflow { track: String },
}

pub type SongResult<T> = Result<T, SongError>;

/// The composition: tracks, markers and the tempo/signature maps at a given version.
#[derive(Debug, Clone)]
pub struct Song {
  title: String,
  ppqn: Ppqn,

  signatures: SignatureMap,
  tempos: TempoMap,
  keys: KeyMap,

  tracks: Vec<Track>,
  markers: Vec<Marker>,

  version: u64,
  next_note_id: u64,
}

impl Song {
  pub fn new<T>(title: T, ppqn: Ppqn, tempo: Tempo, signature: Signature) -> Song
  where
    T: Into<String>,
  {
    Song {
      title: title.into(),
      ppqn,
      signatures: SignatureMap::new(signature),
      tempos: TempoMap::new(tempo),
      keys: KeyMap::new(),
      tracks: Vec::new(),
      markers: Vec::new(),
      version: 0,
      next_note_id: 1,
    }
  }

  pub fn get_title(&self) -> &str {
    self.title.as_str()
  }

  pub(crate) fn set_title<T>(&mut self, title: T) -> String
  where
    T: Into<String>,
  {
    std::mem::replace(&mut self.title, title.into())
  }

  pub fn get_ppqn(&self) -> Ppqn {
    self.ppqn
  }

  pub fn signatures(&self) -> &SignatureMap {
    &self.signatures
  }

  pub(crate) fn signatures_mut(&mut self) -> &mut SignatureMap {
    &mut self.signatures
  }

  pub fn tempos(&self) -> &TempoMap {
    &self.tempos
  }

  pub(crate) fn tempos_mut(&mut self) -> &mut TempoMap {
    &mut self.tempos
  }

  pub fn keys(&self) -> &KeyMap {
    &self.keys
  }

  pub(crate) fn keys_mut(&mut self) -> &mut KeyMap {
    &mut self.keys
  }

  pub fn tracks(&self) -> &[Track] {
    &self.tracks
  }

  pub(crate) fn tracks_mut(&mut self) -> &mut Vec<Track> {
    &mut self.tracks
  }

  /// Track names are matched case-insensitively.
  pub fn track_index(&self, name: &str) -> Option<usize> {
    self
      .tracks
      .iter()
      .position(|track| track.get_name().eq_ignore_ascii_case(name))
  }

  pub fn track(&self, name: &str) -> Option<&Track> {
    self.track_index(name).map(|index| &self.tracks[index])
  }

  pub(crate) fn track_mut(&mut self, name: &str) -> SongResult<&mut Track> {
    match self.track_index(name) {
      Some(index) => Ok(&mut self.tracks[index]),
      None => Err(SongError::TrackNotFound {
        name: name.to_string(),
      }),
    }
  }

  pub fn markers(&self) -> &[Marker] {
    &self.markers
  }

  pub(crate) fn markers_mut(&mut self) -> &mut Vec<Marker> {
    &mut self.markers
  }

  pub fn marker(&self, label: &str) -> Option<&Marker> {
    self.markers.iter().find(|marker| marker.label == label)
  }

  pub fn get_version(&self) -> u64 {
    self.version
  }

  pub(crate) fn set_version(&mut self, version: u64) {
    self.version = version;
  }

  pub(crate) fn allocate_note_id(&mut self) -> NoteId {
    let id = NoteId::new(self.next_note_id);
    self.next_note_id += 1;
    id
  }

  /// Lowest channel not used by any track, skipping the percussion channel.
  pub fn next_free_channel(&self) -> Option<U4> {
    (0..16u8)
      .filter(|channel| *channel != PERCUSSION_CHANNEL)
      .find(|channel| self.tracks.iter().all(|track| track.get_channel() != *channel))
  }

  pub fn note_count(&self) -> usize {
    self.tracks.iter().map(|track| track.notes().len()).sum()
  }

  /// Tick where the last note ends, or zero for an empty song.
  pub fn end_tick(&self) -> TicksTime {
    self
      .tracks
      .iter()
      .filter_map(|track| track.notes().last_end())
      .max()
      .unwrap_or_else(TicksTime::zero)
  }
}

#[cfg(test)]
mod test {

  use super::{
    track::{Instrument, Track},
    Song,
  };
  use crate::time::{Signature, Tempo};

  pub fn song() -> Song {
    Song::new("Untitled", 480, Tempo::default(), Signature::default())
  }

  #[test]
  pub fn new() {
    let song = song();
    assert_eq!(song.get_title(), "Untitled");
    assert_eq!(song.get_ppqn(), 480);
    assert_eq!(song.get_version(), 0);
    assert!(song.tracks().is_empty());
  }

  #[test]
  pub fn track_lookup_ignores_case() {
    let mut song = song();
    song
      .tracks_mut()
      .push(Track::new("Bass", 0, Instrument::Program(33)));
    assert_eq!(song.track_index("bass"), Some(0));
    assert!(song.track("Keys").is_none());
  }

  #[test]
  pub fn next_free_channel_skips_percussion() {
    let mut song = song();
    for channel in 0..9 {
      song
        .tracks_mut()
        .push(Track::new(format!("T{}", channel), channel, Instrument::Program(0)));
    }
    assert_eq!(song.next_free_channel(), Some(10));
  }
}
