use std::fmt;

use crate::{
  midi::{gm, U4, U7},
  song::notes::NotesClip,
};

pub const PERCUSSION_CHANNEL: U4 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
  Program(U7),
  Percussion,
}

impl fmt::Display for Instrument {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Instrument::Program(program) => match gm::name_for(*program) {
        Some(name) => write!(f, "{}", name),
        None => write!(f, "program {}", program),
      },
      Instrument::Percussion => write!(f, "drums"),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
  name: String,
  channel: U4,
  instrument: Instrument,
  mute: bool,
  solo: bool,

  notes: NotesClip,
}

impl Track {
  pub fn new<T>(name: T, channel: U4, instrument: Instrument) -> Track
  where
    T: Into<String>,
  {
    Track {
      name: name.into(),
      channel,
      instrument,
      mute: false,
      solo: false,
      notes: NotesClip::new(),
    }
  }

  pub fn get_name(&self) -> &str {
    self.name.as_str()
  }

  pub fn get_channel(&self) -> U4 {
    self.channel
  }

  pub fn set_channel(&mut self, channel: U4) {
    self.channel = channel;
  }

  pub fn get_instrument(&self) -> Instrument {
    self.instrument
  }

  pub fn set_instrument(&mut self, instrument: Instrument) {
    self.instrument = instrument;
  }

  pub fn is_percussion(&self) -> bool {
    self.instrument == Instrument::Percussion
  }

  pub fn is_mute(&self) -> bool {
    self.mute
  }

  pub fn is_solo(&self) -> bool {
    self.solo
  }

  pub fn set_state(&mut self, mute: bool, solo: bool) {
    self.mute = mute;
    self.solo = solo;
  }

  pub fn notes(&self) -> &NotesClip {
    &self.notes
  }

  pub fn notes_mut(&mut self) -> &mut NotesClip {
    &mut self.notes
  }
}
