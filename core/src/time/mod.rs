use failure::Fail;

pub mod bars;
pub mod duration;
pub mod key;
pub mod range;
pub mod signature;
pub mod tempo;
pub mod ticks;

pub use self::bars::{resolve_position, BarsTime};
pub use self::duration::resolve_duration;
pub use self::key::{KeyMap, KeySignature};
pub use self::range::{resolve_range, TickRange};
pub use self::signature::{Signature, SignatureMap};
pub use self::tempo::{Tempo, TempoMap};
pub use self::ticks::TicksTime;

/// Pulses per quarter note.
pub type Ppqn = u32;

#[derive(Debug, Fail, PartialEq)]
pub enum TimeError {
  #[fail(display = "Malformed address '{}': {}", address, reason)]
  MalformedAddress { address: String, reason: String },

  #[fail(display = "Malformed range '{}': expected START-END", range)]
  MalformedRange { range: String },

  #[fail(display = "Inverted range '{}': the end must come after the start", range)]
  InvertedRange { range: String },

  #[fail(display = "Unknown duration '{}'", name)]
  UnknownDuration { name: String },
}

pub type TimeResult<T> = Result<T, TimeError>;
