use std::fmt;

use failure::Fail;

pub mod chord;
pub mod executor;
pub mod parser;
pub mod pitch;
pub mod resolver;
pub mod velocity;

use crate::{
  history::HistoryError,
  midi::smf::SmfError,
  query::QueryError,
  session::SessionError,
  song::SongError,
  time::TimeError,
  tracker::TrackerError,
};

use self::{parser::ParseError, resolver::ResolveError};

/// Coarse classification reported to callers with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  MalformedOperation,
  UnresolvedReference,
  InvalidRange,
  InvalidValue,
  HistoryError,
  CodecError,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let name = match self {
      ErrorKind::MalformedOperation => "malformed operation",
      ErrorKind::UnresolvedReference => "unresolved reference",
      ErrorKind::InvalidRange => "invalid range",
      ErrorKind::InvalidValue => "invalid value",
      ErrorKind::HistoryError => "history",
      ErrorKind::CodecError => "codec",
    };
    write!(f, "{}", name)
  }
}

#[derive(Debug, Fail)]
pub enum OpError {
  #[fail(display = "{}", _0)]
  Time(#[cause] TimeError),

  #[fail(display = "{}", _0)]
  Parse(#[cause] ParseError),

  #[fail(display = "{}", _0)]
  Resolve(#[cause] ResolveError),

  #[fail(display = "{}", _0)]
  Song(#[cause] SongError),
  #[fail(display = "{}", _0)]
  History(#[cause] HistoryError),

  #[fail(display = "{}", _0)]
  Tracker(#[cause] TrackerError),

  #[fail(display = "{}", _0)]
  Smf(#[cause] SmfError),

  #[fail(display = "{}", _0)]
  Query(#[cause] QueryError),

  #[fail(display = "{}", _0)]
  Session(#[cause] SessionError),
}

pub type OpResult<T> = Result<T, OpError>;

impl OpError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      OpError::Time(TimeError::InvertedRange { .. }) => ErrorKind::InvalidRange,
      OpError::Time(_) | OpError::Parse(_) => ErrorKind::MalformedOperation,
      OpError::Resolve(err) => err.kind(),
      OpError::Song(SongError::DuplicateTrack { .. })
      | OpError::Song(SongError::TickOverflow { .. }) => ErrorKind::InvalidValue,
      OpError::Song(_) => ErrorKind::UnresolvedReference,
      OpError::History(_) => ErrorKind::HistoryError,
      OpError::Tracker(TrackerError::UnknownResolution { .. }) => ErrorKind::InvalidValue,
      OpError::Tracker(_) | OpError::Smf(_) => ErrorKind::CodecError,
      OpError::Query(_) | OpError::Session(_) => ErrorKind::MalformedOperation,
    }
  }
}

impl From<TimeError> for OpError {
  fn from(err: TimeError) -> Self {
    OpError::Time(err)
  }
}

impl From<ParseError> for OpError {
  fn from(err: ParseError) -> Self {
    OpError::Parse(err)
  }
}

impl From<ResolveError> for OpError {
  fn from(err: ResolveError) -> Self {
    OpError::Resolve(err)
  }
}

impl From<SongError> for OpError {
  fn from(err: SongError) -> Self {
    OpError::Song(err)
  }
}

impl From<HistoryError> for OpError {
  fn from(err: HistoryError) -> Self {
    OpError::History(err)
  }
}

impl From<TrackerError> for OpError {
  fn from(err: TrackerError) -> Self {
    OpError::Tracker(err)
  }
}

impl From<SmfError> for OpError {
  fn from(err: SmfError) -> Self {
    OpError::Smf(err)
  }
}

impl From<QueryError> for OpError {
  fn from(err: QueryError) -> Self {
    OpError::Query(err)
  }
}

impl From<SessionError> for OpError {
  fn from(err: SessionError) -> Self {
    OpError::Session(err)
  }
}
