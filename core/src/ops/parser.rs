use std::collections::BTreeMap;

use failure::Fail;
use log::trace;

#[derive(Debug, Fail, PartialEq)]
pub enum ParseError {
  #[fail(display = "Empty operation")]
  EmptyOperation,

  #[fail(display = "Unknown verb '{}' (try 'help')", verb)]
  UnknownVerb { verb: String },

  #[fail(display = "Argument '{}' given more than once", key)]
  DuplicateArgument { key: String },

  #[fail(display = "Unexpected argument '{}'", token)]
  UnexpectedArgument { token: String },

  #[fail(display = "Malformed argument '{}'", token)]
  MalformedArgument { token: String },

  #[fail(display = "Missing argument '{}', usage: {}", key, usage)]
  MissingArgument { key: String, usage: String },

  #[fail(display = "Block '{}' is not closed by 'tracker end'", header)]
  UnterminatedBlock { header: String },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Prefixes that belong to a value rather than naming an argument, as in `midi:60`.
const VALUE_PREFIXES: [&str; 3] = ["midi", "tick", "ticks"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
  Track,
  Note,
  Chord,
  Remove,
  Velocity,
  Crescendo,
  Decrescendo,
  Copy,
  Move,
  Transpose,
  Quantize,
  Repeat,
  Tempo,
  TimeSig,
  KeySig,
  Marker,
  Unmark,
  Title,
  Program,
  Mute,
  Solo,
  Tracker,
}

impl Verb {
  pub const ALL: [Verb; 22] = [
    Verb::Track,
    Verb::Note,
    Verb::Chord,
    Verb::Remove,
    Verb::Velocity,
    Verb::Crescendo,
    Verb::Decrescendo,
    Verb::Copy,
    Verb::Move,
    Verb::Transpose,
    Verb::Quantize,
    Verb::Repeat,
    Verb::Tempo,
    Verb::TimeSig,
    Verb::KeySig,
    Verb::Marker,
    Verb::Unmark,
    Verb::Title,
    Verb::Program,
    Verb::Mute,
    Verb::Solo,
    Verb::Tracker,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Verb::Track => "track",
      Verb::Note => "note",
      Verb::Chord => "chord",
      Verb::Remove => "remove",
      Verb::Velocity => "velocity",
      Verb::Crescendo => "crescendo",
      Verb::Decrescendo => "decrescendo",
      Verb::Copy => "copy",
      Verb::Move => "move",
      Verb::Transpose => "transpose",
      Verb::Quantize => "quantize",
      Verb::Repeat => "repeat",
      Verb::Tempo => "tempo",
      Verb::TimeSig => "time-sig",
      Verb::KeySig => "key-sig",
      Verb::Marker => "marker",
      Verb::Unmark => "unmark",
      Verb::Title => "title",
      Verb::Program => "program",
      Verb::Mute => "mute",
      Verb::Solo => "solo",
      Verb::Tracker => "tracker",
    }
  }

  pub fn from_name(name: &str) -> Option<Verb> {
    Verb::ALL
      .iter()
      .find(|verb| verb.name().eq_ignore_ascii_case(name))
      .cloned()
  }

  /// Names given to positional arguments, in order.
  pub fn positional(self) -> &'static [&'static str] {
    match self {
      Verb::Track => &["action", "name", "kind"],
      Verb::Note => &["track", "pitch"],
      Verb::Chord => &["track", "chord"],
      Verb::Remove => &["track"],
      Verb::Velocity => &["track", "vel"],
      Verb::Crescendo | Verb::Decrescendo => &["track"],
      Verb::Copy | Verb::Move | Verb::Quantize | Verb::Repeat => &["track"],
      Verb::Transpose => &["track", "semitones"],
      Verb::Tempo => &["bpm"],
      Verb::TimeSig => &["signature"],
      Verb::KeySig => &["key"],
      Verb::Marker => &["label"],
      Verb::Unmark => &["label"],
      Verb::Title => &["title"],
      Verb::Program => &["track", "instrument"],
      Verb::Mute | Verb::Solo => &["track"],
      Verb::Tracker => &["track", "action"],
    }
  }

  pub fn usage(self) -> &'static str {
    match self {
      Verb::Track => "track add NAME [INSTRUMENT|drums] [instrument:NAME] [program:N] [ch:1-16] | track remove NAME",
      Verb::Note => "note TRACK PITCH at:POS [dur:DUR] [vel:VEL]",
      Verb::Chord => "chord TRACK SYMBOL at:POS [dur:DUR] [vel:VEL] [octave:N]",
      Verb::Remove => "remove TRACK [range:A-B] [pitch:PITCH]",
      Verb::Velocity => "velocity TRACK VEL [range:A-B] [pitch:PITCH]",
      Verb::Crescendo => "crescendo TRACK range:A-B [from:VEL] [to:VEL]",
      Verb::Decrescendo => "decrescendo TRACK range:A-B [from:VEL] [to:VEL]",
      Verb::Copy => "copy TRACK range:A-B to:POS [dest:TRACK] [transpose:N]",
      Verb::Move => "move TRACK to:POS [range:A-B] [pitch:PITCH]",
      Verb::Transpose => "transpose TRACK SEMITONES [range:A-B] [pitch:PITCH]",
      Verb::Quantize => "quantize TRACK [grid:DUR] [range:A-B] [pitch:PITCH]",
      Verb::Repeat => "repeat TRACK range:A-B [count:N] [to:POS]",
      Verb::Tempo => "tempo BPM [at:POS]",
      Verb::TimeSig => "time-sig N/D [at:BAR]",
      Verb::KeySig => "key-sig KEY[-MODE] [at:POS]",
      Verb::Marker => "marker LABEL at:POS",
      Verb::Unmark => "unmark LABEL",
      Verb::Title => "title TEXT",
      Verb::Program => "program TRACK INSTRUMENT",
      Verb::Mute => "mute TRACK",
      Verb::Solo => "solo TRACK",
      Verb::Tracker => "tracker TRACK import at:POS [res:RES] ... tracker end",
    }
  }
}

/// A tokenized operation: its verb and named arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOp {
  pub verb: Verb,
  pub args: BTreeMap<String, String>,
}

impl ParsedOp {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.args.get(key).map(String::as_str)
  }

  pub fn require(&self, key: &str) -> ParseResult<&str> {
    self.get(key).ok_or_else(|| ParseError::MissingArgument {
      key: key.to_string(),
      usage: self.verb.usage().to_string(),
    })
  }
}

/// Splits `key:value` at the first colon. Returns `None` for positional tokens.
pub fn split_key_value(token: &str) -> ParseResult<Option<(String, &str)>> {
  let index = match token.find(':') {
    Some(index) => index,
    None => return Ok(None),
  };
  let key = &token[..index];
  if key.is_empty() {
    return Err(ParseError::MalformedArgument {
      token: token.to_string(),
    });
  }
  let key = key.to_lowercase();
  if VALUE_PREFIXES.contains(&key.as_str())
    || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
  {
    return Ok(None);
  }
  Ok(Some((key, &token[index + 1..])))
}

/// Assigns tokens to argument names: explicit `key:value` pairs first-come, positionals in order.
pub fn parse_arguments(tokens: &[&str], positional: &[&str]) -> ParseResult<BTreeMap<String, String>> {
  let mut args = BTreeMap::new();
  let mut next_positional = 0;
  for token in tokens {
    let (key, value) = match split_key_value(token)? {
      Some((key, value)) => (key, value),
      None => {
        let name = positional
          .get(next_positional)
          .ok_or_else(|| ParseError::UnexpectedArgument {
            token: token.to_string(),
          })?;
        next_positional += 1;
        (name.to_string(), *token)
      }
    };
    if args.contains_key(&key) {
      return Err(ParseError::DuplicateArgument { key });
    }
    args.insert(key, value.to_string());
  }
  Ok(args)
}

pub fn parse_op(line: &str) -> ParseResult<ParsedOp> {
  let tokens: Vec<&str> = line.split_whitespace().collect();
  let (verb, rest) = match tokens.split_first() {
    Some((verb, rest)) => (*verb, rest),
    None => return Err(ParseError::EmptyOperation),
  };
  let verb = Verb::from_name(verb).ok_or_else(|| ParseError::UnknownVerb {
    verb: verb.to_string(),
  })?;
  let args = parse_arguments(rest, verb.positional())?;
  let op = ParsedOp { verb, args };
  trace!("Parsed {:?}", op);
  Ok(op)
}

/// Lines starting a tracker import block.
pub fn is_block_start(line: &str) -> bool {
  let tokens: Vec<&str> = line.split_whitespace().collect();
  tokens.len() >= 3
    && tokens[0].eq_ignore_ascii_case("tracker")
    && tokens[2].eq_ignore_ascii_case("import")
}

pub fn is_block_end(line: &str) -> bool {
  let tokens: Vec<&str> = line.split_whitespace().collect();
  tokens.len() == 2 && tokens[0].eq_ignore_ascii_case("tracker") && tokens[1].eq_ignore_ascii_case("end")
}
