use std::{
  fmt,
  path::{Path, PathBuf},
};

use failure::Fail;
use log::{info, warn};
use uuid::Uuid;

use crate::{
  config::Config,
  help,
  history::History,
  midi::smf,
  ops::{
    executor::apply_line,
    parser::{is_block_end, is_block_start, parse_arguments, ParseError},
    OpError, OpResult,
  },
  query::{run_query, QueryContext},
  song::Song,
  time::{Signature, Tempo},
};

#[derive(Debug, Fail, PartialEq)]
pub enum SessionError {
  #[fail(display = "Unknown session action '{}', try: {}", action, known)]
  UnknownAction { action: String, known: String },

  #[fail(display = "Usage: {}", usage)]
  Usage { usage: String },

  #[fail(display = "No file to save to, use 'save PATH'")]
  NoPath,

  #[fail(display = "Invalid {} '{}'", key, value)]
  InvalidSetting { key: String, value: String },
}

const ACTIONS: [(&str, &str); 7] = [
  ("new", "new [TITLE] [tempo:BPM] [time-sig:N/D] [ppqn:N]"),
  ("open", "open PATH"),
  ("save", "save [PATH|as:PATH]"),
  ("checkpoint", "checkpoint NAME"),
  ("undo", "undo [to:NAME]"),
  ("redo", "redo"),
  ("restore", "restore NAME"),
];

pub fn session_actions() -> impl Iterator<Item = &'static str> {
  ACTIONS.iter().map(|(_, usage)| *usage)
}

fn usage(action: &str) -> SessionError {
  SessionError::Usage {
    usage: ACTIONS
      .iter()
      .find(|(name, _)| *name == action)
      .map(|(_, usage)| usage.to_string())
      .unwrap_or_default(),
  }
}

/// Result of one line of a batch. `line` is 1-based.
#[derive(Debug)]
pub struct LineOutcome {
  pub line: usize,
  pub result: OpResult<String>,
}

impl LineOutcome {
  pub fn is_ok(&self) -> bool {
    self.result.is_ok()
  }
}

impl fmt::Display for LineOutcome {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.result {
      Ok(message) => write!(f, "+ {}", message),
      Err(err) => write!(f, "! line {}: {} [{}]", self.line, err, err.kind()),
    }
  }
}

/// One composition with its history. Several sessions may live in the same process.
pub struct Session {
  id: Uuid,
  config: Config,
  song: Song,
  history: History,
  path: Option<PathBuf>,
}

impl Session {
  pub fn new(config: Config) -> Session {
    let song = Session::default_song(&config);
    let session = Session {
      id: Uuid::new_v4(),
      config,
      song,
      history: History::new(),
      path: None,
    };
    info!("Session {} started", session.id);
    session
  }

  fn default_song(config: &Config) -> Song {
    let tempo = Tempo::new(config.session.tempo).unwrap_or_else(|| {
      warn!("Ignoring configured tempo {}", config.session.tempo);
      Tempo::default()
    });
    let signature = Signature::parse(&config.session.time_signature).unwrap_or_else(|| {
      warn!(
        "Ignoring configured time signature {}",
        config.session.time_signature
      );
      Signature::default()
    });
    Song::new(
      config.session.title.as_str(),
      config.session.ppqn.max(1),
      tempo,
      signature,
    )
  }

  pub fn get_id(&self) -> &Uuid {
    &self.id
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn song(&self) -> &Song {
    &self.song
  }

  pub fn history(&self) -> &History {
    &self.history
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_ref().map(PathBuf::as_path)
  }

  /// Runs a batch. Every line commits on its own, so a failing line leaves the others applied.
  /// `tracker TRACK import ...` opens a block that runs until `tracker end`.
  pub fn apply<S: AsRef<str>>(&mut self, lines: &[S]) -> Vec<LineOutcome> {
    let mut outcomes = Vec::new();
    let mut index = 0;
    while index < lines.len() {
      let number = index + 1;
      let line = lines[index].as_ref().trim();
      index += 1;
      if line.is_empty() || line.starts_with('#') {
        continue;
      }

      let result = if is_block_start(line) {
        let end = lines[index..]
          .iter()
          .position(|row| is_block_end(row.as_ref()))
          .map(|offset| index + offset);
        match end {
          Some(end) => {
            let block: Vec<&str> = lines[index..end].iter().map(|row| row.as_ref()).collect();
            index = end + 1;
            self.apply_line(line, Some(&block.join("\n")))
          }
          None => {
            index = lines.len();
            Err(
              ParseError::UnterminatedBlock {
                header: line.to_string(),
              }
              .into(),
            )
          }
        }
      } else if is_block_end(line) {
        Err(
          ParseError::UnexpectedArgument {
            token: line.to_string(),
          }
          .into(),
        )
      } else {
        self.apply_line(line, None)
      };

      if let Err(err) = &result {
        warn!("Line {} '{}' failed: {}", number, line, err);
      }
      outcomes.push(LineOutcome { line: number, result });
    }
    outcomes
  }

  fn apply_line(&mut self, line: &str, block: Option<&str>) -> OpResult<String> {
    apply_line(line, block, &mut self.song, &mut self.history, &self.config)
  }

  /// Read-only view. Failures come back as `! message`.
  pub fn query(&self, text: &str) -> String {
    let ctx = QueryContext {
      song: &self.song,
      history: &self.history,
      config: &self.config,
      id: &self.id,
      path: self.path(),
    };
    run_query(text, &ctx).unwrap_or_else(|err| format!("! {}", err))
  }

  /// Session lifecycle and history navigation, answered with `+ message` or `! message`.
  pub fn session(&mut self, text: &str) -> String {
    match self.run_action(text) {
      Ok(message) => format!("+ {}", message),
      Err(err) => {
        warn!("Session action '{}' failed: {}", text, err);
        format!("! {}", err)
      }
    }
  }

  pub fn help(&self) -> String {
    help::reference_card()
  }

  fn run_action(&mut self, text: &str) -> OpResult<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let (action, rest) = match tokens.split_first() {
      Some((action, rest)) => (action.to_lowercase(), rest),
      None => (String::new(), &[][..]),
    };

    match action.as_str() {
      "new" => {
        let args = parse_arguments(rest, &["title"])?;
        let mut config = self.config.clone();
        if let Some(title) = args.get("title") {
          config.session.title = title.clone();
        }
        if let Some(tempo) = args.get("tempo") {
          config.session.tempo = tempo
            .parse::<f64>()
            .ok()
            .and_then(Tempo::new)
            .map(f64::from)
            .ok_or_else(|| invalid_setting("tempo", tempo))?;
        }
        if let Some(signature) = args.get("time-sig") {
          Signature::parse(signature).ok_or_else(|| invalid_setting("time-sig", signature))?;
          config.session.time_signature = signature.clone();
        }
        if let Some(ppqn) = args.get("ppqn") {
          config.session.ppqn = ppqn
            .parse::<u32>()
            .ok()
            .filter(|ppqn| *ppqn > 0)
            .ok_or_else(|| invalid_setting("ppqn", ppqn))?;
        }
        self.song = Session::default_song(&config);
        self.history = History::new();
        self.path = None;
        self.id = Uuid::new_v4();
        info!("Session {} started: {}", self.id, self.song.get_title());
        Ok(format!(
          "new session '{}' ({} BPM, {}, ppqn {})",
          self.song.get_title(),
          config.session.tempo,
          config.session.time_signature,
          self.song.get_ppqn()
        ))
      }

      "open" => {
        let path = PathBuf::from(*rest.first().ok_or_else(|| usage("open"))?);
        let song = smf::open(&path)?;
        let summary = format!(
          "opened {} ({} tracks, {} notes)",
          path.display(),
          song.tracks().len(),
          song.note_count()
        );
        self.song = song;
        self.history = History::new();
        self.path = Some(path);
        Ok(summary)
      }

      "save" => {
        let args = parse_arguments(rest, &["path"])?;
        let path = match args.get("as").or_else(|| args.get("path")) {
          Some(path) => PathBuf::from(path),
          None => self.path.clone().ok_or(SessionError::NoPath)?,
        };
        smf::save(&self.song, &path)?;
        let message = format!("saved {} at version {}", path.display(), self.history.version());
        self.path = Some(path);
        Ok(message)
      }

      "checkpoint" => {
        let label = rest.first().ok_or_else(|| usage("checkpoint"))?;
        let version = self.history.checkpoint(label);
        Ok(format!("checkpoint '{}' at version {}", label, version))
      }

      "undo" => {
        let args = parse_arguments(rest, &[])?;
        match args.get("to") {
          Some(label) => {
            let version = self.history.undo_to(&mut self.song, label)?;
            Ok(format!("undone to '{}' (version {})", label, version))
          }
          None => {
            let description = self.history.undo(&mut self.song)?.get_description().to_string();
            Ok(format!(
              "undone: {} (version {})",
              description,
              self.history.version()
            ))
          }
        }
      }

      "redo" => {
        let description = self.history.redo(&mut self.song)?.get_description().to_string();
        Ok(format!(
          "redone: {} (version {})",
          description,
          self.history.version()
        ))
      }

      "restore" => {
        let label = rest.first().ok_or_else(|| usage("restore"))?;
        let version = self.history.restore(&mut self.song, label)?;
        Ok(format!("restored '{}' (version {})", label, version))
      }

      _ => {
        let known: Vec<&str> = ACTIONS.iter().map(|(name, _)| *name).collect();
        Err(
          SessionError::UnknownAction {
            action: action.to_string(),
            known: known.join(", "),
          }
          .into(),
        )
      }
    }
  }
}

fn invalid_setting(key: &str, value: &str) -> OpError {
  SessionError::InvalidSetting {
    key: key.to_string(),
    value: value.to_string(),
  }
  .into()
}
