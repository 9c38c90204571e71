use failure::Error;

use serde_derive::Deserialize;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;

use crate::{
  midi::U7,
  time::{ticks::DEFAULT_PPQN, tempo::DEFAULT_TEMPO, Ppqn},
};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Session {
  pub title: String,
  pub ppqn: Ppqn,
  pub tempo: f64,
  pub time_signature: String,
  pub velocity: U7,
  pub chord_octave: i32,
}

impl Default for Session {
  fn default() -> Session {
    Session {
      title: "Untitled".to_string(),
      ppqn: DEFAULT_PPQN,
      tempo: DEFAULT_TEMPO,
      time_signature: "4/4".to_string(),
      velocity: 80,
      chord_octave: 4,
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Tracker {
  pub max_combined_tracks: usize,
  pub resolution: String,
}

impl Default for Tracker {
  fn default() -> Tracker {
    Tracker {
      max_combined_tracks: 4,
      resolution: "16th".to_string(),
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  pub session: Session,
  pub tracker: Tracker,
  /// Instrument name to GM program overrides, consulted before the GM table.
  pub instruments: BTreeMap<String, U7>,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      session: Session::default(),
      tracker: Tracker::default(),
      instruments: BTreeMap::new(),
    }
  }
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

#[cfg(test)]
mod test {

  use super::Config;

  #[test]
  pub fn defaults() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.session.ppqn, 480);
    assert_eq!(config.tracker.max_combined_tracks, 4);
  }

  #[test]
  pub fn partial_sections() {
    let config = Config::from_str(
      r#"
      [session]
      ppqn = 960
      tempo = 92.5

      [tracker]
      max_combined_tracks = 2

      [instruments]
      "warm-pad" = 89
      "#,
    )
    .unwrap();
    assert_eq!(config.session.ppqn, 960);
    assert_eq!(config.session.tempo, 92.5);
    assert_eq!(config.session.time_signature, "4/4");
    assert_eq!(config.tracker.max_combined_tracks, 2);
    assert_eq!(config.tracker.resolution, "16th");
    assert_eq!(config.instruments.get("warm-pad"), Some(&89));
  }

  #[test]
  pub fn from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("composer.toml");
    std::fs::write(&path, "[session]\ntitle = \"Demo\"\n").unwrap();
    let config = Config::from_file(path.to_str().unwrap()).unwrap();
    assert_eq!(config.session.title, "Demo");
    assert!(Config::from_str("[session]\nppqn = \"x\"").is_err());
  }
}
