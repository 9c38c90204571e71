use std::io::{self, BufRead, Write};

use log::{debug, info, warn};

use failure::{Error, Fail};

use composer_core::config::Config;

mod controller;
use crate::controller::Controller;

mod protocol;
use crate::protocol::{Request, RequestReader};

const COMPOSER_CONFIG: &str = "COMPOSER_CONFIG";
const DEFAULT_COMPOSER_CONFIG: &str = "composer.toml";

const COMPOSER_LOG_CONFIG: &str = "COMPOSER_LOG_CONFIG";
const DEFAULT_COMPOSER_LOG_CONFIG: &str = "log4rs.yaml";

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },
}

fn main() -> Result<(), Error> {
  init_logging()?;

  let config = init_config()?;

  let controller = Controller::new(config)?;

  serve(&controller)?;

  controller.stop()?;

  Ok(())
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(COMPOSER_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_COMPOSER_LOG_CONFIG.to_string());

  log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
    MainError::LoggingInit {
      cause: err.to_string(),
    }
  })?;

  Ok(())
}

fn init_config() -> Result<Config, Error> {
  let config_path =
    std::env::var(COMPOSER_CONFIG).unwrap_or_else(|_| DEFAULT_COMPOSER_CONFIG.to_string());

  let config = if std::path::Path::new(&config_path).exists() {
    info!("Loading configuration from {} ...", config_path);
    Config::from_file(config_path.as_str())?
  } else {
    warn!("No configuration at {}, using defaults", config_path);
    Config::default()
  };
  debug!("{:#?}", config);

  Ok(config)
}

/// Reads requests from stdin and writes each reply to stdout, followed by an empty line.
fn serve(controller: &Controller) -> Result<(), Error> {
  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = stdout.lock();
  let mut reader = RequestReader::new();

  for line in stdin.lock().lines() {
    let reply = match reader.feed(&line?) {
      None => continue,
      Some(Ok(Request::Quit)) => break,
      Some(Ok(request)) => controller.request(request)?,
      Some(Err(err)) => format!("! {}", err),
    };
    writeln!(out, "{}\n", reply)?;
    out.flush()?;
  }

  if reader.in_batch() {
    warn!("Input ended inside an unterminated batch");
  }
  Ok(())
}
