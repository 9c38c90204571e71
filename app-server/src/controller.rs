use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use failure::Fail;
use log::{debug, info};

use composer_core::{config::Config, session::Session};

use crate::protocol::Request;

#[derive(Debug, Fail)]
pub enum ControllerError {
  #[fail(display = "Failed to create the Controller thread: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to join the Controller thread")]
  Stop,

  #[fail(display = "The Controller thread is gone")]
  Disconnected,
}

pub enum Protocol {
  Stop,

  Request {
    request: Request,
    reply_tx: Sender<String>,
  },
}

/// Owns the session. Requests run one at a time, so every reply sees a completed version.
struct ControllerThread {
  session: Session,
}

impl ControllerThread {
  fn new(config: Config) -> ControllerThread {
    ControllerThread {
      session: Session::new(config),
    }
  }

  pub fn handle_messages(&mut self, protocol_rx: Receiver<Protocol>) {
    for msg in protocol_rx.iter() {
      match msg {
        Protocol::Stop => break,

        Protocol::Request { request, reply_tx } => {
          debug!("Received {:?}", request);
          drop(reply_tx.send(self.handle_request(request)));
        }
      }
    }
  }

  fn handle_request(&mut self, request: Request) -> String {
    match request {
      Request::Apply(lines) => {
        let outcomes = self.session.apply(&lines[..]);
        let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
        let mut output: Vec<String> = outcomes.iter().map(ToString::to_string).collect();
        if outcomes.len() > 1 {
          output.push(format!(
            "= {} ok, {} failed, version {}",
            outcomes.len() - failed,
            failed,
            self.session.history().version()
          ));
        }
        output.join("\n")
      }
      Request::Query(query) => self.session.query(&query),
      Request::Session(action) => self.session.session(&action),
      Request::Help => self.session.help(),
      Request::Quit => String::new(),
    }
  }
}

pub struct Controller {
  handler: JoinHandle<()>,
  protocol_tx: Sender<Protocol>,
}

impl Controller {
  pub const CHANNEL_CAPACITY: usize = 1024;
  pub fn new_channel() -> (Sender<Protocol>, Receiver<Protocol>) {
    crossbeam_channel::bounded::<Protocol>(Self::CHANNEL_CAPACITY)
  }

  pub fn new(config: Config) -> Result<Controller, ControllerError> {
    info!("Starting Controller ...");

    let (protocol_tx, protocol_rx) = Self::new_channel();

    thread::Builder::new()
      .name("controller".into())
      .spawn(move || ControllerThread::new(config).handle_messages(protocol_rx))
      .map_err(|err| ControllerError::Start {
        cause: err.to_string(),
      })
      .map(|handler| Controller {
        handler,
        protocol_tx,
      })
  }

  /// Sends a request and waits for its reply.
  pub fn request(&self, request: Request) -> Result<String, ControllerError> {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
    self
      .protocol_tx
      .send(Protocol::Request { request, reply_tx })
      .map_err(|_| ControllerError::Disconnected)?;
    reply_rx.recv().map_err(|_| ControllerError::Disconnected)
  }

  pub fn stop(self) -> Result<(), ControllerError> {
    info!("Stopping Controller ...");

    self
      .protocol_tx
      .send(Protocol::Stop)
      .map_err(|_| ControllerError::Stop)
      .and_then(|()| self.handler.join().map_err(|_| ControllerError::Stop))
  }
}
