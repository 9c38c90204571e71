use failure::Fail;

#[derive(Debug, Fail, PartialEq)]
pub enum ProtocolError {
  #[fail(display = "Unknown request '{}', try: apply, batch, query, session, help, quit", command)]
  UnknownRequest { command: String },

  #[fail(display = "'{}' needs an argument", command)]
  MissingArgument { command: String },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
  Apply(Vec<String>),
  Query(String),
  Session(String),
  Help,
  Quit,
}

/// Turns input lines into requests.
///
/// ```text
/// apply note Bass E2 at:1.1
/// batch
/// track add Keys piano
/// chord Keys Am at:1.1
/// end
/// query map
/// session undo
/// help
/// quit
/// ```
#[derive(Debug, Default)]
pub struct RequestReader {
  batch: Option<Vec<String>>,
}

impl RequestReader {
  pub fn new() -> RequestReader {
    RequestReader { batch: None }
  }

  pub fn in_batch(&self) -> bool {
    self.batch.is_some()
  }

  /// Returns a request once one is complete. Lines inside a batch are buffered until `end`.
  pub fn feed(&mut self, line: &str) -> Option<ProtocolResult<Request>> {
    if let Some(batch) = self.batch.as_mut() {
      if line.trim().eq_ignore_ascii_case("end") {
        return self.batch.take().map(|lines| Ok(Request::Apply(lines)));
      }
      batch.push(line.to_string());
      return None;
    }

    let line = line.trim();
    if line.is_empty() {
      return None;
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_lowercase();
    let rest = parts.next().map(str::trim).unwrap_or("");
    let argument = |request: fn(String) -> Request| {
      if rest.is_empty() {
        Err(ProtocolError::MissingArgument {
          command: command.clone(),
        })
      } else {
        Ok(request(rest.to_string()))
      }
    };

    match command.as_str() {
      "apply" => Some(argument(|op| Request::Apply(vec![op]))),
      "query" => Some(argument(Request::Query)),
      "session" => Some(argument(Request::Session)),
      "batch" => {
        self.batch = Some(Vec::new());
        None
      }
      "help" => Some(Ok(Request::Help)),
      "quit" | "exit" => Some(Ok(Request::Quit)),
      _ => Some(Err(ProtocolError::UnknownRequest {
        command: command.clone(),
      })),
    }
  }
}

#[cfg(test)]
mod test {

  use super::{ProtocolError, Request, RequestReader};

  #[test]
  pub fn single_line_requests() {
    let mut reader = RequestReader::new();
    assert_eq!(
      reader.feed("apply note Bass E2 at:1.1"),
      Some(Ok(Request::Apply(vec!["note Bass E2 at:1.1".to_string()])))
    );
    assert_eq!(reader.feed("query map"), Some(Ok(Request::Query("map".to_string()))));
    assert_eq!(
      reader.feed("SESSION undo to:intro"),
      Some(Ok(Request::Session("undo to:intro".to_string())))
    );
    assert_eq!(reader.feed("  "), None);
    assert_eq!(reader.feed("help"), Some(Ok(Request::Help)));
    assert_eq!(reader.feed("quit"), Some(Ok(Request::Quit)));
  }

  #[test]
  pub fn batches() {
    let mut reader = RequestReader::new();
    assert_eq!(reader.feed("batch"), None);
    assert!(reader.in_batch());
    assert_eq!(reader.feed("track add Bass bass"), None);
    assert_eq!(reader.feed("tracker Bass import at:1.1"), None);
    assert_eq!(reader.feed("Step 01: [E2_v90_4]"), None);
    assert_eq!(reader.feed("tracker end"), None);
    assert_eq!(
      reader.feed("end"),
      Some(Ok(Request::Apply(vec![
        "track add Bass bass".to_string(),
        "tracker Bass import at:1.1".to_string(),
        "Step 01: [E2_v90_4]".to_string(),
        "tracker end".to_string(),
      ])))
    );
    assert!(!reader.in_batch());
  }

  #[test]
  pub fn errors() {
    let mut reader = RequestReader::new();
    assert_eq!(
      reader.feed("dance now"),
      Some(Err(ProtocolError::UnknownRequest {
        command: "dance".to_string()
      }))
    );
    assert_eq!(
      reader.feed("query"),
      Some(Err(ProtocolError::MissingArgument {
        command: "query".to_string()
      }))
    );
  }
}
