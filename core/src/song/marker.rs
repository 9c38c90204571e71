use crate::time::TicksTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
  pub tick: TicksTime,
  pub label: String,
}

impl Marker {
  pub fn new<T>(tick: TicksTime, label: T) -> Marker
  where
    T: Into<String>,
  {
    Marker {
      tick,
      label: label.into(),
    }
  }
}
