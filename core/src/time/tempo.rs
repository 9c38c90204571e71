use std::fmt;

use crate::time::{Ppqn, TicksTime};

pub const DEFAULT_TEMPO: f64 = 120.0;

const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// Beats per minute, always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo(f64);

impl Tempo {
  pub fn new(value: f64) -> Option<Tempo> {
    if value.is_finite() && value > 0.0 {
      Some(Tempo(value))
    } else {
      None
    }
  }

  pub fn from_micros_per_quarter(micros: u32) -> Option<Tempo> {
    if micros == 0 {
      None
    } else {
      Tempo::new(MICROS_PER_MINUTE / f64::from(micros))
    }
  }

  pub fn get_value(&self) -> f64 {
    self.0
  }

  pub fn micros_per_quarter(&self) -> u32 {
    (MICROS_PER_MINUTE / self.0).round().min(f64::from(0x00ff_ffffu32)) as u32
  }

  pub fn seconds_per_tick(&self, ppqn: Ppqn) -> f64 {
    60.0 / (self.0 * f64::from(ppqn.max(1)))
  }
}

impl Default for Tempo {
  fn default() -> Self {
    Tempo(DEFAULT_TEMPO)
  }
}

impl fmt::Display for Tempo {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if (self.0 - self.0.round()).abs() < 1e-9 {
      write!(f, "{}", self.0.round() as i64)
    } else {
      write!(f, "{:.2}", self.0)
    }
  }
}

impl From<Tempo> for f64 {
  fn from(item: Tempo) -> Self {
    item.0
  }
}

/// Tempo changes in ascending tick order with exactly one entry at tick 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
  entries: Vec<(TicksTime, Tempo)>,
}

impl TempoMap {
  pub fn new(initial: Tempo) -> TempoMap {
    TempoMap {
      entries: vec![(TicksTime::zero(), initial)],
    }
  }

  pub fn entries(&self) -> &[(TicksTime, Tempo)] {
    &self.entries
  }

  pub fn get(&self, tick: TicksTime) -> Option<Tempo> {
    self
      .entries
      .binary_search_by(|(t, _)| t.cmp(&tick))
      .ok()
      .map(|index| self.entries[index].1)
  }

  pub fn at(&self, tick: TicksTime) -> Tempo {
    self
      .entries
      .iter()
      .take_while(|(t, _)| *t <= tick)
      .last()
      .map(|(_, tempo)| *tempo)
      .unwrap_or_default()
  }

  /// Inserts, overwrites or (with `None`) removes the change at `tick`, returning the previous one.
  /// The entry at tick 0 can be overwritten but never removed.
  pub fn set(&mut self, tick: TicksTime, tempo: Option<Tempo>) -> Option<Tempo> {
    match (self.entries.binary_search_by(|(t, _)| t.cmp(&tick)), tempo) {
      (Ok(index), Some(tempo)) => {
        let previous = self.entries[index].1;
        self.entries[index].1 = tempo;
        Some(previous)
      }
      (Ok(index), None) => {
        if tick.is_zero() {
          Some(self.entries[index].1)
        } else {
          Some(self.entries.remove(index).1)
        }
      }
      (Err(index), Some(tempo)) => {
        self.entries.insert(index, (tick, tempo));
        None
      }
      (Err(_), None) => None,
    }
  }

  /// Wall clock seconds elapsed from tick 0 until `tick`.
  pub fn seconds_at(&self, tick: TicksTime, ppqn: Ppqn) -> f64 {
    let mut seconds = 0.0;
    for (index, (start, tempo)) in self.entries.iter().enumerate() {
      if *start >= tick {
        break;
      }
      let end = self
        .entries
        .get(index + 1)
        .map(|(next, _)| (*next).min(tick))
        .unwrap_or(tick);
      seconds += f64::from(end - *start) * tempo.seconds_per_tick(ppqn);
    }
    seconds
  }
}

#[cfg(test)]
mod test {

  use super::{Tempo, TempoMap};
  use crate::time::TicksTime;

  #[test]
  pub fn tempo_new() {
    let tempo = Tempo::new(120.0).unwrap();
    assert_eq!(tempo.get_value(), 120.0);
    assert_eq!(tempo.micros_per_quarter(), 500_000);
    assert!(Tempo::new(0.0).is_none());
    assert!(Tempo::new(-3.0).is_none());
  }

  #[test]
  pub fn tempo_display() {
    assert_eq!(Tempo::new(174.0).unwrap().to_string(), "174");
    assert_eq!(Tempo::new(92.5).unwrap().to_string(), "92.50");
  }

  #[test]
  pub fn from_micros() {
    let tempo = Tempo::from_micros_per_quarter(500_000).unwrap();
    assert!((tempo.get_value() - 120.0).abs() < 1e-9);
    assert!(Tempo::from_micros_per_quarter(0).is_none());
  }

  #[test]
  pub fn map_set_overwrites() {
    let mut map = TempoMap::new(Tempo::default());
    let tick = TicksTime::new(960);
    assert_eq!(map.set(tick, Tempo::new(90.0)), None);
    assert_eq!(map.set(tick, Tempo::new(100.0)), Tempo::new(90.0));
    assert_eq!(map.entries().len(), 2);
    assert_eq!(map.at(TicksTime::new(959)), Tempo::default());
    assert_eq!(map.at(TicksTime::new(5000)), Tempo::new(100.0).unwrap());
  }

  #[test]
  pub fn seconds_at() {
    let mut map = TempoMap::new(Tempo::new(120.0).unwrap());
    map.set(TicksTime::new(960), Tempo::new(60.0));
    assert!((map.seconds_at(TicksTime::new(960), 480) - 1.0).abs() < 1e-9);
    assert!((map.seconds_at(TicksTime::new(1440), 480) - 2.0).abs() < 1e-9);
    assert_eq!(map.seconds_at(TicksTime::zero(), 480), 0.0);
  }
}
