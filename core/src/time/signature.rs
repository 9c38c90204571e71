use std::fmt;

use crate::time::{Ppqn, TicksTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
  num_beats: u8,  // numerator
  note_value: u8, // denominator
}

impl Signature {
  pub fn new(num_beats: u8, note_value: u8) -> Signature {
    debug_assert!(note_value.is_power_of_two());
    Signature {
      num_beats,
      note_value,
    }
  }

  /// Parses `N/D` where `N > 0` and `D` is a power of two up to 64.
  pub fn parse(text: &str) -> Option<Signature> {
    let mut parts = text.trim().splitn(2, '/');
    let num_beats = parts.next()?.parse::<u8>().ok()?;
    let note_value = parts.next()?.parse::<u8>().ok()?;
    if num_beats == 0 || !note_value.is_power_of_two() || note_value > 64 {
      return None;
    }
    Some(Signature::new(num_beats, note_value))
  }

  pub fn get_num_beats(&self) -> u8 {
    self.num_beats
  }

  pub fn get_note_value(&self) -> u8 {
    self.note_value
  }

  pub fn ticks_per_beat(&self, ppqn: Ppqn) -> TicksTime {
    TicksTime::new(u64::from(ppqn) * 4 / u64::from(self.note_value.max(1)))
  }

  pub fn ticks_per_bar(&self, ppqn: Ppqn) -> TicksTime {
    self.ticks_per_beat(ppqn) * u64::from(self.num_beats)
  }
}

impl Default for Signature {
  fn default() -> Self {
    Signature::new(4, 4)
  }
}

impl fmt::Display for Signature {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}/{}", self.num_beats, self.note_value)
  }
}

/// Time signature changes in ascending tick order. The first entry is always at tick 0.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMap {
  entries: Vec<(TicksTime, Signature)>,
}

impl SignatureMap {
  pub fn new(initial: Signature) -> SignatureMap {
    SignatureMap {
      entries: vec![(TicksTime::zero(), initial)],
    }
  }

  pub fn entries(&self) -> &[(TicksTime, Signature)] {
    &self.entries
  }

  pub fn get(&self, tick: TicksTime) -> Option<Signature> {
    self
      .entries
      .binary_search_by(|(t, _)| t.cmp(&tick))
      .ok()
      .map(|index| self.entries[index].1)
  }

  /// The signature in effect at `tick`.
  pub fn at(&self, tick: TicksTime) -> Signature {
    self
      .entries
      .iter()
      .take_while(|(t, _)| *t <= tick)
      .last()
      .map(|(_, signature)| *signature)
      .unwrap_or_default()
  }

  /// Inserts, overwrites or (with `None`) removes the entry at `tick`, returning the previous one.
  /// The entry at tick 0 can be overwritten but never removed.
  pub fn set(&mut self, tick: TicksTime, signature: Option<Signature>) -> Option<Signature> {
    match (self.entries.binary_search_by(|(t, _)| t.cmp(&tick)), signature) {
      (Ok(index), Some(signature)) => {
        let previous = self.entries[index].1;
        self.entries[index].1 = signature;
        Some(previous)
      }
      (Ok(index), None) => {
        if tick.is_zero() {
          Some(self.entries[index].1)
        } else {
          Some(self.entries.remove(index).1)
        }
      }
      (Err(index), Some(signature)) => {
        self.entries.insert(index, (tick, signature));
        None
      }
      (Err(_), None) => None,
    }
  }

  /// Start tick and signature of the zero-based bar `bar`, `None` past the last representable tick.
  ///
  /// Bars are laid out from tick 0; a signature applies to a bar when its tick is at or
  /// before the bar's start.
  pub fn bar_start(&self, bar: u64, ppqn: Ppqn) -> Option<(TicksTime, Signature)> {
    let mut start = TicksTime::zero();
    let mut current = 0u64;
    let mut index = 0usize;
    loop {
      while index + 1 < self.entries.len() && self.entries[index + 1].0 <= start {
        index += 1;
      }
      let signature = self.entries[index].1;
      let bar_length = signature.ticks_per_bar(ppqn);
      if index + 1 == self.entries.len() || bar_length.is_zero() {
        let start = bar_length
          .checked_mul(bar - current)
          .and_then(|offset| start.checked_add(offset))?;
        return Some((start, signature));
      }
      if current == bar {
        return Some((start, signature));
      }
      start = start.checked_add(bar_length)?;
      current += 1;
    }
  }

  /// Zero-based bar containing `tick`, together with its start tick and signature.
  pub fn bar_at(&self, tick: TicksTime, ppqn: Ppqn) -> (u64, TicksTime, Signature) {
    let mut start = TicksTime::zero();
    let mut bar = 0u64;
    let mut index = 0usize;
    loop {
      while index + 1 < self.entries.len() && self.entries[index + 1].0 <= start {
        index += 1;
      }
      let signature = self.entries[index].1;
      let bar_length = signature.ticks_per_bar(ppqn);
      if bar_length.is_zero() {
        return (bar, start, signature);
      }
      if index + 1 == self.entries.len() {
        let skipped = (tick - start) / bar_length;
        return (bar + skipped, start + bar_length * skipped, signature);
      }
      if start + bar_length > tick {
        return (bar, start, signature);
      }
      start += bar_length;
      bar += 1;
    }
  }

  pub fn is_bar_start(&self, tick: TicksTime, ppqn: Ppqn) -> bool {
    self.bar_at(tick, ppqn).1 == tick
  }

  /// Whether every change starts a bar of the layout defined by the changes before it.
  pub fn is_aligned(&self, ppqn: Ppqn) -> bool {
    self
      .entries
      .iter()
      .all(|(tick, _)| self.is_bar_start(*tick, ppqn))
  }

  /// Moves each change that falls inside a bar to the start of the following bar.
  /// Returns how many changes moved.
  pub fn align_to_bars(&mut self, ppqn: Ppqn) -> usize {
    let changes = self.entries.split_off(1);
    let mut moved = 0;
    for (tick, signature) in changes {
      let (_, start, current) = self.bar_at(tick, ppqn);
      let aligned = if start == tick {
        tick
      } else {
        moved += 1;
        start + current.ticks_per_bar(ppqn)
      };
      self.set(aligned, Some(signature));
    }
    moved
  }
}

#[cfg(test)]
mod test {

  use super::{Signature, SignatureMap};
  use crate::time::TicksTime;

  #[test]
  pub fn signature_new() {
    let signature = Signature::new(3, 4);
    assert_eq!(signature.get_num_beats(), 3);
    assert_eq!(signature.get_note_value(), 4);
    assert_eq!(signature.to_string(), "3/4");
  }

  #[test]
  pub fn signature_parse() {
    assert_eq!(Signature::parse("6/8"), Some(Signature::new(6, 8)));
    assert_eq!(Signature::parse("7/6"), None);
    assert_eq!(Signature::parse("0/4"), None);
    assert_eq!(Signature::parse("4"), None);
  }

  #[test]
  pub fn ticks_per_beat() {
    assert_eq!(Signature::new(4, 4).ticks_per_beat(480), TicksTime::new(480));
    assert_eq!(Signature::new(6, 8).ticks_per_beat(480), TicksTime::new(240));
    assert_eq!(Signature::new(6, 8).ticks_per_bar(480), TicksTime::new(1440));
  }

  #[test]
  pub fn map_set_and_at() {
    let mut map = SignatureMap::new(Signature::new(4, 4));
    assert_eq!(map.set(TicksTime::new(3840), Some(Signature::new(3, 4))), None);
    assert_eq!(map.at(TicksTime::new(3839)), Signature::new(4, 4));
    assert_eq!(map.at(TicksTime::new(3840)), Signature::new(3, 4));
    assert_eq!(map.set(TicksTime::new(3840), None), Some(Signature::new(3, 4)));
    assert_eq!(map.entries().len(), 1);
    assert_eq!(map.set(TicksTime::zero(), None), Some(Signature::new(4, 4)));
    assert_eq!(map.entries().len(), 1);
  }

  #[test]
  pub fn bar_walk_with_change() {
    let mut map = SignatureMap::new(Signature::new(4, 4));
    map.set(TicksTime::new(2 * 1920), Some(Signature::new(3, 4)));
    assert_eq!(map.bar_start(0, 480).unwrap().0, TicksTime::zero());
    assert_eq!(map.bar_start(2, 480).unwrap().0, TicksTime::new(3840));
    assert_eq!(map.bar_start(3, 480).unwrap().0, TicksTime::new(3840 + 1440));
    assert_eq!(map.bar_at(TicksTime::new(3840 + 1500), 480).0, 3);
    assert_eq!(map.bar_at(TicksTime::new(1919), 480).0, 0);
  }

  #[test]
  pub fn bar_start_overflow() {
    let map = SignatureMap::new(Signature::new(4, 4));
    assert_eq!(map.bar_start(u64::max_value() / 1920 + 1, 480), None);
    assert!(map.bar_start(1000, 480).is_some());
  }

  #[test]
  pub fn alignment() {
    let mut map = SignatureMap::new(Signature::new(4, 4));
    assert!(map.is_bar_start(TicksTime::new(1920), 480));
    assert!(!map.is_bar_start(TicksTime::new(960), 480));

    map.set(TicksTime::new(1920), Some(Signature::new(3, 8)));
    map.set(TicksTime::new(1920 + 1440), Some(Signature::new(4, 4)));
    assert!(map.is_aligned(480));
    map.set(TicksTime::new(1920 + 1440), None);
    map.set(TicksTime::new(1920 + 1000), Some(Signature::new(4, 4)));
    assert!(!map.is_aligned(480));
  }

  #[test]
  pub fn align_moves_changes_to_the_next_bar() {
    let mut map = SignatureMap::new(Signature::new(4, 4));
    map.set(TicksTime::new(960), Some(Signature::new(3, 4)));
    map.set(TicksTime::new(3840), Some(Signature::new(6, 8)));
    // moving the 3/4 change shifts the bar lines under the later one too
    assert_eq!(map.align_to_bars(480), 2);
    assert_eq!(
      map.entries(),
      &[
        (TicksTime::zero(), Signature::new(4, 4)),
        (TicksTime::new(1920), Signature::new(3, 4)),
        (TicksTime::new(1920 + 2 * 1440), Signature::new(6, 8)),
      ]
    );
    assert!(map.is_aligned(480));
  }
}
