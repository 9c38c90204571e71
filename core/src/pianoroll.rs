use std::collections::BTreeMap;

use crate::{
  midi::U7,
  ops::pitch::pitch_name,
  song::notes::Note,
  time::{Ppqn, SignatureMap, TickRange, TicksTime},
};

const MAX_COLUMNS: u64 = 64;

fn ceil_div(value: u64, divisor: u64) -> u64 {
  value / divisor + if value % divisor == 0 { 0 } else { 1 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
  Rest,
  Onset,
  Hold,
}

impl Cell {
  fn symbol(self) -> char {
    match self {
      Cell::Rest => '.',
      Cell::Onset => '#',
      Cell::Hold => '=',
    }
  }
}

/// Quantized grid of the pitches sounding in each column of a range.
#[derive(Debug, Clone, PartialEq)]
pub struct PianoRoll {
  range: TickRange,
  step: TicksTime,
  columns: usize,
  rows: BTreeMap<U7, Vec<Cell>>,
}

impl PianoRoll {
  /// Builds the grid with `step` ticks per column, widened when the range would need more
  /// than 64 columns.
  pub fn new<'a, I>(notes: I, range: TickRange, step: TicksTime) -> PianoRoll
  where
    I: IntoIterator<Item = &'a Note>,
  {
    let length = u64::from(range.length());
    let mut step = u64::from(step).max(1);
    if ceil_div(length, step) > MAX_COLUMNS {
      step = ceil_div(length, MAX_COLUMNS);
    }
    let columns = ceil_div(length, step) as usize;
    let step = TicksTime::new(step);

    let mut rows: BTreeMap<U7, Vec<Cell>> = BTreeMap::new();
    for note in notes {
      if note.start >= range.end || note.end() <= range.start {
        continue;
      }
      let first = if note.start > range.start {
        (note.start - range.start) / step
      } else {
        0
      };
      let last = ceil_div(u64::from(note.end() - range.start), u64::from(step));
      let row = rows.entry(note.key).or_insert_with(|| vec![Cell::Rest; columns]);
      for column in first..last.min(columns as u64) {
        let cell = &mut row[column as usize];
        let onset = column == first && note.start >= range.start;
        if onset {
          *cell = Cell::Onset;
        } else if *cell == Cell::Rest {
          *cell = Cell::Hold;
        }
      }
    }

    PianoRoll {
      range,
      step,
      columns,
      rows,
    }
  }

  pub fn get_step(&self) -> TicksTime {
    self.step
  }

  pub fn columns(&self) -> usize {
    self.columns
  }

  /// Pitches sounding in a column, lowest first.
  pub fn active_keys(&self, column: usize) -> Vec<U7> {
    self
      .rows
      .iter()
      .filter(|(_, cells)| cells.get(column).map_or(false, |cell| *cell != Cell::Rest))
      .map(|(key, _)| *key)
      .collect()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Highest pitch on top. `#` marks an onset, `=` a held note.
  pub fn render(&self, title: &str, signatures: &SignatureMap, ppqn: Ppqn) -> String {
    let mut lines = vec![format!(
      "Piano roll: {} ({}, {} ticks per column)",
      title,
      self.range.display(signatures, ppqn),
      self.step
    )];
    if self.rows.is_empty() {
      lines.push("(no notes)".to_string());
    }
    for (key, cells) in self.rows.iter().rev() {
      let cells: String = cells.iter().map(|cell| cell.symbol()).collect();
      lines.push(format!("{:<5}|{}|", pitch_name(*key), cells));
    }
    lines.join("\n")
  }
}

#[cfg(test)]
mod test {

  use super::{Cell, PianoRoll};
  use crate::{
    song::notes::{Note, NoteId},
    time::{Signature, SignatureMap, TickRange, TicksTime},
  };

  fn note(key: u8, start: u64, length: u64) -> Note {
    Note {
      id: NoteId::new(u64::from(key) * 1000 + start),
      key,
      velocity: 90,
      start: TicksTime::new(start),
      length: TicksTime::new(length),
    }
  }

  #[test]
  pub fn single_note_fills_its_span() {
    let notes = vec![note(40, 0, 480)];
    let range = TickRange::new(TicksTime::zero(), TicksTime::new(480));
    let roll = PianoRoll::new(&notes, range, TicksTime::new(120));
    assert_eq!(roll.columns(), 4);
    for column in 0..4 {
      assert_eq!(roll.active_keys(column), vec![40]);
    }
    assert_eq!(
      roll.rows.get(&40),
      Some(&vec![Cell::Onset, Cell::Hold, Cell::Hold, Cell::Hold])
    );
  }

  #[test]
  pub fn notes_outside_are_ignored() {
    let notes = vec![note(60, 0, 480), note(64, 960, 480), note(67, 1920, 480)];
    let range = TickRange::new(TicksTime::new(480), TicksTime::new(1920));
    let roll = PianoRoll::new(&notes, range, TicksTime::new(480));
    assert_eq!(roll.columns(), 3);
    assert!(roll.active_keys(0).is_empty());
    assert_eq!(roll.active_keys(1), vec![64]);
  }

  #[test]
  pub fn held_from_before_the_range() {
    let notes = vec![note(48, 0, 960)];
    let range = TickRange::new(TicksTime::new(480), TicksTime::new(1440));
    let roll = PianoRoll::new(&notes, range, TicksTime::new(480));
    assert_eq!(roll.rows.get(&48), Some(&vec![Cell::Hold, Cell::Rest]));
  }

  #[test]
  pub fn wide_ranges_are_capped() {
    let range = TickRange::new(TicksTime::zero(), TicksTime::new(480 * 200));
    let roll = PianoRoll::new(&Vec::<Note>::new(), range, TicksTime::new(120));
    assert!(roll.columns() <= 64);
    assert!(roll.is_empty());
  }

  #[test]
  pub fn render() {
    let signatures = SignatureMap::new(Signature::default());
    let notes = vec![note(40, 0, 960), note(43, 960, 480)];
    let range = TickRange::new(TicksTime::zero(), TicksTime::new(1920));
    let roll = PianoRoll::new(&notes, range, TicksTime::new(480));
    assert_eq!(
      roll.render("Bass", &signatures, 480),
      "Piano roll: Bass (1.1-2.1, 480 ticks per column)\n\
       G2   |..#.|\n\
       E2   |#=..|"
    );
  }

  #[test]
  pub fn widest_range_stays_within_the_column_limit() {
    let notes = vec![note(40, u64::max_value() - 480, 480)];
    let range = TickRange::new(TicksTime::zero(), TicksTime::new(u64::max_value()));
    let roll = PianoRoll::new(&notes, range, TicksTime::new(120));
    assert_eq!(roll.columns(), 64);
    assert_eq!(roll.active_keys(63), vec![40]);
  }
}
