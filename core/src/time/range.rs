use std::fmt;

use crate::time::{bars::resolve_position, BarsTime, Ppqn, SignatureMap, TicksTime, TimeError, TimeResult};

/// Half-open tick interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRange {
  pub start: TicksTime,
  pub end: TicksTime,
}

impl TickRange {
  pub fn new(start: TicksTime, end: TicksTime) -> TickRange {
    TickRange { start, end }
  }

  pub fn contains(&self, tick: TicksTime) -> bool {
    self.start <= tick && tick < self.end
  }

  pub fn overlaps(&self, start: TicksTime, end: TicksTime) -> bool {
    start < self.end && end > self.start
  }

  pub fn length(&self) -> TicksTime {
    self.end - self.start
  }

  pub fn display<'a>(&'a self, signatures: &'a SignatureMap, ppqn: Ppqn) -> RangeDisplay<'a> {
    RangeDisplay {
      range: self,
      signatures,
      ppqn,
    }
  }
}

pub struct RangeDisplay<'a> {
  range: &'a TickRange,
  signatures: &'a SignatureMap,
  ppqn: Ppqn,
}

impl<'a> fmt::Display for RangeDisplay<'a> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "{}-{}",
      BarsTime::from_ticks(self.range.start, self.signatures, self.ppqn),
      BarsTime::from_ticks(self.range.end, self.signatures, self.ppqn)
    )
  }
}

/// Resolves `A-B` into `[start, end)`, failing with `InvertedRange` unless `end > start`.
pub fn resolve_range(expr: &str, signatures: &SignatureMap, ppqn: Ppqn) -> TimeResult<TickRange> {
  let expr = expr.trim();
  let mut parts = expr.splitn(2, '-');
  let (start, end) = match (parts.next(), parts.next()) {
    (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => (start, end),
    _ => {
      return Err(TimeError::MalformedRange {
        range: expr.to_string(),
      })
    }
  };
  let start = resolve_position(start, signatures, ppqn)?;
  let end = resolve_position(end, signatures, ppqn)?;
  if end <= start {
    return Err(TimeError::InvertedRange {
      range: expr.to_string(),
    });
  }
  Ok(TickRange::new(start, end))
}
