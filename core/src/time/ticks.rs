use std::{
  cmp::{min, Ordering},
  fmt,
  ops::{Add, AddAssign, Div, Mul, Sub, SubAssign},
};

use crate::time::Ppqn;

pub const DEFAULT_PPQN: Ppqn = 480;

/// Absolute time in ticks. The operators saturate, `checked_add` and `checked_mul` report overflow.
#[derive(Debug, Eq, Copy, Clone, Hash, Default)]
pub struct TicksTime(u64);

impl TicksTime {
  pub fn new(ticks: u64) -> TicksTime {
    TicksTime(ticks)
  }

  pub fn zero() -> TicksTime {
    TicksTime(0)
  }

  pub fn per_quarter(ppqn: Ppqn) -> TicksTime {
    TicksTime(u64::from(ppqn))
  }

  pub fn is_zero(&self) -> bool {
    self.0 == 0
  }

  pub fn checked_add(self, rhs: TicksTime) -> Option<TicksTime> {
    self.0.checked_add(rhs.0).map(TicksTime)
  }

  pub fn checked_mul(self, rhs: u64) -> Option<TicksTime> {
    self.0.checked_mul(rhs).map(TicksTime)
  }

  /// Offset by a signed amount of ticks, saturating at both ends.
  pub fn offset(&self, delta: i64) -> TicksTime {
    if delta < 0 {
      *self - TicksTime(delta.unsigned_abs())
    } else {
      *self + TicksTime(delta as u64)
    }
  }
}

impl Ord for TicksTime {
  fn cmp(&self, other: &TicksTime) -> Ordering {
    self.0.cmp(&other.0)
  }
}

impl PartialOrd for TicksTime {
  fn partial_cmp(&self, other: &TicksTime) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for TicksTime {
  fn eq(&self, other: &TicksTime) -> bool {
    self.0 == other.0
  }
}

impl Add for TicksTime {
  type Output = TicksTime;
  fn add(self, rhs: TicksTime) -> Self {
    TicksTime::new(self.0.saturating_add(rhs.0))
  }
}

impl AddAssign for TicksTime {
  fn add_assign(&mut self, rhs: TicksTime) {
    *self = *self + rhs;
  }
}

impl Sub for TicksTime {
  type Output = TicksTime;
  fn sub(self, rhs: TicksTime) -> Self {
    TicksTime::new(self.0 - min(self.0, rhs.0))
  }
}

impl SubAssign for TicksTime {
  fn sub_assign(&mut self, rhs: TicksTime) {
    *self = *self - rhs;
  }
}

impl Mul<u64> for TicksTime {
  type Output = TicksTime;
  fn mul(self, rhs: u64) -> Self {
    TicksTime::new(self.0.saturating_mul(rhs))
  }
}

impl Div for TicksTime {
  type Output = u64;
  fn div(self, rhs: TicksTime) -> u64 {
    self.0 / rhs.0.max(1)
  }
}

impl Div<u64> for TicksTime {
  type Output = TicksTime;
  fn div(self, rhs: u64) -> Self {
    TicksTime::new(self.0 / rhs.max(1))
  }
}

impl fmt::Display for TicksTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<TicksTime> for f64 {
  fn from(item: TicksTime) -> Self {
    item.0 as f64
  }
}

impl From<TicksTime> for u64 {
  fn from(item: TicksTime) -> Self {
    item.0
  }
}

impl From<u64> for TicksTime {
  fn from(item: u64) -> Self {
    TicksTime(item)
  }
}

#[cfg(test)]
mod test {

  use super::TicksTime;
  use std::cmp::Ordering;

  #[test]
  pub fn new() {
    let ticks_time = TicksTime::new(1234);
    assert_eq!(ticks_time.0, 1234);
  }

  #[test]
  pub fn zero() {
    let ticks_time = TicksTime::zero();
    assert_eq!(ticks_time.0, 0);
    assert!(ticks_time.is_zero());
  }

  #[test]
  pub fn per_quarter() {
    assert_eq!(TicksTime::per_quarter(480), TicksTime(480));
  }

  #[test]
  pub fn ord_cmp() {
    let time1 = TicksTime::new(1234);
    let time2 = TicksTime::new(1235);
    assert_eq!(time1.cmp(&time2), Ordering::Less);
    assert_eq!(time2.cmp(&time1), Ordering::Greater);
    assert_eq!(time1.cmp(&time1), Ordering::Equal);
  }

  #[test]
  pub fn sub_saturates() {
    let time1 = TicksTime::new(100);
    let time2 = TicksTime::new(130);
    assert_eq!(time2 - time1, TicksTime(30));
    assert_eq!(time1 - time2, TicksTime(0));
  }

  #[test]
  pub fn offset() {
    let time = TicksTime::new(100);
    assert_eq!(time.offset(20), TicksTime(120));
    assert_eq!(time.offset(-20), TicksTime(80));
    assert_eq!(time.offset(-200), TicksTime(0));
  }

  #[test]
  pub fn mul_div() {
    let time = TicksTime::new(100);
    assert_eq!(time * 5, TicksTime(500));
    assert_eq!(time / 5, TicksTime(20));
    assert_eq!(time / TicksTime::new(30), 3);
  }

  #[test]
  pub fn overflow() {
    let last = TicksTime::new(u64::max_value());
    assert_eq!(last.checked_add(TicksTime::new(1)), None);
    assert_eq!(last.checked_mul(2), None);
    assert_eq!(TicksTime::new(10).checked_add(TicksTime::new(5)), Some(TicksTime(15)));
    assert_eq!(TicksTime::new(10).checked_mul(3), Some(TicksTime(30)));
    assert_eq!(last + TicksTime::new(1), last);
    assert_eq!(last * 2, last);
    assert_eq!(last.offset(10), last);
  }

  #[test]
  pub fn conversions() {
    let time = TicksTime::new(1234);
    assert_eq!(f64::from(time), 1234.0);
    assert_eq!(u64::from(time), 1234);
    assert_eq!(TicksTime::from(7u64), TicksTime(7));
    assert_eq!(time.to_string(), "1234");
  }
}
