use std::fmt;

use crate::time::{Ppqn, SignatureMap, TicksTime, TimeError, TimeResult};

/// A musical position. Fields are zero-based, the textual form `bar.beat[.tick]` is one-based.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct BarsTime {
  bars: u64,
  beats: u64,
  ticks: u64,
}

impl BarsTime {
  pub fn new(bars: u64, beats: u64, ticks: u64) -> BarsTime {
    BarsTime { bars, beats, ticks }
  }

  pub fn parse(address: &str) -> TimeResult<BarsTime> {
    let malformed = |reason: &str| TimeError::MalformedAddress {
      address: address.to_string(),
      reason: reason.to_string(),
    };

    let parts: Vec<&str> = address.split('.').collect();
    if parts.len() < 2 || parts.len() > 3 {
      return Err(malformed("expected bar.beat or bar.beat.tick"));
    }
    let bar = parts[0]
      .parse::<u64>()
      .map_err(|_| malformed("bar is not a positive integer"))?;
    let beat = parts[1]
      .parse::<u64>()
      .map_err(|_| malformed("beat is not a positive integer"))?;
    if bar == 0 || beat == 0 {
      return Err(malformed("bar and beat start at 1"));
    }
    let ticks = match parts.get(2) {
      Some(offset) => offset
        .parse::<u64>()
        .map_err(|_| malformed("tick offset is not a non-negative integer"))?,
      None => 0,
    };
    Ok(BarsTime::new(bar - 1, beat - 1, ticks))
  }

  pub fn from_ticks(ticks_time: TicksTime, signatures: &SignatureMap, ppqn: Ppqn) -> BarsTime {
    let (bar, bar_start, signature) = signatures.bar_at(ticks_time, ppqn);
    let beat_length = signature.ticks_per_beat(ppqn);
    let offset = u64::from(ticks_time - bar_start);
    let beat_ticks = u64::from(beat_length).max(1);
    BarsTime {
      bars: bar,
      beats: offset / beat_ticks,
      ticks: offset % beat_ticks,
    }
  }

  pub fn get_bars(&self) -> u64 {
    self.bars
  }

  pub fn get_beats(&self) -> u64 {
    self.beats
  }

  pub fn get_ticks(&self) -> u64 {
    self.ticks
  }

  /// Absolute tick for this position. Beats past the bar's numerator spill into the next bars.
  pub fn to_ticks(&self, signatures: &SignatureMap, ppqn: Ppqn) -> TimeResult<TicksTime> {
    let malformed = |reason: String| TimeError::MalformedAddress {
      address: self.to_string(),
      reason,
    };
    let too_far = || malformed("position is past the last representable tick".to_string());

    let (bar_start, signature) = signatures.bar_start(self.bars, ppqn).ok_or_else(too_far)?;
    let beat_length = signature.ticks_per_beat(ppqn);
    if self.ticks >= u64::from(beat_length) {
      return Err(malformed(format!("tick offset must be below {}", beat_length)));
    }
    beat_length
      .checked_mul(self.beats)
      .and_then(|offset| bar_start.checked_add(offset))
      .and_then(|tick| tick.checked_add(TicksTime::new(self.ticks)))
      .ok_or_else(too_far)
  }
}

/// Resolves `bar.beat[.tick]` or a raw `tick:N` into an absolute tick.
pub fn resolve_position(address: &str, signatures: &SignatureMap, ppqn: Ppqn) -> TimeResult<TicksTime> {
  let address = address.trim();
  if let Some(raw) = strip_prefix_ignore_case(address, "tick:") {
    return raw.parse::<u64>().map(TicksTime::new).map_err(|_| TimeError::MalformedAddress {
      address: address.to_string(),
      reason: "raw tick is not a non-negative integer".to_string(),
    });
  }
  BarsTime::parse(address).and_then(|position| {
    position.to_ticks(signatures, ppqn).map_err(|err| match err {
      TimeError::MalformedAddress { reason, .. } => TimeError::MalformedAddress {
        address: address.to_string(),
        reason,
      },
      other => other,
    })
  })
}

pub(crate) fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
  if text.len() >= prefix.len()
    && text.is_char_boundary(prefix.len())
    && text[..prefix.len()].eq_ignore_ascii_case(prefix)
  {
    Some(&text[prefix.len()..])
  } else {
    None
  }
}

impl fmt::Display for BarsTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.ticks == 0 {
      write!(f, "{}.{}", self.bars + 1, self.beats + 1)
    } else {
      write!(f, "{}.{}.{}", self.bars + 1, self.beats + 1, self.ticks)
    }
  }
}

impl fmt::Debug for BarsTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:05}:{:02}:{:03}", self.bars + 1, self.beats + 1, self.ticks)
  }
}

#[cfg(test)]
mod test {

  use super::{resolve_position, BarsTime};
  use crate::time::{Signature, SignatureMap, TicksTime, TimeError};

  fn four_four() -> SignatureMap {
    SignatureMap::new(Signature::new(4, 4))
  }

  #[test]
  pub fn new() {
    let time = BarsTime::new(10, 1, 100);
    assert_eq!(time.get_bars(), 10);
    assert_eq!(time.get_beats(), 1);
    assert_eq!(time.get_ticks(), 100);
  }

  #[test]
  pub fn to_ticks() {
    let map = four_four();
    assert_eq!(resolve_position("1.1", &map, 480).unwrap(), TicksTime::zero());
    assert_eq!(resolve_position("1.2", &map, 480).unwrap(), TicksTime::new(480));
    assert_eq!(resolve_position("2.1", &map, 480).unwrap(), TicksTime::new(1920));
    assert_eq!(resolve_position("9.1", &map, 480).unwrap(), TicksTime::new(15360));
    assert_eq!(resolve_position("1.1.240", &map, 480).unwrap(), TicksTime::new(240));
    assert_eq!(resolve_position("tick:777", &map, 480).unwrap(), TicksTime::new(777));
  }

  #[test]
  pub fn to_ticks_across_signature_change() {
    let mut map = four_four();
    map.set(TicksTime::new(1920), Some(Signature::new(6, 8)));
    assert_eq!(resolve_position("2.2", &map, 480).unwrap(), TicksTime::new(1920 + 240));
    assert_eq!(resolve_position("3.1", &map, 480).unwrap(), TicksTime::new(1920 + 1440));
  }

  #[test]
  pub fn malformed() {
    let map = four_four();
    for address in &["0.1", "1.0", "a.1", "1", "1.1.1.1", "-1.2", "1.1.480", "tick:x"] {
      match resolve_position(address, &map, 480) {
        Err(TimeError::MalformedAddress { .. }) => {}
        other => panic!("{} resolved to {:?}", address, other),
      }
    }
  }

  #[test]
  pub fn far_positions_are_rejected() {
    let map = four_four();
    for address in &["99999999999999999.1", "1.9999999999999999999", "9607679205057060.1"] {
      match resolve_position(address, &map, 480) {
        Err(TimeError::MalformedAddress { .. }) => {}
        other => panic!("{} resolved to {:?}", address, other),
      }
    }
    assert_eq!(
      resolve_position("tick:18446744073709551615", &map, 480).unwrap(),
      TicksTime::new(u64::max_value())
    );
  }

  #[test]
  pub fn from_ticks() {
    let map = four_four();
    let position = BarsTime::from_ticks(TicksTime::new(1920 + 480 + 10), &map, 480);
    assert_eq!(position, BarsTime::new(1, 1, 10));
    assert_eq!(position.to_string(), "2.2.10");
    assert_eq!(BarsTime::from_ticks(TicksTime::zero(), &map, 480).to_string(), "1.1");
  }

  #[test]
  pub fn debug_format() {
    assert_eq!(format!("{:?}", BarsTime::new(0, 1, 2)), "00001:02:002");
  }
}
