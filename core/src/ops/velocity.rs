use crate::{
  midi::{U7, MAX_U7},
  ops::resolver::{ResolveError, ResolveResult},
};

pub const DYNAMICS: [(&str, U7); 8] = [
  ("ppp", 16),
  ("pp", 33),
  ("p", 49),
  ("mp", 64),
  ("mf", 80),
  ("f", 96),
  ("ff", 112),
  ("fff", 127),
];

/// A velocity number 0-127 or a dynamics marking from `ppp` to `fff`.
pub fn parse_velocity(text: &str) -> ResolveResult<U7> {
  let normalized = text.trim().to_lowercase();
  if let Some((_, velocity)) = DYNAMICS.iter().find(|(name, _)| *name == normalized) {
    return Ok(*velocity);
  }
  match normalized.parse::<i64>() {
    Ok(value) if value >= 0 && value <= i64::from(MAX_U7) => Ok(value as U7),
    Ok(_) => Err(ResolveError::InvalidValue {
      key: "velocity".to_string(),
      value: text.to_string(),
      reason: "must be within 0-127".to_string(),
    }),
    Err(_) => Err(ResolveError::InvalidValue {
      key: "velocity".to_string(),
      value: text.to_string(),
      reason: "expected 0-127 or ppp..fff".to_string(),
    }),
  }
}

#[cfg(test)]
mod test {

  use super::parse_velocity;

  #[test]
  pub fn numbers_and_dynamics() {
    assert_eq!(parse_velocity("90").unwrap(), 90);
    assert_eq!(parse_velocity("0").unwrap(), 0);
    assert_eq!(parse_velocity("mf").unwrap(), 80);
    assert_eq!(parse_velocity("FFF").unwrap(), 127);
  }

  #[test]
  pub fn out_of_range() {
    assert!(parse_velocity("128").is_err());
    assert!(parse_velocity("-1").is_err());
    assert!(parse_velocity("loud").is_err());
  }
}
