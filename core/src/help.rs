use crate::{
  ops::{parser::Verb, velocity::DYNAMICS},
  query::Query,
  session::session_actions,
};

/// Reference card listing every operation, query and session action.
pub fn reference_card() -> String {
  let mut lines = vec!["Operations:".to_string()];
  lines.extend(Verb::ALL.iter().map(|verb| format!("  {}", verb.usage())));

  lines.push("Queries:".to_string());
  lines.extend(Query::ALL.iter().map(|query| format!("  {}", query.usage())));

  lines.push("Session:".to_string());
  lines.extend(session_actions().map(|usage| format!("  {}", usage)));

  let dynamics: Vec<String> = DYNAMICS
    .iter()
    .map(|(name, velocity)| format!("{}={}", name, velocity))
    .collect();
  lines.extend(vec![
    "Values:".to_string(),
    "  POS    bar.beat[.tick] (1.1 is the start) or tick:N".to_string(),
    "  BAR    a POS on the first beat of a bar".to_string(),
    "  A-B    range from A up to, not including, B".to_string(),
    "  DUR    whole half quarter eighth sixteenth 32nd triplet, dotted-X, triplet-X, ticks:N".to_string(),
    "  PITCH  C4 D#5 Bb3 midi:60, drum names on percussion tracks".to_string(),
    "  CHORD  Cmaj7 Dm/F Em@3 or C4,E4,G4".to_string(),
    format!("  VEL    0-127 or {}", dynamics.join(" ")),
    "  KEY    C-major D-minor Bb F#m".to_string(),
    "  RES    quarter 8th 16th 32nd".to_string(),
  ]);
  lines.join("\n")
}
