//! Read-only projections of a song.
//!
//! Every listing is ordered by tick, then by pitch.

use std::{collections::BTreeMap, path::Path};

use failure::Fail;
use uuid::Uuid;

use crate::{
  config::Config,
  history::History,
  midi::{drums, gm, U7},
  ops::{
    parser::parse_arguments,
    pitch::{parse_pitch, pitch_name},
    resolver::{ResolveError, Resolver},
    OpResult,
  },
  pianoroll::PianoRoll,
  song::{
    notes::Note,
    track::{Instrument, Track},
    Song,
  },
  time::{BarsTime, TickRange, TicksTime},
  tracker::{self, Lane},
};

#[derive(Debug, Fail, PartialEq)]
pub enum QueryError {
  #[fail(display = "Unknown query '{}', try: {}", name, known)]
  UnknownQuery { name: String, known: String },

  #[fail(display = "Usage: {}", usage)]
  Usage { usage: String },

  #[fail(display = "Cannot read velocity filter '{}', expected >N, <N or N", filter)]
  VelocityFilter { filter: String },
}

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
  Map,
  Tracks,
  Describe,
  Stats,
  Status,
  Events,
  PianoRoll,
  Instruments,
  Find,
  Tracker,
  History,
}

impl Query {
  pub const ALL: [Query; 11] = [
    Query::Map,
    Query::Tracks,
    Query::Describe,
    Query::Stats,
    Query::Status,
    Query::Events,
    Query::PianoRoll,
    Query::Instruments,
    Query::Find,
    Query::Tracker,
    Query::History,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Query::Map => "map",
      Query::Tracks => "tracks",
      Query::Describe => "describe",
      Query::Stats => "stats",
      Query::Status => "status",
      Query::Events => "events",
      Query::PianoRoll => "piano-roll",
      Query::Instruments => "instruments",
      Query::Find => "find",
      Query::Tracker => "tracker",
      Query::History => "history",
    }
  }

  pub fn from_name(name: &str) -> Option<Query> {
    Query::ALL
      .iter()
      .cloned()
      .find(|query| query.name().eq_ignore_ascii_case(name))
  }

  fn positional(self) -> &'static [&'static str] {
    match self {
      Query::Describe => &["track"],
      Query::Events => &["track", "range"],
      Query::PianoRoll | Query::Tracker => &["track", "range"],
      Query::Instruments => &["filter"],
      Query::Find => &["pattern", "mode"],
      Query::History => &["count"],
      Query::Map | Query::Tracks | Query::Stats | Query::Status => &[],
    }
  }

  pub fn usage(self) -> &'static str {
    match self {
      Query::Map => "map",
      Query::Tracks => "tracks",
      Query::Describe => "describe TRACK",
      Query::Stats => "stats",
      Query::Status => "status",
      Query::Events => "events TRACK|* [range:A-B]",
      Query::PianoRoll => "piano-roll TRACK range:A-B [res:16th]",
      Query::Instruments => "instruments [FILTER]",
      Query::Find => "find PITCH|P1,P2,.. [fuzzy] [vel:>N|<N] [track:T] [range:A-B]",
      Query::Tracker => "tracker TRACK|A,B|* range:A-B [res:16th]",
      Query::History => "history [N]",
    }
  }

  fn usage_error(self) -> QueryError {
    QueryError::Usage {
      usage: self.usage().to_string(),
    }
  }
}

/// Everything a query may look at.
pub struct QueryContext<'a> {
  pub song: &'a Song,
  pub history: &'a History,
  pub config: &'a Config,
  pub id: &'a Uuid,
  pub path: Option<&'a Path>,
}

impl<'a> QueryContext<'a> {
  fn resolver(&self) -> Resolver<'a> {
    Resolver::new(self.song, self.config)
  }

  fn position(&self, tick: TicksTime) -> BarsTime {
    BarsTime::from_ticks(tick, self.song.signatures(), self.song.get_ppqn())
  }

  fn span(&self, range: TickRange) -> String {
    range
      .display(self.song.signatures(), self.song.get_ppqn())
      .to_string()
  }

  /// `*` for every track, a comma separated list, or a single name.
  fn select_tracks(&self, selector: &str) -> OpResult<Vec<&'a Track>> {
    if selector == "*" || selector.eq_ignore_ascii_case("all") {
      return Ok(self.song.tracks().iter().collect());
    }
    let resolver = self.resolver();
    let mut tracks = Vec::new();
    for name in selector.split(',').filter(|name| !name.is_empty()) {
      tracks.push(resolver.track(name)?);
    }
    Ok(tracks)
  }
}

pub fn run_query(text: &str, ctx: &QueryContext) -> OpResult<String> {
  let tokens: Vec<&str> = text.split_whitespace().collect();
  let (name, rest) = match tokens.split_first() {
    Some((name, rest)) => (*name, rest),
    None => return Err(unknown_query("").into()),
  };
  let query = Query::from_name(name).ok_or_else(|| unknown_query(name))?;
  let args = parse_arguments(rest, query.positional())?;
  let arg = |key: &str| args.get(key).map(String::as_str);

  match query {
    Query::Map => Ok(map(ctx)),
    Query::Tracks => Ok(tracks(ctx)),
    Query::Describe => {
      let track = ctx.resolver().track(arg("track").ok_or_else(|| query.usage_error())?)?;
      Ok(describe(ctx, track))
    }
    Query::Stats => Ok(stats(ctx)),
    Query::Status => Ok(status(ctx)),
    Query::Events => {
      let tracks = ctx.select_tracks(arg("track").ok_or_else(|| query.usage_error())?)?;
      let range = arg("range").map(|expr| ctx.resolver().range(expr)).transpose()?;
      Ok(events(ctx, &tracks, range))
    }
    Query::PianoRoll => {
      let track = ctx.resolver().track(arg("track").ok_or_else(|| query.usage_error())?)?;
      let range = ctx.resolver().range(arg("range").ok_or_else(|| query.usage_error())?)?;
      let step = match arg("res") {
        Some(res) => tracker::resolution_ticks(res, ctx.song.get_ppqn())?,
        None => ctx
          .song
          .signatures()
          .at(range.start)
          .ticks_per_beat(ctx.song.get_ppqn()),
      };
      let roll = PianoRoll::new(track.notes().notes_range(range.start, range.end), range, step);
      Ok(roll.render(track.get_name(), ctx.song.signatures(), ctx.song.get_ppqn()))
    }
    Query::Instruments => Ok(instruments(ctx, arg("filter"))),
    Query::Find => find(ctx, &args),
    Query::Tracker => {
      let tracks = ctx.select_tracks(arg("track").ok_or_else(|| query.usage_error())?)?;
      let range = ctx.resolver().range(arg("range").ok_or_else(|| query.usage_error())?)?;
      tracker_view(ctx, &tracks, range, arg("res"))
    }
    Query::History => {
      let count = match arg("count") {
        Some(count) => count.parse::<usize>().map_err(|_| query.usage_error())?,
        None => 10,
      };
      Ok(history(ctx, count))
    }
  }
}

fn unknown_query(name: &str) -> QueryError {
  let known: Vec<&str> = Query::ALL.iter().map(|query| query.name()).collect();
  QueryError::UnknownQuery {
    name: name.to_string(),
    known: known.join(", "),
  }
}

fn instrument_label(track: &Track) -> String {
  match track.get_instrument() {
    Instrument::Program(program) => gm::name_for(program)
      .map(str::to_string)
      .unwrap_or_else(|| format!("program {}", program)),
    Instrument::Percussion => "drums".to_string(),
  }
}

fn key_label(track: &Track, key: U7) -> String {
  if track.is_percussion() {
    if let Some(name) = drums::short_name(key) {
      return name.to_string();
    }
  }
  pitch_name(key)
}

fn flags(track: &Track) -> &'static str {
  match (track.is_mute(), track.is_solo()) {
    (true, true) => " [MUTED] [SOLO]",
    (true, false) => " [MUTED]",
    (false, true) => " [SOLO]",
    (false, false) => "",
  }
}

fn track_span(ctx: &QueryContext, track: &Track) -> String {
  match (track.notes().first_start(), track.notes().last_end()) {
    (Some(start), Some(end)) => ctx.span(TickRange::new(start, end)),
    _ => "empty".to_string(),
  }
}

fn map(ctx: &QueryContext) -> String {
  let song = ctx.song;
  let ppqn = song.get_ppqn();
  let mut lines = vec![
    format!("Song: {}", song.get_title()),
    format!(
      "  Tempo: {} BPM | Time sig: {} | PPQN: {}",
      song.tempos().at(TicksTime::zero()),
      song.signatures().at(TicksTime::zero()),
      ppqn
    ),
  ];

  let tempo_changes: Vec<String> = song
    .tempos()
    .entries()
    .iter()
    .skip(1)
    .map(|(tick, tempo)| format!("{} at {}", tempo, ctx.position(*tick)))
    .collect();
  if !tempo_changes.is_empty() {
    lines.push(format!("  Tempo changes: {}", tempo_changes.join(", ")));
  }
  let signature_changes: Vec<String> = song
    .signatures()
    .entries()
    .iter()
    .skip(1)
    .map(|(tick, signature)| format!("{} at {}", signature, ctx.position(*tick)))
    .collect();
  if !signature_changes.is_empty() {
    lines.push(format!("  Time sig changes: {}", signature_changes.join(", ")));
  }
  let keys: Vec<String> = song
    .keys()
    .entries()
    .iter()
    .map(|(tick, key)| format!("{} at {}", key, ctx.position(*tick)))
    .collect();
  if !keys.is_empty() {
    lines.push(format!("  Key: {}", keys.join(", ")));
  }
  if !song.markers().is_empty() {
    let markers: Vec<String> = song
      .markers()
      .iter()
      .map(|marker| format!("{} {}", marker.label, ctx.position(marker.tick)))
      .collect();
    lines.push(format!("  Markers: {}", markers.join(", ")));
  }

  lines.push(format!("  Tracks ({}):", song.tracks().len()));
  for track in song.tracks() {
    lines.push(format!(
      "    {} (ch:{}) {} | {} notes | {}{}",
      track.get_name(),
      track.get_channel() + 1,
      instrument_label(track),
      track.notes().len(),
      track_span(ctx, track),
      flags(track)
    ));
  }
  lines.push(format!("  Version: {}", song.get_version()));
  lines.join("\n")
}

fn tracks(ctx: &QueryContext) -> String {
  if ctx.song.tracks().is_empty() {
    return "No tracks.".to_string();
  }
  let mut lines = vec![format!("Tracks ({}):", ctx.song.tracks().len())];
  for (index, track) in ctx.song.tracks().iter().enumerate() {
    lines.push(format!(
      "  {}. {} (ch:{}) {} | {} notes{}",
      index + 1,
      track.get_name(),
      track.get_channel() + 1,
      instrument_label(track),
      track.notes().len(),
      flags(track)
    ));
  }
  lines.join("\n")
}

fn describe(ctx: &QueryContext, track: &Track) -> String {
  let instrument = match track.get_instrument() {
    Instrument::Program(program) => format!(
      "{} (program {}, {})",
      instrument_label(track),
      program,
      gm::family_for(program).unwrap_or("unknown family")
    ),
    Instrument::Percussion => "drums (GM percussion)".to_string(),
  };
  let mut lines = vec![
    format!("Track: {}", track.get_name()),
    format!("  Channel: {}", track.get_channel() + 1),
    format!("  Instrument: {}", instrument),
    format!(
      "  State: {}",
      match (track.is_mute(), track.is_solo()) {
        (true, true) => "muted, solo",
        (true, false) => "muted",
        (false, true) => "solo",
        (false, false) => "normal",
      }
    ),
    format!("  Notes: {}", track.notes().len()),
  ];

  let notes: Vec<&Note> = track.notes().iter().collect();
  let lowest = notes.iter().map(|note| note.key).min();
  let highest = notes.iter().map(|note| note.key).max();
  if let (Some(lowest), Some(highest)) = (lowest, highest) {
    let total: u64 = notes.iter().map(|note| u64::from(note.velocity)).sum();
    let softest = notes.iter().map(|note| note.velocity).min().unwrap_or(0);
    let loudest = notes.iter().map(|note| note.velocity).max().unwrap_or(0);
    lines.push(format!("  Span: {}", track_span(ctx, track)));
    lines.push(format!(
      "  Pitch range: {}-{}",
      key_label(track, lowest),
      key_label(track, highest)
    ));
    lines.push(format!(
      "  Velocity: {}-{} (avg {})",
      softest,
      loudest,
      total / notes.len() as u64
    ));
  }
  lines.join("\n")
}

fn stats(ctx: &QueryContext) -> String {
  let song = ctx.song;
  let ppqn = song.get_ppqn();
  let end = song.end_tick();
  let seconds = song.tempos().seconds_at(end, ppqn);
  let minutes = (seconds / 60.0).floor();
  let measures = if end.is_zero() {
    0
  } else {
    song.signatures().bar_at(end.offset(-1), ppqn).0 + 1
  };
  vec![
    format!("Song: {}", song.get_title()),
    format!("  Tempo: {} BPM", song.tempos().at(TicksTime::zero())),
    format!("  Time sig: {}", song.signatures().at(TicksTime::zero())),
    format!("  PPQN: {}", ppqn),
    format!("  Tracks: {}", song.tracks().len()),
    format!("  Notes: {}", song.note_count()),
    format!("  Markers: {}", song.markers().len()),
    format!("  Duration: {}:{:05.2}", minutes as u64, seconds - minutes * 60.0),
    format!("  Measures: {}", measures),
  ]
  .join("\n")
}

fn status(ctx: &QueryContext) -> String {
  vec![
    format!("Session: {}", ctx.song.get_title()),
    format!("  Id: {}", ctx.id),
    format!(
      "  File: {}",
      ctx
        .path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(unsaved)".to_string())
    ),
    format!("  Version: {}", ctx.history.version()),
    format!("  Redo depth: {}", ctx.history.redo_depth()),
    format!("  Checkpoints: {}", ctx.history.checkpoints().count()),
  ]
  .join("\n")
}

fn events(ctx: &QueryContext, tracks: &[&Track], range: Option<TickRange>) -> String {
  if tracks.is_empty() {
    return "No tracks.".to_string();
  }
  let mut sections = Vec::new();
  for track in tracks {
    let mut lines = Vec::new();
    if tracks.len() > 1 {
      lines.push(format!("--- {} ---", track.get_name()));
    }
    let notes: Vec<&Note> = match range {
      Some(range) => track.notes().starting_in(range).collect(),
      None => track.notes().iter().collect(),
    };
    if notes.is_empty() {
      lines.push(format!("No notes on {}.", track.get_name()));
    }
    for note in notes {
      lines.push(format!(
        "  {:<9} {:<5} vel:{:<3} dur:{}",
        ctx.position(note.start).to_string(),
        key_label(track, note.key),
        note.velocity,
        note.length
      ));
    }
    sections.push(lines.join("\n"));
  }
  sections.join("\n")
}

fn instruments(ctx: &QueryContext, filter: Option<&str>) -> String {
  let filter = filter.map(gm::normalize);
  let matches = |name: &str| filter.as_ref().map_or(true, |filter| name.contains(filter.as_str()));

  let mut lines: Vec<String> = ctx
    .config
    .instruments
    .iter()
    .map(|(alias, program)| (gm::normalize(alias), *program))
    .filter(|(alias, _)| matches(alias.as_str()))
    .map(|(alias, program)| format!("  {} program:{} [config]", alias, program))
    .collect();
  lines.extend(
    gm::instruments()
      .filter(|(_, name)| matches(*name))
      .map(|(program, name)| format!("  {} program:{}", name, program)),
  );
  if matches("drums") {
    lines.push("  drums ch:10 [percussion]".to_string());
  }

  if lines.is_empty() {
    return "No instruments found.".to_string();
  }
  let mut output = vec![format!("Instruments ({}):", lines.len())];
  output.extend(lines);
  output.join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum VelocityFilter {
  Above(U7),
  Below(U7),
  Exactly(U7),
}

impl VelocityFilter {
  fn parse(text: &str) -> QueryResult<VelocityFilter> {
    let invalid = || QueryError::VelocityFilter {
      filter: text.to_string(),
    };
    let number = |digits: &str| digits.trim().parse::<U7>().map_err(|_| invalid());
    if let Some(rest) = text.strip_prefix('>') {
      Ok(VelocityFilter::Above(number(rest)?))
    } else if let Some(rest) = text.strip_prefix('<') {
      Ok(VelocityFilter::Below(number(rest)?))
    } else {
      Ok(VelocityFilter::Exactly(number(text)?))
    }
  }

  fn accepts(self, velocity: U7) -> bool {
    match self {
      VelocityFilter::Above(limit) => velocity > limit,
      VelocityFilter::Below(limit) => velocity < limit,
      VelocityFilter::Exactly(value) => velocity == value,
    }
  }
}

fn find_key(token: &str) -> Result<U7, ResolveError> {
  parse_pitch(token).or_else(|err| drums::drum_note(token).ok_or(err))
}

fn find(ctx: &QueryContext, args: &BTreeMap<String, String>) -> OpResult<String> {
  let arg = |key: &str| args.get(key).map(String::as_str);
  let pattern = arg("pattern");
  let velocity = arg("vel").map(VelocityFilter::parse).transpose()?;
  if pattern.is_none() && velocity.is_none() {
    return Err(Query::Find.usage_error().into());
  }
  let fuzzy = match arg("mode") {
    Some(mode) if mode.eq_ignore_ascii_case("fuzzy") => true,
    Some(_) => return Err(Query::Find.usage_error().into()),
    None => false,
  };
  let keys = match pattern {
    Some(pattern) => pattern
      .split(',')
      .filter(|token| !token.is_empty())
      .map(find_key)
      .collect::<Result<Vec<U7>, ResolveError>>()?,
    None => Vec::new(),
  };
  let tracks = ctx.select_tracks(arg("track").unwrap_or("*"))?;
  let range = arg("range")
    .map(|expr| ctx.resolver().range(expr))
    .transpose()?
    .unwrap_or_else(|| TickRange::new(TicksTime::zero(), TicksTime::new(u64::MAX)));
  let description = match (pattern, arg("vel")) {
    (Some(pattern), Some(vel)) => format!("{} vel:{}", pattern, vel),
    (Some(pattern), None) => pattern.to_string(),
    (None, Some(vel)) => format!("vel:{}", vel),
    (None, None) => String::new(),
  };

  let mut hits: Vec<(TicksTime, U7, String)> = Vec::new();
  for track in tracks {
    let notes: Vec<&Note> = track
      .notes()
      .starting_in(range)
      .filter(|note| velocity.map_or(true, |filter| filter.accepts(note.velocity)))
      .collect();

    if keys.len() <= 1 {
      for note in notes.iter().filter(|note| keys.first().map_or(true, |key| note.key == *key)) {
        hits.push((
          note.start,
          note.key,
          format!(
            "  {}  {}  {}  vel:{}",
            ctx.position(note.start),
            track.get_name(),
            key_label(track, note.key),
            note.velocity
          ),
        ));
      }
    } else {
      for window in notes.windows(keys.len()) {
        let found: Vec<U7> = window.iter().map(|note| note.key).collect();
        if sequence_matches(&keys, &found, fuzzy) {
          let names: Vec<String> = found.iter().map(|key| key_label(track, *key)).collect();
          hits.push((
            window[0].start,
            window[0].key,
            format!(
              "  {}  {}  {}",
              ctx.position(window[0].start),
              track.get_name(),
              names.join(" ")
            ),
          ));
        }
      }
    }
  }

  if hits.is_empty() {
    return Ok(format!("No matches for {}.", description));
  }
  hits.sort_by_key(|(tick, key, _)| (*tick, *key));
  let mut lines = vec![format!("Found {} match(es) for {}:", hits.len(), description)];
  lines.extend(hits.into_iter().map(|(_, _, line)| line));
  Ok(lines.join("\n"))
}

/// Exact pitches, or with `fuzzy` the same intervals at any transposition.
fn sequence_matches(pattern: &[U7], found: &[U7], fuzzy: bool) -> bool {
  if pattern.len() != found.len() {
    return false;
  }
  if !fuzzy {
    return pattern == found;
  }
  let intervals = |keys: &[U7]| -> Vec<i32> {
    keys
      .windows(2)
      .map(|pair| i32::from(pair[1]) - i32::from(pair[0]))
      .collect()
  };
  intervals(pattern) == intervals(found)
}

fn tracker_view(ctx: &QueryContext, tracks: &[&Track], range: TickRange, res: Option<&str>) -> OpResult<String> {
  let ppqn = ctx.song.get_ppqn();
  let signatures = ctx.song.signatures();
  if let [track] = tracks {
    let notes: Vec<Note> = track.notes().iter().cloned().collect();
    let label = format!("{} ({})", track.get_name(), instrument_label(track));
    return Ok(tracker::format_tracker(&notes, &label, range, signatures, ppqn, res)?);
  }
  let lanes: Vec<Lane> = tracks
    .iter()
    .map(|track| Lane {
      name: track.get_name().to_string(),
      percussion: track.is_percussion(),
      notes: track.notes().iter().cloned().collect(),
    })
    .collect();
  Ok(tracker::format_tracker_multi(
    &lanes,
    range,
    signatures,
    ppqn,
    res,
    ctx.config.tracker.max_combined_tracks,
  )?)
}

fn history(ctx: &QueryContext, count: usize) -> String {
  let mut lines = vec![format!(
    "Version {} ({} undone)",
    ctx.history.version(),
    ctx.history.redo_depth()
  )];
  for event in ctx.history.recent(count) {
    lines.push(format!("  v{} {}", event.get_version(), event.get_description()));
  }
  let checkpoints: Vec<String> = ctx
    .history
    .checkpoints()
    .map(|(label, checkpoint)| format!("{} v{}", label, checkpoint.get_version()))
    .collect();
  if !checkpoints.is_empty() {
    lines.push(format!("Checkpoints: {}", checkpoints.join(", ")));
  }
  lines.join("\n")
}

#[cfg(test)]
mod test {

  use std::path::Path;

  use uuid::Uuid;

  use super::{run_query, sequence_matches, QueryContext};
  use crate::{
    config::Config,
    history::History,
    ops::{executor::apply_line, ErrorKind},
    song::Song,
    time::{resolve_position, Signature, Tempo, TicksTime},
  };

  struct Fixture {
    song: Song,
    history: History,
    config: Config,
    id: Uuid,
  }

  impl Fixture {
    fn new(lines: &[&str]) -> Fixture {
      let mut fixture = Fixture {
        song: Song::new("Demo", 480, Tempo::default(), Signature::default()),
        history: History::new(),
        config: Config::default(),
        id: Uuid::new_v4(),
      };
      for line in lines {
        apply_line(line, None, &mut fixture.song, &mut fixture.history, &fixture.config).unwrap();
      }
      fixture
    }

    fn context(&self) -> QueryContext {
      QueryContext {
        song: &self.song,
        history: &self.history,
        config: &self.config,
        id: &self.id,
        path: Some(Path::new("demo.mid")),
      }
    }

    fn query(&self, text: &str) -> String {
      run_query(text, &self.context()).unwrap()
    }
  }

  #[test]
  pub fn bass_piano_roll() {
    let fixture = Fixture::new(&["track add Bass bass", "note Bass E2 at:1.1 dur:quarter vel:90"]);
    let output = fixture.query("piano-roll Bass range:tick:0-tick:480 res:16th");
    assert_eq!(
      output,
      "Piano roll: Bass (1.1-1.2, 120 ticks per column)\n\
       E2   |#===|"
    );
  }

  #[test]
  pub fn piano_roll_holds_notes_from_before_the_range() {
    let fixture = Fixture::new(&[
      "track add Bass bass",
      "note Bass E2 at:1.1 dur:whole",
      "note Bass G2 at:3.1",
    ]);
    let output = fixture.query("piano-roll Bass range:1.3-2.1 res:quarter");
    assert_eq!(
      output,
      "Piano roll: Bass (1.3-2.1, 480 ticks per column)\n\
       E2   |==|"
    );
  }

  #[test]
  pub fn map_lists_key_signatures() {
    let fixture = Fixture::new(&["track add Bass bass", "key-sig Dm", "key-sig F-major at:9.1"]);
    assert!(fixture
      .query("map")
      .contains("  Key: D minor at 1.1, F major at 9.1\n"));
  }

  #[test]
  pub fn tempo_does_not_move_addresses() {
    let mut fixture = Fixture::new(&["track add Bass bass"]);
    let before = resolve_position("15.3", fixture.song.signatures(), 480).unwrap();
    apply_line(
      "tempo 174 at:11.1",
      None,
      &mut fixture.song,
      &mut fixture.history,
      &fixture.config,
    )
    .unwrap();
    let after = resolve_position("15.3", fixture.song.signatures(), 480).unwrap();
    assert_eq!(before, after);
    assert_eq!(after, TicksTime::new(14 * 1920 + 2 * 480));
    assert!(fixture.query("map").contains("Tempo changes: 174 at 11.1"));
  }

  #[test]
  pub fn map_and_tracks() {
    let fixture = Fixture::new(&[
      "title Groove",
      "track add Bass bass",
      "track add Kit drums",
      "note Bass E2 at:1.1",
      "note Bass G2 at:2.1 dur:half",
      "marker verse at:1.1",
      "mute Kit",
    ]);
    assert_eq!(
      fixture.query("map"),
      "Song: Groove\n  \
       Tempo: 120 BPM | Time sig: 4/4 | PPQN: 480\n  \
       Markers: verse 1.1\n  \
       Tracks (2):\n    \
       Bass (ch:1) electric-bass-finger | 2 notes | 1.1-2.3\n    \
       Kit (ch:10) drums | 0 notes | empty [MUTED]\n  \
       Version: 7"
    );
    assert_eq!(
      fixture.query("tracks"),
      "Tracks (2):\n  \
       1. Bass (ch:1) electric-bass-finger | 2 notes\n  \
       2. Kit (ch:10) drums | 0 notes [MUTED]"
    );
  }

  #[test]
  pub fn events_are_ordered() {
    let fixture = Fixture::new(&[
      "track add Keys piano",
      "note Keys G4 at:2.1",
      "chord Keys C at:1.1",
    ]);
    let output = fixture.query("events Keys");
    let pitches: Vec<&str> = output
      .lines()
      .map(|line| line.split_whitespace().nth(1).unwrap_or(""))
      .collect();
    assert_eq!(pitches, vec!["C4", "E4", "G4", "G4"]);
    assert!(fixture.query("events Keys range:2.1-3.1").contains("G4"));
    assert!(!fixture.query("events Keys range:2.1-3.1").contains("C4"));
  }

  #[test]
  pub fn find() {
    let fixture = Fixture::new(&[
      "track add Lead piano",
      "note Lead C4 at:1.1 vel:110",
      "note Lead E4 at:1.2 vel:60",
      "note Lead G4 at:1.3 vel:30",
      "note Lead D4 at:2.1",
      "note Lead F#4 at:2.2",
      "note Lead A4 at:2.3",
    ]);
    assert!(fixture.query("find C4").starts_with("Found 1 match(es) for C4:"));
    assert!(fixture
      .query("find C4,E4,G4")
      .starts_with("Found 1 match(es) for C4,E4,G4:"));
    assert_eq!(
      fixture.query("find C4,E4,G4 fuzzy"),
      "Found 2 match(es) for C4,E4,G4:\n  \
       1.1  Lead  C4 E4 G4\n  \
       2.1  Lead  D4 F#4 A4"
    );
    assert_eq!(
      fixture.query("find vel:>100"),
      "Found 1 match(es) for vel:>100:\n  1.1  Lead  C4  vel:110"
    );
    assert!(fixture.query("find vel:<40").contains("G4"));
    assert_eq!(fixture.query("find B7"), "No matches for B7.");
  }

  #[test]
  pub fn fuzzy_sequences() {
    assert!(sequence_matches(&[60, 64, 67], &[62, 66, 69], true));
    assert!(!sequence_matches(&[60, 64, 67], &[62, 66, 69], false));
    assert!(!sequence_matches(&[60, 64, 67], &[62, 65, 69], true));
  }

  #[test]
  pub fn tracker_views() {
    let fixture = Fixture::new(&[
      "track add Bass bass",
      "track add Kit drums",
      "note Bass E2 at:1.1 dur:eighth vel:90",
      "note Kit kick at:1.1 dur:16th vel:100",
    ]);
    assert_eq!(
      fixture.query("tracker Bass range:1.1-2.1 res:16th"),
      "[Resolution: 16th]\n\
       [Track: Bass (electric-bass-finger) | Range: 1.1-2.1]\n\
       Step 01: [E2_v90_2]"
    );
    assert_eq!(
      fixture.query("tracker * range:1.1-2.1 res:16th"),
      "[Resolution: 16th]\n\
       [Tracks: Bass, Kit | Range: 1.1-2.1]\n\
       Step 01: Bass[E2_v90_2] Kit[kick_v100_1]"
    );
  }

  #[test]
  pub fn stats_status_history() {
    let fixture = Fixture::new(&["track add Bass bass", "note Bass E2 at:1.1 dur:whole"]);
    let stats = fixture.query("stats");
    assert!(stats.contains("Duration: 0:02.00"));
    assert!(stats.contains("Measures: 1"));
    let status = fixture.query("status");
    assert!(status.contains(&fixture.id.to_string()));
    assert!(status.contains("File: demo.mid"));
    assert_eq!(
      fixture.query("history 1"),
      "Version 2 (0 undone)\n  v2 add note E2 to Bass at 1.1"
    );
  }

  #[test]
  pub fn instruments() {
    let fixture = Fixture::new(&[]);
    let output = fixture.query("instruments cello");
    assert_eq!(output, "Instruments (1):\n  cello program:42");
    assert_eq!(fixture.query("instruments theremin"), "No instruments found.");
  }

  #[test]
  pub fn errors() {
    let fixture = Fixture::new(&["track add Bass bass"]);
    let ctx = fixture.context();
    assert_eq!(
      run_query("bogus", &ctx).unwrap_err().kind(),
      ErrorKind::MalformedOperation
    );
    assert_eq!(
      run_query("describe Guitar", &ctx).unwrap_err().kind(),
      ErrorKind::UnresolvedReference
    );
    assert_eq!(
      run_query("piano-roll Bass", &ctx).unwrap_err().kind(),
      ErrorKind::MalformedOperation
    );
    assert_eq!(
      run_query("find vel:>loud", &ctx).unwrap_err().kind(),
      ErrorKind::MalformedOperation
    );
  }
}
