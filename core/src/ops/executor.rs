//! Turns resolved commands into mutation primitives committed through the history.
//!
//! Every primitive is one event: a chord of three pitches adds three events, removing five
//! notes adds five. Ramps, copies and tracker imports expand into a single event each.

use log::debug;

use crate::{
  config::Config,
  history::History,
  ops::{
    parser::parse_op,
    resolver::{Command, Resolver},
    OpResult,
  },
  song::{primitives, track::Track, Change, Song},
  time::{BarsTime, TicksTime},
};

fn position(song: &Song, tick: TicksTime) -> BarsTime {
  BarsTime::from_ticks(tick, song.signatures(), song.get_ppqn())
}

fn commit(history: &mut History, song: &mut Song, change: Change) -> OpResult<u64> {
  Ok(history.commit(song, change)?)
}

/// Parses, resolves and executes one operation line. `block` carries tracker import rows.
pub fn apply_line(
  line: &str,
  block: Option<&str>,
  song: &mut Song,
  history: &mut History,
  config: &Config,
) -> OpResult<String> {
  let op = parse_op(line)?;
  let command = Resolver::new(song, config).resolve(&op, block)?;
  execute(command, song, history)
}

pub fn execute(command: Command, song: &mut Song, history: &mut History) -> OpResult<String> {
  let message = match command {
    Command::AddTrack {
      name,
      channel,
      instrument,
    } => {
      let change = primitives::add_track(song, Track::new(&name, channel, instrument))?;
      commit(history, song, change)?;
      format!("track {} added on ch:{}", name, channel + 1)
    }

    Command::RemoveTrack { track } => {
      let change = primitives::remove_track(song, &track)?;
      commit(history, song, change)?;
      format!("track {} removed", track)
    }

    Command::AddNotes {
      track,
      label,
      keys,
      start,
      length,
      velocity,
    } => {
      for key in keys.iter() {
        let change = primitives::add_note(song, &track, *key, velocity, start, length)?;
        commit(history, song, change)?;
      }
      if keys.len() == 1 {
        format!("{} on {} at {}", label, track, position(song, start))
      } else {
        format!(
          "{} ({} notes) on {} at {}",
          label,
          keys.len(),
          track,
          position(song, start)
        )
      }
    }

    Command::RemoveNotes { track, notes } => {
      for note in notes.iter() {
        let change = primitives::remove_note(song, &track, note)?;
        commit(history, song, change)?;
      }
      format!("{} note(s) removed from {}", notes.len(), track)
    }

    Command::SetVelocity {
      track,
      notes,
      velocity,
    } => {
      for note in notes.iter() {
        let change = primitives::set_note_velocity(song, &track, note, velocity)?;
        commit(history, song, change)?;
      }
      format!("{} note(s) on {} set to vel {}", notes.len(), track, velocity)
    }

    Command::VelocityRamp {
      track,
      range,
      from,
      to,
    } => {
      let change = primitives::apply_velocity_ramp(song, &track, range, from, to)?;
      commit(history, song, change)?;
      format!(
        "velocity ramp {}->{} on {} over {}",
        from,
        to,
        track,
        range.display(song.signatures(), song.get_ppqn())
      )
    }

    Command::CopyRange {
      source,
      range,
      dest,
      dest_start,
      transpose,
    } => {
      let change = primitives::copy_range(song, &source, range, &dest, dest_start, transpose)?;
      commit(history, song, change)?;
      format!(
        "copied {} {} to {} at {}{}",
        source,
        range.display(song.signatures(), song.get_ppqn()),
        dest,
        position(song, dest_start),
        if transpose != 0 {
          format!(" transposed {:+}", transpose)
        } else {
          String::new()
        }
      )
    }

    Command::MoveNotes { track, notes, to } => {
      let change = primitives::move_notes(song, &track, &notes, to)?;
      commit(history, song, change)?;
      format!("{} note(s) on {} moved to {}", notes.len(), track, position(song, to))
    }

    Command::TransposeNotes {
      track,
      notes,
      semitones,
    } => {
      let change = primitives::transpose_notes(song, &track, &notes, semitones)?;
      commit(history, song, change)?;
      let kept = notes
        .iter()
        .filter(|note| !(0..=127).contains(&(i32::from(note.key) + semitones)))
        .count();
      if kept == 0 {
        format!("{} note(s) on {} transposed {:+}", notes.len(), track, semitones)
      } else {
        format!(
          "{} note(s) on {} transposed {:+}, {} left in place",
          notes.len() - kept,
          track,
          semitones,
          kept
        )
      }
    }

    Command::QuantizeNotes { track, notes, grid } => {
      let change = primitives::quantize_notes(song, &track, &notes, grid)?;
      commit(history, song, change)?;
      format!("{} note(s) on {} quantized to {} ticks", notes.len(), track, grid)
    }

    Command::RepeatNotes {
      track,
      notes,
      to,
      count,
    } => {
      let change = primitives::repeat_notes(song, &track, &notes, to, count)?;
      commit(history, song, change)?;
      format!("{} note(s) on {} repeated {} time(s)", notes.len(), track, count)
    }

    Command::SetTempo { tick, tempo } => {
      let change = primitives::set_tempo_at(song, tick, tempo);
      commit(history, song, change)?;
      format!("tempo {} at {}", tempo, position(song, tick))
    }

    Command::SetSignature { tick, signature } => {
      let change = primitives::set_time_signature_at(song, tick, signature);
      commit(history, song, change)?;
      format!("time signature {} at {}", signature, position(song, tick))
    }

    Command::SetKey { tick, key } => {
      commit(history, song, primitives::set_key_at(song, tick, key))?;
      format!("key {} at {}", key, position(song, tick))
    }

    Command::AddMarker { tick, label } => {
      let change = primitives::add_marker(song, tick, &label);
      commit(history, song, change)?;
      format!("marker {} at {}", label, position(song, tick))
    }

    Command::RemoveMarker { label } => {
      let change = primitives::remove_marker(song, &label)?;
      commit(history, song, change)?;
      format!("marker {} removed", label)
    }

    Command::SetTitle { title } => {
      commit(history, song, primitives::set_title(&title))?;
      format!("title set to {}", title)
    }

    Command::SetInstrument {
      track,
      channel,
      instrument,
    } => {
      let change = primitives::set_instrument(song, &track, channel, instrument)?;
      commit(history, song, change)?;
      format!("{} now plays {} on ch:{}", track, instrument, channel + 1)
    }

    Command::SetTrackState { track, mute, solo } => {
      let change = primitives::set_track_state(song, &track, mute, solo)?;
      commit(history, song, change)?;
      format!(
        "{} {}",
        track,
        match (mute, solo) {
          (true, true) => "muted and soloed",
          (true, false) => "muted",
          (false, true) => "soloed",
          (false, false) => "audible",
        }
      )
    }

    Command::ImportNotes { track, notes } => {
      let count = notes.len();
      let change = primitives::add_notes(song, &track, notes)?;
      commit(history, song, change)?;
      format!("{} note(s) imported into {}", count, track)
    }
  };
  debug!("v{} {}", song.get_version(), message);
  Ok(message)
}
