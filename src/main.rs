use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use cartwall::analyze::ProbeAnalyzer;
use cartwall::{init_data_dir, Error, Library, Settings, TrackId};

const USAGE: &str = "usage: cartwall [--data DIR] <command> [args]

commands:
  init                          create the data directory layout
  import <playlist> <file>...   ingest audio files into a playlist
  list [playlist]               show tracks, newest first
  update <id> <key>=<value>...  change artist, title, weight or expiration
  delete <id>                   remove a track
  play <id>                     log one play of a track
  fsck [--repair]               check (and optionally repair) the stores
  disable-expired               take expired tracks out of rotation
  reanalyze <id>                refresh gain, cue points and stream properties";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cartwall: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(mut args: Vec<String>) -> cartwall::Result<()> {
    let mut settings = Settings::load().map_err(|e| Error::Config(e.to_string()))?;
    settings.validate().map_err(Error::Config)?;
    if let Some(pos) = args.iter().position(|a| a == "--data") {
        if pos + 1 >= args.len() {
            return Err(Error::Config("--data needs a directory".to_string()));
        }
        args.remove(pos);
        settings.data_dir = PathBuf::from(args.remove(pos));
    }

    let command = args.first().cloned().unwrap_or_default();
    let rest = &args[1.min(args.len())..];

    match command.as_str() {
        "init" => init_data_dir(&settings),
        "import" => import(&settings, rest),
        "list" => list(&settings, rest),
        "update" => update(&settings, rest),
        "delete" => delete(&settings, rest),
        "play" => play(&settings, rest),
        "fsck" => fsck(&settings, rest),
        "disable-expired" => disable_expired(&settings),
        "reanalyze" => reanalyze(&settings, rest),
        _ => {
            eprintln!("{USAGE}");
            Err(Error::Config(format!("unknown command '{command}'")))
        }
    }
}

fn open(settings: &Settings) -> cartwall::Result<Library> {
    Library::open(settings.clone(), Arc::new(ProbeAnalyzer))
}

fn parse_id(rest: &[String]) -> cartwall::Result<TrackId> {
    let raw = rest
        .first()
        .ok_or_else(|| Error::Config("missing track id".to_string()))?;
    TrackId::from_str(raw).map_err(|_| Error::Validation(format!("not a track id: {raw}")))
}

fn import(settings: &Settings, rest: &[String]) -> cartwall::Result<()> {
    let (playlist, files) = rest
        .split_first()
        .ok_or_else(|| Error::Config("usage: import <playlist> <file>...".to_string()))?;
    if files.is_empty() {
        return Err(Error::Config("no files to import".to_string()));
    }

    let library = open(settings)?;
    let uploader = env::var("USER").ok();
    for file in files {
        let track = library.upload(
            playlist,
            std::path::Path::new(file),
            None,
            uploader.as_deref(),
        )?;
        println!("{}  {}", track.id, track.original_filename);
    }
    Ok(())
}

fn list(settings: &Settings, rest: &[String]) -> cartwall::Result<()> {
    let library = open(settings)?;
    let tracks = match rest.first() {
        Some(playlist) => library.playlist_tracks(playlist),
        None => library.tracks(),
    };
    for track in tracks {
        println!(
            "{}  {:<8} w={} plays={}  {} - {}",
            track.id, track.playlist, track.weight, track.play_count, track.artist, track.title
        );
    }
    Ok(())
}

fn update(settings: &Settings, rest: &[String]) -> cartwall::Result<()> {
    let id = parse_id(rest)?;
    if rest.len() < 2 {
        return Err(Error::Config("usage: update <id> <key>=<value>...".to_string()));
    }

    let mut payload = Map::new();
    for pair in &rest[1..] {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::Validation(format!("expected key=value, got '{pair}'")))?;
        payload.insert(key.to_string(), parse_value(value));
    }

    let library = open(settings)?;
    let track = library
        .get(&id)
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    library.update(&track.playlist, id, track.ext, &payload)?;
    Ok(())
}

/// Bare integers become JSON numbers, everything else stays a string.
fn parse_value(raw: &str) -> Value {
    match raw.parse::<u64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(raw),
    }
}

fn delete(settings: &Settings, rest: &[String]) -> cartwall::Result<()> {
    let id = parse_id(rest)?;
    let library = open(settings)?;
    let track = library
        .get(&id)
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    library.delete(&track.playlist, id, track.ext)
}

fn play(settings: &Settings, rest: &[String]) -> cartwall::Result<()> {
    let id = parse_id(rest)?;
    let library = open(settings)?;
    let track = library.log_play(id)?;
    println!("{}  plays={}", track.id, track.play_count);
    Ok(())
}

fn fsck(settings: &Settings, rest: &[String]) -> cartwall::Result<()> {
    let repair = rest.iter().any(|a| a == "--repair");
    let library = open(settings)?;
    let discrepancies = if repair {
        library.repair()?
    } else {
        library.verify()?
    };

    for discrepancy in &discrepancies {
        println!("{discrepancy}");
    }
    if discrepancies.is_empty() || repair {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} inconsistencies found",
            discrepancies.len()
        )))
    }
}

fn disable_expired(settings: &Settings) -> cartwall::Result<()> {
    let library = open(settings)?;
    let count = library.disable_expired()?;
    println!("{count} tracks disabled");
    Ok(())
}

fn reanalyze(settings: &Settings, rest: &[String]) -> cartwall::Result<()> {
    let id = parse_id(rest)?;
    let library = open(settings)?;
    let track = library.reanalyze(id)?;
    println!(
        "{}  gain={} dB cue={}..{}",
        track.id, track.track_gain, track.cue_in, track.cue_out
    );
    Ok(())
}
