use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use editing::{CommandManager, CommandResult};
use project::{EditSettings, ProjectDb, TrackType};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use timeline::{find_gaps, find_overlaps, ProjectId, Rate, RoundingMode, SequenceId};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ripplecut")]
#[command(about = "Headless timeline editing: ripple, trim, insert and undo against a project database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project database (defaults to the app data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Project id
    #[arg(short, long, global = true, default_value = "main")]
    project: String,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project with one sequence and its tracks
    New {
        /// Project name
        name: String,

        /// Sequence name
        #[arg(long, default_value = "Main")]
        sequence: String,

        /// Frame rate, e.g. 30, 25 or 30000/1001
        #[arg(long, default_value = "30")]
        fps: String,

        #[arg(long, default_value = "1")]
        video_tracks: u32,

        #[arg(long, default_value = "1")]
        audio_tracks: u32,
    },

    /// Register a media file with a known length
    Import {
        file: PathBuf,

        /// Length in frames at --fps
        #[arg(long)]
        frames: i64,

        #[arg(long, default_value = "30")]
        fps: String,

        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Execute an edit command given as JSON (`-` reads stdin, `@path` reads a file)
    Exec { json: String },

    Undo,

    Redo,

    /// Report gaps and overlaps per track
    Check {
        /// Only this sequence
        #[arg(long)]
        sequence: Option<String>,
    },

    /// Print sequences, tracks, clips and the command history
    Dump {
        #[arg(long)]
        sequence: Option<String>,
    },

    /// Show or change the project's editing settings
    Settings {
        #[arg(long)]
        history_limit: Option<usize>,

        /// exact, nearest, floor or ceil
        #[arg(long)]
        source_rounding: Option<String>,

        #[arg(long)]
        allow_bare_frame_numbers: Option<bool>,

        #[arg(long)]
        verify_apply_steps: Option<bool>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| project::app_data_dir().join("ripplecut.db"));
    let db = ProjectDb::open_or_create(&db_path)
        .with_context(|| format!("opening project database {}", db_path.display()))?;
    debug!(path = %db_path.display(), "database open");
    let project_id = ProjectId::from(cli.project.as_str());

    match cli.command {
        Commands::New {
            name,
            sequence,
            fps,
            video_tracks,
            audio_tracks,
        } => new_command(
            &db,
            &project_id,
            &name,
            &sequence,
            &fps,
            video_tracks,
            audio_tracks,
        ),
        Commands::Import {
            file,
            frames,
            fps,
            name,
        } => import_command(&db, &project_id, &file, frames, &fps, name),
        Commands::Exec { json } => exec_command(&db, &project_id, &json),
        Commands::Undo => {
            let mut manager = load_manager(&db, &project_id)?;
            report(manager.undo())
        }
        Commands::Redo => {
            let mut manager = load_manager(&db, &project_id)?;
            report(manager.redo())
        }
        Commands::Check { sequence } => check_command(&db, &project_id, sequence),
        Commands::Dump { sequence } => dump_command(&db, &project_id, sequence),
        Commands::Settings {
            history_limit,
            source_rounding,
            allow_bare_frame_numbers,
            verify_apply_steps,
        } => settings_command(
            &db,
            &project_id,
            history_limit,
            source_rounding,
            allow_bare_frame_numbers,
            verify_apply_steps,
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_rate(raw: &str) -> Result<Rate> {
    let (num, den) = match raw.split_once('/') {
        Some((num, den)) => (num.trim().parse()?, den.trim().parse()?),
        None => (raw.trim().parse()?, 1),
    };
    Rate::new(num, den).map_err(|e| anyhow!("invalid frame rate {raw}: {e}"))
}

fn parse_rounding(raw: &str) -> Result<RoundingMode> {
    serde_json::from_value(serde_json::Value::String(raw.to_ascii_lowercase()))
        .with_context(|| format!("unknown rounding mode {raw}"))
}

fn ensure_known_project(db: &ProjectDb, project_id: &ProjectId) -> Result<()> {
    if !db.list_projects()?.iter().any(|p| &p.id == project_id) {
        bail!("project {project_id} does not exist; create it with `ripplecut new`");
    }
    Ok(())
}

fn load_manager<'a>(db: &'a ProjectDb, project_id: &ProjectId) -> Result<CommandManager<'a>> {
    ensure_known_project(db, project_id)?;
    Ok(CommandManager::load(db, project_id)?)
}

/// Prints a command result; a failed command makes the process exit non-zero.
fn report(result: CommandResult) -> Result<()> {
    print_json(&result)?;
    if !result.success {
        bail!(
            "{} failed: {}",
            result.command.unwrap_or("command"),
            result.error_message.unwrap_or_default()
        );
    }
    Ok(())
}

fn sequences_in_scope(
    db: &ProjectDb,
    project_id: &ProjectId,
    only: Option<String>,
) -> Result<Vec<project::SequenceRow>> {
    match only {
        Some(id) => Ok(vec![db.get_sequence(&SequenceId::from(id))?]),
        None => Ok(db.list_sequences(project_id)?),
    }
}

fn new_command(
    db: &ProjectDb,
    project_id: &ProjectId,
    name: &str,
    sequence_name: &str,
    fps: &str,
    video_tracks: u32,
    audio_tracks: u32,
) -> Result<()> {
    let rate = parse_rate(fps)?;
    let tx = db.begin_tx()?;
    db.ensure_project(project_id, name)?;
    let sequence = db.create_sequence(project_id, sequence_name, rate)?;
    let mut tracks = Vec::new();
    for idx in 0..video_tracks {
        let name = format!("V{}", idx + 1);
        tracks.push(db.create_track(&sequence.id, &name, TrackType::Video, i64::from(idx))?);
    }
    for idx in 0..audio_tracks {
        let name = format!("A{}", idx + 1);
        tracks.push(db.create_track(&sequence.id, &name, TrackType::Audio, i64::from(idx))?);
    }
    tx.commit()?;

    info!(
        project_id = %project_id,
        sequence_id = %sequence.id,
        rate = %rate,
        tracks = tracks.len(),
        "project created"
    );
    print_json(&serde_json::json!({
        "project_id": project_id,
        "sequence": sequence,
        "tracks": tracks,
        "created": chrono::Utc::now().to_rfc3339(),
    }))
}

fn import_command(
    db: &ProjectDb,
    project_id: &ProjectId,
    file: &Path,
    frames: i64,
    fps: &str,
    name: Option<String>,
) -> Result<()> {
    ensure_known_project(db, project_id)?;
    if !file.exists() {
        warn!(file = %file.display(), "importing a file that does not exist yet");
    }
    let rate = parse_rate(fps)?;
    let name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string())
    });
    let media = db.create_media(project_id, &name, &file.to_string_lossy(), frames, rate)?;
    info!(media_id = %media.id, frames, rate = %rate, "imported media");
    print_json(&media)
}

fn read_command_json(raw: &str) -> Result<serde_json::Value> {
    let text = if raw == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading command from stdin")?;
        buf
    } else if let Some(path) = raw.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("reading command from {path}"))?
    } else {
        raw.to_string()
    };
    serde_json::from_str(&text).context("command is not valid JSON")
}

fn exec_command(db: &ProjectDb, project_id: &ProjectId, raw: &str) -> Result<()> {
    let value = read_command_json(raw)?;
    let mut manager = load_manager(db, project_id)?;
    report(manager.execute_json(&value))
}

#[derive(Serialize)]
struct TrackCheck {
    sequence_id: SequenceId,
    track_id: timeline::TrackId,
    clips: usize,
    gaps: Vec<timeline::Gap>,
    overlaps: Vec<(timeline::ClipId, timeline::ClipId)>,
}

fn check_command(db: &ProjectDb, project_id: &ProjectId, only: Option<String>) -> Result<()> {
    let mut tracks = Vec::new();
    let mut overlapping = 0;
    for sequence in sequences_in_scope(db, project_id, only)? {
        for track in db.track_states(&sequence.id)? {
            let overlaps = find_overlaps(&track.clips);
            overlapping += overlaps.len();
            tracks.push(TrackCheck {
                sequence_id: sequence.id.clone(),
                gaps: find_gaps(&track),
                clips: track.clips.len(),
                track_id: track.track_id,
                overlaps,
            });
        }
    }
    print_json(&tracks)?;
    if overlapping > 0 {
        bail!("{overlapping} overlapping clip pairs found");
    }
    Ok(())
}

fn dump_command(db: &ProjectDb, project_id: &ProjectId, only: Option<String>) -> Result<()> {
    let mut sequences = Vec::new();
    for sequence in sequences_in_scope(db, project_id, only)? {
        let mut tracks = Vec::new();
        for track in db.list_tracks(&sequence.id)? {
            let clips = db.list_track_clips(&track.id)?;
            tracks.push(serde_json::json!({ "track": track, "clips": clips }));
        }
        sequences.push(serde_json::json!({ "sequence": sequence, "tracks": tracks }));
    }
    let history: Vec<_> = db
        .list_commands(project_id)?
        .into_iter()
        .map(|row| {
            serde_json::json!({
                "sequence_number": row.sequence_number,
                "command_type": row.command_type,
                "status": row.status.as_str(),
                "executed_at": row.executed_at,
            })
        })
        .collect();
    print_json(&serde_json::json!({
        "project_id": project_id,
        "sequences": sequences,
        "media": db.list_media(project_id)?,
        "history": history,
    }))
}

fn settings_command(
    db: &ProjectDb,
    project_id: &ProjectId,
    history_limit: Option<usize>,
    source_rounding: Option<String>,
    allow_bare_frame_numbers: Option<bool>,
    verify_apply_steps: Option<bool>,
) -> Result<()> {
    ensure_known_project(db, project_id)?;
    let current = db.edit_settings(project_id)?;
    let mut next = EditSettings {
        history_limit: history_limit.unwrap_or(current.history_limit),
        allow_bare_frame_numbers: allow_bare_frame_numbers
            .unwrap_or(current.allow_bare_frame_numbers),
        verify_apply_steps: verify_apply_steps.unwrap_or(current.verify_apply_steps),
        ..current.clone()
    };
    if let Some(raw) = source_rounding {
        next.source_rounding = parse_rounding(&raw)?;
    }
    if next != current {
        db.update_edit_settings(project_id, &next)?;
        info!(project_id = %project_id, "editing settings updated");
    }
    print_json(&next)
}
