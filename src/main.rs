use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mixplan::config::AppConfig;
use mixplan::mixpoints::{self, MixPoint};
use mixplan::scoring;
use mixplan::sequence;
use mixplan::session::Session;
use mixplan::track::Track;
use mixplan::track::camelot::CamelotKey;
use mixplan::track::load::load_tracks;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mixplan", version, about = "DJ set planner: mix points, transitions and track order")]
struct Cli {
    /// Path to a config file (defaults to ~/.config/mixplan/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Order tracks into a set with planned transitions
    Plan {
        /// Track feature file (.json, .yaml or .yml)
        file: PathBuf,

        /// Number of tracks in the set
        #[arg(short = 'n', long)]
        length: usize,

        /// Track id to open the set with
        #[arg(short, long)]
        start: Option<String>,

        /// Print the session as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Also write the JSON session to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show candidate exit and entry points for each track
    Points {
        /// Track feature file (.json, .yaml or .yml)
        file: PathBuf,

        /// Only show this track id
        #[arg(short, long)]
        track: Option<String>,
    },

    /// Score the best transition between two tracks
    Score {
        /// Track feature file (.json, .yaml or .yml)
        file: PathBuf,

        /// Outgoing track id
        from: String,

        /// Incoming track id
        to: String,
    },

    /// Show keys that mix well with a Camelot key
    Keys {
        /// Camelot key, e.g. 8A
        key: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let engine = config.engine();

    let workers = config.resolve_workers();
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .context("Failed to start worker pool")?;
    log::debug!("Using {} workers", workers);

    match cli.command {
        Commands::Plan { file, length, start, json, output } => {
            let tracks = read_tracks(&file)?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            spinner.enable_steady_tick(Duration::from_millis(100));

            spinner.set_message(format!("Planning mix points for {} tracks...", tracks.len()));
            let plans = mixpoints::build_mix_plan(&tracks, &engine.planner);

            spinner.set_message("Searching for the best order...");
            let result = sequence::find_optimal_sequence(
                &tracks,
                &plans,
                length,
                start.as_deref(),
                &engine,
            );
            spinner.finish_and_clear();
            let session = result.context("Invalid planning request")?;

            if session.is_empty() {
                anyhow::bail!("No session could be planned: {}", session.warnings.join("; "));
            }

            let rendered = serde_json::to_string_pretty(&session)
                .context("Failed to serialize session")?;
            if let Some(path) = &output {
                std::fs::write(path, &rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }

            if json {
                println!("{}", rendered);
            } else {
                print_session(&session);
                if let Some(path) = &output {
                    println!();
                    println!("Session written to {}", path.display());
                }
            }
        }

        Commands::Points { file, track } => {
            let tracks = read_tracks(&file)?;
            let selected: Vec<&Track> = match &track {
                Some(id) => tracks.iter().filter(|t| &t.id == id).collect(),
                None => tracks.iter().collect(),
            };
            if selected.is_empty() {
                anyhow::bail!("No track with id \"{}\" in {}", track.unwrap_or_default(), file.display());
            }

            for (i, t) in selected.iter().enumerate() {
                let plan = mixpoints::plan(t, &engine.planner);
                if i > 0 {
                    println!();
                }
                println!("{} [{}] {:.1} BPM, {}", t.display_name(), t.id, t.bpm, display_key(&t.key));
                print_points("Exits", &plan.exits);
                print_points("Entries", &plan.entries);
            }
        }

        Commands::Score { file, from, to } => {
            let tracks = read_tracks(&file)?;
            let a = find_track(&tracks, &from, &file)?;
            let b = find_track(&tracks, &to, &file)?;
            let plan_a = mixpoints::plan(a, &engine.planner);
            let plan_b = mixpoints::plan(b, &engine.planner);

            let Some(c) = scoring::best_transition(a, &plan_a, b, &plan_b, &engine.scoring) else {
                println!("No mix points to pair between {} and {}.", a.id, b.id);
                return Ok(());
            };

            println!("{} -> {}", a.display_name(), b.display_name());
            println!();
            println!("Score:      {:.1}{}", c.score, if c.viable { "" } else { " (below viability threshold)" });
            println!("Type:       {}", c.kind.label());
            println!("Exit:       {} ({})", format_ms(c.exit.ms), point_summary(&c.exit));
            println!("Entry:      {} ({})", format_ms(c.entry.ms), point_summary(&c.entry));
            println!();
            println!("Harmonic:   {:.2}", c.sub_scores.harmonic);
            println!("Tempo:      {:.2}", c.sub_scores.tempo);
            println!("Energy:     {:.2}", c.sub_scores.energy);
            println!("Structure:  {:.2}", c.sub_scores.structure);
            println!();
            println!("{}", c.rationale);
        }

        Commands::Keys { key } => {
            let parsed = CamelotKey::parse(&key)
                .with_context(|| format!("\"{}\" is not a Camelot key (expected 1A-12B)", key))?;
            println!("{} (Open Key {})", parsed, parsed.open_key());
            println!();
            println!("Compatible keys:");
            for k in parsed.compatible_keys() {
                println!("  {:<4} {:<4} {}", k.to_string(), k.open_key(), parsed.relation(&k));
            }
        }
    }

    Ok(())
}

fn read_tracks(path: &Path) -> Result<Vec<Track>> {
    load_tracks(path).with_context(|| format!("Failed to load tracks from {}", path.display()))
}

fn find_track<'a>(tracks: &'a [Track], id: &str, file: &Path) -> Result<&'a Track> {
    tracks
        .iter()
        .find(|t| t.id == id)
        .with_context(|| format!("No track with id \"{}\" in {}", id, file.display()))
}

/// Print a session as a table, one row per track.
fn print_session(session: &Session) {
    println!(
        "{:>3}  {:<30} {:>6} {:>4}  {:<14} {:>8} {:>8} {:>6}",
        "#", "Track", "BPM", "Key", "Transition", "Exit", "Entry", "Score"
    );
    println!("{}", "-".repeat(90));

    for entry in &session.tracks {
        let t = &entry.track;
        let name = if t.title.trim().is_empty() { &t.id } else { &t.title };
        let (kind, exit, into, score) = match &entry.transition {
            Some(tr) => (
                tr.kind.label(),
                format_ms(tr.exit_point_ms),
                format_ms(tr.entry_point_ms),
                format!("{:.1}", tr.score),
            ),
            None => ("-", "-".to_string(), "-".to_string(), "-".to_string()),
        };

        println!(
            "{:>3}  {:<30} {:>6.1} {:>4}  {:<14} {:>8} {:>8} {:>6}",
            entry.position + 1,
            truncate(name, 30),
            t.bpm,
            display_key(&t.key),
            kind,
            exit,
            into,
            score,
        );
    }

    println!();
    println!(
        "Total score: {:.1}   Average per transition: {:.1}",
        session.total_score, session.avg_transition_score
    );
    println!("Exit = position in the outgoing track, Entry = position in the incoming track");

    if !session.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &session.warnings {
            println!("  - {}", w);
        }
    }
}

fn print_points(label: &str, points: &[MixPoint]) {
    println!("  {}:", label);
    for p in points {
        println!("    {:>8}  conf {:.2}  {}", format_ms(p.ms), p.confidence, point_summary(p));
    }
}

fn point_summary(p: &MixPoint) -> String {
    let section = p.section.map(|s| s.label()).unwrap_or("unlabelled");
    let mut summary = format!("{}, {}, energy {:.2}", section, p.vocals.label(), p.energy);
    if p.fallback {
        summary.push_str(", fallback");
    }
    summary
}

/// m:ss.d
fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}.{}", secs / 60, secs % 60, (ms % 1000) / 100)
}

fn display_key(raw: &str) -> &str {
    if raw.trim().is_empty() { "?" } else { raw.trim() }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
