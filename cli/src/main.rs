//! Proxima CLI - one-shot proximity discovery.
//!
//! Mounts a single [`DiscoverySession`], drives it until the view settles
//! (results, an empty state, a directory error, or no location at all), prints
//! the outcome and releases everything.
//!
//! ```text
//! main() -> discover() -> DiscoverySession::mount() -> next_event()* -> render_view()
//! ```
//!
//! A terminal has no positioning hardware, so live positioning is simulated:
//! `--at LAT,LON` feeds one device fix, `--deny-location` reports a permission
//! denial, and otherwise the platform is treated as having no positioning.

mod render;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use proxima_engine::proxima_types::{Category, CategoryFilter, Coordinate, ProjectId, UserId};
use proxima_engine::{
    ChannelPositioning, DiscoveryPhase, DiscoverySession, DiscoveryView, HttpBackend,
    LocationStatus, NoPositioning, PositionError, PositionEvent, PositioningSource,
    ProximaConfig, SessionContext, Surface, TeamStatus, WatchRequest,
};

#[derive(Parser)]
#[command(name = "proxima")]
#[command(about = "Find nearby construction professionals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve your location and list professionals nearby
    Discover(DiscoverArgs),
}

#[derive(Args)]
struct DiscoverArgs {
    /// Acting user id (used for the profile location fallback)
    #[arg(long)]
    user: String,
    /// Active project; professionals already on its team are hidden
    #[arg(long)]
    project: Option<String>,
    /// Discovery surface, which selects the default search radius
    #[arg(long, value_enum, default_value_t = SurfaceArg::Map)]
    surface: SurfaceArg,
    /// Your own trade; peers of the same trade are hidden
    #[arg(long)]
    viewer_category: Option<String>,
    /// Only professionals of this category
    #[arg(long)]
    category: Option<String>,
    /// Only professionals of this sub-category
    #[arg(long)]
    sub_category: Option<String>,
    /// Simulated device fix, as LAT,LON
    #[arg(long, value_parser = parse_coordinate, conflicts_with = "deny_location")]
    at: Option<Coordinate>,
    /// Simulate a denied location permission
    #[arg(long)]
    deny_location: bool,
    /// Give up if nothing settles within this many seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SurfaceArg {
    Map,
    List,
}

impl From<SurfaceArg> for Surface {
    fn from(value: SurfaceArg) -> Self {
        match value {
            SurfaceArg::Map => Surface::Map,
            SurfaceArg::List => Surface::List,
        }
    }
}

fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got `{raw}`"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("invalid latitude `{}`: {e}", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("invalid longitude `{}`: {e}", lon.trim()))?;
    Coordinate::new(lat, lon).map_err(|e| e.to_string())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stderr keeps stdout clean for results.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.proxima/logs/proxima.log
    if let Some(config_path) = ProximaConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("proxima.log"));
    }

    // Fallback: ./.proxima/logs/proxima.log
    candidates.push(PathBuf::from(".proxima").join("logs").join("proxima.log"));

    candidates
}

/// Answers every watch request with `event`, then holds the feed until the
/// engine releases it.
async fn simulated_device(
    mut requests: mpsc::UnboundedReceiver<WatchRequest>,
    event: PositionEvent,
) {
    while let Some(request) = requests.recv().await {
        tracing::debug!(
            high_accuracy = request.options.high_accuracy,
            timeout = ?request.options.timeout,
            "Position watch opened"
        );
        if request.feed.publish(event).await {
            request.feed.released().await;
        }
        tracing::debug!("Position watch released by engine");
    }
}

fn positioning_for(args: &DiscoverArgs) -> (Arc<dyn PositioningSource>, Option<JoinHandle<()>>) {
    let event = match (args.at, args.deny_location) {
        (Some(at), _) => PositionEvent::Fix(at),
        (None, true) => PositionEvent::Failed(PositionError::PermissionDenied),
        (None, false) => return (Arc::new(NoPositioning), None),
    };
    let (positioning, requests) = ChannelPositioning::new();
    let device = tokio::spawn(simulated_device(requests, event));
    (Arc::new(positioning), Some(device))
}

/// Results are final once the search settled and, with a project set, the
/// team snapshot has landed or failed.
fn settled(view: &DiscoveryView) -> bool {
    let searched = match view.phase {
        DiscoveryPhase::Ready | DiscoveryPhase::Error => true,
        DiscoveryPhase::AwaitingLocation => view.location == LocationStatus::Unavailable,
        DiscoveryPhase::Searching | DiscoveryPhase::Refreshing => false,
    };
    searched && view.team != TeamStatus::Pending
}

async fn discover(args: DiscoverArgs) -> Result<()> {
    let config = ProximaConfig::load()?.unwrap_or_default();
    let backend = Arc::new(
        HttpBackend::from_config(&config).context("failed to configure service clients")?,
    );
    let policy = config.policy(args.surface.into())?;
    let context = SessionContext::signed_in(UserId::new(args.user.as_str()))
        .with_category(args.viewer_category.as_deref().map(Category::parse));
    let (positioning, device) = positioning_for(&args);

    let mut session = DiscoverySession::mount(
        backend,
        positioning,
        context,
        policy,
        args.project.clone().map(ProjectId::new),
        config.watch_options(),
    );
    session.set_filter(CategoryFilter::new(args.category, args.sub_category));

    let waited = tokio::time::timeout(Duration::from_secs(args.timeout_secs), async {
        while !settled(&session.view()) {
            session.next_event().await;
        }
    })
    .await;
    let view = session.view();
    session.unmount();
    if let Some(device) = device {
        device.abort();
    }

    if waited.is_err() {
        bail!(
            "discovery did not settle within {}s (phase: {})",
            args.timeout_secs,
            view.phase.as_str()
        );
    }
    print!("{}", render::render_view(&view));
    if view.phase == DiscoveryPhase::Error {
        bail!("directory search failed");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Discover(args) => discover(args).await,
    }
}
