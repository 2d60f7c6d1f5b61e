mod app;
mod display;
mod script;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use siap_ai::Advisor;
use siap_core::{Coordinate, School, WorkflowConfig, geo, geofence};
use siap_store::JsonFileCache;
use siap_sync::DataServiceClient;
use tracing_subscriber::EnvFilter;

use crate::app::{App, Submitted};
use crate::script::LoadedScript;

#[derive(Parser)]
#[command(name = "siap", version, about = "Field supervision for school inspectors")]
struct Cli {
    /// Data service endpoint.
    #[arg(long, env = "SIAP_API_URL", global = true)]
    api_url: Option<String>,

    /// Local cache file.
    #[arg(long, env = "SIAP_CACHE_PATH", default_value = "siap-cache.json", global = true)]
    cache_path: PathBuf,

    /// Inspector id (`id_pengawas`). Defaults to the cached profile.
    #[arg(long, env = "SIAP_INSPECTOR_ID", global = true)]
    inspector_id: Option<String>,

    /// Geofence radius in meters.
    #[arg(long, env = "SIAP_RADIUS_METERS", default_value_t = geofence::GEOFENCE_RADIUS_METERS, global = true)]
    radius_meters: f64,

    /// Key for the advisory text endpoint.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    gemini_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Great-circle distance in meters between two points.
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lon1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lon2: f64,
    },
    /// Check a position against a school's registered coordinate.
    Geofence {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Cached school id or NPSN.
        #[arg(long, conflicts_with_all = ["school_lat", "school_lon"])]
        school: Option<String>,
        #[arg(long, allow_negative_numbers = true, requires = "school_lon")]
        school_lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires = "school_lat")]
        school_lon: Option<f64>,
    },
    /// List cached schools.
    Schools {
        /// Filter by name or NPSN.
        #[arg(long)]
        search: Option<String>,
    },
    /// List cached visits, or show one in full.
    Visits {
        #[arg(long)]
        show: Option<String>,
    },
    /// Capture a visit from a script file and submit it.
    Visit {
        #[arg(long)]
        script: PathBuf,
        /// Stop at the final stage without submitting.
        #[arg(long)]
        dry_run: bool,
    },
    /// Exchange data with the data service.
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
    /// Empathetic follow-up advice for a cached visit (latest by default).
    Advice {
        #[arg(long)]
        visit: Option<String>,
    },
    /// A leadership quote for the inspector.
    Quote,
    /// Clear the local cache.
    Logout {
        /// Also drop visits that were never delivered.
        #[arg(long)]
        discard_outbox: bool,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Refresh profile, schools, and visit history.
    Pull,
    /// Deliver queued visits.
    Flush,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("siap v{}", env!("CARGO_PKG_VERSION"));

    if !(cli.radius_meters.is_finite() && cli.radius_meters > 0.0) {
        bail!("radius must be a positive number of meters");
    }
    let config = WorkflowConfig {
        geofence_radius_meters: cli.radius_meters,
        ..WorkflowConfig::default()
    };

    match cli.command {
        Command::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => {
            let meters = geo::distance(lat1, lon1, lat2, lon2);
            println!("{meters:.1}");
            Ok(())
        }
        Command::Geofence {
            lat,
            lon,
            school,
            school_lat,
            school_lon,
        } => {
            let captured = Coordinate::new(lat, lon)?;
            let target = match school {
                Some(key) => {
                    let app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
                    let directory = app.directory();
                    let found = directory
                        .get(&key)
                        .cloned()
                        .or_else(|| directory.search(&key).first().map(|s| (*s).clone()));
                    found.with_context(|| format!("school {key:?} is not in the cache"))?
                }
                None => School {
                    id: String::new(),
                    npsn: String::new(),
                    name: String::new(),
                    principal: String::new(),
                    inspector_id: String::new(),
                    latitude: school_lat,
                    longitude: school_lon,
                },
            };
            let result = geofence::evaluate(&captured, &target, config.geofence_radius_meters);
            if !target.name.is_empty() {
                println!("{}", target.name);
            }
            display::print_geofence(&result, config.geofence_radius_meters);
            Ok(())
        }
        Command::Schools { search } => {
            let app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
            let directory = app.directory();
            let schools = directory.search(search.as_deref().unwrap_or(""));
            display::print_school_table(&schools);
            Ok(())
        }
        Command::Visits { show } => {
            let app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
            let visits = &app.state().visits;
            match show {
                Some(id) => {
                    let visit = visits
                        .iter()
                        .find(|v| v.id == id)
                        .with_context(|| format!("visit {id} is not in the cache"))?;
                    display::print_visit_card(visit);
                }
                None => display::print_visit_table(visits),
            }
            Ok(())
        }
        Command::Visit { script, dry_run } => {
            let mut app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
            require_inspector(&app)?;
            let loaded = LoadedScript::load(&script)?;
            let directory = app.directory();

            let workflow = app.start_visit()?;
            eprintln!("Capturing {}", workflow.draft().id);
            loaded.run(&directory, workflow, None).await?;

            if dry_run {
                let missing = workflow.missing_requirements();
                if missing.is_empty() {
                    eprintln!("Ready to submit.");
                } else {
                    eprintln!("Missing before submit: {missing:?}");
                }
                app.cancel_visit();
                return Ok(());
            }

            let client = data_service(cli.api_url.as_deref())?;
            let Submitted {
                visit,
                stats,
                durable,
            } = app.submit_visit(&client).await?;
            if !durable && stats.remaining > 0 {
                println!("{}", serde_json::to_string_pretty(&visit)?);
                bail!(
                    "visit {} could not be saved locally or delivered; keep the record printed above",
                    visit.id
                );
            }
            display::print_visit_card(&visit);
            if stats.remaining > 0 {
                eprintln!(
                    "{} visit(s) queued; run `siap sync flush` when online.",
                    stats.remaining
                );
            }
            Ok(())
        }
        Command::Sync { action } => {
            let mut app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
            let client = data_service(cli.api_url.as_deref())?;
            match action {
                SyncAction::Pull => {
                    require_inspector(&app)?;
                    app.pull(&client).await?;
                    let state = app.state();
                    eprintln!(
                        "Pulled {} school(s), {} visit(s).",
                        state.schools.len(),
                        state.visits.len()
                    );
                }
                SyncAction::Flush => {
                    let stats = app.flush(&client).await?;
                    eprintln!(
                        "Delivered {}, {} still queued.",
                        stats.delivered, stats.remaining
                    );
                }
            }
            Ok(())
        }
        Command::Advice { visit } => {
            let app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
            let visits = &app.state().visits;
            let chosen = match &visit {
                Some(id) => visits.iter().find(|v| &v.id == id),
                None => visits.first(),
            }
            .context("no matching visit in the cache")?;
            let advisor = Advisor::new(cli.gemini_api_key);
            let text = advisor
                .empathetic_advice(&chosen.key_findings, &chosen.agreed_actions)
                .await;
            println!("{text}");
            Ok(())
        }
        Command::Quote => {
            let app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
            let (name, region) = match &app.state().user {
                Some(user) => (user.nama_pengawas.clone(), user.wilayah.clone()),
                None => (app.inspector_id().to_string(), String::new()),
            };
            let advisor = Advisor::new(cli.gemini_api_key);
            println!("{}", advisor.leadership_quote(&name, &region).await);
            Ok(())
        }
        Command::Logout { discard_outbox } => {
            let mut app = open_app(&cli.cache_path, cli.inspector_id.as_deref(), config);
            let dropped = app.logout(discard_outbox)?;
            let kept = app.state().outbox.len();
            eprintln!("Cache cleared ({dropped} undelivered visit(s) dropped, {kept} kept).");
            Ok(())
        }
    }
}

fn open_app(
    cache_path: &std::path::Path,
    inspector_id: Option<&str>,
    config: WorkflowConfig,
) -> App<JsonFileCache> {
    App::open(
        JsonFileCache::new(cache_path),
        inspector_id.map(str::to_string),
        config,
    )
}

fn require_inspector(app: &App<JsonFileCache>) -> anyhow::Result<()> {
    if app.inspector_id().is_empty() {
        bail!("no inspector id; pass --inspector-id or run `siap sync pull` with one");
    }
    Ok(())
}

fn data_service(api_url: Option<&str>) -> anyhow::Result<DataServiceClient> {
    let url = api_url.context("no data service URL; set SIAP_API_URL or pass --api-url")?;
    Ok(DataServiceClient::new(url.to_string()))
}
