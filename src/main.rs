use charger_watch::app::{Controller, PollOutcome};
use charger_watch::config::AppConfig;
use charger_watch::ingest::ApiClient;
use charger_watch::logging::{self, Component, LogLevel};
use charger_watch::model::{CoordSystem, Coordinate};
use charger_watch::present::markers::AvailabilityLevel;
use charger_watch::watchlist::slot::{FileSlot, KvSlot, MemorySlot, PostgresSlot};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

const DEFAULT_STATE_DIR: &str = ".charger-watch";

#[derive(Parser, Debug)]
#[command(author, version, about = "Live charger occupancy for the Yuquan and Zijingang campuses", long_about = None)]
struct Args {
    /// TOML config file; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Campus id to show (2143 Yuquan, 1774 Zijingang)
    #[arg(long)]
    campus: Option<String>,
    /// Provider id to show
    #[arg(long)]
    provider: Option<String>,
    /// Tile backend: osm, gaode or baidu
    #[arg(long)]
    basemap: Option<String>,
    /// Poll once and exit
    #[arg(long)]
    once: bool,
    /// Stop after this many polls
    #[arg(long)]
    cycles: Option<usize>,
    /// Toggle a station on the watchlist (repeatable)
    #[arg(long)]
    toggle: Vec<String>,
    /// List the closest stations to a WGS84 fix, "lat,lng"
    #[arg(long)]
    near: Option<String>,
    /// Keep the watchlist in memory only
    #[arg(long)]
    ephemeral: bool,
    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_fix(value: &str) -> Option<Coordinate> {
    let (lat, lng) = value.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    Some(Coordinate::new(lng, lat, CoordSystem::Wgs84))
}

fn open_slot(args: &Args, config: &AppConfig) -> Box<dyn KvSlot> {
    if args.ephemeral {
        return Box::new(MemorySlot::new());
    }
    if let Some(url) = &config.database_url {
        match PostgresSlot::connect(url) {
            Ok(slot) => return Box::new(slot),
            Err(e) => logging::warn(
                Component::Watchlist,
                None,
                &format!("postgres slot unavailable ({}), using the file slot", e),
            ),
        }
    }
    let dir = config
        .watchlist_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
    Box::new(FileSlot::new(dir))
}

fn print_outcome(outcome: &PollOutcome) {
    let p = &outcome.presentation;
    println!(
        "== {} | source: {:?} | map: {} | {} markers{}",
        p.updated_at.as_deref().unwrap_or("no snapshot"),
        outcome.source,
        p.working_system,
        p.markers.len(),
        if p.stale { " | STALE" } else { "" }
    );
    if let Some(notice) = &outcome.notice {
        println!("!! {}", notice);
    }
    for row in &p.rows {
        let v = &row.view;
        let status = if v.reported {
            AvailabilityLevel::classify(v.free_count).status_text(v.free_count)
        } else {
            "not reporting".to_string()
        };
        println!(
            "{} {:<32} {:<10} {:<18} {}/{}",
            if row.watched { "*" } else { " " },
            v.descriptor,
            v.provider_id,
            status,
            v.free_count,
            v.total_count
        );
    }
}

fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            process::exit(2);
        }
    };

    let level = match args.log_level.as_deref() {
        Some(s) => LogLevel::parse(s).unwrap_or(config.log_level),
        None => config.log_level,
    };
    logging::init_logger(level, config.log_file.as_deref(), true);

    let api = match ApiClient::from_config(&config) {
        Ok(api) => api,
        Err(e) => {
            logging::error(Component::System, None, &format!("cannot build HTTP client: {}", e));
            process::exit(1);
        }
    };

    let slot = open_slot(&args, &config);
    let mut controller = Controller::from_config(&config, api, slot);

    if let Some(id) = &args.basemap {
        controller.switch_basemap(id);
    }
    controller.load_providers();
    controller.set_campus(args.campus.as_deref());
    controller.set_provider(args.provider.as_deref());

    let mut interval_secs = config.fetch_interval_secs;
    if !config.fetch_interval_explicit {
        match controller.api().fetch_remote_config() {
            Ok(remote) => {
                if let Some(secs) = remote.fetch_interval.filter(|s| *s > 0) {
                    interval_secs = secs;
                }
            }
            Err(e) => logging::log_fetch_failure(Component::System, "remote config", &e),
        }
    }
    logging::info(
        Component::System,
        None,
        &format!("polling {} every {}s", controller.api().base_url(), interval_secs),
    );

    // Toggles and distance queries need session data, so poll once first.
    let first = controller.refresh();
    for descriptor in &args.toggle {
        let result = controller.toggle_watch(descriptor);
        println!("{}: {:?}", descriptor, result);
    }
    if let Some(fix) = &args.near {
        match parse_fix(fix) {
            Some(user) => {
                for (view, metres) in controller.nearest_to(user, 5) {
                    println!("{:>7.0} m  {}", metres, view.descriptor);
                }
            }
            None => eprintln!("--near expects \"lat,lng\", got '{}'", fix),
        }
    }

    if args.toggle.is_empty() {
        print_outcome(&first);
    } else {
        print_outcome(&PollOutcome {
            presentation: controller.render(),
            ..first
        });
    }

    let remaining = if args.once {
        Some(0)
    } else {
        args.cycles.map(|n| n.saturating_sub(1))
    };
    if remaining == Some(0) {
        return;
    }

    std::thread::sleep(Duration::from_secs(interval_secs));
    controller.run(Duration::from_secs(interval_secs), remaining, print_outcome);
}
