//! floodcast entry point: CLI wiring, config loading and a single run.

use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use floodcast::config::ServiceConfig;
use floodcast::io::export::export_csv;
use floodcast::jobs::JobManager;
use floodcast::model::ModelTemplate;
use floodcast::pipeline::{Pipeline, SimulationRequest};
use floodcast::series::SyntheticBoundaries;
use floodcast::series::timefmt::{format_timestamp, parse_timestamp};
use floodcast::sim::{ScriptedSolver, SimulationResult};

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    request_path: Option<String>,
    synthetic: Option<(String, String)>,
    seed: u64,
    csv_out: Option<String>,
    log_level: Level,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("floodcast: boundary-driven flood simulation runs");
    eprintln!();
    eprintln!("Usage: floodcast [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>              Load service config from TOML");
    eprintln!("  --request <path>             Run the JSON simulation request in <path>");
    eprintln!("  --synthetic <start> <end>    Run synthetic boundaries over [start, end]");
    eprintln!("  --seed <u64>                 Seed for --synthetic (default: 42)");
    eprintln!("  --csv-out <path>             Export sampled node series to CSV");
    eprintln!("  --log-level <level>          trace|debug|info|warn|error (default: info)");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                      Start REST API server");
        eprintln!("  --port <u16>                 API server port (default: 3000)");
    }
    eprintln!("  --help                       Show this help message");
    eprintln!();
    eprintln!("Runs use the bundled scripted solver, which keeps every node dry.");
}

/// Returns the value following flag `args[*i]`, or exits with an error.
fn flag_value(args: &[String], i: &mut usize, what: &str) -> String {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(value) => value.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        request_path: None,
        synthetic: None,
        seed: 42,
        csv_out: None,
        log_level: Level::INFO,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => cli.config_path = Some(flag_value(&args, &mut i, "a path argument")),
            "--request" => cli.request_path = Some(flag_value(&args, &mut i, "a path argument")),
            "--synthetic" => {
                let start = flag_value(&args, &mut i, "<start> <end> arguments");
                let end = flag_value(&args, &mut i, "<start> <end> arguments");
                cli.synthetic = Some((start, end));
            }
            "--seed" => {
                let raw = flag_value(&args, &mut i, "a u64 argument");
                if let Ok(s) = raw.parse::<u64>() {
                    cli.seed = s;
                } else {
                    eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--csv-out" => cli.csv_out = Some(flag_value(&args, &mut i, "a path argument")),
            "--log-level" => {
                let raw = flag_value(&args, &mut i, "a level argument");
                if let Ok(level) = raw.parse::<Level>() {
                    cli.log_level = level;
                } else {
                    eprintln!("error: --log-level value \"{raw}\" is not a valid level");
                    process::exit(1);
                }
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                let raw = flag_value(&args, &mut i, "a u16 argument");
                if let Ok(p) = raw.parse::<u16>() {
                    cli.port = p;
                } else {
                    eprintln!("error: --port value \"{raw}\" is not a valid u16");
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    if cli.request_path.is_some() && cli.synthetic.is_some() {
        eprintln!("error: --request and --synthetic are mutually exclusive");
        process::exit(1);
    }

    cli
}

fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging unavailable: {e}");
    }
}

/// Builds the request to run, if any.
fn build_request(cli: &CliArgs) -> Result<Option<SimulationRequest>, String> {
    if let Some(path) = &cli.request_path {
        let text = fs::read_to_string(path).map_err(|e| format!("cannot read \"{path}\": {e}"))?;
        let request = serde_json::from_str(&text)
            .map_err(|e| format!("invalid request \"{path}\": {e}"))?;
        return Ok(Some(request));
    }
    if let Some((start, end)) = &cli.synthetic {
        let parse = |s: &str| parse_timestamp(s).ok_or_else(|| format!("invalid date \"{s}\""));
        let (start, end) = (parse(start)?, parse(end)?);
        let boundaries = SyntheticBoundaries::default().generate(start, end, cli.seed);
        return Ok(Some(SimulationRequest {
            start_date: format_timestamp(&start),
            end_date: format_timestamp(&end),
            boundaries: boundaries.to_raw(),
            nodes: None,
        }));
    }
    Ok(None)
}

fn print_summary(result: &SimulationResult) {
    println!(
        "{:<16} {:>10} {:>12} {:>9} {:>6}",
        "node", "max_depth", "max_level", "risk", "prob"
    );
    for (id, node) in &result.nodes {
        let (risk, probability) = result
            .flood
            .get(id)
            .map_or(("-".to_string(), 0.0), |a| (a.risk.to_string(), a.probability));
        println!(
            "{id:<16} {:>10.3} {:>12.3} {risk:>9} {probability:>6.2}",
            node.max_depth_m, node.max_water_level_m
        );
    }
}

fn main() {
    let cli = parse_args();
    init_logging(cli.log_level);

    let config = if let Some(ref path) = cli.config_path {
        match ServiceConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ServiceConfig::default()
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let request = match build_request(&cli) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    #[cfg(feature = "api")]
    let idle = request.is_none() && !cli.serve;
    #[cfg(not(feature = "api"))]
    let idle = request.is_none();
    if idle {
        eprintln!("error: nothing to do; pass --request or --synthetic");
        print_help();
        process::exit(1);
    }

    let template = match ModelTemplate::load(&config.paths.template) {
        Ok(template) => template,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let solver = ScriptedSolver::still_water(&config.solver);
    let pipeline = match Pipeline::new(&config, template, solver) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let manager = Arc::new(JobManager::in_memory(Arc::new(pipeline), config.jobs.timeout()));

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });

    if let Some(request) = request {
        let result = match rt.block_on(manager.submit_and_wait(request)) {
            Ok((_, result)) => result,
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        };

        print_summary(&result);

        if let Some(ref path) = cli.csv_out {
            if let Err(e) = export_csv(&result, Path::new(path)) {
                eprintln!("error: failed to write CSV: {e}");
                process::exit(1);
            }
            eprintln!("Node series written to {path}");
        }
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;

        let state = Arc::new(floodcast::api::AppState {
            manager: Arc::clone(&manager),
        });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        if let Err(e) = rt.block_on(floodcast::api::serve(state, addr)) {
            eprintln!("error: API server failed: {e}");
            process::exit(1);
        }
    }
}
