//! Command-line front end: load a CSV, run the requested models, print metrics.

use occupancy_forecast::summary::{monthly_profile, weekday_profile};
use occupancy_forecast::{
    ArtifactWriter, DataLoader, ForecastError, ModelKind, Orchestrator, RunConfig, RunMode,
};
use serde_json::json;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: bedcast --data <csv> [--horizon N] [--mode forecast|test|accurate]
               [--config <request.json>] [--models <name,...>]
               [--output <dir>] [--profile]

Runs the requested forecasting models over a daily occupancy CSV with
`date` and `occupancy` columns and prints the metrics as JSON.

--models takes a comma-separated list such as `sarima,holt-winter`.
Listed models keep their parameters from --config, others use defaults.";

#[derive(Debug)]
struct Args {
    data: PathBuf,
    horizon: Option<usize>,
    mode: Option<RunMode>,
    config: Option<PathBuf>,
    models: Option<Vec<ModelKind>>,
    output: PathBuf,
    profile: bool,
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Run(ForecastError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Run(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}\n\n{USAGE}"),
            CliError::Run(err) => write!(f, "{err}"),
        }
    }
}

impl From<ForecastError> for CliError {
    fn from(err: ForecastError) -> Self {
        CliError::Run(err)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
}

fn run() -> Result<(), CliError> {
    let Some(args) = parse_args(env::args().skip(1).collect())? else {
        return Ok(());
    };

    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(horizon) = args.horizon {
        config.horizon = horizon;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(kinds) = &args.models {
        config.models = config.models.select(kinds);
    }

    let series = DataLoader::from_csv(&args.data)?;
    let request = config.into_request(series);
    let mut orchestrator = Orchestrator::new(ArtifactWriter::new(&args.output));
    let metrics = orchestrator.run(&request)?;

    let output = if args.profile {
        json!({
            "metrics": metrics,
            "weekday_profile": weekday_profile(&request.series),
            "monthly_profile": monthly_profile(&request.series),
        })
    } else {
        json!(metrics)
    };
    let text = serde_json::to_string_pretty(&output).map_err(ForecastError::from)?;
    println!("{text}");
    Ok(())
}

fn parse_args(tokens: Vec<String>) -> Result<Option<Args>, CliError> {
    let mut data = None;
    let mut horizon = None;
    let mut mode = None;
    let mut config = None;
    let mut models = None;
    let mut output = PathBuf::from("output");
    let mut profile = false;

    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        let (flag, inline) = match token.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (token, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| iter.next())
                .filter(|v| !v.starts_with("--"))
                .ok_or_else(|| CliError::Usage(format!("{flag} requires a value")))
        };

        match flag.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(None);
            }
            "--data" => data = Some(PathBuf::from(value()?)),
            "--horizon" => {
                let raw = value()?;
                let parsed = raw.parse::<usize>().map_err(|_| {
                    CliError::Usage(format!("--horizon expects a positive integer, got '{raw}'"))
                })?;
                horizon = Some(parsed);
            }
            "--mode" => {
                let raw = value()?;
                mode = Some(
                    raw.parse::<RunMode>()
                        .map_err(|e| CliError::Usage(e.to_string()))?,
                );
            }
            "--config" => config = Some(PathBuf::from(value()?)),
            "--models" => models = Some(parse_models(&value()?)?),
            "--output" => output = PathBuf::from(value()?),
            "--profile" => profile = true,
            other => return Err(CliError::Usage(format!("unknown option '{other}'"))),
        }
    }

    let data = data.ok_or_else(|| CliError::Usage("--data <csv> is required".to_string()))?;
    Ok(Some(Args {
        data,
        horizon,
        mode,
        config,
        models,
        output,
        profile,
    }))
}

/// Model families named in a comma-separated list, without repeats
fn parse_models(raw: &str) -> Result<Vec<ModelKind>, CliError> {
    let mut kinds = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let kind = ModelKind::from_name(name)
            .ok_or_else(|| CliError::Usage(format!("unknown model '{name}'")))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(CliError::Usage("--models needs at least one model name".to_string()));
    }
    Ok(kinds)
}
