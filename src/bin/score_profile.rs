//! Score a single profile from the command line.
//!
//! ```text
//! score-profile [--config config/config.toml] [--models a,b] <profile.json | ->
//! ```
//!
//! Prints the prediction as JSON on stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use fake_profile_detector::{
    config::AppConfig, service::ProfileScoringService, types::ProfileAttributes,
};
use std::io::Read;
use tracing_subscriber::EnvFilter;

struct Args {
    config: String,
    models: Option<Vec<String>>,
    input: String,
}

fn parse_args() -> Result<Args> {
    let mut config = "config/config.toml".to_string();
    let mut models = None;
    let mut input = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = args.next().context("--config needs a path")?,
            "--models" => {
                let list = args.next().context("--models needs a comma-separated list")?;
                models = Some(
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "-h" | "--help" => {
                eprintln!("usage: score-profile [--config PATH] [--models a,b] <profile.json | ->");
                std::process::exit(0);
            }
            _ if input.is_none() => input = Some(arg),
            other => bail!("unexpected argument {other:?}"),
        }
    }

    Ok(Args {
        config,
        models,
        input: input.unwrap_or_else(|| "-".to_string()),
    })
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read profile from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fake_profile_detector=warn".parse()?),
        )
        .init();

    let args = parse_args()?;
    let mut config = AppConfig::load_from_path(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    // Only the requested models are needed for a one-shot run
    config.models.preload = false;

    let service = ProfileScoringService::from_config(&config)?;

    let raw = read_input(&args.input)?;
    let profile: ProfileAttributes =
        serde_json::from_str(&raw).context("Input is not a profile JSON object")?;

    let result = service.score(&profile, args.models.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
