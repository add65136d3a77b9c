use anyhow::{Context, Result};
use clap::Parser;
use signer::cli::{Cli, Commands, OutputFormat, RunOverrides};
use signer::config::{self, SignerConfig};
use signer::observability::{init_tracing, install_panic_hook};
use signer::pipeline::{signer_pipeline, SignerOptions};
use signer::{HashFunction, SynchronizedHashResource};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);
    install_panic_hook();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            seed,
            buffer_capacity,
            max_in_flight,
            restricted,
            free,
            salt,
            simulate_latency,
            print_intermediate,
            format,
        } => {
            let overrides = RunOverrides {
                seed,
                buffer_capacity,
                max_in_flight,
                restricted,
                free,
                salt,
                simulate_latency,
            };
            let config = overrides.apply(config);
            config.validate()?;
            handle_run(&config, SignerOptions { print_intermediate }, format)
        }
        Commands::Hash {
            algorithm,
            data,
            salt,
        } => {
            let hash = algorithm.build(&salt);
            println!("{}", hash.hash(&data)?);
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

// File (explicit or discovered), then environment overrides
fn load_config(cli: &Cli) -> Result<SignerConfig> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => config::load_config()?,
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn handle_run(config: &SignerConfig, options: SignerOptions, format: OutputFormat) -> Result<()> {
    let resource = Arc::new(SynchronizedHashResource::from_config(&config.hashing));
    let pipeline = signer_pipeline(resource, config.seed.clone(), &config.pipeline, options);
    let output = pipeline.execute().context("signing pipeline failed")?;

    match format {
        OutputFormat::Plain => {
            for timing in &output.timings {
                tracing::info!("{}", timing.format());
            }
            let elapsed = output.elapsed;
            let combined = output.into_single()?;
            println!("{combined}");
            tracing::info!("done in {:.3}s", elapsed.as_secs_f64());
        }
        OutputFormat::Json => {
            let stages: Vec<_> = output
                .timings
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "duration_ms": t.duration.as_secs_f64() * 1000.0,
                        "emitted": t.emitted,
                        "final_state": t.final_state.to_string(),
                    })
                })
                .collect();
            let elapsed_ms = output.elapsed.as_secs_f64() * 1000.0;
            let report = serde_json::json!({
                "result": output.into_single()?,
                "elapsed_ms": elapsed_ms,
                "stages": stages,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
