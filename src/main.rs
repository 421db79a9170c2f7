use anyhow::{bail, Context};
use std::{env, fs::File, io::Write, time::Instant};
use swarmfolio::{best_of, run, run_restarts, RunConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

// usage: swarmfolio-bin [config.json] [output.json]
// the config path falls back to SWARMFOLIO_CONFIG, SWARMFOLIO_RESTARTS enables parallel restarts.
fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let config_path = match args.next().or_else(|| env::var("SWARMFOLIO_CONFIG").ok()) {
        Some(path) => path,
        None => bail!("No run configuration given (pass a path or set SWARMFOLIO_CONFIG)"),
    };
    let output_path = args.next();

    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path))?;
    let config: RunConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse run configuration in {}", config_path))?;

    let restarts = match env::var("SWARMFOLIO_RESTARTS") {
        Ok(value) => value
            .parse::<usize>()
            .with_context(|| format!("SWARMFOLIO_RESTARTS must be a count, got {}", value))?,
        Err(_) => 1,
    };

    let start = Instant::now();
    let result = if restarts > 1 {
        let results = run_restarts(&config, restarts)?;
        info!("Completed {} restarts", results.len());
        best_of(&results)
            .cloned()
            .context("Restarts produced no result")?
    } else {
        run(&config)?
    };
    info!("Optimization took {:.2?}", start.elapsed());

    let json = serde_json::to_string_pretty(&result)?;
    match output_path {
        Some(path) => {
            let mut file =
                File::create(&path).with_context(|| format!("Failed to create {}", path))?;
            file.write_all(json.as_bytes())?;
            info!("Result written to {}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
