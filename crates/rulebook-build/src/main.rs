mod assembler;
mod config;
mod error;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting rulebook snapshot build");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        root = %config.root.display(),
        output = %config.output.display(),
        stacks = config.stacks.len(),
        "configuration loaded"
    );

    // 2. Read and parse every stack; any read failure aborts before writing
    let snapshot = assembler::build(&config.root, &config.stacks).inspect_err(|e| {
        error!(error = %e, "build failed, existing snapshot left untouched");
    })?;

    // 3. Replace the snapshot file in one step
    let digest = snapshot.content_digest()?;
    snapshot.write_atomic(&config.output).inspect_err(|e| {
        error!(error = %e, "failed to write snapshot");
    })?;

    let guides: usize = snapshot.stacks.iter().map(|s| s.guides.len()).sum();
    info!(
        path = %config.output.display(),
        stacks = snapshot.stacks.len(),
        guides,
        digest = %digest,
        generated_at = %snapshot.generated_at,
        "snapshot written"
    );
    Ok(())
}
