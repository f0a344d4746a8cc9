use anyhow::{Context, Result};
use binder_common::BinderConfig;
use binder_server::{BinderSession, HostPlatform};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // stdout carries the announcement, so logs go to stderr only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = BinderConfig::from_env().context("Failed to resolve base directory")?;
    tracing::info!(
        "Starting socket binder under {:?} (from {})",
        config.base_dir,
        config.base_source
    );

    let session = BinderSession::establish(HostPlatform, &config)
        .context("Failed to set up private directory and listeners")?;
    session
        .publish()
        .context("Failed to publish socket paths")?;
    session.serve().context("Failed to hand over data socket")?;

    Ok(())
}
