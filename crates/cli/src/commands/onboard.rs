//! `counsel onboard` — write a default configuration file.

use anyhow::{bail, Result};
use std::path::Path;

use counsel_config::AppConfig;

pub fn run() -> Result<()> {
    let path = Path::new("counsel.toml");
    if path.exists() {
        bail!("counsel.toml already exists — remove it first to regenerate");
    }

    std::fs::write(path, AppConfig::default_toml())?;

    println!("Wrote {}", path.display());
    println!("Next steps:");
    println!("  1. Set auth.secret (or export COUNSEL_AUTH_SECRET)");
    println!("  2. counsel migrate");
    println!("  3. counsel add-user --email you@example.com --name You --password ...");
    println!("  4. counsel serve");
    Ok(())
}
