use anyhow::Context;
use standup_core::config::Config;
use standup_core::paths;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing standup in: {}", root.display());

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config")?
    } else {
        let config = Config::default();
        config.save(root).context("failed to write config")?;
        println!("  created: {}", paths::CONFIG_FILE);
        config
    };

    let db_path = config.database_path(root);
    let existed = db_path.exists();
    standup_core::store::CheckinDb::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let verb = if existed { "exists: " } else { "created:" };
    println!("  {verb} {}", db_path.display());

    println!(
        "\nSet {} before running `standup serve`.",
        standup_core::config::SIGNING_SECRET_ENV
    );
    Ok(())
}
