use anyhow::Result;
use standup_server::ServeOptions;
use std::path::Path;

pub fn run(root: &Path, port: Option<u16>, no_scheduler: bool) -> Result<()> {
    let (config, app) = super::app_state(root)?;
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }

    let opts = ServeOptions {
        scheduler: config.scheduler.enabled && !no_scheduler,
        stale_claim_after: config.scheduler.stale_claim_after(),
        catch_up_on_start: config.scheduler.catch_up_on_start,
    };
    let port = port.unwrap_or(config.server.port);
    tracing::info!(
        instance = %config.scheduler.instance(),
        port,
        scheduler = opts.scheduler,
        "starting standup"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(standup_server::serve(app, port, opts))
}
