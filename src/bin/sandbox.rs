use backoffice::logger::*;
use backoffice::sandbox::{self, SandboxState};
use backoffice::settings::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = SandboxCli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let config = project_settings.sandbox;
    if config.users.is_empty() {
        warn!("no sandbox users configured, every login will be rejected");
    }
    let address: SocketAddr = config.address.parse()?;

    let cancel = CancellationToken::new();
    let state = Arc::new(SandboxState::new(config));
    let (_, handle) = sandbox::spawn(state, address, cancel.clone())?;

    signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    handle.await?;

    Ok(())
}
