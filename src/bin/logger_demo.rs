use backoffice::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "backoffice=trace,info".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!("application trace log");
    debug!("application debug log");

    let span = info_span!("api_request", id = "0a1b2c3d4e", method = "GET", path = "orders");
    let _entered = span.enter();
    info!(status = 200, "response received");

    Ok(())
}
