use backoffice::settings::*;

fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);
    println!("Client paths: {:?}", project_settings.api.client_config());

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // $ BACKOFFICE__API__TIMEOUT_MS=500 cargo run --bin settings_demo -- --settings=settings/dev.toml status
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Request timeout: {:?}", project_settings.api.timeout());

    Ok(())
}
