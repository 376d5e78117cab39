use backoffice::application_impl::*;
use backoffice::application_port::*;
use backoffice::domain_model::*;
use backoffice::domain_port::*;
use backoffice::infra_fake::*;
use backoffice::infra_http::*;
use backoffice::infra_memory::*;
use backoffice::infra_redis::*;
use backoffice::logger::*;
use backoffice::settings::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let transport: Arc<dyn BackendTransport> = match project_settings.api.backend.as_str() {
        "http" => Arc::new(ReqwestTransport::new(
            project_settings.api.base_url.clone(),
            project_settings.api.timeout(),
        )?),
        "fake" => Arc::new(FakeBackendTransport::seeded()),
        other => return Err(anyhow::anyhow!("Unknown api backend: {}", other)),
    };

    let store: Arc<dyn CredentialStore> = match project_settings.credentials.backend.as_str() {
        "memory" => Arc::new(MemoryCredentialStore::new()),
        "redis" => {
            let dsn = project_settings
                .credentials
                .redis_dsn
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("credentials.redis_dsn is required for redis"))?;
            let prefix = project_settings.credentials.prefix.clone();
            Arc::new(RedisCredentialStore::connect(dsn, prefix).await?)
        }
        other => return Err(anyhow::anyhow!("Unknown credentials backend: {}", other)),
    };

    let client = AuthenticatedHttpClient::new(
        transport,
        store,
        project_settings.api.client_config(),
    );

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Expired => warn!("session expired, log in again"),
                other => debug!(event = %other, "session event"),
            }
        }
    });

    match cli.command {
        Command::Login { username, password } => {
            client.login(LoginInput { username, password }).await?;
            println!("logged in");
        }
        Command::Logout => {
            client.logout().await?;
            println!("logged out");
        }
        Command::Status => {
            if client.is_authenticated().await? {
                println!("authenticated");
            } else {
                println!("not authenticated");
            }
        }
        Command::Request {
            method,
            path,
            json,
            username,
            password,
        } => {
            if let (Some(username), Some(password)) = (username, password) {
                client.login(LoginInput { username, password }).await?;
            }

            let method: Method = method.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let mut request = OutboundRequest::new(method, path);
            if let Some(json) = json {
                let value: serde_json::Value = serde_json::from_str(&json)?;
                request = request.body(Body::Json(value));
            }

            match client.send(request).await {
                Ok(response) => {
                    println!("{}", response.status);
                    println!("{}", response.text());
                }
                Err(e) => {
                    if let Some(response) = e.response() {
                        eprintln!("{}", response.text());
                    }
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
