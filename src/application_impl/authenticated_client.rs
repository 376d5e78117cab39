use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use nanoid::nanoid;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::Instrument;

/// Headers attached to every request so that no browser, proxy or CDN cache
/// ever answers for the live API.
pub const CACHE_SUPPRESSION_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

const REQUEST_ID_ALPHABET: [char; 16] = [
    '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Auth endpoint paths, relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub refresh_path: String,
    pub login_path: String,
    pub logout_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            refresh_path: "auth/refresh".to_string(),
            login_path: "auth/login".to_string(),
            logout_path: "auth/logout".to_string(),
        }
    }
}

/// Sends requests with the session's bearer token and transparently recovers
/// from one expired access token per request.
pub struct AuthenticatedHttpClient {
    transport: Arc<dyn BackendTransport>,
    store: Arc<dyn CredentialStore>,
    events: SessionEvents,
    coordinator: RefreshCoordinator,
    /// Session generation, bumped by login and logout. Held while the store is
    /// written so a refresh cycle never overwrites a newer session.
    generation: Arc<Mutex<u64>>,
    config: ClientConfig,
}

impl AuthenticatedHttpClient {
    pub fn new(
        transport: Arc<dyn BackendTransport>,
        store: Arc<dyn CredentialStore>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            store,
            events: SessionEvents::new(),
            coordinator: RefreshCoordinator::new(),
            generation: Arc::new(Mutex::new(0)),
            config,
        }
    }

    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        self.store.clone()
    }

    /// Refresh cycles started since construction.
    pub fn refresh_cycles(&self) -> u64 {
        self.coordinator.cycles_started()
    }

    async fn send_with_recovery(
        &self,
        request: &OutboundRequest,
    ) -> Result<ApiResponse, ClientError> {
        let mut attempt = Attempt::Initial;
        loop {
            let access_token = self.store.get_access_token().await?;
            let prepared = prepare(request, access_token.as_ref());
            let response = self.transport.dispatch(prepared).await.map_err(|e| {
                warn!(%attempt, error = %e, "no response from backend");
                e
            })?;

            if !response.is_unauthorized() {
                debug!(%attempt, status = response.status, "response received");
                return classify(response);
            }

            let Some(next) = attempt.next() else {
                warn!("replayed request was rejected again");
                return Err(ClientError::AuthorizationExpired(response));
            };

            debug!("access token rejected, refreshing session");
            let refreshed = self
                .coordinator
                .refresh(access_token.as_ref(), || self.refresh_cycle())
                .await;
            match refreshed {
                Ok(_) => attempt = next,
                Err(failure) => {
                    warn!(%failure, "session could not be refreshed");
                    return Err(ClientError::SessionExpired { response });
                }
            }
        }
    }

    /// One refresh cycle, including its failure handling. Runs to completion
    /// exactly once no matter how many requests await it.
    ///
    /// If a login or logout replaced the session while the exchange was in
    /// flight, its result is discarded and the store is left alone.
    fn refresh_cycle(&self) -> BoxFuture<'static, RefreshOutcome> {
        let transport = self.transport.clone();
        let store = self.store.clone();
        let events = self.events.clone();
        let generation = self.generation.clone();
        let refresh_path = self.config.refresh_path.clone();

        async move {
            let (started_in, refresh_token) = {
                let current = generation.lock().await;
                (*current, store.get_refresh_token().await)
            };
            let exchanged = match refresh_token {
                Ok(Some(refresh_token)) => {
                    exchange_refresh_token(transport.as_ref(), &refresh_path, refresh_token).await
                }
                Ok(None) => Err(RefreshFailure::MissingRefreshToken),
                Err(e) => Err(RefreshFailure::Store(e.to_string())),
            };

            let current = generation.lock().await;
            if *current != started_in {
                debug!("session replaced during refresh, discarding result");
                return match store.get_access_token().await {
                    Ok(Some(access_token)) => Ok(access_token),
                    Ok(None) => Err(RefreshFailure::Superseded),
                    Err(e) => Err(RefreshFailure::Store(e.to_string())),
                };
            }

            let outcome = match exchanged {
                Ok(credential) => {
                    let access_token = credential.access_token.clone();
                    store
                        .set_pair(credential)
                        .await
                        .map(|_| access_token)
                        .map_err(|e| RefreshFailure::Store(e.to_string()))
                }
                Err(failure) => Err(failure),
            };
            match &outcome {
                Ok(_) => {
                    info!("access token refreshed");
                    events.arm();
                    events.publish(SessionEvent::Refreshed);
                }
                Err(failure) => {
                    if let Err(e) = store.clear().await {
                        error!(error = %e, "failed to clear credentials");
                    }
                    if events.expire() {
                        warn!(%failure, "session expired");
                    }
                }
            }
            drop(current);
            outcome
        }
        .instrument(info_span!("refresh_cycle"))
        .boxed()
    }
}

#[async_trait::async_trait]
impl ApiClient for AuthenticatedHttpClient {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, ClientError> {
        let span = info_span!(
            "api_request",
            id = %nanoid!(10, &REQUEST_ID_ALPHABET),
            method = %request.method,
            path = %request.path,
        );
        self.send_with_recovery(&request).instrument(span).await
    }
}

#[async_trait::async_trait]
impl SessionService for AuthenticatedHttpClient {
    async fn login(&self, input: LoginInput) -> Result<(), ClientError> {
        let LoginInput { username, password } = input;
        let request = OutboundRequest::post(self.config.login_path.as_str())
            .json(&LoginRequestBody { username, password })?;

        let response = self.transport.dispatch(prepare(&request, None)).await?;
        if !response.is_success() {
            warn!(status = response.status, "login rejected");
            return Err(ClientError::Application(response));
        }

        let credential: Credential = response.json()?;
        if !credential.is_complete() {
            return Err(ClientError::Store(CredentialStoreError::Incomplete));
        }
        {
            let mut generation = self.generation.lock().await;
            self.store.set_pair(credential).await?;
            *generation += 1;
        }
        self.coordinator.reset();
        self.events.arm();
        self.events.publish(SessionEvent::LoggedIn);
        info!("logged in");
        Ok(())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        if let Some(credential) = self.store.get_pair().await? {
            let request = OutboundRequest::post(self.config.logout_path.as_str()).json(
                &RefreshRequestBody {
                    refresh_token: credential.refresh_token.clone(),
                },
            )?;
            match self
                .transport
                .dispatch(prepare(&request, Some(&credential.access_token)))
                .await
            {
                Ok(response) if response.is_success() => debug!("refresh token revoked"),
                Ok(response) => warn!(status = response.status, "logout rejected by backend"),
                Err(e) => warn!(error = %e, "logout request failed"),
            }
        }

        {
            let mut generation = self.generation.lock().await;
            self.store.clear().await?;
            *generation += 1;
        }
        self.coordinator.reset();
        self.events.disarm();
        self.events.publish(SessionEvent::LoggedOut);
        info!("logged out");
        Ok(())
    }

    async fn is_authenticated(&self) -> Result<bool, ClientError> {
        Ok(self.store.get_access_token().await?.is_some())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Build the wire request: caller headers, then the client's own headers,
/// which always win.
pub fn prepare(request: &OutboundRequest, access_token: Option<&AccessToken>) -> PreparedRequest {
    let mut headers = request.headers.clone();
    for (name, value) in CACHE_SUPPRESSION_HEADERS {
        headers.set(name, value);
    }
    headers.remove("Authorization");
    if let Some(token) = access_token {
        headers.set("Authorization", token.bearer());
    }
    if let Some(content_type) = request.body.content_type() {
        if !headers.contains("Content-Type") {
            headers.set("Content-Type", content_type);
        }
    }

    PreparedRequest {
        method: request.method,
        path: request.path.clone(),
        headers,
        body: request.body.clone(),
    }
}

fn classify(response: ApiResponse) -> Result<ApiResponse, ClientError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Application(response))
    }
}

async fn exchange_refresh_token(
    transport: &dyn BackendTransport,
    refresh_path: &str,
    refresh_token: RefreshToken,
) -> Result<Credential, RefreshFailure> {
    let request = OutboundRequest::post(refresh_path)
        .json(&RefreshRequestBody { refresh_token })
        .map_err(|e| RefreshFailure::InvalidRequest(e.to_string()))?;
    let response = transport
        .dispatch(prepare(&request, None))
        .await
        .map_err(|e| RefreshFailure::Transport(e.to_string()))?;
    if !response.is_success() {
        return Err(RefreshFailure::Rejected {
            status: response.status,
        });
    }

    let credential: Credential = response
        .json()
        .map_err(|e| RefreshFailure::MalformedResponse(e.to_string()))?;
    if !credential.is_complete() {
        return Err(RefreshFailure::MalformedResponse(
            "empty token in refresh response".to_string(),
        ));
    }
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_injects_bearer_and_cache_headers() {
        let request = OutboundRequest::get("orders")
            .header("cache-control", "max-age=600")
            .header("authorization", "Bearer forged")
            .header("X-Store", "north");
        let prepared = prepare(&request, Some(&AccessToken::new("T1")));

        assert_eq!(prepared.headers.get("Authorization"), Some("Bearer T1"));
        assert_eq!(
            prepared.headers.get("Cache-Control"),
            Some("no-cache, no-store, must-revalidate")
        );
        assert_eq!(prepared.headers.get("Pragma"), Some("no-cache"));
        assert_eq!(prepared.headers.get("Expires"), Some("0"));
        assert_eq!(prepared.headers.get("x-store"), Some("north"));
        assert_eq!(prepared.path, "orders");
    }

    #[test]
    fn prepare_without_token_sends_no_authorization() {
        let request = OutboundRequest::post("auth/refresh")
            .json(&serde_json::json!({ "refreshToken": "R1" }))
            .unwrap();
        let prepared = prepare(&request, None);

        assert!(!prepared.headers.contains("Authorization"));
        assert_eq!(prepared.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(prepared.headers.get("Pragma"), Some("no-cache"));
    }
}
