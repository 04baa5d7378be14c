use std::collections::BTreeMap;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reqwest::Response;
use serde::de::DeserializeOwned;

use super::actions::Action;
use super::patterns::{PatternSelector, TrafficPattern};
use super::payloads;
use crate::configuration::ClientConfig;
use crate::error_handling::types::ClientError;
use crate::web_interface::types::{
    DataResponse, DeleteUserResponse, EchoResponse, HealthResponse, LargeDataResponse,
    LoginRequest, LoginResponse, LogoutRequest, MessagePage, NewMessage, SearchResponse,
    UploadAck, UserProfile,
};

const MAX_KNOWN_ACCOUNTS: usize = 100;
const SUMMARY_EVERY: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Login state carried between actions.
#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    pub token: Option<String>,
    pub username: Option<String>,
}

impl ClientSession {
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    fn clear(&mut self) {
        self.token = None;
        self.username = None;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionCounter {
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TrafficStats {
    pub patterns_run: u64,
    pub actions: BTreeMap<Action, ActionCounter>,
}

impl TrafficStats {
    fn record(&mut self, action: Action, ok: bool) {
        let counter = self.actions.entry(action).or_default();
        if ok {
            counter.succeeded += 1;
        } else {
            counter.failed += 1;
        }
    }

    pub fn counter(&self, action: Action) -> ActionCounter {
        self.actions.get(&action).copied().unwrap_or_default()
    }

    pub fn total_succeeded(&self) -> u64 {
        self.actions.values().map(|c| c.succeeded).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.actions.values().map(|c| c.failed).sum()
    }
}

async fn expect_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::UnexpectedStatus(status.as_u16(), body))
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    Ok(expect_success(response).await?.json::<T>().await?)
}

/// Drives the demo server with randomized traffic.
///
/// Every action is one HTTP call whose failure is logged and counted but
/// never stops the run.
pub struct TrafficClient {
    http: reqwest::Client,
    base_url: String,
    session: ClientSession,
    accounts: Vec<Credentials>,
    selector: PatternSelector,
    rng: StdRng,
    stats: TrafficStats,
}

impl TrafficClient {
    pub fn new(config: &ClientConfig, selector: PatternSelector) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("trafficlab-client/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.insecure);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if config.insecure {
            warn!("TLS certificate verification is disabled");
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session: ClientSession::default(),
            accounts: Vec::new(),
            selector,
            rng,
            stats: TrafficStats::default(),
        })
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn accounts(&self) -> &[Credentials] {
        &self.accounts
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn remember_account(&mut self, credentials: Credentials) {
        if self.accounts.len() >= MAX_KNOWN_ACCOUNTS {
            self.accounts.remove(0);
        }
        self.accounts.push(credentials);
    }

    fn random_account(&mut self) -> Option<Credentials> {
        self.accounts.choose(&mut self.rng).cloned()
    }

    /// Current user, or else any account this client registered.
    fn target_username(&mut self) -> Option<String> {
        match &self.session.username {
            Some(name) => Some(name.clone()),
            None => self.random_account().map(|c| c.username),
        }
    }

    /// Performs one action and reports its outcome.
    pub async fn perform(&mut self, action: Action) -> Result<(), ClientError> {
        match action {
            Action::HealthCheck => {
                let response = self.http.get(self.url("/health")).send().await?;
                let health: HealthResponse = parse(response).await?;
                debug!(
                    "health: {} ({} users, {} sessions)",
                    health.status, health.users, health.active_sessions
                );
            }
            Action::Root => {
                let response = self.http.get(self.url("/")).send().await?;
                expect_success(response).await?;
            }
            Action::Register => {
                let request = payloads::registration(&mut self.rng);
                let response = self
                    .http
                    .post(self.url("/users/register"))
                    .json(&request)
                    .send()
                    .await?;
                expect_success(response).await?;
                debug!("registered {}", request.username);
                self.remember_account(Credentials {
                    username: request.username,
                    password: request.password,
                });
            }
            Action::Login => {
                let account = self.random_account().ok_or(ClientError::NoKnownAccount)?;
                let response = self
                    .http
                    .post(self.url("/users/login"))
                    .json(&LoginRequest {
                        username: account.username,
                        password: account.password,
                    })
                    .send()
                    .await?;
                let login: LoginResponse = parse(response).await?;
                debug!("logged in as {} (expires in {}s)", login.username, login.expires_in);
                self.session.token = Some(login.token);
                self.session.username = Some(login.username);
            }
            Action::Logout => {
                let token = self.session.token.clone().ok_or(ClientError::NotLoggedIn)?;
                let response = self
                    .http
                    .post(self.url("/users/logout"))
                    .json(&LogoutRequest { token })
                    .send()
                    .await?;
                // The token is gone either way: logged out, or already invalid.
                self.session.clear();
                expect_success(response).await?;
            }
            Action::GetUser => {
                let username = self.target_username().ok_or(ClientError::NoKnownAccount)?;
                let response = self
                    .http
                    .get(self.url(&format!("/users/{}", username)))
                    .send()
                    .await?;
                let profile: UserProfile = parse(response).await?;
                debug!("fetched profile of {}", profile.username);
            }
            Action::DeleteUser => {
                let username = self.target_username().ok_or(ClientError::NoKnownAccount)?;
                let response = self
                    .http
                    .delete(self.url(&format!("/users/{}", username)))
                    .send()
                    .await?;
                self.accounts.retain(|c| c.username != username);
                if self.session.username.as_deref() == Some(username.as_str()) {
                    self.session.clear();
                }
                let deleted: DeleteUserResponse = parse(response).await?;
                debug!(
                    "deleted {} ({} session(s) dropped)",
                    deleted.username, deleted.sessions_invalidated
                );
            }
            Action::SendMessage => {
                let sender = self
                    .session
                    .username
                    .clone()
                    .unwrap_or_else(|| "anonymous".to_string());
                let recipient = self
                    .random_account()
                    .map(|c| c.username)
                    .unwrap_or_else(|| "everyone".to_string());
                let message = NewMessage {
                    sender,
                    recipient,
                    content: payloads::message_content(&mut self.rng),
                };
                let response = self
                    .http
                    .post(self.url("/messages"))
                    .json(&message)
                    .send()
                    .await?;
                expect_success(response).await?;
            }
            Action::ReadMessages => {
                let limit: usize = self.rng.gen_range(5..=50);
                let offset: usize = self.rng.gen_range(0..=20);
                let response = self
                    .http
                    .get(self.url("/messages"))
                    .query(&[("limit", limit), ("offset", offset)])
                    .send()
                    .await?;
                let page: MessagePage = parse(response).await?;
                debug!("read {} of {} message(s)", page.messages.len(), page.total);
            }
            Action::Search => {
                let term = payloads::search_term(&mut self.rng);
                let category = payloads::search_category(&mut self.rng);
                let limit: usize = self.rng.gen_range(1..=25);
                let response = self
                    .http
                    .get(self.url("/search"))
                    .query(&[
                        ("q", term.as_str()),
                        ("category", category),
                        ("limit", limit.to_string().as_str()),
                    ])
                    .send()
                    .await?;
                let results: SearchResponse = parse(response).await?;
                debug!("search '{}' returned {} result(s)", results.query, results.total);
            }
            Action::GetData => {
                let response = self.http.get(self.url("/data")).send().await?;
                let data: DataResponse = parse(response).await?;
                debug!("data: {:?}", data.data);
            }
            Action::GetLargeData => {
                let response = self.http.get(self.url("/data/large")).send().await?;
                let data: LargeDataResponse = parse(response).await?;
                debug!("large data: {} item(s)", data.count);
            }
            Action::UploadMetadata => {
                let meta = payloads::upload_metadata(&mut self.rng);
                let response = self
                    .http
                    .post(self.url("/upload/metadata"))
                    .json(&meta)
                    .send()
                    .await?;
                let ack: UploadAck = parse(response).await?;
                debug!("upload {} acknowledged as {}", ack.filename, ack.upload_id);
            }
            Action::Echo => {
                let body = payloads::echo_payload(&mut self.rng);
                let response = self
                    .http
                    .post(self.url("/echo"))
                    .json(&body)
                    .send()
                    .await?;
                let echo: EchoResponse = parse(response).await?;
                debug!("echoed {} field(s)", echo.received.len());
            }
        }
        Ok(())
    }

    /// Performs an action, logging and counting failures instead of returning them.
    pub async fn run_action(&mut self, action: Action) -> bool {
        let ok = match self.perform(action).await {
            Ok(()) => true,
            Err(ClientError::NotLoggedIn) | Err(ClientError::NoKnownAccount) => {
                debug!("Skipped {}: prerequisite missing", action);
                false
            }
            Err(e) => {
                warn!("Action {} failed: {}", action, e);
                false
            }
        };
        self.stats.record(action, ok);
        ok
    }

    pub async fn run_pattern(&mut self, pattern: &TrafficPattern) {
        debug!("Running pattern {}", pattern.name);
        for (i, action) in pattern.actions.iter().enumerate() {
            if i > 0 && pattern.action_delay_ms > 0 {
                tokio::time::sleep(pattern.action_delay()).await;
            }
            self.run_action(*action).await;
        }
        self.stats.patterns_run += 1;

        let pause = pattern.random_sleep(&mut self.rng);
        debug!("Pattern {} done, sleeping {:?}", pattern.name, pause);
        tokio::time::sleep(pause).await;
    }

    /// Loops over weighted patterns; `None` means forever.
    pub async fn run(&mut self, iterations: Option<u64>) {
        match iterations {
            Some(n) => info!("Generating traffic against {} for {} pattern(s)", self.base_url, n),
            None => info!("Generating traffic against {} until stopped", self.base_url),
        }

        let mut completed = 0u64;
        while iterations.map_or(true, |limit| completed < limit) {
            let pattern = self.selector.select(&mut self.rng).clone();
            self.run_pattern(&pattern).await;
            completed += 1;
            if completed % SUMMARY_EVERY == 0 {
                self.log_summary();
            }
        }
        self.log_summary();
    }

    pub fn log_summary(&self) {
        info!(
            "{} pattern(s) run, {} action(s) succeeded, {} failed",
            self.stats.patterns_run,
            self.stats.total_succeeded(),
            self.stats.total_failed()
        );
        for (action, counter) in &self.stats.actions {
            info!("  {:<16} ok={} failed={}", action.name(), counter.succeeded, counter.failed);
        }
    }
}
