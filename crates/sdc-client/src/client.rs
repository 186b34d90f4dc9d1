//! CloudAPI machine endpoints

use crate::notify::{DeletionRequest, LogNotifier, Notifier};
use crate::signer::{authorization_header, date_header, OpenSslSigner, RequestSigner};
use chrono::Utc;
use reaper_core::endpoints::{API_VERSION, MACHINES, PAGE_LIMIT};
use reaper_core::{CloudClient, Machine, ReaperConfig, ReaperError, Result, VERSION};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, DATE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking CloudAPI client for one account.
///
/// With `dry_run` set, stop and delete are logged and skipped; reads and
/// the deletion report still go through.
pub struct SdcClient<S = OpenSslSigner, N = LogNotifier> {
    http: Client,
    base_url: Url,
    config: ReaperConfig,
    signer: S,
    notifier: N,
}

impl<S, N> std::fmt::Debug for SdcClient<S, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdcClient")
            .field("sdc_url", &self.config.sdc_url)
            .field("account", &self.config.account)
            .field("key_id", &self.config.key_id)
            .field("dry_run", &self.config.dry_run)
            .finish()
    }
}

impl SdcClient {
    pub fn new(config: ReaperConfig) -> Result<Self> {
        let signer = OpenSslSigner::new(&config.key_path);
        Self::with_parts(config, signer, LogNotifier)
    }
}

impl<S: RequestSigner, N: Notifier> SdcClient<S, N> {
    pub fn with_parts(config: ReaperConfig, signer: S, notifier: N) -> Result<Self> {
        config.validate()?;
        let base_url = Url::parse(config.base_url()).map_err(|error| {
            ReaperError::InvalidConfig {
                reason: format!("sdc_url {:?} is not a valid URL: {error}", config.sdc_url),
            }
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ReaperError::InvalidConfig {
                reason: format!("sdc_url {:?} cannot be a base URL", config.sdc_url),
            });
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("reaper/{VERSION}"))
            .build()
            .map_err(transport_error)?;
        info!(
            sdc_url = %config.sdc_url,
            account = %config.account,
            dry_run = config.dry_run,
            "CloudAPI client ready"
        );
        Ok(Self {
            http,
            base_url,
            config,
            signer,
            notifier,
        })
    }

    pub fn machines_url(&self) -> Result<Url> {
        self.account_url(&[MACHINES])
    }

    /// The id is percent-encoded as a single path segment.
    pub fn machine_url(&self, machine_id: &str) -> Result<Url> {
        self.account_url(&[MACHINES, machine_id])
    }

    fn account_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ReaperError::InvalidConfig {
                reason: format!("sdc_url {:?} cannot be a base URL", self.config.sdc_url),
            })?
            .pop_if_empty()
            .push(&self.config.account)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let date = date_header(Utc::now());
        let signature = self.signer.sign(format!("date: {date}").as_bytes())?;
        let authorization = authorization_header(
            &self.config.account,
            &self.config.key_id,
            self.signer.algorithm(),
            &signature,
        );
        Ok(self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header("Api-Version", API_VERSION)
            .header(DATE, date)
            .header(AUTHORIZATION, authorization))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().map_err(transport_error)?;
        let status = response.status();
        debug!(%status, url = %response.url(), "CloudAPI response");
        if status.is_success() {
            return Ok(response);
        }
        let message = error_body(response.text());
        Err(api_error(status, message))
    }

    fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().map_err(transport_error)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn list_page(&self, offset: usize) -> Result<Vec<Machine>> {
        let request = self
            .request(Method::GET, self.machines_url()?)?
            .query(&[("offset", offset), ("limit", PAGE_LIMIT)]);
        Self::read_json(self.send(request)?)
    }
}

impl<S: RequestSigner, N: Notifier> CloudClient for SdcClient<S, N> {
    #[instrument(skip(self), fields(account = %self.config.account))]
    fn list_machines(&self) -> Result<Vec<Machine>> {
        let mut machines = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0;
        loop {
            let page = self.list_page(offset)?;
            offset += page.len();
            let full_page = page.len() >= PAGE_LIMIT;
            let added = merge_page(&mut machines, &mut seen, page);
            if !full_page {
                break;
            }
            if added == 0 {
                warn!(offset, "Listing page repeated known machines; stopping pagination");
                break;
            }
        }
        debug!(count = machines.len(), "Listed machines");
        Ok(machines)
    }

    #[instrument(skip(self))]
    fn get_machine(&self, machine_id: &str) -> Result<Machine> {
        let request = self.request(Method::GET, self.machine_url(machine_id)?)?;
        match self.send(request) {
            Ok(response) => Self::read_json(response),
            Err(ReaperError::Api { status, .. }) if is_gone(status) => {
                Err(ReaperError::MachineNotFound {
                    machine_id: machine_id.to_string(),
                })
            }
            Err(error) => Err(error),
        }
    }

    #[instrument(skip(self))]
    fn stop_machine(&self, machine_id: &str) -> Result<()> {
        if self.config.dry_run {
            info!("Dry run: not stopping machine");
            return Ok(());
        }
        let request = self
            .request(Method::POST, self.machine_url(machine_id)?)?
            .query(&[("action", "stop")]);
        self.send(request)?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_machine(&self, machine_id: &str) -> Result<()> {
        if self.config.dry_run {
            info!("Dry run: not deleting machine");
            return Ok(());
        }
        let request = self.request(Method::DELETE, self.machine_url(machine_id)?)?;
        self.send(request)?;
        Ok(())
    }

    #[instrument(skip(self, machines), fields(count = machines.len()))]
    fn request_deletion(&self, machines: &[Machine], notify_target: &str) -> Result<()> {
        let request = DeletionRequest::new(&self.config.account, notify_target, machines);
        self.notifier.notify(&request)
    }
}

fn transport_error(error: reqwest::Error) -> ReaperError {
    ReaperError::Transport {
        reason: error.to_string(),
    }
}

/// Append machines not seen before; returns how many were new.
fn merge_page(
    machines: &mut Vec<Machine>,
    seen: &mut HashSet<String>,
    page: Vec<Machine>,
) -> usize {
    let before = machines.len();
    for machine in page {
        if seen.insert(machine.id.clone()) {
            machines.push(machine);
        }
    }
    machines.len() - before
}

fn error_body<E: Display>(body: std::result::Result<String, E>) -> String {
    body.unwrap_or_else(|error| format!("<response body unreadable: {error}>"))
}

/// CloudAPI answers 410 for machines that were already destroyed.
fn is_gone(status: u16) -> bool {
    status == StatusCode::NOT_FOUND.as_u16() || status == StatusCode::GONE.as_u16()
}

fn api_error(status: StatusCode, body: String) -> ReaperError {
    // CloudAPI errors are `{"code": "...", "message": "..."}`.
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);
    ReaperError::Api {
        status: status.as_u16(),
        message,
    }
}
