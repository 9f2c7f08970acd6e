mod cache;

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::http::{
    Attempt, CONNECT_TIMEOUT, HttpResponse, READ_TIMEOUT, RetryFailure, RetryPolicy, build_agent,
    run_with_retry, send, should_retry_http_status,
};
use crate::model::{ActiveRange, FetchedRange, KnownRange, SaveRequest, SkipRange};

pub(crate) use cache::{FetchTicket, RangeCache, SessionKey};

pub(crate) const MAX_FETCH_ATTEMPTS: usize = 3;
pub(crate) const FETCH_RETRY_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum SyncError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("range service not found at {url}")]
    NotFound { url: String },
    #[error("request failed after {attempts} attempt(s): {detail}")]
    Transient { attempts: usize, detail: String },
    #[error("save failed: {0}")]
    Persistence(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Outcome of a range lookup that reached the service.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RangeFetch {
    Found(ActiveRange),
    /// The episode has no stored range yet.
    Empty,
}

impl RangeFetch {
    pub(crate) fn active(&self) -> Option<&ActiveRange> {
        match self {
            Self::Found(range) => Some(range),
            Self::Empty => None,
        }
    }

    pub(crate) fn known(&self) -> KnownRange {
        match self {
            Self::Found(range) => KnownRange::Found(range.clone()),
            Self::Empty => KnownRange::Empty,
        }
    }
}

/// The calls the playback side makes against the range service.
pub(crate) trait RangeService {
    fn fetch_range(
        &self,
        episode_id: &str,
        file_id: Option<&str>,
        title: Option<&str>,
    ) -> Result<RangeFetch, SyncError>;

    fn save_range(&self, request: &SaveRequest) -> Result<SkipRange, SyncError>;

    fn plugin_version(&self) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct VersionBody {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PingBody {
    pub(crate) status: String,
    pub(crate) time: String,
}

#[derive(Debug, Clone)]
pub(crate) struct RangeClient {
    base_url: String,
    agent: ureq::Agent,
    fetch_policy: RetryPolicy,
    write_policy: RetryPolicy,
}

impl RangeClient {
    pub(crate) fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: build_agent(CONNECT_TIMEOUT, READ_TIMEOUT),
            fetch_policy: RetryPolicy::fixed(MAX_FETCH_ATTEMPTS, FETCH_RETRY_DELAY),
            write_policy: RetryPolicy::exponential(
                3,
                Duration::from_millis(500),
                Duration::from_secs(4),
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_policies(
        base_url: &str,
        fetch_policy: RetryPolicy,
        write_policy: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: build_agent(Duration::from_millis(500), Duration::from_millis(500)),
            fetch_policy,
            write_policy,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    fn range_url(&self, episode_id: &str) -> String {
        format!(
            "{}/ranges/{}",
            self.base_url,
            urlencoding::encode(episode_id)
        )
    }

    pub(crate) fn delete_range(&self, episode_id: &str) -> Result<bool, SyncError> {
        require_episode_id(episode_id)?;
        let url = self.range_url(episode_id);
        let response = self.send_write("DELETE", &url, &[], None)?;
        match response.status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(SyncError::Persistence(response.describe())),
        }
    }

    pub(crate) fn range_exists(&self, episode_id: &str) -> Result<bool, SyncError> {
        require_episode_id(episode_id)?;
        let url = self.range_url(episode_id);
        let response = self.send_read("HEAD", &url, &[])?;
        Ok(response.status == 200)
    }

    /// Raw JSON dump of every stored range.
    pub(crate) fn export(&self) -> Result<String, SyncError> {
        let url = format!("{}/download-db", self.base_url);
        Ok(self.send_read("GET", &url, &[])?.body)
    }

    pub(crate) fn ping(&self) -> Result<PingBody, SyncError> {
        let url = format!("{}/ping", self.base_url);
        let response = self.send_read("GET", &url, &[])?;
        serde_json::from_str(&response.body)
            .map_err(|err| SyncError::Decode(format!("invalid ping body: {err}")))
    }

    /// GET-style call: 2xx comes back, 404 is terminal, everything else is
    /// retried with the fetch policy.
    fn send_read(
        &self,
        method: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<HttpResponse, SyncError> {
        let outcome = run_with_retry(&self.fetch_policy, thread::sleep, |attempt| {
            debug!(%method, %url, attempt, "range service request");
            match send(&self.agent, method, url, query, None) {
                Ok(response) if response.is_success() => Attempt::Done(response),
                Ok(response) if response.status == 404 => Attempt::Stop(response.describe()),
                Ok(response) => {
                    warn!(%url, attempt, status = response.status, "unexpected response");
                    Attempt::Retry(response.describe())
                }
                Err(err) => {
                    warn!(%url, attempt, error = %err, "request failed");
                    Attempt::Retry(err)
                }
            }
        });
        outcome.map_err(|failure| self.map_failure(failure))
    }

    /// Write call: retried only for server-side trouble, never assumed to
    /// have succeeded.
    fn send_write(
        &self,
        method: &str,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<HttpResponse, SyncError> {
        let outcome = run_with_retry(&self.write_policy, thread::sleep, |attempt| {
            debug!(%method, %url, attempt, "range service write");
            match send(&self.agent, method, url, query, body) {
                Ok(response) if response.is_success() || response.status == 404 => {
                    Attempt::Done(response)
                }
                Ok(response) if should_retry_http_status(response.status) => {
                    warn!(%url, attempt, status = response.status, "write failed, retrying");
                    Attempt::Retry(response.describe())
                }
                Ok(response) => Attempt::Stop(response.describe()),
                Err(err) => {
                    warn!(%url, attempt, error = %err, "write transport failure");
                    Attempt::Retry(err)
                }
            }
        });
        outcome.map_err(|failure| match failure {
            RetryFailure::Terminal { error, .. } => SyncError::Persistence(error),
            RetryFailure::Exhausted { attempts, error } => {
                SyncError::Persistence(format!("after {attempts} attempt(s): {error}"))
            }
        })
    }

    fn map_failure(&self, failure: RetryFailure<String>) -> SyncError {
        match failure {
            RetryFailure::Terminal { .. } => SyncError::NotFound {
                url: self.base_url.clone(),
            },
            RetryFailure::Exhausted { attempts, error } => SyncError::Transient {
                attempts,
                detail: error,
            },
        }
    }
}

impl RangeService for RangeClient {
    fn fetch_range(
        &self,
        episode_id: &str,
        file_id: Option<&str>,
        title: Option<&str>,
    ) -> Result<RangeFetch, SyncError> {
        require_episode_id(episode_id)?;
        let url = self.range_url(episode_id);
        let mut query = Vec::new();
        if let Some(file_id) = file_id {
            query.push(("fileId", file_id));
        }
        if let Some(title) = title {
            query.push(("title", title));
        }

        let outcome = run_with_retry(&self.fetch_policy, thread::sleep, |attempt| {
            info!(episode_id, attempt, "fetching skip range");
            let response = match send(&self.agent, "GET", &url, &query, None) {
                Ok(response) => response,
                Err(err) => {
                    warn!(episode_id, attempt, error = %err, "range fetch failed");
                    return Attempt::Retry(err);
                }
            };
            match response.status {
                204 => Attempt::Done(RangeFetch::Empty),
                404 => Attempt::Stop(response.describe()),
                200..=299 => match serde_json::from_str::<FetchedRange>(&response.body) {
                    Ok(fetched) => {
                        Attempt::Done(RangeFetch::Found(ActiveRange::from_fetched(&fetched, file_id)))
                    }
                    Err(err) => {
                        warn!(episode_id, attempt, error = %err, "undecodable range body");
                        Attempt::Retry(format!("invalid range body: {err}"))
                    }
                },
                status => {
                    warn!(episode_id, attempt, status, "unexpected response for range");
                    Attempt::Retry(response.describe())
                }
            }
        });

        match outcome {
            Ok(RangeFetch::Empty) => {
                info!(episode_id, "no skip data stored for episode");
                Ok(RangeFetch::Empty)
            }
            Ok(found) => {
                if let RangeFetch::Found(range) = &found {
                    info!(
                        episode_id,
                        start = range.start,
                        end = range.end,
                        offset = range.offset,
                        "loaded skip range"
                    );
                }
                Ok(found)
            }
            Err(failure) => {
                let err = self.map_failure(failure);
                match &err {
                    SyncError::NotFound { url } => {
                        warn!(episode_id, %url, "range service not found; check the server URL")
                    }
                    _ => warn!(episode_id, error = %err, "giving up on skip range"),
                }
                Err(err)
            }
        }
    }

    fn save_range(&self, request: &SaveRequest) -> Result<SkipRange, SyncError> {
        request.validate().map_err(SyncError::Validation)?;
        let url = format!("{}/ranges", self.base_url);
        let body = serde_json::to_string(request)
            .map_err(|err| SyncError::Validation(format!("cannot encode request: {err}")))?;
        let response = self.send_write("POST", &url, &[], Some(&body))?;
        if !response.is_success() {
            return Err(SyncError::Persistence(response.describe()));
        }
        let stored: SkipRange = serde_json::from_str(&response.body)
            .map_err(|err| SyncError::Persistence(format!("invalid save response: {err}")))?;
        info!(
            episode_id = %request.episode_id,
            start = request.start,
            end = request.end,
            offset = ?request.offset,
            "saved skip range"
        );
        Ok(stored)
    }

    fn plugin_version(&self) -> Option<String> {
        let url = format!("{}/plugin-version", self.base_url);
        let response = match self.send_read("GET", &url, &[]) {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "could not fetch server plugin version");
                return None;
            }
        };
        serde_json::from_str::<VersionBody>(&response.body)
            .ok()
            .and_then(|body| body.version)
            .filter(|version| !version.trim().is_empty())
    }
}

fn require_episode_id(episode_id: &str) -> Result<(), SyncError> {
    if episode_id.trim().is_empty() {
        return Err(SyncError::Validation("episode id is empty".to_string()));
    }
    Ok(())
}
