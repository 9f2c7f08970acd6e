use std::time::Duration;

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backoff {
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) attempts: usize,
    pub(crate) backoff: Backoff,
}

impl RetryPolicy {
    pub(crate) const fn fixed(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub(crate) const fn exponential(attempts: usize, initial: Duration, max: Duration) -> Self {
        Self {
            attempts,
            backoff: Backoff::Exponential { initial, max },
        }
    }

    /// Delay to wait after the 1-based `failed_attempt` before the next one.
    pub(crate) fn delay_after(&self, failed_attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = failed_attempt.saturating_sub(1).min(16) as u32;
                initial.saturating_mul(1_u32 << shift).min(max)
            }
        }
    }
}

/// What a single attempt decided.
#[derive(Debug)]
pub(crate) enum Attempt<T, E> {
    Done(T),
    Stop(E),
    Retry(E),
}

#[derive(Debug, PartialEq)]
pub(crate) enum RetryFailure<E> {
    Terminal { attempt: usize, error: E },
    Exhausted { attempts: usize, error: E },
}

pub(crate) fn run_with_retry<T, E>(
    policy: &RetryPolicy,
    mut sleep: impl FnMut(Duration),
    mut attempt_once: impl FnMut(usize) -> Attempt<T, E>,
) -> Result<T, RetryFailure<E>> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_once(attempt) {
            Attempt::Done(value) => return Ok(value),
            Attempt::Stop(error) => return Err(RetryFailure::Terminal { attempt, error }),
            Attempt::Retry(error) => {
                if attempt >= attempts {
                    return Err(RetryFailure::Exhausted { attempts, error });
                }
                sleep(policy.delay_after(attempt));
                attempt += 1;
            }
        }
    }
}

pub(crate) fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl HttpResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub(crate) fn describe(&self) -> String {
        let body = self.body.trim();
        if body.is_empty() {
            format!("HTTP status {}", self.status)
        } else {
            let truncated = body.chars().take(240).collect::<String>();
            format!("HTTP status {} ({truncated})", self.status)
        }
    }
}

pub(crate) fn build_agent(connect_timeout: Duration, read_timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(connect_timeout)
        .timeout_read(read_timeout)
        .timeout_write(read_timeout)
        .build()
}

/// Sends one request. Any HTTP status comes back as `Ok`; only transport
/// problems are errors.
pub(crate) fn send(
    agent: &ureq::Agent,
    method: &str,
    url: &str,
    query: &[(&str, &str)],
    json_body: Option<&str>,
) -> Result<HttpResponse, String> {
    let mut request = agent.request(method, url).set("Accept", "application/json");
    for (key, value) in query {
        request = request.query(key, value);
    }

    let result = match json_body {
        Some(body) => request
            .set("Content-Type", "application/json")
            .send_string(body),
        None => request.call(),
    };

    match result {
        Ok(response) => {
            let status = response.status();
            let body = response
                .into_string()
                .map_err(|err| format!("response decode failed: {err}"))?;
            Ok(HttpResponse { status, body })
        }
        Err(ureq::Error::Status(status, response)) => Ok(HttpResponse {
            status,
            body: response.into_string().ok().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(err)) => Err(format!("transport error: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, TestServer};

    const NO_DELAY: RetryPolicy = RetryPolicy::fixed(3, Duration::from_millis(0));

    #[test]
    fn fixed_policy_waits_the_same_between_attempts() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(2000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    }

    #[test]
    fn exponential_policy_doubles_up_to_cap() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
    }

    #[test]
    fn retries_until_success_and_sleeps_between_attempts() {
        let mut sleeps = Vec::new();
        let result: Result<&str, RetryFailure<&str>> = run_with_retry(
            &RetryPolicy::fixed(3, Duration::from_millis(7)),
            |delay| sleeps.push(delay),
            |attempt| {
                if attempt < 3 {
                    Attempt::Retry("flaky")
                } else {
                    Attempt::Done("ok")
                }
            },
        );
        assert_eq!(result, Ok("ok"));
        assert_eq!(sleeps, vec![Duration::from_millis(7); 2]);
    }

    #[test]
    fn terminal_outcome_stops_without_sleeping() {
        let mut calls = 0;
        let mut slept = false;
        let result: Result<(), RetryFailure<&str>> = run_with_retry(
            &NO_DELAY,
            |_| slept = true,
            |_| {
                calls += 1;
                Attempt::Stop("gone")
            },
        );
        assert_eq!(
            result,
            Err(RetryFailure::Terminal {
                attempt: 1,
                error: "gone"
            })
        );
        assert_eq!(calls, 1);
        assert!(!slept);
    }

    #[test]
    fn exhausting_the_budget_reports_last_error() {
        let result: Result<(), RetryFailure<usize>> =
            run_with_retry(&NO_DELAY, |_| {}, Attempt::Retry);
        assert_eq!(
            result,
            Err(RetryFailure::Exhausted {
                attempts: 3,
                error: 3
            })
        );
    }

    #[test]
    fn send_returns_statuses_as_responses() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(503, "down".to_string()),
            Behavior::Respond(204, String::new()),
        ]);
        let agent = build_agent(Duration::from_millis(200), Duration::from_millis(200));

        let first = send(&agent, "GET", &server.base_url, &[], None).expect("http response");
        assert_eq!(first.status, 503);
        assert_eq!(first.describe(), "HTTP status 503 (down)");
        assert!(!first.is_success());

        let second = send(&agent, "GET", &server.base_url, &[], None).expect("http response");
        assert_eq!(second.status, 204);
        assert!(second.is_success());
    }

    #[test]
    fn send_reports_read_timeouts_as_transport_errors() {
        let server = TestServer::spawn(vec![Behavior::DelayRespond(
            Duration::from_millis(150),
            200,
            "slow".to_string(),
        )]);
        let agent = build_agent(Duration::from_millis(200), Duration::from_millis(20));

        let err = send(&agent, "GET", &server.base_url, &[], None)
            .expect_err("slow response should time out");
        assert!(err.starts_with("transport error"), "unexpected: {err}");
    }

    #[test]
    fn send_encodes_query_and_body() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "{}".to_string())]);
        let agent = build_agent(Duration::from_millis(200), Duration::from_millis(200));

        send(
            &agent,
            "POST",
            &format!("{}/ranges", server.base_url),
            &[("fileId", "a b")],
            Some(r#"{"x":1}"#),
        )
        .expect("http response");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].target, "/ranges?fileId=a+b");
        assert_eq!(requests[0].body, r#"{"x":1}"#);
    }

    #[test]
    fn retryable_statuses_match_server_side_trouble() {
        assert!(should_retry_http_status(500));
        assert!(should_retry_http_status(429));
        assert!(should_retry_http_status(408));
        assert!(!should_retry_http_status(404));
        assert!(!should_retry_http_status(400));
    }
}
