use std::future::Future;

use karga::Metric;
use reqwest::{Client, Request, StatusCode, Url};

use crate::{config::LoadConfig, error::Result};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Why a single request counted as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum FailureCause {
    /// The server answered with a status outside `200..300`.
    Status(u16),
    Timeout,
    Connect,
    /// The response started but its body could not be read.
    Body,
    Transport,
    /// The unit running the request panicked or was cancelled.
    Aborted,
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd)]
pub enum Outcome {
    Success { status: u16 },
    Failure(FailureCause),
}

impl Metric for Outcome {}

impl Outcome {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Self::Success {
                status: status.as_u16(),
            }
        } else {
            Self::Failure(FailureCause::Status(status.as_u16()))
        }
    }

    pub fn from_error(err: &reqwest::Error) -> Self {
        let cause = if err.is_timeout() {
            FailureCause::Timeout
        } else if err.is_connect() {
            FailureCause::Connect
        } else if err.is_body() || err.is_decode() {
            FailureCause::Body
        } else {
            FailureCause::Transport
        };
        Self::Failure(cause)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One request's worth of work.
///
/// Implementations must not fail: every fault is reported as an
/// [`Outcome::Failure`].
pub trait Action: Send + Sync + 'static {
    fn perform(&self) -> impl Future<Output = Outcome> + Send;
}

/// Builds the client shared by every request of a run.
pub fn transport(config: &LoadConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout);

    if !config.system_proxy {
        builder = builder.no_proxy();
    }

    Ok(builder.build()?)
}

/// Sends the configured request and classifies the answer.
#[derive(Debug)]
pub struct RequestExecutor {
    client: Client,
    template: Request,
}

impl RequestExecutor {
    /// Prepares the request once; every call to [`execute`](Self::execute)
    /// sends a clone of it.
    pub fn new(client: Client, config: &LoadConfig) -> Result<Self> {
        let template = client
            .request(config.method.clone(), config.target.clone())
            .headers(config.headers.clone())
            .build()?;

        Ok(Self { client, template })
    }

    pub fn target(&self) -> &Url {
        self.template.url()
    }

    pub async fn execute(&self) -> Outcome {
        // bodiless requests always clone
        let Some(request) = self.template.try_clone() else {
            return Outcome::Failure(FailureCause::Transport);
        };

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::trace!(error = %err, "request failed");
                return Outcome::from_error(&err);
            }
        };

        let status = response.status();
        if let Err(err) = response.bytes().await {
            tracing::trace!(%status, error = %err, "failed to read response body");
            return Outcome::from_error(&err);
        }

        let outcome = Outcome::from_status(status);
        tracing::trace!(%status, success = outcome.is_success(), "request completed");
        outcome
    }
}

impl Action for RequestExecutor {
    async fn perform(&self) -> Outcome {
        self.execute().await
    }
}
