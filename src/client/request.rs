//! The in-flight request: a single-use execution of one operation call.
//!
//! A [`Request`] owns its machine state exclusively; nothing is shared
//! across requests except the read-only schema, the signing-key cache,
//! and the credential provider. Within one request, state transitions are
//! strictly sequential — the two asynchronous suspension points are
//! credential resolution and the transport round-trip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Notify;
use url::Url;

use crate::error::SdkError;
use crate::protocol::{codec_for, Codec};
use crate::schema::{validate, Operation};
use crate::transport::{WireRequest, WireResponse};

use super::retry::{forces_credential_refresh, RetryPolicy};
use super::state::State;
use super::Client;

/// SDK version reported in the User-Agent header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default)]
struct AbortFlag {
    aborted: AtomicBool,
    notify: Notify,
}

/// Handle for cancelling an in-flight request.
///
/// Abort short-circuits the response-validation stage with a terminal
/// aborted error; if the transport round-trip is in progress it is
/// cancelled. No retry is scheduled after an abort.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    flag: Arc<AbortFlag>,
}

impl AbortHandle {
    /// Signals the request to abort.
    pub fn abort(&self) {
        self.flag.aborted.store(true, Ordering::SeqCst);
        self.flag.notify.notify_waiters();
    }

    /// Returns true once [`abort`](Self::abort) has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.flag.aborted.load(Ordering::SeqCst)
    }
}

/// A single-use operation call, created by [`Client::invoke`].
///
/// # Example
///
/// ```rust,ignore
/// let request = client.invoke("ListQueues", json!({}))?;
/// let data = request.send().await?;
/// ```
#[derive(Debug)]
pub struct Request {
    client: Client,
    operation: String,
    params: Value,
    abort: Arc<AbortFlag>,
}

impl Request {
    pub(super) fn new(client: Client, operation: impl Into<String>, params: Value) -> Self {
        Self {
            client,
            operation: operation.into(),
            params,
            abort: Arc::new(AbortFlag::default()),
        }
    }

    /// Returns a handle that can abort this request from another task.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            flag: Arc::clone(&self.abort),
        }
    }

    /// Executes the request through the state machine and returns decoded
    /// data or the terminal error.
    ///
    /// # Errors
    ///
    /// Exactly one [`SdkError`] per failed call; see the crate error
    /// taxonomy.
    pub async fn send(self) -> Result<Value, SdkError> {
        let operation = self
            .client
            .schema
            .operation(&self.operation)
            .map_err(SdkError::from)?
            .clone();
        let machine = Machine {
            client: &self.client,
            operation: &operation,
            params: &self.params,
            abort: self.abort.as_ref(),
            codec: codec_for(self.client.schema.protocol),
            policy: self.client.retry,
            endpoint: self.client.endpoint.clone(),
            request: None,
            response: None,
            data: None,
            error: None,
            attempt: 0,
            redirects: 0,
            pending_delay: Duration::ZERO,
        };
        machine.run().await
    }

    /// Builds a presigned URL for this operation instead of sending it.
    ///
    /// All signing material moves into query parameters; the URL is valid
    /// for `expires_in_secs` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidExpiryTime`] beyond the seven-day cap,
    /// plus any validation, schema, or credential error raised while
    /// building the request.
    pub async fn presign(self, expires_in_secs: u64) -> Result<String, SdkError> {
        let operation = self
            .client
            .schema
            .operation(&self.operation)
            .map_err(SdkError::from)?
            .clone();
        if let Some(input) = &operation.input {
            validate::validate(&self.client.schema.registry, input, &self.params)?;
        }

        let mut request = WireRequest::new(operation.http_method, &self.client.endpoint);
        codec_for(self.client.schema.protocol).build(
            &mut request,
            &self.client.schema,
            &operation,
            &self.params,
        )?;

        let credentials = self.client.credentials.provide().await?;
        let now = Utc::now() + chrono::Duration::seconds(self.client.config.clock_offset_secs());
        self.client
            .v4_signer
            .presign(&mut request, &credentials, now, expires_in_secs)?;
        Ok(request.url())
    }
}

/// One run of the request state machine; owns all per-attempt context.
struct Machine<'a> {
    client: &'a Client,
    operation: &'a Operation,
    params: &'a Value,
    abort: &'a AbortFlag,
    codec: &'static dyn Codec,
    policy: RetryPolicy,
    endpoint: Url,
    request: Option<WireRequest>,
    response: Option<WireResponse>,
    data: Option<Value>,
    error: Option<SdkError>,
    attempt: u32,
    redirects: u32,
    pending_delay: Duration,
}

impl Machine<'_> {
    async fn run(mut self) -> Result<Value, SdkError> {
        let mut state = State::Validate;
        loop {
            tracing::trace!(?state, operation = %self.operation.name, "entering state");
            state = match state {
                State::Validate => self.validate(),
                State::Build => self.build(),
                State::AfterBuild => self.after_build(),
                State::Sign => self.sign().await,
                State::Send => self.send().await,
                State::ValidateResponse => self.validate_response(),
                State::ExtractData => self.extract_data(),
                State::ExtractError => self.extract_error(),
                State::Retry => self.retry(),
                State::AfterRetry => self.after_retry().await,
                State::Restart => self.restart(),
                State::Success => {
                    self.error = None;
                    State::Complete
                }
                State::Error => State::Complete,
                State::Complete => {
                    return match self.error.take() {
                        Some(error) => Err(error),
                        None => Ok(self.data.take().unwrap_or(Value::Object(Map::new()))),
                    };
                }
            };
        }
    }

    fn fail(&mut self, from: State, error: SdkError) -> State {
        self.error = Some(error);
        from.fail()
    }

    /// Recovers from a broken machine invariant (a state entered without
    /// its required context). Not reachable through the transition table.
    fn invariant_lost(&mut self, what: &str) -> State {
        self.error = Some(SdkError::Networking {
            message: format!("internal error: {what} missing from machine state"),
        });
        State::Error
    }

    fn validate(&mut self) -> State {
        let from = State::Validate;
        if let Some(input) = &self.operation.input {
            if let Err(error) =
                validate::validate(&self.client.schema.registry, input, self.params)
            {
                return self.fail(from, error);
            }
        }
        from.accept()
    }

    fn build(&mut self) -> State {
        let from = State::Build;
        let mut request = WireRequest::new(self.operation.http_method, &self.endpoint);
        if let Err(error) =
            self.codec
                .build(&mut request, &self.client.schema, self.operation, self.params)
        {
            return self.fail(from, error);
        }
        self.request = Some(request);
        from.accept()
    }

    fn after_build(&mut self) -> State {
        let from = State::AfterBuild;
        let Some(request) = self.request.as_mut() else {
            return self.invariant_lost("wire request");
        };

        let prefix = self
            .client
            .config
            .user_agent_prefix()
            .map_or_else(String::new, |prefix| format!("{prefix} "));
        request
            .headers
            .set("User-Agent", format!("{prefix}nimbus-client/{SDK_VERSION}"));
        if !request.body.is_empty() {
            request
                .headers
                .set("Content-Length", request.body.as_bytes().len().to_string());
        }
        from.accept()
    }

    async fn sign(&mut self) -> State {
        let from = State::Sign;
        let credentials = match self.client.credentials.provide().await {
            Ok(credentials) => credentials,
            Err(error) => return self.fail(from, error.into()),
        };
        let Some(request) = self.request.as_mut() else {
            return self.invariant_lost("wire request");
        };
        let now = Utc::now() + chrono::Duration::seconds(self.client.config.clock_offset_secs());
        self.client.signer.add_authorization(request, &credentials, now);
        from.accept()
    }

    async fn send(&mut self) -> State {
        let from = State::Send;
        if self.abort.aborted.load(Ordering::SeqCst) {
            // Response validation surfaces the abort.
            return from.accept();
        }
        let Some(request) = self.request.as_ref() else {
            return self.invariant_lost("wire request");
        };

        let result = {
            let send = self.client.transport.send(request);
            tokio::pin!(send);
            tokio::select! {
                () = self.abort.notify.notified() => {
                    // Dropping the transport future cancels the
                    // round-trip; the abort surfaces in response
                    // validation.
                    return from.accept();
                }
                result = &mut send => result,
            }
        };

        match result {
            Ok(response) => {
                self.response = Some(response);
                from.accept()
            }
            Err(error) => self.fail(
                from,
                SdkError::Networking {
                    message: error.to_string(),
                },
            ),
        }
    }

    fn validate_response(&mut self) -> State {
        let from = State::ValidateResponse;
        if self.abort.aborted.load(Ordering::SeqCst) {
            self.error = Some(SdkError::Aborted);
            return State::Error;
        }
        let Some(response) = self.response.as_ref() else {
            return self.invariant_lost("response");
        };

        // Integrity check: a declared body checksum must match.
        if let Some(expected) = response
            .headers
            .get("x-amz-crc32")
            .and_then(|raw| raw.trim().parse::<u32>().ok())
        {
            let computed = crc32fast::hash(&response.body);
            if computed != expected {
                self.error = Some(SdkError::Checksum { expected, computed });
                return State::Retry;
            }
        }

        // A redirect re-enters the build state at zero delay, bounded by
        // its own counter.
        if response.is_redirect() {
            if let Some(location) = response.headers.get("location") {
                if self.redirects >= self.client.config.max_redirects() {
                    self.error = Some(SdkError::Networking {
                        message: format!(
                            "redirect limit of {} exceeded",
                            self.client.config.max_redirects()
                        ),
                    });
                    return State::Error;
                }
                match Url::parse(location) {
                    Ok(target) => {
                        tracing::debug!(%target, "following redirect");
                        self.redirects += 1;
                        self.endpoint = target;
                        return State::Restart;
                    }
                    Err(_) => {
                        self.error = Some(SdkError::Networking {
                            message: format!("unparseable redirect location: {location}"),
                        });
                        return State::Error;
                    }
                }
            }
        }

        if response.is_success() {
            from.accept()
        } else {
            from.fail()
        }
    }

    fn extract_data(&mut self) -> State {
        let from = State::ExtractData;
        let Some(response) = self.response.as_ref() else {
            return self.invariant_lost("response");
        };
        match self
            .codec
            .extract_data(response, &self.client.schema, self.operation)
        {
            Ok(data) => {
                self.data = Some(data);
                from.accept()
            }
            Err(error) => self.fail(from, error),
        }
    }

    fn extract_error(&mut self) -> State {
        let from = State::ExtractError;
        let Some(response) = self.response.as_ref() else {
            return self.invariant_lost("response");
        };
        let error = self.codec.extract_error(response).map_or(
            SdkError::Unknown {
                status: response.status,
            },
            |info| {
                SdkError::Service(crate::error::ServiceError {
                    code: info.code,
                    message: info.message,
                    status: response.status,
                    request_id: response.request_id().map(ToString::to_string),
                })
            },
        );
        self.error = Some(error);
        from.accept()
    }

    fn retry(&mut self) -> State {
        let from = State::Retry;
        let (retryable, needs_refresh) = match self.error.as_ref() {
            Some(error) => (
                self.policy.should_retry(error, self.attempt),
                forces_credential_refresh(error),
            ),
            None => return self.invariant_lost("error"),
        };

        if !retryable {
            return from.fail();
        }
        if needs_refresh {
            // The next attempt must resolve fresh credentials.
            self.client.credentials.invalidate();
        }
        self.pending_delay = self.policy.delay_for(self.attempt);
        self.attempt += 1;
        tracing::warn!(
            attempt = self.attempt,
            delay_ms = self.pending_delay.as_millis() as u64,
            "retrying request"
        );
        from.accept()
    }

    async fn after_retry(&mut self) -> State {
        let from = State::AfterRetry;
        if self.abort.aborted.load(Ordering::SeqCst) {
            self.error = Some(SdkError::Aborted);
            return from.fail();
        }
        let sleep = tokio::time::sleep(self.pending_delay);
        tokio::pin!(sleep);
        tokio::select! {
            () = self.abort.notify.notified() => {
                self.error = Some(SdkError::Aborted);
                return from.fail();
            }
            () = &mut sleep => {}
        }
        from.accept()
    }

    fn restart(&mut self) -> State {
        self.request = None;
        self.response = None;
        State::Restart.accept()
    }
}
