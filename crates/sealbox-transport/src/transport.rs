//! Secure transport sessions
//!
//! Each session holds a destination URL, method, headers, optional pinned
//! server key and response timeout, and moves between two states:
//!
//! ```text
//!   Idle --send_request--> Sending --response / error / abort--> Idle
//! ```
//!
//! Configuration changes and a second `send_request` are refused while a
//! request is in flight. `abort` cancels the pending request, which then fails
//! with `ActionAborted`, and leaves the session reusable. `destroy` also
//! cancels and removes the session.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use sealbox_enclave::InstanceManager;

use crate::config::TransportConfig;
use crate::descriptor::{apply_descriptors, SecureDataDescriptor};
use crate::error::{Result, TransportError};
use crate::executor::HttpExecutor;
use crate::pinning::ServerKeyPin;
use crate::request::{HttpMethod, HttpRequest, OpenOptions, RequestFormat, Response, SendRequestOptions};

/// Handle of an open transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportId(pub u64);

impl std::fmt::Display for TransportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

enum SessionState {
    Idle,
    Sending {
        seq: u64,
        abort: watch::Sender<bool>,
    },
}

struct Session {
    url: Url,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    pinned_key: Option<ServerKeyPin>,
    timeout: Duration,
    state: SessionState,
}

impl Session {
    fn ensure_idle(&self, id: TransportId) -> Result<()> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Sending { .. } => Err(TransportError::IncorrectState(format!(
                "transport {} has a request in flight",
                id
            ))),
        }
    }
}

/// Secure transport session table
pub struct SecureTransport {
    manager: InstanceManager,
    executor: Arc<dyn HttpExecutor>,
    config: TransportConfig,
    sessions: Mutex<HashMap<TransportId, Session>>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
}

/// Returns the session to `Idle` when a send ends, however it ends
struct SendingGuard<'a> {
    transport: &'a SecureTransport,
    id: TransportId,
    seq: u64,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        let mut sessions = self.transport.sessions();
        if let Some(session) = sessions.get_mut(&self.id) {
            if matches!(session.state, SessionState::Sending { seq, .. } if seq == self.seq) {
                session.state = SessionState::Idle;
                debug!(transport = %self.id, "Transport idle");
            }
        }
    }
}

impl SecureTransport {
    pub fn new(
        manager: InstanceManager,
        executor: Arc<dyn HttpExecutor>,
        config: TransportConfig,
    ) -> Result<Self> {
        config.validate()?;
        info!(executor = executor.executor_type(), "Secure transport ready");
        Ok(Self {
            manager,
            executor,
            config,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Open a session
    pub fn open(&self, options: OpenOptions) -> Result<TransportId> {
        let url = parse_https_url(&options.url)?;
        let method = match &options.method {
            Some(m) => m.parse()?,
            None => HttpMethod::default(),
        };
        let pinned_key = options
            .server_key
            .as_deref()
            .map(ServerKeyPin::from_pem)
            .transpose()?;
        let timeout = match options.timeout_ms {
            Some(ms) => self.config.check_timeout(ms)?,
            None => self.config.default_timeout(),
        };

        let id = TransportId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(
            transport = %id,
            host = url.host_str().unwrap_or_default(),
            %method,
            pinned = pinned_key.is_some(),
            "Opened secure transport"
        );

        self.sessions().insert(
            id,
            Session {
                url,
                method,
                headers: BTreeMap::new(),
                pinned_key,
                timeout,
                state: SessionState::Idle,
            },
        );
        Ok(id)
    }

    /// Point the session at a new URL
    ///
    /// The pin is replaced by `server_key`, or cleared when it is `None`.
    pub fn set_url(&self, id: TransportId, url: &str, server_key: Option<&str>) -> Result<()> {
        let url = parse_https_url(url)?;
        let pinned_key = server_key.map(ServerKeyPin::from_pem).transpose()?;

        let mut sessions = self.sessions();
        let session = Self::session_mut(&mut sessions, id)?;
        session.ensure_idle(id)?;
        session.url = url;
        session.pinned_key = pinned_key;
        Ok(())
    }

    pub fn set_method(&self, id: TransportId, method: &str) -> Result<()> {
        let method: HttpMethod = method.parse()?;

        let mut sessions = self.sessions();
        let session = Self::session_mut(&mut sessions, id)?;
        session.ensure_idle(id)?;
        session.method = method;
        Ok(())
    }

    /// Replace the session's headers
    pub fn set_headers(&self, id: TransportId, headers: BTreeMap<String, String>) -> Result<()> {
        if headers.len() > self.config.max_headers {
            return Err(TransportError::InvalidHeader(format!(
                "{} headers, limit is {}",
                headers.len(),
                self.config.max_headers
            )));
        }
        for (name, value) in &headers {
            check_header(name, value)?;
        }

        let mut sessions = self.sessions();
        let session = Self::session_mut(&mut sessions, id)?;
        session.ensure_idle(id)?;
        session.headers = headers;
        Ok(())
    }

    /// Send the session's request and wait for the response
    pub async fn send_request(
        &self,
        id: TransportId,
        options: SendRequestOptions,
    ) -> Result<Response> {
        let format = match &options.request_format {
            Some(f) => f.parse()?,
            None => RequestFormat::default(),
        };
        let descriptors = match &options.secure_data_descriptors {
            Some(value) => SecureDataDescriptor::parse_list(value)?,
            None => Vec::new(),
        };
        if !descriptors.is_empty() && format != RequestFormat::Json {
            return Err(TransportError::DescriptorNotSupported);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (abort_tx, mut abort_rx) = watch::channel(false);

        let (url, method, headers, pinned_key, timeout) = {
            let mut sessions = self.sessions();
            let session = Self::session_mut(&mut sessions, id)?;
            session.ensure_idle(id)?;
            session.state = SessionState::Sending {
                seq,
                abort: abort_tx,
            };
            (
                session.url.clone(),
                session.method,
                session.headers.clone(),
                session.pinned_key.clone(),
                session.timeout,
            )
        };
        let _guard = SendingGuard {
            transport: self,
            id,
            seq,
        };
        debug!(transport = %id, %method, descriptors = descriptors.len(), "Transport sending");

        let request = HttpRequest {
            url,
            method,
            headers,
            body: options.request_body,
            pinned_key,
            timeout,
        };
        let outcome = tokio::select! {
            result = self.exchange(request, format, &descriptors) => result,
            // A dropped sender means the session was destroyed
            _ = abort_rx.changed() => Err(TransportError::ActionAborted),
        };

        match &outcome {
            Ok(response) => {
                info!(transport = %id, status = response.status, "Request completed")
            }
            Err(TransportError::ActionAborted) => info!(transport = %id, "Request aborted"),
            Err(e) => warn!(transport = %id, error = %e, "Request failed"),
        }
        outcome
    }

    /// Prepare the body and run the request through the executor
    async fn exchange(
        &self,
        mut request: HttpRequest,
        format: RequestFormat,
        descriptors: &[SecureDataDescriptor],
    ) -> Result<Response> {
        if format == RequestFormat::Json {
            let host = request.url.host_str().unwrap_or_default().to_string();
            request.body = match request.body.take() {
                Some(body) => {
                    Some(apply_descriptors(&self.manager, &host, &body, descriptors).await?)
                }
                None if !descriptors.is_empty() => {
                    return Err(TransportError::InvalidRequestBody(
                        "descriptors need a request body".to_string(),
                    ))
                }
                None => None,
            };
        }

        let timeout = request.timeout;
        match tokio::time::timeout(timeout, self.executor.execute(request)).await {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::ConnectionTimeout),
        }
    }

    /// Cancel the session's pending request
    pub fn abort(&self, id: TransportId) -> Result<()> {
        let mut sessions = self.sessions();
        let session = Self::session_mut(&mut sessions, id)?;

        match std::mem::replace(&mut session.state, SessionState::Idle) {
            SessionState::Sending { abort, .. } => {
                let _ = abort.send(true);
                debug!(transport = %id, "Abort signalled");
                Ok(())
            }
            SessionState::Idle => Err(TransportError::IncorrectState(format!(
                "transport {} has no request in flight",
                id
            ))),
        }
    }

    /// Close the session, cancelling any pending request
    pub fn destroy(&self, id: TransportId) -> Result<()> {
        let session = self
            .sessions()
            .remove(&id)
            .ok_or(TransportError::InvalidHandle(id))?;

        if let SessionState::Sending { abort, .. } = session.state {
            let _ = abort.send(true);
        }
        info!(transport = %id, "Destroyed secure transport");
        Ok(())
    }

    /// Whether the session has a request in flight
    pub fn is_sending(&self, id: TransportId) -> Result<bool> {
        let mut sessions = self.sessions();
        let session = Self::session_mut(&mut sessions, id)?;
        Ok(matches!(session.state, SessionState::Sending { .. }))
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<TransportId, Session>> {
        // Never held across an await, so a poisoned lock still holds a consistent table
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn session_mut<'a>(
        sessions: &'a mut HashMap<TransportId, Session>,
        id: TransportId,
    ) -> Result<&'a mut Session> {
        sessions
            .get_mut(&id)
            .ok_or(TransportError::InvalidHandle(id))
    }
}

/// Parse a destination URL, accepting only `https` with a host
fn parse_https_url(input: &str) -> Result<Url> {
    let url = Url::parse(input).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", input, e)))?;

    if url.scheme() != "https" {
        return Err(TransportError::InvalidUrl(format!(
            "scheme {:?} is not https",
            url.scheme()
        )));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(TransportError::InvalidUrl(format!("{} has no host", input)));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(TransportError::InvalidUrl(
            "credentials in URL are not allowed".to_string(),
        ));
    }
    Ok(url)
}

fn check_header(name: &str, value: &str) -> Result<()> {
    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid_name {
        return Err(TransportError::InvalidHeader(format!(
            "{:?} is not a valid header name",
            name
        )));
    }
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(TransportError::InvalidHeader(format!(
            "value of {} contains a control character",
            name
        )));
    }
    Ok(())
}
