//! Process-wide facade used by request instrumentation.
//!
//! A [`Connector`] is initialised once with the router settings. Afterwards
//! logging calls capture a timestamp, hand the transaction to the driver task
//! and return immediately; every network failure stays inside the driver and
//! is only visible in the logs.

use std::{
    sync::{
        Arc,
        OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime,
    sync::{mpsc, watch},
    time::timeout,
};
use tracing::{debug, error, trace, warn};

use crate::{
    config::RouterSettings,
    error::ConnectorError,
    observer::{self, ExceptionReport, RequestMetadata},
    protocol::{EXCEPTIONS_CATEGORY, REQUESTS_CATEGORY},
    session::{ConnectionState, ConnectorSession},
    timestamp::Clock,
    transaction::Transaction,
    transport::{self, Command, SessionStatus},
};

struct Running {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    clock: Arc<dyn Clock>,
}

/// Entry point for logging transactions to the router.
pub struct Connector {
    claimed: AtomicBool,
    running: OnceLock<Running>,
}

impl Default for Connector {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

static GLOBAL: Connector = Connector::new();

/// The process-wide connector.
#[must_use]
pub fn global() -> &'static Connector { &GLOBAL }

impl Connector {
    /// A connector that has not been initialised yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            running: OnceLock::new(),
        }
    }

    /// Validate `settings` and start the driver task on the current Tokio
    /// runtime.
    ///
    /// Only the first call on a connector has any effect. Failures are
    /// logged and leave the connector disabled for the life of the process;
    /// the returned error is informational.
    ///
    /// # Errors
    /// Returns [`ConnectorError::AlreadyInitialised`] on repeated calls,
    /// [`ConnectorError::ConfigIncomplete`] when a required setting is
    /// missing and [`ConnectorError::NoRuntime`] outside a Tokio runtime.
    pub fn init(&self, settings: RouterSettings) -> Result<(), ConnectorError> {
        let result = self
            .claim()
            .and_then(|()| settings.into_config())
            .and_then(|config| self.start(ConnectorSession::new(config)));
        log_init_failure(result)
    }

    /// Initialise from the five values the router requires.
    ///
    /// # Errors
    /// As for [`Connector::init`].
    pub fn init_with(
        &self,
        address: &str,
        username: &str,
        password: &str,
        gateway_key: &str,
        group_name: &str,
    ) -> Result<(), ConnectorError> {
        self.init(RouterSettings::from_parts(
            address,
            username,
            password,
            gateway_key,
            group_name,
        ))
    }

    /// Start the driver for a session built by the caller, for example one
    /// with an injected clock.
    ///
    /// # Errors
    /// As for [`Connector::init`], minus configuration validation.
    pub fn init_session(&self, session: ConnectorSession) -> Result<(), ConnectorError> {
        let result = self.claim().and_then(|()| self.start(session));
        log_init_failure(result)
    }

    fn claim(&self) -> Result<(), ConnectorError> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return Err(ConnectorError::AlreadyInitialised);
        }
        Ok(())
    }

    fn start(&self, session: ConnectorSession) -> Result<(), ConnectorError> {
        let handle = runtime::Handle::try_current().map_err(|_| ConnectorError::NoRuntime)?;
        debug!(config = ?session.config(), "starting router connector");
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus::of(&session));
        let running = Running {
            commands,
            status,
            clock: session.clock(),
        };
        if self.running.set(running).is_err() {
            return Err(ConnectorError::AlreadyInitialised);
        }
        handle.spawn(transport::run(session, receiver, status_tx));
        Ok(())
    }

    /// Whether `init` succeeded. Stays true across reconnects.
    #[must_use]
    pub fn is_enabled(&self) -> bool { self.running.get().is_some() }

    /// Connection state last published by the driver.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.running
            .get()
            .map_or(ConnectionState::Disabled, |running| running.status.borrow().state)
    }

    /// Receiver for driver status updates, if the connector is running.
    #[must_use]
    pub fn subscribe(&self) -> Option<watch::Receiver<SessionStatus>> {
        self.running.get().map(|running| running.status.clone())
    }

    /// Correlation id carried by `request`.
    #[must_use]
    pub fn correlation_id<R: RequestMetadata + ?Sized>(request: &R) -> Option<&str> {
        observer::correlation_id(request)
    }

    /// Queue a transaction of `lines` under `category`.
    ///
    /// A non-empty `continuation` continues an existing router transaction.
    /// Does nothing while disabled.
    pub fn log_transaction(&self, category: &str, lines: Vec<String>, continuation: Option<&str>) {
        let Some(running) = self.running.get() else {
            trace!(category, "router connector disabled; dropping transaction");
            return;
        };
        let mut tx = Transaction::new(running.clock.now_micros(), category, lines);
        if let Some(id) = continuation.filter(|id| !id.is_empty()) {
            tx = tx.continuing(id);
        }
        if running.commands.send(Command::Enqueue(tx)).is_err() {
            warn!(category, "router driver stopped; dropping transaction");
        }
    }

    /// Log a request for `url` in the `requests` category.
    pub fn log_request(&self, url: &str, continuation: Option<&str>) {
        self.log_transaction(REQUESTS_CATEGORY, observer::request_lines(url), continuation);
    }

    /// Log an unhandled error in the `exceptions` category.
    pub fn log_exception(&self, report: &ExceptionReport<'_>) {
        self.log_transaction(EXCEPTIONS_CATEGORY, observer::exception_lines(report), None);
    }

    /// Wait up to `limit` for the handshake to complete and the queue to
    /// empty. Returns whether it did.
    #[must_use]
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let Some(mut status) = self.subscribe() else {
            return false;
        };
        matches!(
            timeout(limit, status.wait_for(|current| current.is_drained())).await,
            Ok(Ok(_))
        )
    }
}

fn log_init_failure(result: Result<(), ConnectorError>) -> Result<(), ConnectorError> {
    if let Err(err) = &result {
        error!(error = %err, "router connector not started");
    }
    result
}
