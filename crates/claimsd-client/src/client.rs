// ── Claims client ──
//
// Full lifecycle management for one claims dataset: initialization,
// background watch + refresh tasks, the on-demand active-claims cache with
// single-flight fetch deduplication, readiness/update signalling, and the
// entry point into the ensure engine.
//
// Concurrency model: one shared state record behind a read/write lock.
// Readers (snapshot/status queries) take the read side, mutators
// (initialize/uninitialize, snapshot replacement) the write side. The lock
// is never held across a network call — snapshots are read under the lock,
// carried out as `Arc`s, and the fetch proceeds lock-free. All background
// work is bound to a `CancellationToken` derived from the caller's parent
// scope at initialize time.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use claimsd_api::{
    ActiveClaims, ApiClient, EVENT_CLAIMS_UPDATED, EVENT_HELLO, Endpoint, ProductClaims,
};

use crate::config::ClientConfig;
use crate::ensure::EnsureTransaction;
use crate::error::ClientError;

/// Per-attempt timeout for the aggregated-claims fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed delay before retrying a failed fetch or reconnecting the watch
/// subscription. No growth, no retry cap — only cancellation stops retries.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Buffer depth of the updated-signal fan-out. Listeners that fall more
/// than this many refreshes behind observe a lag warning instead of
/// blocking the refresh task.
const UPDATE_CHANNEL_SIZE: usize = 64;

// ── Client ───────────────────────────────────────────────────────────

/// Client for the local claims service.
///
/// Cheaply cloneable via `Arc`-shared state. Construct once, then
/// [`initialize`](Self::initialize) to start the background refresh
/// machinery; [`uninitialize`](Self::uninitialize) releases it. The
/// instance can be re-initialized after uninitialize.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    state: RwLock<State>,
}

struct State {
    initialized: bool,
    trusted: bool,
    /// Monotonic initialization counter. Background tasks from a previous
    /// session compare against it before touching shared data.
    session: u64,
    /// Scope bounding the current session's background tasks.
    cancel: Option<CancellationToken>,
    /// One-shot ready latch for the current session. Fired stays fired.
    ready: Option<watch::Sender<bool>>,
    /// Re-armed updated signal: one message per successful refresh.
    updated_tx: broadcast::Sender<()>,
    api: Option<ApiClient>,
    product_claims: Arc<ProductClaims>,
    active_claims: Option<Arc<ActiveClaims>>,
    /// In-flight active-claims fetch marker. `Some` means a fetch is
    /// running; waiters subscribe to the channel and re-check the cache
    /// when it fires.
    fetching: Option<watch::Receiver<bool>>,
}

impl Client {
    /// Create a new client from configuration. Does not touch the network —
    /// call [`initialize`](Self::initialize) to start.
    pub fn new(config: ClientConfig) -> Self {
        let (updated_tx, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ClientInner {
                config,
                state: RwLock::new(State {
                    initialized: false,
                    trusted: false,
                    session: 0,
                    cancel: None,
                    ready: None,
                    updated_tx,
                    api: None,
                    product_claims: Arc::new(ProductClaims::default()),
                    active_claims: None,
                    fetching: None,
                }),
            }),
        }
    }

    /// Access the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Whether the instance is currently initialized.
    pub fn initialized(&self) -> bool {
        self.inner.read_state().initialized
    }

    /// Whether the selected endpoint is the trusted default. Meaningful
    /// only while initialized.
    pub fn trusted(&self) -> bool {
        self.inner.read_state().trusted
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Initialize the instance: select the claims endpoint, derive a
    /// cancellation scope from `parent`, and start the background watch
    /// and refresh tasks. Returns immediately; use
    /// [`wait_until_ready`](Self::wait_until_ready) to await the first
    /// successful fetch.
    ///
    /// Fails with [`ClientError::AlreadyInitialized`] while active and
    /// with [`ClientError::InvalidProductName`] for an empty filter.
    ///
    /// Must run inside a tokio runtime (it spawns the background tasks).
    pub fn initialize(
        &self,
        parent: &CancellationToken,
        product: Option<&str>,
    ) -> Result<(), ClientError> {
        if matches!(product, Some("")) {
            return Err(ClientError::InvalidProductName);
        }

        let mut state = self.inner.write_state();
        if state.initialized {
            return Err(ClientError::AlreadyInitialized);
        }

        let endpoint = Endpoint::select(self.inner.config.endpoint.as_ref())?;
        if self.inner.config.debug {
            debug!(
                endpoint = %endpoint.base,
                trusted = endpoint.trusted,
                "claims client initializing"
            );
        }

        let api = ApiClient::new(
            endpoint.clone(),
            self.inner.config.product_user_agent.as_deref(),
        )?;

        let cancel = parent.child_token();
        let (ready_tx, _) = watch::channel(false);

        state.initialized = true;
        state.trusted = endpoint.trusted;
        state.session += 1;
        state.cancel = Some(cancel.clone());
        state.ready = Some(ready_tx.clone());
        state.api = Some(api.clone());
        state.active_claims = None;

        let session = state.session;
        let product = product.map(str::to_owned);

        // Coalescing wake-up: capacity one, non-blocking send, a pending
        // trigger satisfies any number of update notifications.
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);

        if self.inner.config.auto_refresh {
            tokio::spawn(watch_task(
                api.clone(),
                product.clone(),
                trigger_tx,
                cancel.clone(),
                self.inner.config.debug,
            ));
        }

        tokio::spawn(refresh_task(
            Arc::clone(&self.inner),
            api,
            product,
            session,
            trigger_rx,
            ready_tx,
            cancel,
        ));

        Ok(())
    }

    /// Release the instance: cancel the background scope and mark the
    /// instance inactive. Returns once state is updated; does not wait for
    /// task shutdown. Fails with [`ClientError::NotInitialized`] when not
    /// active.
    pub fn uninitialize(&self) -> Result<(), ClientError> {
        let mut state = self.inner.write_state();
        if !state.initialized {
            return Err(ClientError::NotInitialized);
        }

        state.initialized = false;
        state.ready = None;
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }

        Ok(())
    }

    /// Block until the first successful fetch fired the ready latch, the
    /// instance scope is cancelled, or `timeout` elapses.
    ///
    /// Safe for any number of concurrent waiters, including after the
    /// latch already fired.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), ClientError> {
        let (ready_tx, cancel) = {
            let state = self.inner.read_state();
            if !state.initialized {
                return Err(ClientError::NotInitialized);
            }
            (
                state.ready.clone().ok_or(ClientError::NotInitialized)?,
                state.cancel.clone().ok_or(ClientError::NotInitialized)?,
            )
        };

        let mut ready_rx = ready_tx.subscribe();

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled),
            result = tokio::time::timeout(timeout, ready_rx.wait_for(|ready| *ready)) => {
                match result {
                    Ok(Ok(_)) => Ok(()),
                    // Latch sender dropped: the session was torn down.
                    Ok(Err(_)) => Err(ClientError::Cancelled),
                    Err(_) => Err(ClientError::Timeout),
                }
            }
        }
    }

    // ── Claims access ────────────────────────────────────────────────

    /// The latest aggregated product-claims snapshot. Non-blocking and
    /// infallible: before the first successful fetch this is the safe
    /// default (`offline`, untrusted, no products).
    pub fn current_product_claims(&self) -> Arc<ProductClaims> {
        Arc::clone(&self.inner.read_state().product_claims)
    }

    /// Begin an ensure transaction over the current snapshot.
    pub fn begin_ensure(&self) -> EnsureTransaction {
        EnsureTransaction::new(self.current_product_claims())
    }

    /// The active-claims payload, fetched lazily and cached until the next
    /// refresh cycle invalidates it.
    ///
    /// Concurrent callers during a cache miss share a single backend
    /// fetch: one caller performs it, the rest await its completion and
    /// re-read the cache. A failed fetch is not cached, so the next caller
    /// retries. Cancelling `cancel` aborts the wait (or the fetch, for the
    /// fetching caller) with [`ClientError::Cancelled`].
    pub async fn current_claims(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<ActiveClaims>, ClientError> {
        loop {
            // Fast path outside the write lock.
            {
                let state = self.inner.read_state();
                if let Some(claims) = &state.active_claims {
                    return Ok(Arc::clone(claims));
                }
            }

            let (api, fetch_done) = {
                let mut state = self.inner.write_state();
                if let Some(claims) = &state.active_claims {
                    return Ok(Arc::clone(claims));
                }
                if !state.initialized {
                    return Err(ClientError::NotInitialized);
                }

                if let Some(rx) = &state.fetching {
                    (None, rx.clone())
                } else {
                    let (tx, rx) = watch::channel(false);
                    state.fetching = Some(rx.clone());
                    let api = state.api.clone().ok_or(ClientError::NotInitialized)?;
                    (Some((api, tx)), rx)
                }
            };

            match api {
                // This caller is the fetcher.
                Some((api, done_tx)) => {
                    let fetched = tokio::select! {
                        biased;
                        () = cancel.cancelled() => Err(ClientError::Cancelled),
                        result = api.fetch_claims() => result.map_err(ClientError::from),
                    };

                    let result = {
                        let mut state = self.inner.write_state();
                        state.fetching = None;
                        match fetched {
                            Ok(claims) => {
                                let claims = Arc::new(claims);
                                state.active_claims = Some(Arc::clone(&claims));
                                Ok(claims)
                            }
                            Err(e) => Err(e),
                        }
                    };

                    // Release all waiters; on failure they find an empty
                    // cache and retry.
                    let _ = done_tx.send(true);

                    if let Err(ref e) = result {
                        if self.inner.config.debug {
                            debug!(error = %e, "active claims fetch failed");
                        }
                    }
                    return result;
                }
                // A fetch is in flight: wait for it, then re-read.
                None => {
                    let mut fetch_done = fetch_done;
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ClientError::Cancelled),
                        // A closed channel means the fetcher is gone either
                        // way; looping re-reads the cache and, if needed,
                        // elects a new fetcher.
                        _ = fetch_done.wait_for(|done| *done) => {}
                    }
                }
            }
        }
    }

    // ── Update notifications ─────────────────────────────────────────

    /// Push one notification into `sink` for every successful refresh,
    /// until `cancel` fires or the instance is uninitialized (both exit
    /// cleanly). Fails with [`ClientError::NotInitialized`] when called on
    /// an inactive instance.
    ///
    /// Delivery is decoupled from the refresh task through a buffered
    /// fan-out: a slow `sink` delays only this listener, never a refresh.
    /// The buffer holds up to 64 pending refreshes per listener; a
    /// listener that falls further behind skips the missed generations
    /// (with a lag warning) rather than blocking the refresh engine.
    pub async fn notify_when_updated(
        &self,
        cancel: &CancellationToken,
        sink: mpsc::Sender<()>,
    ) -> Result<(), ClientError> {
        let (mut updates, scope) = {
            let state = self.inner.read_state();
            if !state.initialized {
                return Err(ClientError::NotInitialized);
            }
            (
                state.updated_tx.subscribe(),
                state.cancel.clone().ok_or(ClientError::NotInitialized)?,
            )
        };

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                () = scope.cancelled() => return Ok(()),
                result = updates.recv() => match result {
                    Ok(()) => {
                        if sink.send(()).await.is_err() {
                            // Receiver dropped; nothing left to notify.
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "update listener lagged behind refreshes");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    // ── One-shot mode ────────────────────────────────────────────────

    /// Instant mode for callers without a persistent instance: construct,
    /// initialize, wait for readiness, run `f`, uninitialize — as a single
    /// blocking call. Auto-refresh is forced off; the snapshot `f` sees is
    /// the first (and only) fetch.
    pub async fn oneshot<F, Fut, T>(
        config: ClientConfig,
        product: Option<&str>,
        timeout: Duration,
        f: F,
    ) -> Result<T, ClientError>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut config = config;
        config.auto_refresh = false;

        let client = Client::new(config);
        let scope = CancellationToken::new();
        client.initialize(&scope, product)?;

        let result = {
            let client = client.clone();
            async move {
                client.wait_until_ready(timeout).await?;
                f(client).await
            }
        }
        .await;

        let _ = client.uninitialize();
        result
    }
}

impl ClientInner {
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("claims client state lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().expect("claims client state lock poisoned")
    }

    /// Invalidate the cached active claims at the start of a refresh
    /// cycle. Returns `false` when the session is stale.
    fn begin_refresh_cycle(&self, session: u64) -> bool {
        let mut state = self.write_state();
        if state.session != session || !state.initialized {
            return false;
        }
        state.active_claims = None;
        true
    }

    /// Atomically replace the aggregated snapshot and fire one updated
    /// generation. Returns `false` when the session is stale (the snapshot
    /// is dropped unapplied).
    fn apply_product_claims(&self, session: u64, snapshot: ProductClaims) -> bool {
        let mut state = self.write_state();
        if state.session != session || !state.initialized {
            return false;
        }
        state.product_claims = Arc::new(snapshot);
        let _ = state.updated_tx.send(());
        true
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Watch task: keep a claims-watch subscription open and wake the refresh
/// task through the coalescing trigger. Reconnects forever with a fixed
/// delay; only scope cancellation stops it.
async fn watch_task(
    api: ApiClient,
    product: Option<String>,
    trigger: mpsc::Sender<()>,
    cancel: CancellationToken,
    debug_enabled: bool,
) {
    let mut first = true;

    loop {
        if debug_enabled {
            debug!("claims watch start");
        }
        let mut events = Box::pin(api.subscribe(product.as_deref()));

        loop {
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                item = events.next() => item,
            };

            match item {
                Some(Ok(event)) => match event.event_type.as_str() {
                    EVENT_HELLO => {
                        if first {
                            first = false;
                            if debug_enabled {
                                debug!(data = %event.data, "claims watch first hello");
                            }
                            let _ = trigger.try_send(());
                        }
                    }
                    EVENT_CLAIMS_UPDATED => {
                        if debug_enabled {
                            debug!("claims watch update notification");
                        }
                        if trigger.try_send(()).is_err() && debug_enabled {
                            debug!("claims trigger busy");
                        }
                    }
                    _ => {}
                },
                Some(Err(e)) => {
                    if debug_enabled {
                        debug!(error = %e, "claims watch error (will reconnect)");
                    }
                    break;
                }
                None => {
                    if debug_enabled {
                        debug!("claims watch ended (will reconnect)");
                    }
                    break;
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(RETRY_DELAY) => {}
        }
    }
}

/// Refresh task: fetch the aggregated snapshot, publish it, signal
/// readiness/updates, and wait for the next trigger. With auto-refresh off
/// it exits permanently after the first successful fetch.
async fn refresh_task(
    inner: Arc<ClientInner>,
    api: ApiClient,
    product: Option<String>,
    session: u64,
    mut trigger: mpsc::Receiver<()>,
    ready: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    let auto_refresh = inner.config.auto_refresh;
    let debug_enabled = inner.config.debug;
    let mut first = true;

    loop {
        // Whatever active claims were cached belong to the previous cycle.
        if !inner.begin_refresh_cycle(session) {
            return;
        }

        if auto_refresh && first {
            // Wait for the watcher's first hello before fetching, so
            // startup does not fetch twice.
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                _ = trigger.recv() => {}
            }
        }

        // Retried with a fixed delay until it succeeds; failures never
        // surface to callers.
        let snapshot = loop {
            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = tokio::time::timeout(
                    FETCH_TIMEOUT,
                    api.fetch_product_claims(product.as_deref()),
                ) => result,
            };

            match fetched {
                Ok(Ok(snapshot)) => break snapshot,
                Ok(Err(e)) => {
                    if debug_enabled {
                        debug!(error = %e, "claims fetch error");
                    }
                }
                Err(_elapsed) => {
                    if debug_enabled {
                        debug!("claims fetch timed out");
                    }
                }
            }

            if !retry_delay(&cancel).await {
                return;
            }
        };

        if !inner.apply_product_claims(session, snapshot) {
            return;
        }

        if first {
            first = false;
            let _ = ready.send(true);
        }

        if !auto_refresh {
            return;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            _ = trigger.recv() => {}
        }
    }
}

/// Sleep out the fixed retry delay. Returns `false` when cancelled.
async fn retry_delay(cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(RETRY_DELAY) => true,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
