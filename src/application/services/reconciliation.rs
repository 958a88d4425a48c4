//! # Reconciliation Engine
//!
//! Keeps the local trade set converged with the remote trade service.
//!
//! Each poll pass:
//!
//! 1. Flushes trades whose earlier push failed on the network
//! 2. Fetches every record visible to the local profile, sorted by version
//! 3. Reconciles each trade id in version order, different ids concurrently
//!
//! Reconciling one record loads (or synthesizes) the local copy, refreshes
//! its escrow transactions, lets the role's [`TradeProtocol`] react, then
//! persists and publishes whatever changed. Records carrying facts the
//! remote lacks are pushed back with compare-and-swap; a conflict is
//! rebased onto the latest record and retried.
//!
//! A second task consumes wallet events so confirmations promote
//! FUNDING→FUNDED and COMPLETING→COMPLETED without waiting for a poll.
//!
//! # Example
//!
//! ```ignore
//! let engine = ReconciliationEngine::new(context, service, store, EngineConfig::default());
//! engine.load().await?;
//! let mut events = engine.subscribe();
//! let handle = engine.start();
//! // ...
//! handle.shutdown().await;
//! ```

use crate::application::dto::TradeRecord;
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::ports::{ServiceError, TradeService, TradeStore, WalletEvent};
use crate::application::protocol::{ProtocolContext, TradeProtocol};
use crate::application::services::retry::{RetryPolicy, execute_with_retry};
use crate::application::services::trade_locks::TradeLocks;
use crate::domain::entities::Trade;
use crate::domain::events::TradeEvent;
use crate::domain::value_objects::TradeId;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Default pause after the trade service is unreachable.
pub const DEFAULT_NETWORK_RETRY_DELAY: Duration = Duration::from_secs(100);

/// Default bound on rebase-and-retry after write conflicts.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

const DEFAULT_EVENT_CAPACITY: usize = 256;

// ============================================================================
// Configuration
// ============================================================================

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between poll passes.
    pub poll_interval: Duration,
    /// Pause after a fetch fails on the network.
    pub network_retry_delay: Duration,
    /// Rebase attempts after `RemoteWriteConflict` before giving up.
    pub max_conflict_retries: u32,
    /// Backoff for pushes failing on the network.
    pub push_retry: RetryPolicy,
    /// Capacity of the trade event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            network_retry_delay: DEFAULT_NETWORK_RETRY_DELAY,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            push_retry: RetryPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// What reconciling one record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Older than what was already applied; dropped until re-polled.
    Stale,
    /// Nothing changed.
    Unchanged,
    /// The local copy changed and was stored.
    Stored,
    /// The local copy was stored and published to the trade service.
    Pushed,
    /// Stored locally; the push is queued until the service is reachable.
    Deferred,
}

/// Counts for one poll pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Records fetched.
    pub fetched: usize,
    /// Queued pushes flushed successfully.
    pub flushed: usize,
    /// Records dropped as stale.
    pub stale: usize,
    /// Records that changed nothing.
    pub unchanged: usize,
    /// Records stored and, where needed, published or queued.
    pub updated: usize,
    /// Records skipped on error.
    pub failed: usize,
}

impl PassSummary {
    fn record(&mut self, result: &ApplicationResult<Outcome>) {
        match result {
            Ok(Outcome::Stale) => self.stale += 1,
            Ok(Outcome::Unchanged) => self.unchanged += 1,
            Ok(Outcome::Stored | Outcome::Pushed | Outcome::Deferred) => self.updated += 1,
            Err(_) => self.failed += 1,
        }
    }
}

enum Pushed {
    Stored(Trade),
    Deferred,
}

// ============================================================================
// Engine
// ============================================================================

struct EngineInner {
    context: ProtocolContext,
    service: Arc<dyn TradeService>,
    store: Arc<dyn TradeStore>,
    config: EngineConfig,
    locks: TradeLocks,
    applied: Mutex<HashMap<TradeId, u64>>,
    pending: Mutex<HashSet<TradeId>>,
    events: broadcast::Sender<TradeEvent>,
}

/// Poll-merge-write loop for one principal. Clones share state.
#[derive(Clone)]
pub struct ReconciliationEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("profile", &self.inner.context.profile().pub_key())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Creates an engine. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(
        context: ProtocolContext,
        service: Arc<dyn TradeService>,
        store: Arc<dyn TradeStore>,
        config: EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(EngineInner {
                context,
                service,
                store,
                config,
                locks: TradeLocks::new(),
                applied: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashSet::new()),
                events,
            }),
        }
    }

    /// Returns the protocol collaborators.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &ProtocolContext {
        &self.inner.context
    }

    /// Returns the local trade store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &dyn TradeStore {
        self.inner.store.as_ref()
    }

    /// Returns the engine configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Subscribes to trade events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.inner.events.subscribe()
    }

    /// Ids whose push is waiting for the service to come back.
    pub async fn pending_pushes(&self) -> Vec<TradeId> {
        let mut ids: Vec<TradeId> = self.inner.pending.lock().await.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Reads every stored trade, refreshes its transactions and re-derives
    /// its status, emitting [`TradeEvent::Loaded`] for each.
    ///
    /// # Errors
    ///
    /// Storage or wallet failures.
    pub async fn load(&self) -> ApplicationResult<Vec<Trade>> {
        let ctx = &self.inner.context;
        let profile = ctx.profile().pub_key();
        let stored = self.inner.store.all().await?;
        let mut loaded = Vec::with_capacity(stored.len());
        for mut trade in stored {
            if let Some(address) = trade.escrow_address() {
                ctx.wallet().watch_escrow_address(address).await?;
            }
            ctx.refresh_transactions(&mut trade).await?;
            if let Err(err) = trade.update_status() {
                warn!(trade_id = %trade.id(), error = %err, "stored trade does not derive");
            }
            if let Err(err) = trade.assign_role(&profile) {
                warn!(trade_id = %trade.id(), error = %err, "stored trade has no local role");
            }
            self.mark_applied(trade.id(), trade.version()).await;
            self.publish(TradeEvent::Loaded(trade.clone()));
            loaded.push(trade);
        }
        info!(trades = loaded.len(), "local trades loaded");
        Ok(loaded)
    }

    /// Runs one poll pass.
    ///
    /// # Errors
    ///
    /// `NetworkFailure` or another service error if the fetch fails.
    /// Per-trade failures are logged and counted, never returned.
    pub async fn poll_once(&self) -> ApplicationResult<PassSummary> {
        let mut summary = PassSummary {
            flushed: self.flush_pending().await,
            ..PassSummary::default()
        };

        let profile = self.inner.context.profile().pub_key();
        let mut records = self.inner.service.get(&profile).await?;
        summary.fetched = records.len();
        records.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.id.cmp(&b.id)));

        let mut groups: Vec<Vec<TradeRecord>> = Vec::new();
        let mut index: HashMap<TradeId, usize> = HashMap::new();
        for record in records {
            let slot = *index.entry(record.id.clone()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(record);
        }

        let passes = groups.into_iter().map(|group| async move {
            let mut results = Vec::with_capacity(group.len());
            for record in group {
                let id = record.id.clone();
                let result = self.reconcile_record(record).await;
                if let Err(err) = &result {
                    log_failure(&id, err);
                }
                results.push(result);
            }
            results
        });
        for result in join_all(passes).await.iter().flatten() {
            summary.record(result);
        }
        debug!(
            fetched = summary.fetched,
            updated = summary.updated,
            stale = summary.stale,
            failed = summary.failed,
            "poll pass complete"
        );
        Ok(summary)
    }

    /// Reconciles one remote record against the local copy.
    ///
    /// # Errors
    ///
    /// `InvalidTradeState` if the record cannot be trusted or derived;
    /// protocol, wallet and storage errors otherwise. The local copy is
    /// untouched on error.
    pub async fn reconcile_record(&self, record: TradeRecord) -> ApplicationResult<Outcome> {
        let id = record.id.clone();
        let _guard = self.inner.locks.acquire(&id).await;

        let applied = self.applied_version(&id).await;
        if record.version < applied {
            debug!(trade_id = %id, version = record.version, applied, "stale record dropped");
            return Ok(Outcome::Stale);
        }
        let stored = self.inner.store.read(&id).await?;
        if let Some(local) = &stored
            && record.version < local.version()
        {
            debug!(
                trade_id = %id,
                version = record.version,
                local_version = local.version(),
                "record behind local copy dropped"
            );
            return Ok(Outcome::Stale);
        }

        let version = record.version;
        let outcome = self.step(stored, record.into_trade()).await?;
        self.mark_applied(&id, version).await;
        Ok(outcome)
    }

    /// Reconciles the stored copy of `id` against itself, picking up new
    /// transaction observations.
    ///
    /// # Errors
    ///
    /// As for [`reconcile_record`](Self::reconcile_record).
    pub async fn reconcile_local(&self, id: &TradeId) -> ApplicationResult<Outcome> {
        let _guard = self.inner.locks.acquire(id).await;
        let Some(local) = self.inner.store.read(id).await? else {
            return Ok(Outcome::Unchanged);
        };
        let remote = local.clone();
        self.step(Some(local), remote).await
    }

    /// Persists and publishes a trade changed by a user action.
    ///
    /// Facts stored since the action read its copy are merged in first.
    ///
    /// # Errors
    ///
    /// Derivation, storage and non-network service errors. A network
    /// failure queues the push and still returns the stored trade.
    pub async fn commit(&self, trade: Trade) -> ApplicationResult<Trade> {
        let _guard = self.inner.locks.acquire(trade.id()).await;
        self.commit_locked(trade).await
    }

    /// Runs `action` on the current local copy of `id` and commits the
    /// result, holding the trade's lock throughout.
    ///
    /// The copy handed to `action` has fresh transaction observations, a
    /// derived status and the local role.
    ///
    /// # Errors
    ///
    /// `TradeNotFound` if nothing is stored for `id`; whatever `action`
    /// returns; commit errors as for [`commit`](Self::commit).
    pub async fn with_trade<F, Fut>(&self, id: &TradeId, action: F) -> ApplicationResult<Trade>
    where
        F: FnOnce(Trade) -> Fut,
        Fut: Future<Output = ApplicationResult<Trade>>,
    {
        let _guard = self.inner.locks.acquire(id).await;
        let current = self.current(id).await?;
        let updated = action(current).await?;
        self.commit_locked(updated).await
    }

    /// Current local copy of `id`, refreshed and role-resolved.
    ///
    /// # Errors
    ///
    /// `TradeNotFound` if nothing is stored for `id`; storage, wallet and
    /// derivation errors.
    pub async fn current(&self, id: &TradeId) -> ApplicationResult<Trade> {
        let mut trade = self
            .inner
            .store
            .read(id)
            .await?
            .ok_or_else(|| ApplicationError::TradeNotFound(id.to_string()))?;
        self.inner.context.refresh_transactions(&mut trade).await?;
        trade.update_status()?;
        trade.assign_role(&self.inner.context.profile().pub_key())?;
        Ok(trade)
    }

    async fn commit_locked(&self, mut trade: Trade) -> ApplicationResult<Trade> {
        let previous = self.inner.store.read(trade.id()).await?;
        if let Some(stored) = &previous {
            trade.rebase_onto(stored)?;
        }
        trade.update_status()?;
        self.inner.store.write(&trade).await?;
        info!(
            trade_id = %trade.id(),
            status = ?trade.status(),
            role = ?trade.role(),
            version = trade.version(),
            "trade committed"
        );
        self.publish(TradeEvent::Updated(trade.clone()));
        match self.push(trade.clone()).await {
            Ok(Pushed::Stored(pushed)) => Ok(pushed),
            Ok(Pushed::Deferred) => Ok(trade),
            Err(err) => {
                // A rejected action must not linger in the local copy.
                if let Some(previous) = previous {
                    self.inner.store.write(&previous).await?;
                    warn!(trade_id = %previous.id(), error = %err, "action rejected, local copy restored");
                    self.publish(TradeEvent::Updated(previous));
                }
                Err(err)
            }
        }
    }

    /// Spawns the poll loop and the wallet event consumer.
    #[must_use]
    pub fn start(&self) -> EngineHandle {
        let (shutdown, _) = watch::channel(false);
        let poll = tokio::spawn(self.clone().run_poll_loop(shutdown.subscribe()));
        let wallet_events = self.inner.context.wallet().subscribe();
        let wallet = tokio::spawn(self.clone().run_wallet_loop(wallet_events, shutdown.subscribe()));
        info!(
            poll_interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "reconciliation engine started"
        );
        EngineHandle {
            shutdown,
            tasks: vec![poll, wallet],
        }
    }

    // ========== Internals ==========

    async fn step(&self, stored: Option<Trade>, mut remote: Trade) -> ApplicationResult<Outcome> {
        let ctx = &self.inner.context;
        let (mut local, synthesized) = match &stored {
            Some(trade) => (trade.clone(), false),
            None => (self.synthesize(&remote).await?, true),
        };
        ctx.refresh_transactions(&mut local).await?;
        ctx.refresh_transactions(&mut remote).await?;
        if synthesized {
            local.update_status()?;
        }
        let role = local.assign_role(&ctx.profile().pub_key())?;

        let protocol = TradeProtocol::for_role(role, ctx.clone());
        let mut candidate = match protocol.handle(&local, &remote).await? {
            Some(trade) => trade,
            None if synthesized || remote.version() > local.version() => local.clone(),
            None => return Ok(Outcome::Unchanged),
        };
        // The remote version is only taken once every remote fact is held.
        if !remote.contributes_to(&candidate) {
            candidate.set_version(local.version().max(remote.version()));
        }
        candidate.update_status()?;

        if stored.as_ref().is_some_and(|s| s.same_snapshot(&candidate)) {
            if !candidate.contributes_to(&remote) {
                return Ok(Outcome::Unchanged);
            }
        } else {
            self.inner.store.write(&candidate).await?;
            debug!(
                trade_id = %candidate.id(),
                status = ?candidate.status(),
                %role,
                version = candidate.version(),
                "trade stored"
            );
            self.publish(TradeEvent::Updated(candidate.clone()));
        }

        if !candidate.contributes_to(&remote) {
            return Ok(Outcome::Stored);
        }
        match self.push(candidate).await? {
            Pushed::Stored(_) => Ok(Outcome::Pushed),
            Pushed::Deferred => Ok(Outcome::Deferred),
        }
    }

    /// Local copy of a trade first seen remotely.
    async fn synthesize(&self, remote: &Trade) -> ApplicationResult<Trade> {
        remote.verify_id()?;
        if let Some(address) = remote.escrow_address() {
            self.inner
                .context
                .wallet()
                .watch_escrow_address(address)
                .await?;
        }
        info!(trade_id = %remote.id(), version = remote.version(), "new trade observed");
        Ok(TradeRecord::from(remote).into_trade())
    }

    /// Publishes `trade`, rebasing onto the latest record after conflicts.
    async fn push(&self, mut trade: Trade) -> ApplicationResult<Pushed> {
        let inner = &self.inner;
        let mut conflicts = 0u32;
        loop {
            let record = TradeRecord::from(&trade);
            let result = execute_with_retry(&inner.config.push_retry, "push trade", || {
                inner.service.put(record.clone())
            })
            .await;

            match result {
                Ok(stored) => return self.pushed(trade, stored.version, conflicts > 0).await,
                Err(ServiceError::Conflict {
                    id,
                    submitted,
                    current,
                }) => {
                    if conflicts >= inner.config.max_conflict_retries {
                        return Err(ApplicationError::RemoteWriteConflict {
                            id,
                            submitted,
                            current,
                        });
                    }
                    conflicts += 1;
                    warn!(trade_id = %id, submitted, current, attempt = conflicts, "write conflict, rebasing");
                    let latest = match inner.service.fetch(trade.id()).await {
                        Ok(latest) => latest,
                        Err(ServiceError::Network(msg)) => return Ok(self.defer(&trade, &msg).await),
                        Err(other) => return Err(other.into()),
                    };
                    let Some(latest) = latest else {
                        trade.set_version(0);
                        continue;
                    };
                    let latest = latest.into_trade();
                    trade.rebase_onto(&latest)?;
                    trade.update_status()?;
                    if !trade.contributes_to(&latest) {
                        return self.pushed(trade, latest.version(), true).await;
                    }
                }
                Err(ServiceError::Network(msg)) => return Ok(self.defer(&trade, &msg).await),
                Err(other) => return Err(other.into()),
            }
        }
    }

    async fn pushed(&self, mut trade: Trade, version: u64, rebased: bool) -> ApplicationResult<Pushed> {
        trade.set_version(version);
        self.inner.store.write(&trade).await?;
        self.mark_applied(trade.id(), version).await;
        self.inner.pending.lock().await.remove(trade.id());
        info!(
            trade_id = %trade.id(),
            status = ?trade.status(),
            version,
            rebased,
            "trade published"
        );
        if rebased {
            self.publish(TradeEvent::Updated(trade.clone()));
        }
        Ok(Pushed::Stored(trade))
    }

    async fn defer(&self, trade: &Trade, reason: &str) -> Pushed {
        warn!(trade_id = %trade.id(), %reason, "trade service unreachable, push queued");
        self.inner.pending.lock().await.insert(trade.id().clone());
        Pushed::Deferred
    }

    /// Retries queued pushes, returning how many went through.
    async fn flush_pending(&self) -> usize {
        let ids = self.pending_pushes().await;
        let mut flushed = 0;
        for id in ids {
            let _guard = self.inner.locks.acquire(&id).await;
            let result = match self.inner.store.read(&id).await {
                Ok(Some(trade)) => self.push(trade).await,
                Ok(None) => {
                    self.inner.pending.lock().await.remove(&id);
                    continue;
                }
                Err(err) => Err(err.into()),
            };
            match result {
                Ok(Pushed::Stored(_)) => flushed += 1,
                Ok(Pushed::Deferred) => break,
                Err(err) => {
                    log_failure(&id, &err);
                    self.inner.pending.lock().await.remove(&id);
                }
            }
        }
        flushed
    }

    async fn on_wallet_event(&self, event: WalletEvent) {
        let trades = match self.inner.store.all().await {
            Ok(trades) => trades,
            Err(err) => {
                error!(error = %err, "cannot scan trades for wallet event");
                return;
            }
        };
        for trade in trades
            .iter()
            .filter(|t| t.escrow_address() == Some(event.escrow_address.as_str()))
        {
            debug!(
                trade_id = %trade.id(),
                tx_hash = event.transaction.tx_hash(),
                depth = event.transaction.depth(),
                "escrow transaction observed"
            );
            if let Err(err) = self.reconcile_local(trade.id()).await {
                log_failure(trade.id(), &err);
            }
        }
    }

    async fn run_poll_loop(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.inner.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let profile = self.inner.context.profile().pub_key();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let pass = self.poll_once().instrument(info_span!("poll", %profile));
                    match pass.await {
                        Ok(_) => {}
                        Err(ApplicationError::NetworkFailure(msg)) => {
                            warn!(
                                error = %msg,
                                delay_secs = self.inner.config.network_retry_delay.as_secs(),
                                "trade service unreachable, backing off"
                            );
                            tokio::select! {
                                _ = shutdown.changed() => break,
                                () = sleep(self.inner.config.network_retry_delay) => {}
                            }
                        }
                        Err(err) => error!(error = %err, error_code = err.code(), "poll pass failed"),
                    }
                }
            }
        }
        info!("poll loop stopped");
    }

    async fn run_wallet_loop(
        self,
        mut events: broadcast::Receiver<WalletEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Ok(event) => self.on_wallet_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "wallet events dropped, next poll catches up");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("wallet event loop stopped");
    }

    fn publish(&self, event: TradeEvent) {
        // Nobody listening is fine.
        let _ = self.inner.events.send(event);
    }

    async fn applied_version(&self, id: &TradeId) -> u64 {
        self.inner.applied.lock().await.get(id).copied().unwrap_or(0)
    }

    async fn mark_applied(&self, id: &TradeId, version: u64) {
        let mut applied = self.inner.applied.lock().await;
        let entry = applied.entry(id.clone()).or_insert(0);
        *entry = (*entry).max(version);
    }
}

fn log_failure(id: &TradeId, err: &ApplicationError) {
    if err.is_invalid_trade_state() {
        error!(trade_id = %id, error_code = err.code(), error = %err, "invalid trade state, skipped");
    } else {
        warn!(trade_id = %id, error_code = err.code(), error = %err, "trade skipped this pass");
    }
}

/// Running engine tasks.
#[derive(Debug)]
pub struct EngineHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Signals both tasks to stop and waits for them. A pass already in
    /// flight completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                error!(error = %err, "engine task failed");
            }
        }
        info!("reconciliation engine stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::protocol::{BuyerProtocol, SellerProtocol};
    use crate::domain::entities::test_support::*;
    use crate::domain::value_objects::{ArbitrationReason, CurrencyCode, PaymentMethod, Role, TradeStatus};
    use crate::infrastructure::persistence::InMemoryTradeStore;
    use crate::infrastructure::profile::StaticProfile;
    use crate::infrastructure::trade_service::InMemoryTradeService;
    use crate::infrastructure::wallet::{SimulatedChain, SimulatedWallet};

    struct Node {
        engine: ReconciliationEngine,
        store: InMemoryTradeStore,
        wallet: Arc<SimulatedWallet>,
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(10),
            network_retry_delay: Duration::from_millis(10),
            push_retry: RetryPolicy::no_retry(),
            ..EngineConfig::default()
        }
    }

    fn node(chain: &SimulatedChain, service: &InMemoryTradeService, profile: &str, escrow: &str) -> Node {
        let wallet = Arc::new(SimulatedWallet::new(chain.clone(), escrow));
        let profile = StaticProfile::new(profile).with_payment_details(
            CurrencyCode::Usd,
            PaymentMethod::Zelle,
            "zelle: seller@example.com",
        );
        let store = InMemoryTradeStore::new();
        let engine = ReconciliationEngine::new(
            ProtocolContext::new(wallet.clone(), Arc::new(profile)),
            Arc::new(service.clone()),
            Arc::new(store.clone()),
            test_config(),
        );
        Node {
            engine,
            store,
            wallet,
        }
    }

    struct Net {
        chain: SimulatedChain,
        service: InMemoryTradeService,
        buyer: Node,
        seller: Node,
    }

    async fn net() -> Net {
        let chain = SimulatedChain::new();
        let service = InMemoryTradeService::new();
        let buyer = node(&chain, &service, BUYER_PROFILE, BUYER_ESCROW);
        let seller = node(&chain, &service, SELLER_PROFILE, SELLER_ESCROW);
        chain.credit(seller.wallet.address(), btc("2")).await;
        Net {
            chain,
            service,
            buyer,
            seller,
        }
    }

    async fn buyer_creates(net: &Net) -> Trade {
        let created = BuyerProtocol::new(net.buyer.engine.context().clone())
            .create_trade(&sell_offer(), btc("0.5"))
            .await
            .unwrap();
        net.buyer.engine.commit(created).await.unwrap()
    }

    mod commit {
        use super::*;

        #[tokio::test]
        async fn stores_and_publishes() {
            let net = net().await;
            let mut events = net.buyer.engine.subscribe();
            let trade = buyer_creates(&net).await;

            assert_eq!(trade.version(), 1);
            assert_eq!(net.service.record(trade.id()).await.unwrap().version, 1);
            assert_eq!(net.buyer.store.read(trade.id()).await.unwrap().unwrap().version(), 1);
            let event = events.recv().await.unwrap();
            assert_eq!(event.trade_id(), trade.id());
            assert_eq!(event.status(), Some(TradeStatus::Created));
        }

        #[tokio::test]
        async fn offline_push_is_queued_then_flushed() {
            let net = net().await;
            net.service.set_offline(true);
            let trade = buyer_creates(&net).await;
            assert_eq!(trade.version(), 0);
            assert_eq!(net.buyer.engine.pending_pushes().await, vec![trade.id().clone()]);

            net.service.set_offline(false);
            let summary = net.buyer.engine.poll_once().await.unwrap();
            assert_eq!(summary.flushed, 1);
            assert!(net.buyer.engine.pending_pushes().await.is_empty());
            assert_eq!(net.service.record(trade.id()).await.unwrap().version, 1);
        }

        #[tokio::test]
        async fn conflicting_push_rebases_onto_latest() {
            let net = net().await;
            let trade = buyer_creates(&net).await;

            // Seller accepts behind the buyer's back.
            let mut record = net.service.record(trade.id()).await.unwrap();
            record.trade_acceptance = Some(acceptance());
            net.service.put(record).await.unwrap();

            let mut local = net.buyer.store.read(trade.id()).await.unwrap().unwrap();
            local.assign_role(BUYER_PROFILE).unwrap();
            let canceled = BuyerProtocol::new(net.buyer.engine.context().clone())
                .cancel_unfunded(&local)
                .unwrap();
            let committed = net.buyer.engine.commit(canceled).await.unwrap();

            let remote = net.service.record(trade.id()).await.unwrap();
            assert_eq!(remote.version, 3);
            assert!(remote.trade_acceptance.is_some());
            assert!(remote.cancel_completed.is_some());
            assert_eq!(committed.status(), Some(TradeStatus::Canceled));
        }
    }

    mod polling {
        use super::*;

        #[tokio::test]
        async fn seller_synthesizes_accepts_and_funds() {
            let net = net().await;
            let trade = buyer_creates(&net).await;

            let summary = net.seller.engine.poll_once().await.unwrap();
            assert_eq!(summary.fetched, 1);
            assert_eq!(summary.updated, 1);

            let local = net.seller.store.read(trade.id()).await.unwrap().unwrap();
            assert_eq!(local.status(), Some(TradeStatus::Funding));
            let remote = net.service.record(trade.id()).await.unwrap();
            assert_eq!(remote.version, 2);
            assert!(remote.payment_request.is_some());
            assert_eq!(local.version(), 2);
        }

        #[tokio::test]
        async fn repeated_poll_is_quiet() {
            let net = net().await;
            buyer_creates(&net).await;
            net.seller.engine.poll_once().await.unwrap();
            let puts = net.service.accepted_puts();

            let summary = net.seller.engine.poll_once().await.unwrap();
            assert_eq!(summary.updated, 0);
            assert_eq!(net.service.accepted_puts(), puts);
            assert_eq!(net.chain.balance(net.seller.wallet.address()).await, btc("1.5"));
        }

        #[tokio::test]
        async fn unadopted_facts_hold_back_local_version() {
            let net = net().await;
            let trade = buyer_creates(&net).await;
            net.seller.engine.poll_once().await.unwrap();
            net.buyer.engine.poll_once().await.unwrap();

            let current = net.buyer.engine.current(trade.id()).await.unwrap();
            let disputed = TradeProtocol::for_role(Role::Buyer, net.buyer.engine.context().clone())
                .request_arbitrate(&current)
                .unwrap();
            net.buyer.engine.commit(disputed).await.unwrap();

            // Still FUNDING, so the seller does not adopt the dispute yet.
            let summary = net.seller.engine.poll_once().await.unwrap();
            assert_eq!(summary.updated, 0);
            let local = net.seller.store.read(trade.id()).await.unwrap().unwrap();
            assert_eq!(local.version(), 2);
            assert!(local.arbitrate_request().is_none());

            let current = net.seller.engine.current(trade.id()).await.unwrap();
            let own = TradeProtocol::for_role(Role::Seller, net.seller.engine.context().clone())
                .request_arbitrate(&current)
                .unwrap();
            assert!(net.seller.engine.commit(own).await.is_err());

            let remote = net.service.record(trade.id()).await.unwrap();
            assert_eq!(remote.version, 3);
            assert_eq!(remote.arbitrate_request.unwrap().reason, ArbitrationReason::NoBtc);
            let local = net.seller.store.read(trade.id()).await.unwrap().unwrap();
            assert!(local.arbitrate_request().is_none());

            net.chain.mine_block().await;
            net.seller.engine.poll_once().await.unwrap();
            net.seller.engine.poll_once().await.unwrap();
            let local = net.seller.store.read(trade.id()).await.unwrap().unwrap();
            assert_eq!(local.version(), 3);
            assert_eq!(local.status(), Some(TradeStatus::Arbitrating));
            assert_eq!(local.arbitrate_request().unwrap().reason, ArbitrationReason::NoBtc);
        }

        #[tokio::test]
        async fn older_record_is_stale() {
            let net = net().await;
            let trade = buyer_creates(&net).await;
            net.seller.engine.poll_once().await.unwrap();

            let mut old = TradeRecord::from(&trade);
            old.version = 1;
            let outcome = net.seller.engine.reconcile_record(old).await.unwrap();
            assert_eq!(outcome, Outcome::Stale);
        }

        #[tokio::test]
        async fn offline_fetch_is_network_failure() {
            let net = net().await;
            net.service.set_offline(true);
            let err = net.buyer.engine.poll_once().await.unwrap_err();
            assert!(matches!(err, ApplicationError::NetworkFailure(_)));
        }

        #[tokio::test]
        async fn tampered_record_skipped_others_continue() {
            let net = net().await;
            let good = buyer_creates(&net).await;

            let mut forged = TradeRecord::from(&buy_trade());
            forged.id = crate::domain::value_objects::TradeId::from_terms(&["forged"]);
            net.service.put(forged.clone()).await.unwrap();

            let summary = net.seller.engine.poll_once().await.unwrap();
            assert_eq!(summary.failed, 1);
            assert_eq!(summary.updated, 1);
            assert!(net.seller.store.read(&forged.id).await.unwrap().is_none());
            assert!(net.seller.store.read(good.id()).await.unwrap().is_some());
        }
    }

    mod wallet_events {
        use super::*;

        #[tokio::test]
        async fn confirmation_promotes_funding() {
            let net = net().await;
            let trade = buyer_creates(&net).await;
            net.seller.engine.poll_once().await.unwrap();
            net.chain.mine_block().await;

            let outcome = net.seller.engine.reconcile_local(trade.id()).await.unwrap();
            assert_eq!(outcome, Outcome::Stored);
            let local = net.seller.store.read(trade.id()).await.unwrap().unwrap();
            assert_eq!(local.status(), Some(TradeStatus::Funded));
        }

        #[tokio::test]
        async fn running_engine_reacts_to_blocks() {
            let net = net().await;
            let trade = buyer_creates(&net).await;
            net.seller.engine.poll_once().await.unwrap();

            let mut events = net.seller.engine.subscribe();
            let handle = net.seller.engine.start();
            net.chain.mine_block().await;
            let funded = tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    let event = events.recv().await.unwrap();
                    if event.status() == Some(TradeStatus::Funded) {
                        return event;
                    }
                }
            })
            .await
            .unwrap();
            assert_eq!(funded.trade_id(), trade.id());
            handle.shutdown().await;
        }
    }

    mod startup {
        use super::*;

        #[tokio::test]
        async fn load_emits_loaded_with_fresh_status() {
            let net = net().await;
            let trade = buyer_creates(&net).await;
            net.seller.engine.poll_once().await.unwrap();
            net.chain.mine_block().await;

            let mut events = net.seller.engine.subscribe();
            let loaded = net.seller.engine.load().await.unwrap();
            assert_eq!(loaded.len(), 1);
            assert_eq!(loaded[0].status(), Some(TradeStatus::Funded));
            assert!(loaded[0].funding_transaction().is_some());
            let event = events.recv().await.unwrap();
            assert!(matches!(event, TradeEvent::Loaded(_)));
            assert_eq!(event.trade_id(), trade.id());
        }
    }

    #[tokio::test]
    async fn shutdown_stops_tasks() {
        let net = net().await;
        let handle = net.buyer.engine.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn maker_buyer_accepts_seller_created_trade() {
        let net = net().await;
        let created = SellerProtocol::new(net.seller.engine.context().clone())
            .create_trade(&buy_offer(), btc("0.5"))
            .await
            .unwrap();
        let created = net.seller.engine.commit(created).await.unwrap();
        net.buyer.engine.poll_once().await.unwrap();
        let local = net.buyer.store.read(created.id()).await.unwrap().unwrap();
        assert!(local.trade_acceptance().is_some());
        assert_eq!(local.status(), Some(TradeStatus::Accepted));
    }
}
