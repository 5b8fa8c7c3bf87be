use crate::domain::ledger::{Conversion, LedgerAccount, Source};
use crate::domain::money::{Amount, Balance};
use crate::domain::policy::ConversionPolicy;
use crate::domain::ports::{ClockRef, Ledger, SessionGuard, SessionMutator, SessionStore};
use crate::domain::session::Session;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

type SessionCell = Arc<Mutex<Session>>;

/// A TTL-bound in-memory session registry.
///
/// The outer `RwLock` only guards the id → cell map and is never held
/// across a session lock wait. Each session sits behind its own `Mutex`,
/// so exchanges for one id run one at a time while different ids proceed
/// in parallel.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionCell>>>,
    clock: ClockRef,
    timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new(clock: ClockRef, timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock,
            timeout,
        }
    }

    /// The cell registered for `session_id`, replacing it with a fresh
    /// session when it is missing, closed or idle past the timeout.
    async fn live_cell(&self, session_id: &str, now: DateTime<Utc>) -> SessionCell {
        let mut sessions = self.sessions.write().await;
        let existing = sessions
            .get(session_id)
            .filter(|cell| match cell.try_lock() {
                Ok(session) => !session.closed && !session.is_expired(now, self.timeout),
                // Busy with another exchange, so not idle.
                Err(_) => true,
            })
            .cloned();

        match existing {
            Some(cell) => cell,
            None => {
                let cell = Arc::new(Mutex::new(Session::new(session_id, now)));
                if sessions.insert(session_id.to_string(), cell.clone()).is_some() {
                    tracing::debug!(session_id, "Replaced expired session");
                } else {
                    tracing::debug!(session_id, "Created session");
                }
                cell
            }
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Result<SessionGuard> {
        loop {
            let cell = self.live_cell(session_id, self.clock.now()).await;
            let mut session = cell.lock_owned().await;
            // Torn down while we queued behind another exchange.
            if session.closed {
                continue;
            }
            session.touch(self.clock.now());
            return Ok(session);
        }
    }

    async fn update(&self, session_id: &str, mutator: SessionMutator) -> Result<bool> {
        let cell = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        };
        let Some(cell) = cell else {
            return Ok(false);
        };

        let mut session = cell.lock().await;
        let now = self.clock.now();
        if session.closed {
            return Ok(false);
        }
        // Expired but not yet swept: treat as gone.
        if session.is_expired(now, self.timeout) {
            session.closed = true;
            return Ok(false);
        }
        mutator(&mut *session);
        session.touch(now);
        Ok(true)
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let removed = self.sessions.write().await.remove(session_id);
        Ok(match removed {
            Some(cell) => {
                if let Ok(mut session) = cell.try_lock() {
                    session.closed = true;
                }
                true
            }
            None => false,
        })
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        // Check expiry on a snapshot so the map lock is only held briefly.
        let snapshot: Vec<(String, SessionCell)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .map(|(id, cell)| (id.clone(), cell.clone()))
                .collect()
        };

        let mut expired = Vec::new();
        for (id, cell) in snapshot {
            let idle = match cell.try_lock() {
                Ok(mut session) if session.is_expired(now, self.timeout) => {
                    session.closed = true;
                    true
                }
                _ => false,
            };
            if idle {
                expired.push((id, cell));
            }
        }

        if expired.is_empty() {
            return Ok(0);
        }

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for (id, cell) in expired {
            if sessions
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                sessions.remove(&id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// A thread-safe in-memory ledger keyed by caller id.
///
/// Every mutation runs under one write lock, so a conversion's debit and
/// credit are observed together or not at all.
#[derive(Clone)]
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<String, LedgerAccount>>>,
    clock: ClockRef,
}

impl InMemoryLedger {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Builds a ledger pre-loaded with `balances` per caller.
    pub fn with_balances<I>(clock: ClockRef, balances: I) -> Self
    where
        I: IntoIterator<Item = (String, BTreeMap<Source, Balance>)>,
    {
        let now = clock.now();
        let accounts = balances
            .into_iter()
            .map(|(caller, sources)| {
                let mut account = LedgerAccount::new(caller.clone());
                for (source, balance) in sources {
                    account.set_balance(source, balance, now);
                }
                (caller, account)
            })
            .collect();
        Self {
            accounts: Arc::new(RwLock::new(accounts)),
            clock,
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn balance(&self, caller: &str, source: Source) -> Result<Balance> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(caller)
            .map(|account| account.balance(source))
            .unwrap_or(Balance::ZERO))
    }

    async fn credit(&self, caller: &str, source: Source, amount: Amount) -> Result<Balance> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .entry(caller.to_string())
            .or_insert_with(|| LedgerAccount::new(caller));
        Ok(account.credit(source, amount, self.clock.now()))
    }

    async fn debit(&self, caller: &str, source: Source, amount: Amount) -> Result<Balance> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(caller) {
            Some(account) => Ok(account.debit(source, amount, self.clock.now())?),
            None => Ok(LedgerAccount::new(caller).debit(source, amount, self.clock.now())?),
        }
    }

    async fn debit_all(
        &self,
        caller: &str,
        totals: &BTreeMap<Source, Decimal>,
    ) -> Result<BTreeMap<Source, Balance>> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(caller) {
            Some(account) => Ok(account.debit_all(totals, self.clock.now())?),
            None => Ok(LedgerAccount::new(caller).debit_all(totals, self.clock.now())?),
        }
    }

    async fn convert(
        &self,
        caller: &str,
        from: Source,
        to: Source,
        amount: Amount,
        policy: &ConversionPolicy,
    ) -> Result<Conversion> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(caller) {
            Some(account) => Ok(account.convert(from, to, amount, policy, self.clock.now())?),
            None => Ok(LedgerAccount::new(caller).convert(
                from,
                to,
                amount,
                policy,
                self.clock.now(),
            )?),
        }
    }

    async fn account(&self, caller: &str) -> Result<Option<LedgerAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(caller).cloned())
    }
}
