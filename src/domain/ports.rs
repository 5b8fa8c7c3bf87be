use super::ledger::{Conversion, LedgerAccount, Source};
use super::money::{Amount, Balance};
use super::policy::ConversionPolicy;
use super::session::Session;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Exclusive access to one session for the length of an exchange.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// A mutation applied to a stored session.
pub type SessionMutator = Box<dyn FnOnce(&mut Session) + Send>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the live session for `session_id`, creating a fresh one when
    /// it is absent, expired or already closed. The guard serialises
    /// exchanges on the same id.
    async fn get_or_create(&self, session_id: &str) -> Result<SessionGuard>;
    /// Applies `mutator` to a live session. Returns `false` if there is none.
    async fn update(&self, session_id: &str, mutator: SessionMutator) -> Result<bool>;
    async fn delete(&self, session_id: &str) -> Result<bool>;
    /// Removes every session idle for longer than the timeout at `now`.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize>;
    async fn active_count(&self) -> usize;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, caller: &str, source: Source) -> Result<Balance>;
    async fn credit(&self, caller: &str, source: Source, amount: Amount) -> Result<Balance>;
    async fn debit(&self, caller: &str, source: Source, amount: Amount) -> Result<Balance>;
    /// Debits every source total or none of them.
    async fn debit_all(
        &self,
        caller: &str,
        totals: &BTreeMap<Source, Decimal>,
    ) -> Result<BTreeMap<Source, Balance>>;
    async fn convert(
        &self,
        caller: &str,
        from: Source,
        to: Source,
        amount: Amount,
        policy: &ConversionPolicy,
    ) -> Result<Conversion>;
    async fn account(&self, caller: &str) -> Result<Option<LedgerAccount>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SessionStoreRef = Arc<dyn SessionStore>;
pub type LedgerRef = Arc<dyn Ledger>;
pub type ClockRef = Arc<dyn Clock>;
