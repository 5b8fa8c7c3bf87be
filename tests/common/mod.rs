#![allow(dead_code)]

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use ussd_market::application::engine::DialogEngine;
use ussd_market::domain::gateway::{INPUT_DELIMITER, Reply, UssdRequest};
use ussd_market::domain::ledger::Source;
use ussd_market::domain::money::Balance;
use ussd_market::domain::policy::DialogPolicy;
use ussd_market::domain::ports::{Ledger, LedgerRef, SessionStore};
use ussd_market::domain::session::Session;
use ussd_market::infrastructure::clock::ManualClock;
use ussd_market::infrastructure::in_memory::InMemorySessionStore;
use ussd_market::infrastructure::marketplace::Marketplace;

pub const CALLER: &str = "1234567890";
pub const PASSWORD: &str = "123";
pub const PHONE: &str = "0821234567";
pub const TIMEOUT: Duration = Duration::from_secs(180);

/// An engine over the bundled marketplace with a clock the test controls.
pub struct Harness {
    pub engine: DialogEngine,
    pub clock: Arc<ManualClock>,
    pub sessions: Arc<InMemorySessionStore>,
    pub ledger: LedgerRef,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(DialogPolicy::default(), None, None)
    }

    pub fn with_policy(policy: DialogPolicy) -> Self {
        Self::build(policy, None, None)
    }

    /// Replaces the opening balances of [`CALLER`]; unlisted sources are zero.
    pub fn with_balances(balances: &[(Source, Decimal)]) -> Self {
        let balances = balances
            .iter()
            .map(|(source, amount)| (*source, Balance(*amount)))
            .collect();
        Self::build(DialogPolicy::default(), Some(balances), None)
    }

    /// Uses `wrap` to put a custom ledger in front of the seeded one.
    pub fn with_ledger(wrap: impl FnOnce(LedgerRef) -> LedgerRef + 'static) -> Self {
        Self::build(DialogPolicy::default(), None, Some(Box::new(wrap)))
    }

    fn build(
        policy: DialogPolicy,
        balances: Option<BTreeMap<Source, Balance>>,
        wrap: Option<Box<dyn FnOnce(LedgerRef) -> LedgerRef>>,
    ) -> Self {
        let clock = Arc::new(ManualClock::default());
        let mut marketplace = Marketplace::bundled().unwrap();
        if let Some(balances) = balances {
            marketplace.balances.insert(CALLER.to_string(), balances);
        }
        let sessions = Arc::new(InMemorySessionStore::new(clock.clone(), TIMEOUT));
        let mut ledger: LedgerRef = Arc::new(marketplace.ledger(clock.clone()));
        if let Some(wrap) = wrap {
            ledger = wrap(ledger);
        }
        let engine = DialogEngine::new(
            sessions.clone(),
            ledger.clone(),
            Arc::new(marketplace.catalog),
            Arc::new(marketplace.directory),
            clock.clone(),
            policy,
        );
        Self {
            engine,
            clock,
            sessions,
            ledger,
        }
    }

    pub fn conversation(&self, session_id: &str) -> Conversation<'_> {
        Conversation {
            engine: &self.engine,
            session_id: session_id.to_string(),
            inputs: Vec::new(),
        }
    }

    /// A copy of the live session. Creates a fresh one if it is gone.
    pub async fn session(&self, session_id: &str) -> Session {
        self.sessions.get_or_create(session_id).await.unwrap().clone()
    }

    pub async fn balance(&self, source: Source) -> Decimal {
        self.ledger.balance(CALLER, source).await.unwrap().value()
    }
}

/// Replays a caller's key presses the way the gateway does, sending the
/// whole input path on every exchange.
pub struct Conversation<'a> {
    engine: &'a DialogEngine,
    session_id: String,
    inputs: Vec<String>,
}

impl Conversation<'_> {
    pub async fn dial(&mut self) -> Reply {
        self.inputs.clear();
        self.exchange(String::new()).await
    }

    pub async fn send(&mut self, input: &str) -> Reply {
        self.inputs.push(input.to_string());
        let separator = INPUT_DELIMITER.to_string();
        let text = self.inputs.join(separator.as_str());
        self.exchange(text).await
    }

    async fn exchange(&self, text: String) -> Reply {
        self.engine
            .handle(&UssdRequest::new(&self.session_id, PHONE, &text))
            .await
    }

    pub async fn login(&mut self) -> Reply {
        self.login_as(CALLER, PASSWORD).await
    }

    pub async fn login_as(&mut self, caller: &str, password: &str) -> Reply {
        self.dial().await;
        self.send("1").await;
        self.send(caller).await;
        self.send(password).await
    }

    /// Picks a product from the store menu and enters a quantity.
    pub async fn add(&mut self, store: u32, department: u32, product: u32, quantity: u32) -> Reply {
        self.send(&store.to_string()).await;
        self.send(&department.to_string()).await;
        self.send(&product.to_string()).await;
        self.send(&quantity.to_string()).await
    }
}
