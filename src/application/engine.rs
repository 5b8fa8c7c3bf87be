use super::transitions::successors;
use crate::domain::catalog::Catalog;
use crate::domain::directory::Directory;
use crate::domain::gateway::{Reply, UssdRequest};
use crate::domain::policy::DialogPolicy;
use crate::domain::ports::{ClockRef, LedgerRef, SessionStoreRef};
use crate::domain::session::{DialogState, Session};
use crate::error::{Result, UssdError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

const MISSING_SESSION: &str = "Service unavailable. Please try again.";
const SERVICE_FAILURE: &str = "Service temporarily unavailable.";

/// The main entry point for driving USSD conversations.
///
/// `DialogEngine` turns one gateway exchange into one reply. It holds the
/// session for the whole exchange, so exchanges on the same session id run
/// one after another while different sessions proceed concurrently.
pub struct DialogEngine {
    pub(super) sessions: SessionStoreRef,
    pub(super) ledger: LedgerRef,
    pub(super) catalog: Arc<Catalog>,
    pub(super) directory: Arc<Directory>,
    pub(super) clock: ClockRef,
    pub(super) policy: DialogPolicy,
}

impl DialogEngine {
    /// Creates a new `DialogEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `sessions` - Where conversations live between exchanges.
    /// * `ledger` - Balances debited at checkout and moved by conversions.
    /// * `catalog` - Stores, departments and products offered in menus.
    /// * `directory` - Caller credentials and fulfilment addresses.
    /// * `clock` - Time source for activity stamps and order numbers.
    /// * `policy` - Branding, bounds and payment sources.
    pub fn new(
        sessions: SessionStoreRef,
        ledger: LedgerRef,
        catalog: Arc<Catalog>,
        directory: Arc<Directory>,
        clock: ClockRef,
        policy: DialogPolicy,
    ) -> Self {
        Self {
            sessions,
            ledger,
            catalog,
            directory,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &DialogPolicy {
        &self.policy
    }

    pub fn sessions(&self) -> &SessionStoreRef {
        &self.sessions
    }

    pub fn ledger(&self) -> &LedgerRef {
        &self.ledger
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.active_count().await
    }

    /// Answers one gateway exchange.
    ///
    /// Always returns a reply. Faults inside the exchange, panics included,
    /// tear the session down and produce a generic terminal message.
    pub async fn handle(&self, request: &UssdRequest) -> Reply {
        let Some(session_id) = request.session_id() else {
            tracing::warn!("Rejected exchange without a session id");
            return Reply::end(MISSING_SESSION);
        };

        match AssertUnwindSafe(self.exchange(session_id, request))
            .catch_unwind()
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(session_id, error = %e, "Exchange failed");
                Reply::end(SERVICE_FAILURE)
            }
            Err(_) => {
                tracing::error!(session_id, "Exchange panicked");
                self.discard(session_id).await;
                Reply::end(SERVICE_FAILURE)
            }
        }
    }

    /// Runs the handler for the session's state on a working copy, and
    /// only writes the copy back once the handler has succeeded.
    async fn exchange(&self, session_id: &str, request: &UssdRequest) -> Result<Reply> {
        let mut guard = self.sessions.get_or_create(session_id).await?;
        let mut session = guard.clone();

        let from = session.state;
        let outcome = self
            .dispatch(&mut session, request.current_input())
            .await
            .and_then(|reply| check_transition(from, &session, reply));

        match outcome {
            Ok(reply) if !reply.is_end() => {
                session.touch(self.clock.now());
                tracing::debug!(session_id, %from, to = %session.state, "Exchange handled");
                *guard = session;
                Ok(reply)
            }
            Ok(reply) => {
                guard.closed = true;
                self.sessions.delete(session_id).await?;
                tracing::info!(
                    session_id,
                    phone = request.phone_number().unwrap_or_default(),
                    %from,
                    "Session ended"
                );
                Ok(reply)
            }
            Err(e) => {
                guard.closed = true;
                self.sessions.delete(session_id).await?;
                Err(e)
            }
        }
    }

    async fn dispatch(&self, session: &mut Session, input: &str) -> Result<Reply> {
        match session.state {
            DialogState::Welcome => self.on_welcome(session, input).await,
            DialogState::CredentialId | DialogState::BalanceId => {
                self.on_credential_id(session, input).await
            }
            DialogState::CredentialPassword => self.on_credential_password(session, input).await,
            DialogState::BalancePassword => self.on_balance_password(session, input).await,
            DialogState::SelectStore => self.on_select_store(session, input).await,
            DialogState::SelectDepartment => self.on_select_department(session, input).await,
            DialogState::SelectProduct => self.on_select_product(session, input).await,
            DialogState::EnterQuantity => self.on_enter_quantity(session, input).await,
            DialogState::SelectPaymentSource => self.on_select_payment_source(session, input).await,
            DialogState::CartMenu => self.on_cart_menu(session, input).await,
            DialogState::RemoveItem => self.on_remove_item(session, input).await,
            DialogState::CheckoutConfirm => self.on_checkout_confirm(session, input).await,
            DialogState::DeliveryOrPickup => self.on_delivery_or_pickup(session, input).await,
            DialogState::FinalConfirm => self.on_final_confirm(session, input).await,
            DialogState::ConversionAmount => self.on_conversion_amount(session, input).await,
            DialogState::ConversionConfirm => self.on_conversion_confirm(session, input).await,
        }
    }

    /// Drops a session whose exchange unwound without cleaning up.
    async fn discard(&self, session_id: &str) {
        let closed = self
            .sessions
            .update(session_id, Box::new(|session: &mut Session| session.closed = true))
            .await;
        let deleted = self.sessions.delete(session_id).await;
        if let Err(e) = closed.and(deleted) {
            tracing::warn!(session_id, error = %e, "Failed to discard session");
        }
    }
}

fn check_transition(from: DialogState, session: &Session, reply: Reply) -> Result<Reply> {
    if reply.is_end() || successors(from).contains(&session.state) {
        Ok(reply)
    } else {
        Err(UssdError::DialogError(format!(
            "undeclared transition from {from} to {}",
            session.state
        )))
    }
}
