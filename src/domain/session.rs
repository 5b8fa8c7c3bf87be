use super::cart::Cart;
use super::ledger::Source;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Every step a conversation can be waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    Welcome,
    CredentialId,
    CredentialPassword,
    BalanceId,
    BalancePassword,
    SelectStore,
    SelectDepartment,
    SelectProduct,
    EnterQuantity,
    SelectPaymentSource,
    CartMenu,
    RemoveItem,
    CheckoutConfirm,
    DeliveryOrPickup,
    FinalConfirm,
    ConversionAmount,
    ConversionConfirm,
}

impl DialogState {
    pub const ALL: [DialogState; 17] = [
        DialogState::Welcome,
        DialogState::CredentialId,
        DialogState::CredentialPassword,
        DialogState::BalanceId,
        DialogState::BalancePassword,
        DialogState::SelectStore,
        DialogState::SelectDepartment,
        DialogState::SelectProduct,
        DialogState::EnterQuantity,
        DialogState::SelectPaymentSource,
        DialogState::CartMenu,
        DialogState::RemoveItem,
        DialogState::CheckoutConfirm,
        DialogState::DeliveryOrPickup,
        DialogState::FinalConfirm,
        DialogState::ConversionAmount,
        DialogState::ConversionConfirm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DialogState::Welcome => "welcome",
            DialogState::CredentialId => "credential_id",
            DialogState::CredentialPassword => "credential_password",
            DialogState::BalanceId => "balance_id",
            DialogState::BalancePassword => "balance_password",
            DialogState::SelectStore => "select_store",
            DialogState::SelectDepartment => "select_department",
            DialogState::SelectProduct => "select_product",
            DialogState::EnterQuantity => "enter_quantity",
            DialogState::SelectPaymentSource => "select_payment_source",
            DialogState::CartMenu => "cart_menu",
            DialogState::RemoveItem => "remove_item",
            DialogState::CheckoutConfirm => "checkout_confirm",
            DialogState::DeliveryOrPickup => "delivery_or_pickup",
            DialogState::FinalConfirm => "final_confirm",
            DialogState::ConversionAmount => "conversion_amount",
            DialogState::ConversionConfirm => "conversion_confirm",
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which read-only flow the `balance_*` credential states serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Balance,
    Convert,
}

/// How a confirmed order reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fulfilment {
    Delivery { address: String },
    Pickup { point: String },
}

impl Fulfilment {
    pub fn location(&self) -> &str {
        match self {
            Fulfilment::Delivery { address } => address,
            Fulfilment::Pickup { point } => point,
        }
    }

    pub fn eta(&self) -> &'static str {
        match self {
            Fulfilment::Delivery { .. } => "2-3 business days",
            Fulfilment::Pickup { .. } => "Ready in 2 hours",
        }
    }
}

/// State carried through the conversion sub-flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionContext {
    /// Amount entered and awaiting confirmation.
    pub amount: Option<Decimal>,
    /// Set when the conversion was entered from final confirmation; the
    /// dialog resumes there with this fulfilment choice.
    pub return_to_checkout: Option<Fulfilment>,
    /// Minimum source amount suggested to cover the checkout shortfall.
    pub required_amount: Option<Decimal>,
}

/// Per-step payload. Each variant belongs to the states that read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Scratch {
    #[default]
    Empty,
    Credential(Purpose),
    PendingQuantity(u32),
    Fulfilment(Fulfilment),
    Conversion(ConversionContext),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub state: DialogState,
    /// Caller id as entered; only trusted once `authenticated` is set.
    pub caller: Option<String>,
    pub authenticated: bool,
    pub selected_store: Option<u32>,
    pub selected_department: Option<u32>,
    pub selected_product: Option<u32>,
    pub cart: Cart,
    pub scratch: Scratch,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set once the session has been torn down; a closed session is never
    /// handed out again.
    #[serde(skip)]
    pub closed: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            state: DialogState::Welcome,
            caller: None,
            authenticated: false,
            selected_store: None,
            selected_department: None,
            selected_product: None,
            cart: Cart::new(),
            scratch: Scratch::Empty,
            last_activity: now,
            created_at: now,
            closed: false,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// True once the session has been idle for longer than `timeout`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.last_activity)
            .to_std()
            .map(|idle| idle > timeout)
            .unwrap_or(false)
    }

    /// Forgets the caller, e.g. after a failed password check.
    pub fn clear_caller(&mut self) {
        self.caller = None;
        self.authenticated = false;
    }
}
