//! Declared hand-overs between dialog states.
//!
//! Every state lists itself first: a rejected input re-renders the same
//! prompt. The engine refuses any continue reply that lands outside this
//! table.

use crate::domain::session::DialogState::{self, *};

pub fn successors(state: DialogState) -> &'static [DialogState] {
    match state {
        Welcome => &[Welcome, CredentialId, BalanceId],
        CredentialId => &[CredentialId, CredentialPassword],
        CredentialPassword => &[CredentialPassword, CredentialId, SelectStore],
        BalanceId => &[BalanceId, BalancePassword],
        BalancePassword => &[BalancePassword, BalanceId, ConversionAmount],
        SelectStore => &[SelectStore, SelectDepartment],
        SelectDepartment => &[SelectDepartment, SelectProduct],
        SelectProduct => &[SelectProduct, EnterQuantity],
        EnterQuantity => &[EnterQuantity, SelectPaymentSource, CartMenu],
        SelectPaymentSource => &[SelectPaymentSource, CartMenu],
        CartMenu => &[CartMenu, SelectStore, RemoveItem, CheckoutConfirm],
        RemoveItem => &[RemoveItem, CartMenu],
        CheckoutConfirm => &[CheckoutConfirm, CartMenu, DeliveryOrPickup, SelectStore],
        DeliveryOrPickup => &[DeliveryOrPickup, FinalConfirm],
        FinalConfirm => &[FinalConfirm, CartMenu, ConversionAmount],
        ConversionAmount => &[ConversionAmount, ConversionConfirm, FinalConfirm],
        ConversionConfirm => &[ConversionConfirm, FinalConfirm],
    }
}
