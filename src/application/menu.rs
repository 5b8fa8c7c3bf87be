//! Reply bodies. Everything the caller reads is rendered here so the
//! handlers only decide where the conversation goes.

use crate::application::handlers::Assessment;
use crate::domain::cart::Cart;
use crate::domain::catalog::{Department, Product, Store};
use crate::domain::ledger::{Conversion, LedgerError, Shortfall, Source};
use crate::domain::money::{Balance, format_money};
use crate::domain::policy::DialogPolicy;
use crate::domain::session::Fulfilment;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const CART_OPTIONS: &str = "What would you like to do?\n1. Continue Shopping\n2. Remove Item\n3. Proceed to Checkout";
pub const CONVERSION_OPTIONS: &str = "Confirm conversion?\n1. Yes, Convert\n2. No, Cancel";
const AMOUNT_CANCEL: &str = "0. Cancel";
const CHECKOUT_OPTIONS: &str = "Confirm your order?\n1. Yes, Continue to Delivery\n2. No, Go Back to Cart";

pub struct Menu<'a> {
    policy: &'a DialogPolicy,
}

impl<'a> Menu<'a> {
    pub fn new(policy: &'a DialogPolicy) -> Self {
        Self { policy }
    }

    pub fn money(&self, value: Decimal) -> String {
        format_money(&self.policy.currency_symbol, value)
    }

    pub fn welcome(&self) -> String {
        format!(
            "Welcome to {}!\nYour digital wallet shopping platform\n\n{}",
            self.policy.brand,
            self.welcome_options()
        )
    }

    pub fn welcome_options(&self) -> String {
        let conversion = &self.policy.conversion;
        format!(
            "1. Shop\n2. Check Balance\n3. Convert {} to {}\n4. Exit",
            conversion.from.label(),
            conversion.to.label()
        )
    }

    pub fn goodbye(&self) -> String {
        format!("Thank you for using {}!\nHave a great day!", self.policy.brand)
    }

    fn sign_off(&self) -> String {
        format!("Thank you for using {}!", self.policy.brand)
    }

    pub fn stores(&self, stores: &[Store]) -> String {
        numbered(stores.iter().map(|store| store.name.clone()))
    }

    pub fn departments(&self, departments: &[&Department]) -> String {
        numbered(departments.iter().map(|department| department.name.clone()))
    }

    pub fn products(&self, products: &[&Product]) -> String {
        numbered(
            products
                .iter()
                .map(|product| format!("{} - {}", product.name, self.money(product.price))),
        )
    }

    pub fn balances(&self, balances: &[(Source, Balance)]) -> String {
        balances
            .iter()
            .map(|(source, balance)| format!("{} Balance: {}", source.label(), self.money(balance.value())))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn payment_sources(&self, balances: &[(Source, Balance)]) -> String {
        numbered(
            balances
                .iter()
                .map(|(source, balance)| format!("{} ({})", source.label(), self.money(balance.value()))),
        )
    }

    pub fn cart(&self, cart: &Cart) -> String {
        cart.summary(&self.policy.currency_symbol, self.policy.multi_source())
    }

    pub fn quantity_prompt(&self, product: &Product) -> String {
        format!(
            "SELECTED PRODUCT:\n{}\nPrice: {}\n\nEnter quantity ({}-{}):",
            product.name,
            self.money(product.price),
            self.policy.quantity.min,
            self.policy.quantity.max
        )
    }

    pub fn checkout_review(&self, cart: &Cart, balances: &[(Source, Balance)]) -> String {
        format!(
            "CHECKOUT REVIEW\n\n{}\n\n{}\n\n{CHECKOUT_OPTIONS}",
            self.cart(cart),
            self.balances(balances)
        )
    }

    pub fn delivery_options(&self, address: &str, point: &str) -> String {
        format!(
            "DELIVERY OPTIONS\nHow would you like to receive your order?\n\n1. Home Delivery\n   Address: {address}\n\n2. Store Pickup\n   Location: {point}"
        )
    }

    pub fn final_confirmation(&self, fulfilment: &Fulfilment, assessment: &Assessment) -> String {
        let heading = match fulfilment {
            Fulfilment::Delivery { .. } => "DELIVERY TO:",
            Fulfilment::Pickup { .. } => "PICKUP FROM:",
        };
        let mut body = format!(
            "FINAL CONFIRMATION\n\n{heading}\n{}\n\nORDER TOTAL: {}\n",
            fulfilment.location(),
            self.money(assessment.grand_total())
        );
        for (source, due) in &assessment.totals {
            let available = assessment.balances.get(source).copied().unwrap_or(Balance::ZERO);
            if self.policy.multi_source() {
                let _ = writeln!(
                    body,
                    "{}: {} due, {} available",
                    source.label(),
                    self.money(*due),
                    self.money(available.value())
                );
            } else {
                let _ = writeln!(body, "{} Balance: {}", source.label(), self.money(available.value()));
            }
        }

        if assessment.shortfalls.is_empty() {
            body.push_str("\nComplete your order?\n1. Yes, Process Payment\n2. No, Cancel Order");
            return body;
        }
        for shortfall in &assessment.shortfalls {
            let _ = write!(
                body,
                "\nINSUFFICIENT {} BALANCE!\nShortfall: {}\n",
                shortfall.source.label().to_uppercase(),
                self.money(shortfall.missing())
            );
        }
        let conversion = &self.policy.conversion;
        if assessment.top_up.is_some() {
            let _ = write!(
                body,
                "\n1. Convert {} to {}\n2. Cancel Order",
                conversion.from.label(),
                conversion.to.label()
            );
        } else {
            body.push_str("\n1. Back to Cart\n2. Cancel Order");
        }
        body
    }

    pub fn insufficient(&self, shortfalls: &[Shortfall]) -> String {
        let mut body = String::from("INSUFFICIENT BALANCE");
        for shortfall in shortfalls {
            let _ = write!(
                body,
                "\n{}: short by {}",
                shortfall.source.label(),
                self.money(shortfall.missing())
            );
        }
        body
    }

    pub fn order_success(
        &self,
        order: &str,
        total: Decimal,
        balances: &BTreeMap<Source, Balance>,
        fulfilment: &Fulfilment,
    ) -> String {
        let mut body = format!("ORDER SUCCESSFUL!\n\nOrder #: {order}\nTotal Paid: {}\n", self.money(total));
        for (source, balance) in balances {
            let _ = writeln!(body, "New {} Balance: {}", source.label(), self.money(balance.value()));
        }
        let heading = match fulfilment {
            Fulfilment::Delivery { .. } => "DELIVERY DETAILS:",
            Fulfilment::Pickup { .. } => "PICKUP DETAILS:",
        };
        let _ = write!(
            body,
            "\n{heading}\n{}\nETA: {}\n\nThank you for shopping with {}!",
            fulfilment.location(),
            fulfilment.eta(),
            self.policy.brand
        );
        body
    }

    pub fn payment_failed(&self, shortfalls: &[Shortfall]) -> String {
        let mut body = String::from("PAYMENT FAILED\n");
        for shortfall in shortfalls {
            let _ = write!(
                body,
                "\nInsufficient {} balance: short by {}",
                shortfall.source.label(),
                self.money(shortfall.missing())
            );
        }
        let _ = write!(body, "\n\nNo funds were deducted.\n{}", self.sign_off());
        body
    }

    pub fn balance_report(&self, balances: &[(Source, Balance)]) -> String {
        format!("BALANCE\n\n{}\n\n{}", self.balances(balances), self.sign_off())
    }

    fn bounds(&self) -> String {
        let conversion = &self.policy.conversion;
        format!("Min: {}, Max: {}", self.money(conversion.min), self.money(conversion.max))
    }

    pub fn conversion_intro(&self, from: Balance, to: Balance) -> String {
        let conversion = &self.policy.conversion;
        format!(
            "{} TOP UP\nTop up your {} with {}\n\nCurrent Balances:\n{}: {}\n{}: {}\n\n{}\n\nEnter {} amount to convert:\n{AMOUNT_CANCEL}",
            conversion.to.label().to_uppercase(),
            conversion.to,
            conversion.from,
            conversion.from.label(),
            self.money(from.value()),
            conversion.to.label(),
            self.money(to.value()),
            self.bounds(),
            conversion.from
        )
    }

    pub fn conversion_detour(&self, shortfall: Decimal, required: Decimal, available: Balance) -> String {
        let conversion = &self.policy.conversion;
        format!(
            "CONVERT {} TO {}\n\nShortfall: {}\nMin {} needed: {}\n\nYour {}: {}\n\nEnter {} amount to convert:\n{AMOUNT_CANCEL}",
            conversion.from.label().to_uppercase(),
            conversion.to.label().to_uppercase(),
            self.money(shortfall),
            conversion.from,
            self.money(required),
            conversion.from,
            self.money(available.value()),
            conversion.from
        )
    }

    pub fn invalid_amount(&self, available: Balance) -> String {
        let conversion = &self.policy.conversion;
        format!(
            "Invalid amount. {}\n\nYour {} balance: {}\n\nEnter amount to convert:\n{AMOUNT_CANCEL}",
            self.bounds(),
            conversion.from,
            self.money(available.value())
        )
    }

    pub fn amount_exceeds_balance(&self, available: Balance) -> String {
        format!(
            "Insufficient {} balance.\nYou have {}\n\nEnter valid amount:\n{AMOUNT_CANCEL}",
            self.policy.conversion.from,
            self.money(available.value())
        )
    }

    pub fn conversion_preview(&self, amount: Decimal) -> String {
        let conversion = &self.policy.conversion;
        let (converted, fee) = conversion.quote(amount);
        format!(
            "CONVERSION PREVIEW\n\n{}: {}\nYou'll receive: {}\nFee ({}%): {}\n\n{CONVERSION_OPTIONS}",
            conversion.from.label(),
            self.money(amount),
            self.money(converted),
            conversion.fee_percent(),
            self.money(fee)
        )
    }

    pub fn conversion_done(&self, conversion: &Conversion) -> String {
        format!(
            "CONVERSION SUCCESSFUL!\n\n{} Deducted: {}\n{} Added: {}\nFee: {}\n\nNew {} Balance: {}",
            conversion.from.label(),
            self.money(conversion.debited),
            conversion.to.label(),
            self.money(conversion.converted),
            self.money(conversion.fee),
            conversion.to.label(),
            self.money(conversion.to_balance.value())
        )
    }

    pub fn conversion_receipt(&self, conversion: &Conversion) -> String {
        format!("{}\n\n{}", self.conversion_done(conversion), self.sign_off())
    }

    pub fn conversion_cancelled(&self) -> String {
        format!("Conversion cancelled.\n\n{}", self.sign_off())
    }

    pub fn conversion_failed(&self, error: &LedgerError) -> String {
        let reason = match error {
            LedgerError::OutOfBounds { .. } => format!("Amount outside limits. {}", self.bounds()),
            LedgerError::InsufficientFunds { bucket, .. } => format!("Insufficient {bucket} balance."),
            other => other.to_string(),
        };
        format!("CONVERSION FAILED\n\n{reason}\n\nPlease try again.\n{}", self.sign_off())
    }
}

fn numbered<I: IntoIterator<Item = String>>(entries: I) -> String {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| format!("{}. {entry}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_numbered_is_one_based() {
        assert_eq!(numbered(["a".to_string(), "b".to_string()]), "1. a\n2. b");
    }

    #[test]
    fn test_conversion_preview_shows_fee_percent() {
        let policy = DialogPolicy::default();
        let preview = Menu::new(&policy).conversion_preview(dec!(50));
        assert!(preview.contains("Airtime: R50.00"));
        assert!(preview.contains("You'll receive: R47.50"));
        assert!(preview.contains("Fee (5%): R2.50"));
    }

    #[test]
    fn test_final_confirmation_offers_conversion_for_target_shortfall() {
        let policy = DialogPolicy::default();
        let assessment = Assessment {
            totals: BTreeMap::from([(Source::Wallet, dec!(200))]),
            balances: BTreeMap::from([(Source::Wallet, Balance(dec!(150)))]),
            shortfalls: vec![Shortfall {
                source: Source::Wallet,
                required: dec!(200),
                available: dec!(150),
            }],
            top_up: Some(dec!(53)),
        };
        let body = Menu::new(&policy).final_confirmation(
            &Fulfilment::Pickup {
                point: "Sandton City".to_string(),
            },
            &assessment,
        );
        assert!(body.contains("PICKUP FROM:\nSandton City"));
        assert!(body.contains("Shortfall: R50.00"));
        assert!(body.contains("1. Convert Airtime to Wallet"));
    }

    #[test]
    fn test_final_confirmation_without_top_up_points_back_to_cart() {
        let policy = DialogPolicy::default();
        let assessment = Assessment {
            totals: BTreeMap::from([(Source::Wallet, dec!(200))]),
            balances: BTreeMap::from([(Source::Wallet, Balance(dec!(150)))]),
            shortfalls: vec![Shortfall {
                source: Source::Wallet,
                required: dec!(200),
                available: dec!(150),
            }],
            top_up: None,
        };
        let body = Menu::new(&policy).final_confirmation(
            &Fulfilment::Pickup {
                point: "Sandton City".to_string(),
            },
            &assessment,
        );
        assert!(body.contains("Shortfall: R50.00"));
        assert!(body.contains("1. Back to Cart"));
        assert!(!body.contains("Convert"));
    }
}
