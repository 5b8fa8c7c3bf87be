use super::catalog::Product;
use super::ledger::Source;
use super::money::format_money;
use crate::error::UssdError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// One cart line. The unit price is captured when the line is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: u32,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub source: Source,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` of `product` paid from `source`.
    ///
    /// Lines merge on `(product, source)`: the same product paid from a
    /// different source becomes its own line.
    pub fn add(&mut self, product: &Product, quantity: u32, source: Source) -> Result<(), UssdError> {
        if quantity == 0 {
            return Err(UssdError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id && item.source == source)
        {
            Some(item) => item.quantity += quantity,
            None => self.items.push(LineItem {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity,
                source,
            }),
        }
        Ok(())
    }

    /// Removes the line at 1-based `position`. Returns `false` when out of range.
    pub fn remove(&mut self, position: usize) -> bool {
        if position >= 1 && position <= self.items.len() {
            self.items.remove(position - 1);
            true
        } else {
            false
        }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn totals_by_source(&self) -> BTreeMap<Source, Decimal> {
        let mut totals = BTreeMap::new();
        for item in &self.items {
            *totals.entry(item.source).or_insert(Decimal::ZERO) += item.subtotal();
        }
        totals
    }

    pub fn grand_total(&self) -> Decimal {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    /// Numbered listing with per-line subtotals and the grand total.
    pub fn summary(&self, currency: &str, show_sources: bool) -> String {
        if self.items.is_empty() {
            return "Cart is empty.".to_string();
        }

        let mut summary = String::from("CART:\n");
        for (index, item) in self.items.iter().enumerate() {
            let _ = write!(
                summary,
                "{}. {}\n   {}x {} = {}",
                index + 1,
                item.name,
                item.quantity,
                format_money(currency, item.unit_price),
                format_money(currency, item.subtotal()),
            );
            if show_sources {
                let _ = write!(summary, " ({})", item.source.label());
            }
            summary.push('\n');
        }
        let _ = write!(summary, "TOTAL: {}", format_money(currency, self.grand_total()));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(id: u32, price: Decimal) -> Product {
        Product {
            id,
            name: format!("Product {id}"),
            price,
            department_id: 1,
        }
    }

    #[test]
    fn test_merge_on_same_product_and_source() {
        let mut cart = Cart::new();
        let bread = product(7, dec!(25));
        cart.add(&bread, 2, Source::Wallet).unwrap();
        cart.add(&bread, 3, Source::Wallet).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);

        cart.add(&bread, 1, Source::Account).unwrap();
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_price_is_snapshotted() {
        let mut cart = Cart::new();
        let mut milk = product(8, dec!(35));
        cart.add(&milk, 1, Source::Wallet).unwrap();
        milk.price = dec!(99);
        cart.add(&milk, 1, Source::Wallet).unwrap();
        assert_eq!(cart.grand_total(), dec!(70));
    }

    #[test]
    fn test_remove_shifts_positions() {
        let mut cart = Cart::new();
        for id in 1..=3 {
            cart.add(&product(id, dec!(10)), 1, Source::Wallet).unwrap();
        }
        assert!(!cart.remove(0));
        assert!(!cart.remove(4));
        assert!(cart.remove(1));
        assert_eq!(cart.items()[0].product_id, 2);
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::new();
        cart.add(&product(1, dec!(150)), 2, Source::Wallet).unwrap();
        cart.add(&product(2, dec!(80)), 1, Source::Account).unwrap();
        cart.add(&product(3, dec!(25.5)), 2, Source::Wallet).unwrap();
        cart.remove(3);

        let expected: Decimal = cart.items().iter().map(|i| i.unit_price * Decimal::from(i.quantity)).sum();
        assert_eq!(cart.grand_total(), expected);
        assert_eq!(cart.grand_total(), dec!(380));
        let totals = cart.totals_by_source();
        assert_eq!(totals[&Source::Wallet], dec!(300));
        assert_eq!(totals[&Source::Account], dec!(80));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut cart = Cart::new();
        assert!(cart.add(&product(1, dec!(1)), 0, Source::Wallet).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_summary() {
        let mut cart = Cart::new();
        assert_eq!(cart.summary("R", false), "Cart is empty.");
        cart.add(&product(1, dec!(25)), 2, Source::Wallet).unwrap();
        assert_eq!(
            cart.summary("R", false),
            "CART:\n1. Product 1\n   2x R25.00 = R50.00\nTOTAL: R50.00"
        );
        assert!(cart.summary("R", true).contains("(Wallet)"));
    }
}
