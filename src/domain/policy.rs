use super::ledger::{LedgerError, Source};
use crate::error::{Result, UssdError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Rate and bounds applied when value moves between two sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionPolicy {
    /// Share of the converted amount that reaches the target source.
    pub rate: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub from: Source,
    pub to: Source,
}

impl Default for ConversionPolicy {
    fn default() -> Self {
        Self {
            rate: dec!(0.95),
            min: dec!(10),
            max: dec!(500),
            from: Source::Airtime,
            to: Source::Wallet,
        }
    }
}

impl ConversionPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.rate <= Decimal::ZERO || self.rate > Decimal::ONE {
            return Err(UssdError::ConfigError(format!(
                "conversion rate must be in (0, 1], got {}",
                self.rate
            )));
        }
        if self.min <= Decimal::ZERO || self.min > self.max {
            return Err(UssdError::ConfigError(format!(
                "conversion bounds must satisfy 0 < min <= max, got {} and {}",
                self.min, self.max
            )));
        }
        if self.from == self.to {
            return Err(UssdError::ConfigError(format!(
                "conversion source and target are both {}",
                self.from
            )));
        }
        Ok(())
    }

    pub fn check_bounds(&self, amount: Decimal) -> std::result::Result<(), LedgerError> {
        if amount < self.min || amount > self.max {
            Err(LedgerError::OutOfBounds {
                amount,
                min: self.min,
                max: self.max,
            })
        } else {
            Ok(())
        }
    }

    /// Splits `amount` into `(converted, fee)`; the two always sum to `amount`.
    pub fn quote(&self, amount: Decimal) -> (Decimal, Decimal) {
        (amount * self.rate, amount * (Decimal::ONE - self.rate))
    }

    /// Fee as a whole percentage, e.g. `5` for a rate of `0.95`.
    pub fn fee_percent(&self) -> Decimal {
        ((Decimal::ONE - self.rate) * dec!(100)).normalize()
    }

    /// Smallest whole source amount that covers `shortfall` after the fee,
    /// never below the conversion minimum.
    pub fn required_for(&self, shortfall: Decimal) -> Decimal {
        (shortfall / self.rate).ceil().max(self.min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantityBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for QuantityBounds {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}

/// Everything the dialog needs to know that is not catalog or caller data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogPolicy {
    pub brand: String,
    pub currency_symbol: String,
    pub conversion: ConversionPolicy,
    /// Sources a cart line may be paid from, in menu order.
    pub payment_sources: Vec<Source>,
    pub quantity: QuantityBounds,
    pub min_id_length: usize,
}

impl Default for DialogPolicy {
    fn default() -> Self {
        Self {
            brand: "MzansiMarket".to_string(),
            currency_symbol: "R".to_string(),
            conversion: ConversionPolicy::default(),
            payment_sources: vec![Source::Wallet],
            quantity: QuantityBounds::default(),
            min_id_length: 8,
        }
    }
}

impl DialogPolicy {
    pub fn validate(&self) -> Result<()> {
        self.conversion.validate()?;
        if self.payment_sources.is_empty() {
            return Err(UssdError::ConfigError(
                "at least one payment source is required".to_string(),
            ));
        }
        for (index, source) in self.payment_sources.iter().enumerate() {
            if self.payment_sources[..index].contains(source) {
                return Err(UssdError::ConfigError(format!(
                    "payment source {source} is listed twice"
                )));
            }
        }
        if self.quantity.min == 0 || self.quantity.min > self.quantity.max {
            return Err(UssdError::ConfigError(format!(
                "quantity bounds must satisfy 1 <= min <= max, got {} and {}",
                self.quantity.min, self.quantity.max
            )));
        }
        Ok(())
    }

    pub fn multi_source(&self) -> bool {
        self.payment_sources.len() > 1
    }

    /// Payment sources first, then the conversion pair if not already listed.
    pub fn visible_sources(&self) -> Vec<Source> {
        let mut sources = self.payment_sources.clone();
        for source in [self.conversion.to, self.conversion.from] {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources
    }
}
