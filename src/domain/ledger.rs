use super::money::{Amount, Balance};
use super::policy::ConversionPolicy;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A named balance bucket held for a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Wallet,
    Airtime,
    Account,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Wallet, Source::Airtime, Source::Account];

    /// Capitalised name used in menus.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Wallet => "Wallet",
            Source::Airtime => "Airtime",
            Source::Account => "Account",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Wallet => "wallet",
            Source::Airtime => "airtime",
            Source::Account => "account",
        })
    }
}

/// How much of a source an operation needed versus what was there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shortfall {
    pub source: Source,
    pub required: Decimal,
    pub available: Decimal,
}

impl Shortfall {
    pub fn missing(&self) -> Decimal {
        self.required - self.available
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("amount {amount} is outside the allowed range {min} to {max}")]
    OutOfBounds {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },
    #[error("insufficient {bucket} balance: {available} available, {requested} requested")]
    InsufficientFunds {
        bucket: Source,
        available: Decimal,
        requested: Decimal,
    },
    #[error("insufficient funds in {} source(s)", .0.len())]
    Shortfall(Vec<Shortfall>),
    #[error("cannot convert {0} into itself")]
    SameSource(Source),
}

/// Outcome of a successful conversion between two sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub from: Source,
    pub to: Source,
    pub debited: Decimal,
    pub converted: Decimal,
    pub fee: Decimal,
    pub from_balance: Balance,
    pub to_balance: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceBalance {
    pub balance: Balance,
    pub last_updated: DateTime<Utc>,
}

/// Every source balance held for one caller.
///
/// All mutators validate before they touch any balance, so a rejected
/// operation leaves the account exactly as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub caller: String,
    balances: BTreeMap<Source, SourceBalance>,
}

impl LedgerAccount {
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            balances: BTreeMap::new(),
        }
    }

    /// Balance of `source`, zero when the caller never held any.
    pub fn balance(&self, source: Source) -> Balance {
        self.balances
            .get(&source)
            .map(|entry| entry.balance)
            .unwrap_or(Balance::ZERO)
    }

    pub fn last_updated(&self, source: Source) -> Option<DateTime<Utc>> {
        self.balances.get(&source).map(|entry| entry.last_updated)
    }

    /// Overwrites a balance outright. Used when seeding accounts.
    pub fn set_balance(&mut self, source: Source, balance: Balance, now: DateTime<Utc>) {
        self.balances.insert(
            source,
            SourceBalance {
                balance,
                last_updated: now,
            },
        );
    }

    pub fn credit(&mut self, source: Source, amount: Amount, now: DateTime<Utc>) -> Balance {
        let updated = self.balance(source) + amount;
        self.set_balance(source, updated, now);
        updated
    }

    pub fn debit(
        &mut self,
        source: Source,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<Balance, LedgerError> {
        let current = self.balance(source);
        let updated = current
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                bucket: source,
                available: current.value(),
                requested: amount.value(),
            })?;
        self.set_balance(source, updated, now);
        Ok(updated)
    }

    /// Debits every `(source, amount)` pair or none of them.
    pub fn debit_all(
        &mut self,
        totals: &BTreeMap<Source, Decimal>,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<Source, Balance>, LedgerError> {
        let shortfalls: Vec<Shortfall> = totals
            .iter()
            .filter(|(source, required)| self.balance(**source).value() < **required)
            .map(|(source, required)| Shortfall {
                source: *source,
                required: *required,
                available: self.balance(*source).value(),
            })
            .collect();
        if !shortfalls.is_empty() {
            return Err(LedgerError::Shortfall(shortfalls));
        }

        let mut updated = BTreeMap::new();
        for (source, required) in totals {
            let balance = match Amount::new(*required) {
                Ok(amount) => self.debit(*source, amount, now)?,
                Err(_) => self.balance(*source),
            };
            updated.insert(*source, balance);
        }
        Ok(updated)
    }

    /// Moves `amount` out of `from` and credits `amount * rate` into `to`.
    pub fn convert(
        &mut self,
        from: Source,
        to: Source,
        amount: Amount,
        policy: &ConversionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Conversion, LedgerError> {
        if from == to {
            return Err(LedgerError::SameSource(from));
        }
        policy.check_bounds(amount.value())?;

        let (converted, fee) = policy.quote(amount.value());
        let from_balance = self.debit(from, amount, now)?;
        let to_balance = match Amount::new(converted) {
            Ok(credited) => self.credit(to, credited, now),
            Err(_) => self.balance(to),
        };

        Ok(Conversion {
            from,
            to,
            debited: amount.value(),
            converted,
            fee,
            from_balance,
            to_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn account(wallet: Decimal, airtime: Decimal) -> LedgerAccount {
        let mut account = LedgerAccount::new("1234567890");
        account.set_balance(Source::Wallet, Balance(wallet), now());
        account.set_balance(Source::Airtime, Balance(airtime), now());
        account
    }

    #[test]
    fn test_unknown_source_reads_zero() {
        let account = LedgerAccount::new("1");
        assert_eq!(account.balance(Source::Account), Balance::ZERO);
        assert_eq!(account.last_updated(Source::Account), None);
    }

    #[test]
    fn test_debit_insufficient_leaves_balance() {
        let mut account = account(dec!(10.0), dec!(0));
        let result = account.debit(Source::Wallet, Amount::new(dec!(20.0)).unwrap(), now());
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { bucket: Source::Wallet, .. })
        ));
        assert_eq!(account.balance(Source::Wallet), Balance(dec!(10.0)));
    }

    #[test]
    fn test_convert_airtime_to_wallet() {
        let mut account = account(dec!(100), dec!(120.5));
        let conversion = account
            .convert(
                Source::Airtime,
                Source::Wallet,
                Amount::new(dec!(50)).unwrap(),
                &ConversionPolicy::default(),
                now(),
            )
            .unwrap();

        assert_eq!(conversion.converted, dec!(47.5));
        assert_eq!(conversion.fee, dec!(2.5));
        assert_eq!(account.balance(Source::Wallet), Balance(dec!(147.5)));
        assert_eq!(account.balance(Source::Airtime), Balance(dec!(70.5)));
    }

    #[test]
    fn test_convert_rejects_out_of_bounds_without_mutation() {
        let mut account = account(dec!(100), dec!(1000));
        let policy = ConversionPolicy::default();

        let low = account.convert(
            Source::Airtime,
            Source::Wallet,
            Amount::new(dec!(9.99)).unwrap(),
            &policy,
            now(),
        );
        let high = account.convert(
            Source::Airtime,
            Source::Wallet,
            Amount::new(dec!(500.01)).unwrap(),
            &policy,
            now(),
        );

        assert!(matches!(low, Err(LedgerError::OutOfBounds { .. })));
        assert!(matches!(high, Err(LedgerError::OutOfBounds { .. })));
        assert_eq!(account.balance(Source::Airtime), Balance(dec!(1000)));
        assert_eq!(account.balance(Source::Wallet), Balance(dec!(100)));
    }

    #[test]
    fn test_convert_rejects_more_than_source_balance() {
        let mut account = account(dec!(100), dec!(45.75));
        let result = account.convert(
            Source::Airtime,
            Source::Wallet,
            Amount::new(dec!(50)).unwrap(),
            &ConversionPolicy::default(),
            now(),
        );
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { bucket: Source::Airtime, .. })
        ));
        assert_eq!(account.balance(Source::Wallet), Balance(dec!(100)));
    }

    #[test]
    fn test_debit_all_is_all_or_nothing() {
        let mut account = account(dec!(150), dec!(10));
        let totals = BTreeMap::from([(Source::Wallet, dec!(100)), (Source::Airtime, dec!(30))]);

        let result = account.debit_all(&totals, now());
        match result {
            Err(LedgerError::Shortfall(shortfalls)) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].source, Source::Airtime);
                assert_eq!(shortfalls[0].missing(), dec!(20));
            }
            other => panic!("expected shortfall, got {other:?}"),
        }
        assert_eq!(account.balance(Source::Wallet), Balance(dec!(150)));
        assert_eq!(account.balance(Source::Airtime), Balance(dec!(10)));

        let totals = BTreeMap::from([(Source::Wallet, dec!(100)), (Source::Airtime, dec!(10))]);
        let updated = account.debit_all(&totals, now()).unwrap();
        assert_eq!(updated[&Source::Wallet], Balance(dec!(50)));
        assert_eq!(updated[&Source::Airtime], Balance::ZERO);
    }
}
