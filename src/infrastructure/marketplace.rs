use crate::domain::catalog::Catalog;
use crate::domain::directory::Directory;
use crate::domain::ledger::Source;
use crate::domain::money::Balance;
use crate::domain::ports::ClockRef;
use crate::error::{Result, UssdError};
use crate::infrastructure::in_memory::InMemoryLedger;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const BUNDLED: &str = include_str!("../../data/marketplace.json");

/// Catalog, caller directory and opening balances loaded together.
#[derive(Debug, Clone, Deserialize)]
pub struct Marketplace {
    pub catalog: Catalog,
    pub directory: Directory,
    #[serde(default)]
    pub balances: HashMap<String, BTreeMap<Source, Balance>>,
}

impl Marketplace {
    /// The demo marketplace compiled into the binary.
    pub fn bundled() -> Result<Self> {
        let marketplace: Self = serde_json::from_str(BUNDLED)?;
        marketplace.validate()?;
        Ok(marketplace)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let marketplace: Self = serde_json::from_reader(BufReader::new(file))?;
        marketplace.validate()?;
        Ok(marketplace)
    }

    fn validate(&self) -> Result<()> {
        for (caller, sources) in &self.balances {
            if let Some((source, _)) = sources
                .iter()
                .find(|(_, balance)| balance.value() < Decimal::ZERO)
            {
                return Err(UssdError::ValidationError(format!(
                    "opening {source} balance for {caller} is negative"
                )));
            }
        }
        Ok(())
    }

    /// A fresh ledger holding the opening balances.
    pub fn ledger(&self, clock: ClockRef) -> InMemoryLedger {
        InMemoryLedger::with_balances(clock, self.balances.clone())
    }
}
