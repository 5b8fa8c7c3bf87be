use crate::error::UssdError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: u32,
    pub name: String,
    pub store_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price: Decimal,
    pub department_id: u32,
}

/// Raw catalog tiers as they appear in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogData {
    pub stores: Vec<Store>,
    pub departments: Vec<Department>,
    pub products: Vec<Product>,
}

/// Read-only store → department → product hierarchy.
///
/// Menu numbering is the position of an entry within its parent, in the
/// order the entries were loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CatalogData")]
pub struct Catalog {
    stores: Vec<Store>,
    departments: Vec<Department>,
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(
        stores: Vec<Store>,
        departments: Vec<Department>,
        products: Vec<Product>,
    ) -> Result<Self, UssdError> {
        if stores.is_empty() {
            return Err(UssdError::CatalogError("no stores defined".to_string()));
        }
        unique_ids("store", stores.iter().map(|s| s.id))?;
        unique_ids("department", departments.iter().map(|d| d.id))?;
        unique_ids("product", products.iter().map(|p| p.id))?;

        for department in &departments {
            if !stores.iter().any(|s| s.id == department.store_id) {
                return Err(UssdError::CatalogError(format!(
                    "department {} belongs to unknown store {}",
                    department.id, department.store_id
                )));
            }
        }
        for product in &products {
            if !departments.iter().any(|d| d.id == product.department_id) {
                return Err(UssdError::CatalogError(format!(
                    "product {} belongs to unknown department {}",
                    product.id, product.department_id
                )));
            }
            if product.price < Decimal::ZERO {
                return Err(UssdError::CatalogError(format!(
                    "product {} has a negative price",
                    product.id
                )));
            }
        }
        // Every menu must offer at least one option.
        for store in &stores {
            if !departments.iter().any(|d| d.store_id == store.id) {
                return Err(UssdError::CatalogError(format!(
                    "store {} has no departments",
                    store.id
                )));
            }
        }
        for department in &departments {
            if !products.iter().any(|p| p.department_id == department.id) {
                return Err(UssdError::CatalogError(format!(
                    "department {} has no products",
                    department.id
                )));
            }
        }

        Ok(Self {
            stores,
            departments,
            products,
        })
    }

    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    pub fn departments(&self, store_id: u32) -> Vec<&Department> {
        self.departments
            .iter()
            .filter(|d| d.store_id == store_id)
            .collect()
    }

    pub fn products(&self, department_id: u32) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| p.department_id == department_id)
            .collect()
    }

    pub fn product(&self, id: u32) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

impl TryFrom<CatalogData> for Catalog {
    type Error = UssdError;

    fn try_from(data: CatalogData) -> Result<Self, Self::Error> {
        Self::new(data.stores, data.departments, data.products)
    }
}

fn unique_ids(tier: &str, ids: impl Iterator<Item = u32>) -> Result<(), UssdError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(UssdError::CatalogError(format!("duplicate {tier} id {id}")));
        }
    }
    Ok(())
}
