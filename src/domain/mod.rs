//! Domain types and the ports the engine talks through.

pub mod cart;
pub mod catalog;
pub mod directory;
pub mod gateway;
pub mod ledger;
pub mod money;
pub mod policy;
pub mod ports;
pub mod session;
