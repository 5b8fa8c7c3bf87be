pub mod clock;
pub mod in_memory;
pub mod marketplace;
pub mod sweeper;
