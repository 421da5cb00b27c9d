//! Cost guard port adapters.

pub mod budget;
pub mod metering;

pub use budget::BudgetCostGuard;
pub use metering::MeteringCostGuard;
