pub mod commission;

pub use commission::{allocate, proportional_tax, CommissionSplit, DEFAULT_COMMISSION_RATE};
