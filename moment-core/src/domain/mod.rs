//! Domain types for Moment

pub mod price;
pub mod range;
pub mod symbol;
pub mod ticker;

pub use price::{Meta, Price, Quote};
pub use range::{DateRange, RangeUnit};
pub use symbol::Symbol;
pub use ticker::Ticker;
