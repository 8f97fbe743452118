//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analysis;
pub mod currency;
pub mod health;
pub mod preferences;
pub mod receipts;
pub mod reference;

// Re-export all handlers for use in router
pub use analysis::*;
pub use currency::*;
pub use health::*;
pub use preferences::*;
pub use receipts::*;
pub use reference::*;
