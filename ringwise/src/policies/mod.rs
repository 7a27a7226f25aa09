//! Pluggable policies: where nodes live, which one to contact, and how
//! implementations are chosen by name.

pub mod endpoint_selection;
pub mod registry;
pub mod snitch;
