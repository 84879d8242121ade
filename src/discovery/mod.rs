//! Article discovery beyond plain anchor harvesting.
//!
//! - [`consent`]: dismiss consent walls in a browser before harvesting
//! - [`feeds`]: RSS/Atom/sitemap discovery

pub mod consent;
pub mod feeds;
