//! Scraper for legislative initiative pages on parlamento.pt.
//!
//! Each identifier in a range is fetched (through the shared page cache),
//! located field by field, and turned into an [`model::Initiative`] whose
//! timeline events carry typed payloads. Results are keyed by title and
//! written as JSON.

pub mod classify;
pub mod cli;
pub mod driver;
pub mod extract;
pub mod locator;
pub mod model;
pub mod output;
pub mod votes;

pub use driver::{scrape, CollisionPolicy, ScrapeError, ScrapeOptions, ScrapeReport};
pub use model::{EventPayload, Initiative, Reference, TimelineEvent, VoteTally};
