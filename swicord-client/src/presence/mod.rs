//! Presence payloads and the periodic updater.

mod auto;
mod builder;

pub use auto::{AutoPresence, DEFAULT_AUTO_UPDATE_INTERVAL};
pub use builder::build_presence_update;
