//! Path model turning host-specific selections into logical source items.
//!
//! Splitting raw host paths and classifying them against the user home are kept in
//! separate submodules so the syntax handling can be tested without touching the
//! filesystem. Only [`normalize`] performs the existence check.

mod host;
mod normalize;

pub use host::{HostPath, split_host_path};
pub use normalize::{classify, normalize, normalize_all};
