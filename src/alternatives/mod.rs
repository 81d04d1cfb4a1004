//! Suggest Linux packages for applications detected on the source machine.
//!
//! The table is an immutable mapping from normalized display names to a package and an
//! optional install hint. Every lookup is total: a miss returns
//! [`Resolution::unmapped`](crate::models::Resolution::unmapped) instead of an error, and
//! the resolver never checks whether the package exists in the target repositories.

mod normalize;
mod resolver;
mod table;

pub use normalize::normalize_app_name;
pub use resolver::{resolve, resolve_with};
pub use table::{AlternativeMapping, AlternativeTable};
