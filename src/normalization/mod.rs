pub mod flatten;
pub mod name;

pub use flatten::{flatten, unflatten, FlatPaths};
pub use name::{canonical_name, canonical_name_opt};
