//! Groupsnap core: pure domain model and filename policy (no I/O).
mod media;
mod model;
mod sanitize;

pub use media::{resolve_path, ExtensionRule, MediaKind, MediaRules, UNKNOWN_HASH};
pub use model::{GroupState, MediaItem, TokenRecord};
pub use sanitize::{sanitize_dir_name, sanitize_name, sanitize_user_name, UNKNOWN_USER};
