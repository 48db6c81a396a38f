//! Name and identifier resolution for ncli
//!
//! - **`ids`**: URL and raw identifier parsing
//! - **`aliases`**: title normalization and alias generation
//! - **`workspace`**: the persisted database name index
//! - **`resolver`**: the staged resolution pipeline

pub mod aliases;
pub mod ids;
pub mod resolver;
pub mod workspace;

pub use ids::{normalize_id, parse_input, ParsedInput};
pub use resolver::{RemoteLookup, ResourceResolver};
pub use workspace::{CachedEntry, MatchKind, WorkspaceCache, WORKSPACE_CACHE_VERSION};
