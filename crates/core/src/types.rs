//! Domain types shared across the workspace

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote resource families addressed by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Page,
    /// Container of one or more data sources
    Database,
    /// Queryable child of a database
    DataSource,
    Block,
    User,
}

impl ResourceKind {
    /// Cache namespace and API object name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Page => "page",
            ResourceKind::Database => "database",
            ResourceKind::DataSource => "data_source",
            ResourceKind::Block => "block",
            ResourceKind::User => "user",
        }
    }

    /// Human-facing name used in error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::DataSource => "data source",
            other => other.as_str(),
        }
    }

    /// Object value accepted by the remote search filter
    pub fn search_object(&self) -> &'static str {
        match self {
            ResourceKind::Database | ResourceKind::DataSource => "data_source",
            _ => "page",
        }
    }

    /// Kinds whose user-facing ID may name the container instead of the leaf
    pub fn is_container(&self) -> bool {
        matches!(self, ResourceKind::Database)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "page" | "pages" => Ok(ResourceKind::Page),
            "database" | "databases" | "db" => Ok(ResourceKind::Database),
            "data_source" | "datasource" => Ok(ResourceKind::DataSource),
            "block" | "blocks" => Ok(ResourceKind::Block),
            "user" | "users" => Ok(ResourceKind::User),
            other => Err(crate::Error::configuration(format!(
                "unknown resource kind '{other}'"
            ))),
        }
    }
}
