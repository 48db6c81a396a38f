use clap::Subcommand;

pub mod cache;
pub mod resolve;
pub mod workspace;

use self::cache::CacheCommands;
use self::workspace::WorkspaceCommands;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect and maintain the response cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Resolve a URL, identifier or name to a canonical identifier
    Resolve {
        /// URL, 32-character identifier, or database name
        input: String,

        /// Resource kind the input refers to (page, database, data_source, block, user);
        /// defaults to database for names, the kind the offline index holds, and page otherwise
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Inspect the workspace name index
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
}
