use crate::commands::Commands;
use crate::runtime::Runtime;
use ncli_core::Result;
use serde_json::Value;

impl Commands {
    /// Run the command and return its JSON result
    pub async fn run(self, runtime: &Runtime) -> Result<Value> {
        match self {
            Commands::Cache { command } => command.run(runtime).await,
            Commands::Resolve { input, kind } => {
                crate::commands::resolve::run(runtime, &input, kind.as_deref()).await
            }
            Commands::Workspace { command } => command.run(runtime).await,
        }
    }

    /// Run the command and print its result on stdout
    pub async fn execute(self, runtime: &Runtime) -> eyre::Result<()> {
        let output = self.run(runtime).await?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
