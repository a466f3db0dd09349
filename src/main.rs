use gateway::cli;
use gateway::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::Cli::run().await
}
