use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    entity_cli::main_entry().await
}
