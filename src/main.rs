#[tokio::main]
async fn main() -> anyhow::Result<()> {
    uiforge_lib::run().await
}
