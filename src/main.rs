#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = trainhub_rust::run().await {
        eprintln!("trainhub-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
