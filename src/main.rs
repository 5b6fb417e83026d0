#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = essay_feedback::run().await {
        eprintln!("essay-feedback fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
