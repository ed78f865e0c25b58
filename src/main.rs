#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wordsmith_quota::server::run().await
}
