use gcore::GcoreProvider;
use std::path::PathBuf;
use tfplug::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries the plugin handshake, logs go to stderr
    let filter = std::env::var("TF_LOG_PROVIDER")
        .ok()
        .and_then(|level| EnvFilter::try_new(level.to_lowercase()).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = ServerConfig::default();
    if let (Ok(cert), Ok(key)) = (
        std::env::var("GCORE_PLUGIN_TLS_CERT"),
        std::env::var("GCORE_PLUGIN_TLS_KEY"),
    ) {
        config = config.with_tls(PathBuf::from(cert), PathBuf::from(key));
    }

    tfplug::serve(GcoreProvider::new(), config).await?;
    Ok(())
}
