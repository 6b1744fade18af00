//! Plugin process entry point
//!
//! Binds a loopback listener, prints the go-plugin handshake line on stdout
//! and serves the Provider and GRPCController services until Terraform asks
//! the plugin to shut down.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::plugin::grpc_controller_server::{GrpcController, GrpcControllerServer};
use crate::proto::plugin::Empty;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{info, warn};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";
pub const CORE_PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_VERSION: u32 = 6;

/// PEM files for serving over TLS
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Serve plaintext when unset
    pub tls: Option<TlsPaths>,
    pub max_message_size: usize,
    /// How long in-flight RPCs may run after shutdown is requested
    pub shutdown_timeout: Duration,
    /// Skip the magic cookie check, for running the binary by hand
    pub skip_cookie_check: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tls: None,
            max_message_size: 256 << 20,
            shutdown_timeout: Duration::from_secs(30),
            skip_cookie_check: false,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tls(mut self, cert_path: PathBuf, key_path: PathBuf) -> Self {
        self.tls = Some(TlsPaths {
            cert_path,
            key_path,
        });
        self
    }
}

/// Fails unless the process was launched by Terraform.
pub fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::HandshakeError(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

/// The line go-plugin reads from stdout to find the server
pub fn handshake_line(addr: &std::net::SocketAddr) -> String {
    format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    )
}

/// Implements go-plugin's GRPCController so Terraform can stop the plugin.
struct Controller {
    shutdown: watch::Sender<bool>,
}

#[tonic::async_trait]
impl GrpcController for Controller {
    async fn shutdown(
        &self,
        _request: tonic::Request<Empty>,
    ) -> std::result::Result<tonic::Response<Empty>, tonic::Status> {
        info!("shutdown requested by terraform");
        let _ = self.shutdown.send(true);
        Ok(tonic::Response::new(Empty {}))
    }
}

async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if !config.skip_cookie_check {
        check_magic_cookie()?;
    }

    let provider_service = ProviderServer::new(GrpcProviderServer::new(provider).await)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = GrpcControllerServer::new(Controller {
        shutdown: shutdown_tx,
    });

    let mut builder = Server::builder();
    if let Some(tls) = &config.tls {
        // Ignored when another crate already installed a provider
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let cert = tokio::fs::read(&tls.cert_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
        let key = tokio::fs::read(&tls.key_path)
            .await
            .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;
        builder = builder.tls_config(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))?;
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    info!(%addr, tls = config.tls.is_some(), "provider server listening");

    println!("{}", handshake_line(&addr));

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let server = builder
        .add_service(provider_service)
        .add_service(controller)
        .serve_with_incoming_shutdown(incoming, shutdown_signal(shutdown_rx.clone()));
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = shutdown_signal(shutdown_rx) => {
            match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(
                    timeout = ?config.shutdown_timeout,
                    "in-flight requests did not finish before shutdown timeout"
                ),
            }
        }
    }

    info!("provider server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn handshake_line_format() {
        let addr: std::net::SocketAddr = "127.0.0.1:41234".parse().unwrap();
        assert_eq!(handshake_line(&addr), "1|6|tcp|127.0.0.1:41234|grpc");
    }

    #[test]
    #[serial]
    fn magic_cookie_is_required() {
        std::env::remove_var(MAGIC_COOKIE_KEY);
        assert!(matches!(
            check_magic_cookie(),
            Err(TfplugError::HandshakeError(_))
        ));

        std::env::set_var(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE);
        assert!(check_magic_cookie().is_ok());
        std::env::remove_var(MAGIC_COOKIE_KEY);
    }

    #[tokio::test]
    async fn controller_shutdown_trips_signal() {
        let (tx, rx) = watch::channel(false);
        let controller = Controller { shutdown: tx };

        controller
            .shutdown(tonic::Request::new(Empty {}))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), shutdown_signal(rx))
            .await
            .unwrap();
    }

    #[test]
    fn default_config_is_plaintext() {
        let config = ServerConfig::default();
        assert!(config.tls.is_none());
        assert_eq!(config.max_message_size, 256 << 20);
    }
}
