//! Listener setup: plain HTTP, or HTTPS terminated with native-tls.

use anyhow::Context;
use axum::{extract::ConnectInfo, Router};
use hyper::{body::Incoming, service::service_fn, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::net::SocketAddr;
use tokio::{net::TcpListener, signal};
use tower::ServiceExt;
use tracing::{debug, error, info, warn};
use usermgmt_core::config::{ServerSettings, TlsSettings};

/// Serves `app` until SIGINT or SIGTERM.
///
/// # Errors
///
/// Fails if the listener cannot be bound or the TLS material cannot be loaded.
pub async fn serve(app: Router, settings: &ServerSettings) -> anyhow::Result<()> {
    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    let local_addr = listener.local_addr()?;

    match &settings.tls {
        None => {
            info!(addr = %local_addr, "listening (http)");
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;
        }
        Some(tls) => {
            let acceptor = tls_acceptor(tls)?;
            info!(addr = %local_addr, "listening (https)");
            serve_tls(listener, acceptor, app).await;
        }
    }

    info!("server stopped");
    Ok(())
}

fn tls_acceptor(tls: &TlsSettings) -> anyhow::Result<tokio_native_tls::TlsAcceptor> {
    let certificate = std::fs::read(&tls.certificate)
        .with_context(|| format!("failed to read {}", tls.certificate.display()))?;
    let private_key = std::fs::read(&tls.private_key)
        .with_context(|| format!("failed to read {}", tls.private_key.display()))?;

    let identity = native_tls::Identity::from_pkcs8(&certificate, &private_key)
        .context("invalid TLS certificate or private key")?;
    let acceptor = native_tls::TlsAcceptor::new(identity).context("failed to build TLS acceptor")?;
    Ok(tokio_native_tls::TlsAcceptor::from(acceptor))
}

async fn serve_tls(listener: TcpListener, acceptor: tokio_native_tls::TlsAcceptor, app: Router) {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("accept failed: {err}");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(err) => {
                    debug!(%peer, "TLS handshake failed: {err}");
                    return;
                }
            };

            let service = service_fn(move |mut request: Request<Incoming>| {
                request.extensions_mut().insert(ConnectInfo(peer));
                app.clone().oneshot(request)
            });

            if let Err(err) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, "connection closed with error: {err}");
            }
        });
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
