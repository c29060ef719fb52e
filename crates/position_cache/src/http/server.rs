use anyhow::Context;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serve `router` on `addr` until `ctx` is cancelled, then drain in-flight requests.
pub async fn run_http_server(
    router: Router,
    addr: String,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;

    info!(address = %addr, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ctx.cancelled().await })
        .await
        .context("HTTP server error")?;

    info!("HTTP API stopped");
    Ok(())
}
