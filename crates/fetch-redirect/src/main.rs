//! fetch-redirect: forward proxy hosting the redirecting fetch interceptor.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use fetch_redirect::config::ProxyConfig;
use fetch_redirect::server::{self, AppState};
use fetch_redirect::{Fetch, Interceptor, ReqwestFetcher};

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("FETCH_REDIRECT_CONFIG").ok())
        .unwrap_or_else(|| "fetch-redirect.toml".to_string());

    let fetch_url = args
        .iter()
        .position(|a| a == "--fetch")
        .and_then(|i| args.get(i + 1).cloned());

    let config = ProxyConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    // Build the tokio runtime first: the tonic gRPC exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = redirect_tracing::init_tracing(&config.tracing);

        // Install the interceptor exactly once; every caller shares it.
        let rule = config.redirect.rule()?;
        let upstream = ReqwestFetcher::with_timeout(Duration::from_secs(config.upstream.timeout_secs))?;
        let fetcher = Interceptor::new(upstream, rule);

        tracing::info!(
            config_path = %config_path,
            pattern = %fetcher.rule().pattern(),
            target = %fetcher.rule().target(),
            otlp_export = tracing_guard.exporting(),
            "Fetch interceptor installed"
        );

        match fetch_url {
            Some(url) => fetch_once(&fetcher, url).await,
            None => {
                tracing::info!(
                    listen_address = %config.server.listen_address,
                    timeout_secs = config.upstream.timeout_secs,
                    "Starting fetch-redirect proxy"
                );
                let state = AppState::new(fetcher, config.upstream.max_body_bytes);
                server::run(&config.server.listen_address, state).await
            }
        }
    })
}

/// Fetch `url` through the installed interceptor and copy the body to stdout.
async fn fetch_once<F: Fetch>(fetcher: &F, url: String) -> anyhow::Result<()> {
    let response = fetcher.fetch(url.as_str().into(), None).await?;
    let status = response.status;
    let body = response
        .bytes()
        .await
        .map_err(|e| anyhow::anyhow!("failed to read response body: {e}"))?;

    if !status.is_success() {
        anyhow::bail!("{url} returned {status}");
    }

    std::io::stdout().write_all(&body)?;
    Ok(())
}
