/// Smoke-test for `BrowserExtractor`.
///
/// Launches a headless Chromium against a live listing page (no proxy) and
/// prints the raw bag and the text that would be handed to the formatter.
///
/// Run with:
///   cargo run -p domus-client --example extract_smoke -- <listing-url>
use domus_client::{BrowserExtractor, ProxyConfig, SessionConfig};
use domus_core::registry::{Strategy, StrategyRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let url = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: extract_smoke <listing-url>"))?;

    let strategy = StrategyRegistry::default().resolve(&url);
    if strategy == Strategy::Unhandled {
        anyhow::bail!("No handler for {url}");
    }

    let extractor = BrowserExtractor::new(SessionConfig::new(), ProxyConfig::direct());
    println!("Extracting {url} with strategy {strategy}…");
    let bag = strategy.extract(&extractor, &url).await;

    println!("{}", serde_json::to_string_pretty(&bag)?);
    println!("--- formatter input ---\n{}", bag.render_text());
    Ok(())
}
