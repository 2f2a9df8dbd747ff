//! End-to-end lifecycle against a running Pagent OS service.
//!
//! Captures a snapshot of a URL, trains an extraction definition for a
//! goal, executes it, and prints the run output with its drift flag.
//!
//! ```bash
//! PAGENT_BASE_URL=http://localhost:8101 \
//!     cargo run --example lifecycle -- https://example.com "extract the page title"
//! ```

use pagemill::{FetchMeta, MemoryStore, OwnerId, PageFetcher, Pagination, Pipeline};
use pagent_client::PagentClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pagemill=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "https://example.com".into());
    let goal = args
        .next()
        .unwrap_or_else(|| "extract the page title and main links".into());

    let client = PagentClient::from_env()?;
    let fetcher = PagentClient::from_env()?;
    let pipeline = Pipeline::new(MemoryStore::new(), client);
    let owner = OwnerId::new();

    let page = pipeline.create_page(owner, url.as_str()).await?;
    println!("page {}: {}", page.id, page.url);

    let fetched = fetcher.fetch(&url).await?;
    let meta = FetchMeta {
        content_type: Some("text/html".into()),
        ..fetched.meta
    };
    let snapshot = pipeline
        .create_snapshot(owner, page.id, fetched.html, meta)
        .await?;
    println!(
        "snapshot {} ({} bytes, hash {})",
        snapshot.id,
        snapshot.html.len(),
        &snapshot.content_hash[..12]
    );

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, goal.as_str())
        .await?;
    println!("definition {} trained for goal: {goal}", definition.id);
    if let Some(schema) = &definition.output_schema {
        println!("declared schema: {}", serde_json::to_string_pretty(schema)?);
    }

    let run = pipeline.execute(owner, definition.id, snapshot.id).await?;
    println!("run {} (drifted: {:?})", run.id, run.drifted);
    println!("{}", serde_json::to_string_pretty(&run.output)?);

    let runs = pipeline
        .list_runs(owner, definition.id, &Pagination::first_page())
        .await?;
    println!("{} run(s) recorded for this definition", runs.len());

    Ok(())
}
