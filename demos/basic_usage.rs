//! Basic usage example for the Trove Master library.
//!
//! Searches newspapers for a phrase, walks a few pages, then fetches the
//! full text of the first article found.
//!
//! ```sh
//! TROVE_API_KEY=... cargo run --example basic_usage
//! ```

use trove_master::models::{Category, SearchQuery, SortBy};
use trove_master::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::from_env()?;
    let session = client.open()?;

    let query = SearchQuery::new()
        .text("\"Dunbar\" wreck")
        .category(Category::Newspaper)
        .filter("decade", "185")
        .sort(SortBy::DateAsc)
        .page_size(10);

    println!("{} matching articles", query.count(&client).await?);

    let mut first_article = None;
    let mut pages = query.pages(&client)?;
    while let Some(page) = pages.next().await {
        let page = page?;
        for record in page.records() {
            println!(
                "  {} {} {}",
                record.id(),
                record.date().unwrap_or_default(),
                record.title().unwrap_or("(untitled)")
            );
            first_article.get_or_insert_with(|| record.id().to_string());
        }
        // stop after three pages
        if pages.fetched() >= 3 {
            break;
        }
    }

    if let Some(id) = first_article {
        match client.get_derived_text(Category::Newspaper, &id).await? {
            Some(text) => println!("\nFull text of {}:\n{}", id, text),
            None => println!("\nNo full text for {}", id),
        }
    }

    let stats = client.stats();
    println!(
        "\n{} requests sent, {} cache hits",
        stats.transport_calls, stats.cache_hits
    );

    session.close();
    Ok(())
}
