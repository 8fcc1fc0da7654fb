//! Category catalog discovery
//!
//! The catalog is built once. A non-empty catalog collection is taken as
//! already discovered and returned as stored.

use crate::config::SiteConfig;
use crate::crawler::extractor::{parse_category_tiles, parse_page_count};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::model::Category;
use crate::storage::Storage;
use crate::HarvestError;

/// Builds the category list from the index page
///
/// Each tile costs one extra fetch of its first listing page to read the
/// pagination control. When that fetch fails or the control is unreadable
/// the category gets a single page.
pub async fn extract_categories<F>(
    fetcher: &F,
    index_html: &str,
    site: &SiteConfig,
) -> Result<Vec<Category>, HarvestError>
where
    F: Fetcher + ?Sized,
{
    let tiles = parse_category_tiles(index_html, site)?;
    let mut categories = Vec::with_capacity(tiles.len());

    for (name, listing_path) in tiles {
        let page_count = match fetcher.fetch(&listing_path).await {
            Ok(body) => parse_page_count(&body).unwrap_or_else(|| {
                tracing::debug!("No page count for category {}, assuming 1", name);
                1
            }),
            Err(e) => {
                tracing::warn!("Could not read page count for category {}: {}", name, e);
                1
            }
        };

        tracing::debug!("Category {}: {} pages", name, page_count);
        categories.push(Category {
            name,
            listing_path,
            page_count,
        });
    }

    Ok(categories)
}

/// Returns the category catalog, discovering and storing it on first use
///
/// # Arguments
///
/// * `fetcher` - Source of the index and listing pages
/// * `storage` - Destination of the catalog
/// * `site` - Site layout
/// * `collection` - Name of the catalog collection
///
/// # Returns
///
/// * `Ok(Vec<Category>)` - Stored or freshly discovered categories
/// * `Err(HarvestError)` - Any failure; discovery is not retried
pub async fn discover_and_persist_categories<F, S>(
    fetcher: &F,
    storage: &mut S,
    site: &SiteConfig,
    collection: &str,
) -> Result<Vec<Category>, HarvestError>
where
    F: Fetcher + ?Sized,
    S: Storage + ?Sized,
{
    if storage.count(collection)? > 0 {
        let categories = storage
            .find_all(collection)?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Category>, _>>()?;

        tracing::info!(
            "Catalog already discovered: {} categories in '{}'",
            categories.len(),
            collection
        );
        return Ok(categories);
    }

    tracing::info!("Discovering categories from {}", site.index_path);
    let index_html = fetcher.fetch(&site.index_path).await?;
    let categories = extract_categories(fetcher, &index_html, site).await?;

    let documents = categories
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    storage.insert_many(collection, &documents)?;

    tracing::info!("Discovered {} categories", categories.len());
    Ok(categories)
}
