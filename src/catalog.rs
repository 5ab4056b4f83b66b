use crate::models::{Category, EndpointDescriptor};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The endpoint catalog (`settings.json`).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

/// A descriptor together with the category it was listed under.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry<'a> {
    pub index: usize,
    pub category: &'a str,
    pub descriptor: &'a EndpointDescriptor,
}

impl Catalog {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("catalog is not a valid endpoint list")
    }

    /// Every descriptor, numbered from 1 in listing order.
    pub fn entries(&self) -> Vec<CatalogEntry<'_>> {
        self.categories
            .iter()
            .flat_map(|cat| cat.items.iter().map(move |d| (cat.name.as_str(), d)))
            .enumerate()
            .map(|(i, (category, descriptor))| CatalogEntry {
                index: i + 1,
                category,
                descriptor,
            })
            .collect()
    }

    /// Looks up by 1-based index or by case-insensitive name.
    pub fn find(&self, key: &str) -> Option<&EndpointDescriptor> {
        let key = key.trim();
        let entries = self.entries();
        if let Ok(index) = key.parse::<usize>() {
            return entries.iter().find(|e| e.index == index).map(|e| e.descriptor);
        }
        entries
            .iter()
            .find(|e| e.descriptor.name.eq_ignore_ascii_case(key))
            .map(|e| e.descriptor)
    }

    pub fn by_category(&self, category: &str) -> Vec<CatalogEntry<'_>> {
        self.entries()
            .into_iter()
            .filter(|e| category.eq_ignore_ascii_case("all") || e.category.eq_ignore_ascii_case(category))
            .collect()
    }

    /// Case-insensitive substring match over name, path and description.
    pub fn search(&self, query: &str) -> Vec<CatalogEntry<'_>> {
        let query = query.trim().to_lowercase();
        self.entries()
            .into_iter()
            .filter(|e| {
                let d = e.descriptor;
                [&d.name, &d.path, &d.desc]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .collect()
    }
}

/// Loads the catalog from a file path or an `http(s)` URL.
pub async fn load_catalog(source: &str) -> Result<Catalog> {
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        reqwest::get(source)
            .await
            .with_context(|| format!("failed to fetch catalog from {}", source))?
            .error_for_status()
            .with_context(|| format!("catalog server returned an error for {}", source))?
            .text()
            .await
            .context("failed to read catalog body")?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("failed to read catalog file {}", source))?
    };

    let catalog = Catalog::parse(&text)?;
    tracing::info!(
        "Loaded {} endpoints in {} categories from {}",
        catalog.entries().len(),
        catalog.categories.len(),
        source
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"{
        "categories": [
            { "name": "Downloader", "items": [
                { "name": "YouTube MP3", "path": "/api/download/ytmp3?url=https://youtu.be/abc123",
                  "params": { "url": "YouTube link" }, "desc": "Convert a video to mp3" }
            ]},
            { "name": "Tools", "items": [
                { "name": "Ping", "path": "/api/ping", "method": "GET" }
            ]}
        ]
    }"#;

    #[test]
    fn entries_are_numbered_across_categories() {
        let catalog = Catalog::parse(SETTINGS).unwrap();
        let entries = catalog.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].category, "Tools");
    }

    #[test]
    fn find_by_index_or_name() {
        let catalog = Catalog::parse(SETTINGS).unwrap();
        assert_eq!(catalog.find("2").map(|d| d.name.as_str()), Some("Ping"));
        assert_eq!(catalog.find("youtube mp3").map(|d| d.name.as_str()), Some("YouTube MP3"));
        assert!(catalog.find("9").is_none());
    }

    #[test]
    fn search_and_filter() {
        let catalog = Catalog::parse(SETTINGS).unwrap();
        assert_eq!(catalog.search("MP3").len(), 1);
        assert_eq!(catalog.search("/api/").len(), 2);
        assert_eq!(catalog.by_category("tools").len(), 1);
        assert_eq!(catalog.by_category("All").len(), 2);
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        assert!(Catalog::parse("{\"categories\": 3}").is_err());
        assert!(Catalog::parse("<html>").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = load_catalog("/definitely/not/here/settings.json").await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to read catalog file"));
    }
}
