//! CurseForge addon API client

use anyhow::Context;
use modpull_core::http;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::catalog::CatalogClient;
use crate::config::CatalogSettings;
use crate::model::{CatalogItem, FileRecord};

/// Public addon API
pub const DEFAULT_API_URL: &str = "https://addons-ecs.forgesvc.net/api/v2";

#[derive(Debug, Deserialize)]
struct Game {
    id: u64,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Category {
    id: u64,
    name: String,
    slug: String,
    game_id: u64,
}

/// Parse a response body, naming the request in the error
fn decode<T: DeserializeOwned>(body: &str, what: &str) -> anyhow::Result<T> {
    serde_json::from_str(body).with_context(|| format!("Malformed {what} response"))
}

/// HTTP-backed catalog for one game section and game version
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    api_url: String,
    game_id: u64,
    section_id: u64,
    game_version: String,
}

impl HttpCatalog {
    /// Resolve the configured game and category slugs to ids
    pub fn connect(settings: &CatalogSettings, game_version: &str) -> anyhow::Result<Self> {
        let api_url = settings.api_url.trim_end_matches('/').to_string();

        log::info!("Requesting games from catalog");
        let body = http::get_text(&format!("{api_url}/game"), &[])
            .map_err(|e| anyhow::anyhow!("Game list request failed: {e}"))?;
        let games: Vec<Game> = decode(&body, "game list")?;
        let game_id = find_game(&games, &settings.game_slug)?;

        log::info!("Requesting categories from catalog");
        let body = http::get_text(&format!("{api_url}/category"), &[])
            .map_err(|e| anyhow::anyhow!("Category list request failed: {e}"))?;
        let categories: Vec<Category> = decode(&body, "category list")?;
        let section_id = find_category(&categories, game_id, &settings.category_slug)?;

        Ok(Self::new(api_url, game_id, section_id, game_version))
    }

    /// Catalog with already known ids
    pub fn new(api_url: String, game_id: u64, section_id: u64, game_version: &str) -> Self {
        Self {
            api_url,
            game_id,
            section_id,
            game_version: game_version.to_string(),
        }
    }

    /// Query of the search endpoint for one page
    fn search_query(&self, offset: usize, page_size: usize) -> Vec<(&'static str, String)> {
        vec![
            // the section id carries the category; categoryID stays 0
            ("categoryID", "0".to_string()),
            ("gameID", self.game_id.to_string()),
            ("gameVersion", self.game_version.clone()),
            ("pageSize", page_size.to_string()),
            ("index", offset.to_string()),
            ("sectionId", self.section_id.to_string()),
        ]
    }

    fn files_url(&self, item_id: u64) -> String {
        format!("{}/addon/{item_id}/files", self.api_url)
    }
}

fn find_game(games: &[Game], slug: &str) -> anyhow::Result<u64> {
    for game in games {
        log::debug!(
            "Found game {} (slug {}) with id {}",
            game.name,
            game.slug,
            game.id
        );
    }
    let game = games
        .iter()
        .find(|g| g.slug == slug)
        .with_context(|| format!("Game {slug:?} not found in catalog"))?;
    log::info!("Found {} with id {}", game.name, game.id);
    Ok(game.id)
}

fn find_category(categories: &[Category], game_id: u64, slug: &str) -> anyhow::Result<u64> {
    let category = categories
        .iter()
        .find(|c| c.game_id == game_id && c.slug == slug)
        .with_context(|| format!("Category {slug:?} not found for game {game_id}"))?;
    log::info!("Found {} category with id {}", category.name, category.id);
    Ok(category.id)
}

impl CatalogClient for HttpCatalog {
    fn list_page(&self, offset: usize, page_size: usize) -> anyhow::Result<Vec<CatalogItem>> {
        let url = format!("{}/addon/search", self.api_url);
        let body = http::get_text(&url, &self.search_query(offset, page_size))
            .map_err(|e| anyhow::anyhow!("Search request at index {offset} failed: {e}"))?;
        decode(&body, "search")
    }

    fn get_details(&self, ids: &[u64]) -> anyhow::Result<Vec<CatalogItem>> {
        let url = format!("{}/addon", self.api_url);
        let body = http::post_json(&url, &ids)
            .map_err(|e| anyhow::anyhow!("Detail request for {} ids failed: {e}", ids.len()))?;
        decode(&body, "addon detail")
    }

    fn list_files(&self, item_id: u64) -> anyhow::Result<Vec<FileRecord>> {
        let body = http::get_text(&self.files_url(item_id), &[])
            .map_err(|e| anyhow::anyhow!("File list request for {item_id} failed: {e}"))?;
        decode(&body, "file list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> HttpCatalog {
        HttpCatalog::new(DEFAULT_API_URL.to_string(), 432, 6, "1.12.2")
    }

    #[test]
    fn search_query_carries_filters() {
        let query = catalog().search_query(400, 200);
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("categoryID"), "0");
        assert_eq!(get("gameID"), "432");
        assert_eq!(get("sectionId"), "6");
        assert_eq!(get("gameVersion"), "1.12.2");
        assert_eq!(get("pageSize"), "200");
        assert_eq!(get("index"), "400");
    }

    #[test]
    fn files_url() {
        assert_eq!(
            catalog().files_url(238222),
            "https://addons-ecs.forgesvc.net/api/v2/addon/238222/files"
        );
    }

    #[test]
    fn finds_game_by_slug() {
        let games: Vec<Game> = decode(
            r#"[{"id":1,"name":"WoW","slug":"wow"},{"id":432,"name":"Minecraft","slug":"minecraft"}]"#,
            "game list",
        )
        .unwrap();
        assert_eq!(find_game(&games, "minecraft").unwrap(), 432);
        assert!(find_game(&games, "terraria").is_err());
    }

    #[test]
    fn finds_category_of_game() {
        let categories: Vec<Category> = decode(
            r#"[
                {"id":9,"name":"Mods","slug":"mc-mods","gameId":1},
                {"id":6,"name":"Mods","slug":"mc-mods","gameId":432},
                {"id":12,"name":"Texture Packs","slug":"texture-packs","gameId":432}
            ]"#,
            "category list",
        )
        .unwrap();
        assert_eq!(find_category(&categories, 432, "mc-mods").unwrap(), 6);
        assert!(find_category(&categories, 432, "worlds").is_err());
    }

    #[test]
    fn malformed_payload_is_error() {
        let err = decode::<Vec<CatalogItem>>("<html>maintenance</html>", "search").unwrap_err();
        assert!(err.to_string().contains("Malformed search response"));
    }

    #[test]
    fn search_page_decodes_items() {
        let items: Vec<CatalogItem> = decode(
            r#"[{"id":238222,"name":"Just Enough Items","slug":"jei","summary":"View items"}]"#,
            "search",
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "jei");
    }
}
