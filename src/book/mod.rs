use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::plugin::BookContainer;

/// An in-memory book container.
/// Hosts with their own storage implement [`BookContainer`] directly; this one
/// backs tests and embedders that already hold the files.
#[derive(Debug, Clone, Default)]
pub struct MemoryBook {
    pub manifest: Vec<ManifestItem>,
    pub resources: HashMap<String, Resource>,
    pub preferences: Option<Map<String, Value>>,
    /// Ids in the order they were written back.
    pub written: Vec<String>,
}

/// A manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

/// A resource (content document, stylesheet, image, ...)
#[derive(Debug, Clone)]
pub struct Resource {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl MemoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource and its manifest entry
    pub fn add_resource(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        data: impl Into<Vec<u8>>,
        media_type: impl Into<String>,
    ) {
        let id = id.into();
        let media_type = media_type.into();
        self.manifest.push(ManifestItem {
            id: id.clone(),
            href: href.into(),
            media_type: media_type.clone(),
        });
        self.resources.insert(id, Resource {
            data: data.into(),
            media_type,
        });
    }

    pub fn with_resource(
        mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        data: impl Into<Vec<u8>>,
        media_type: impl Into<String>,
    ) -> Self {
        self.add_resource(id, href, data, media_type);
        self
    }

    pub fn with_preferences(mut self, preferences: Map<String, Value>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Get a resource by id
    pub fn get_resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Resource content as text, for inspection after a run.
    pub fn text(&self, id: &str) -> Option<String> {
        self.get_resource(id)
            .map(|resource| String::from_utf8_lossy(&resource.data).into_owned())
    }
}

impl BookContainer for MemoryBook {
    fn css_iter(&self) -> Vec<(String, String)> {
        self.manifest
            .iter()
            .filter(|item| item.media_type.eq_ignore_ascii_case("text/css"))
            .map(|item| (item.id.clone(), item.href.clone()))
            .collect()
    }

    fn markup_iter(&self) -> Vec<(String, String, String)> {
        self.manifest
            .iter()
            .filter(|item| !item.media_type.eq_ignore_ascii_case("text/css"))
            .map(|item| (item.id.clone(), item.href.clone(), item.media_type.clone()))
            .collect()
    }

    fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        self.get_resource(id)
            .map(|resource| resource.data.clone())
            .ok_or_else(|| Error::MissingResource(id.to_string()))
    }

    fn write_file(&mut self, id: &str, text: &str) -> Result<()> {
        let resource = self
            .resources
            .get_mut(id)
            .ok_or_else(|| Error::MissingResource(id.to_string()))?;
        resource.data = text.as_bytes().to_vec();
        self.written.push(id.to_string());
        Ok(())
    }

    fn load_preferences(&self) -> Option<Map<String, Value>> {
        self.preferences.clone()
    }

    fn save_preferences(&mut self, prefs: Map<String, Value>) -> Result<()> {
        self.preferences = Some(prefs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> MemoryBook {
        MemoryBook::new()
            .with_resource("css", "Styles/style.css", "p {}", "text/css")
            .with_resource("c1", "Text/c1.xhtml", "<html/>", "application/xhtml+xml")
            .with_resource("img", "Images/a.png", vec![0u8, 1, 2], "image/png")
    }

    #[test]
    fn test_manifest_views() {
        let book = book();
        assert_eq!(
            book.css_iter(),
            [("css".to_string(), "Styles/style.css".to_string())]
        );
        let markup: Vec<_> = book.markup_iter().into_iter().map(|(id, ..)| id).collect();
        assert_eq!(markup, ["c1", "img"]);
    }

    #[test]
    fn test_read_and_write() {
        let mut book = book();
        assert_eq!(book.read_file("css").unwrap(), b"p {}");
        book.write_file("css", "a {}").unwrap();
        assert_eq!(book.text("css").as_deref(), Some("a {}"));
        assert_eq!(book.written, ["css"]);

        assert!(matches!(book.read_file("nope"), Err(Error::MissingResource(_))));
        assert!(book.write_file("nope", "").is_err());
    }

    #[test]
    fn test_preferences_storage() {
        let mut book = book();
        assert!(book.load_preferences().is_none());

        let mut prefs = Map::new();
        prefs.insert("indent".to_string(), Value::from("\t"));
        book.save_preferences(prefs.clone()).unwrap();
        assert_eq!(book.load_preferences(), Some(prefs));
    }
}
