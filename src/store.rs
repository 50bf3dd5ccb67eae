use std::path::{Path, PathBuf};

use content_model::{Announcement, AnnouncementKind, Category, Product, StoredSettings};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use tokio::sync::mpsc::Sender;
use tracing::trace;

use crate::error::{SourceError, SourceResult};
use crate::events::{SourceChanged, Topic};
use crate::source::{ChangeHub, ContentSource, Subscription};

impl Topic {
    /// Top-level key of this topic's section in a content file.
    pub fn section_key(&self) -> &'static str {
        match self {
            Topic::Products => "products",
            Topic::Categories => "categories",
            Topic::Announcements => "announcements",
            Topic::Settings => "settings",
        }
    }
}

/// Content store backed by one YAML document:
///
/// ```yaml
/// settings:      { advance-ms: 8000, transition-seconds: 0.5, auto-rotate: true }
/// products:      [ { id: 1, name: "...", featured: true, special: false } ]
/// categories:    [ { id: 1, name: "...", display-order: 2 } ]
/// announcements: [ { id: 1, title: "...", type: slide, start-date: ..., end-date: ... } ]
/// ```
///
/// The file is read on every fetch and each section parses on its own, so a
/// malformed section only fails its own source.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    hub: ChangeHub,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hub: ChangeHub::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Publishing side used by the file watcher.
    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    /// Reads the document and splits it into its top-level sections.
    pub async fn read_sections(&self) -> SourceResult<Mapping> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_sections(&text)
    }

    async fn section<T>(&self, topic: Topic) -> SourceResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let sections = self.read_sections().await?;
        match sections.get(topic.section_key()) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => Ok(serde_yaml::from_value(value.clone())?),
        }
    }
}

pub fn parse_sections(text: &str) -> SourceResult<Mapping> {
    match serde_yaml::from_str::<Value>(text)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(SourceError::Unavailable(
            "content document must be a mapping".to_string(),
        )),
    }
}

impl ContentSource for FileStore {
    async fn fetch_featured_products(&self) -> SourceResult<Vec<Product>> {
        let mut products: Vec<Product> = self.section(Topic::Products).await?;
        products.retain(|p| p.active && p.featured);
        trace!(count = products.len(), "featured products fetched");
        Ok(products)
    }

    async fn fetch_categories(&self) -> SourceResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.section(Topic::Categories).await?;
        categories.sort_by_key(|c| (c.display_order.is_none(), c.display_order));
        trace!(count = categories.len(), "categories fetched");
        Ok(categories)
    }

    async fn fetch_active_slide_announcements(&self) -> SourceResult<Vec<Announcement>> {
        let mut announcements: Vec<Announcement> = self.section(Topic::Announcements).await?;
        announcements.retain(|a| a.active && a.kind == AnnouncementKind::Slide);
        trace!(count = announcements.len(), "slide announcements fetched");
        Ok(announcements)
    }

    async fn fetch_settings(&self) -> SourceResult<StoredSettings> {
        self.section(Topic::Settings).await
    }

    fn subscribe(&self, topic: Topic, tx: Sender<SourceChanged>) -> Subscription {
        self.hub.subscribe(topic, tx)
    }
}
