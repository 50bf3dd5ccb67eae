use std::fs;
use std::time::Duration;

use signage_display::error::SourceError;
use signage_display::events::Topic;
use signage_display::source::ContentSource;
use signage_display::store::FileStore;
use tempfile::tempdir;
use tokio::sync::mpsc;

const CONTENT: &str = r#"
settings:
  advance-ms: 4000
  transition-seconds: 0.25
products:
  - { id: 1, name: "Espresso", price: 2.5, featured: true, special: true }
  - { id: 2, name: "Latte", featured: true }
  - { id: 3, name: "Mocha", featured: false }
  - { id: 4, name: "Cortado", featured: true, active: false }
categories:
  - { id: c3, name: "Pastries" }
  - { id: c1, name: "Coffee", display-order: 2 }
  - { id: c2, name: "Tea", display-order: 1 }
announcements:
  - { id: 10, title: "Open late", type: slide }
  - { id: 11, title: "Ticker", type: banner }
  - { id: 12, title: "Retired", type: slide, active: false }
  - { id: 13, title: "Mystery", type: popup }
"#;

fn store_with(text: &str) -> (tempfile::TempDir, FileStore) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("content.yaml");
    fs::write(&path, text).unwrap();
    (dir, FileStore::new(path))
}

fn ids<T>(records: &[T], id: impl Fn(&T) -> String) -> Vec<String> {
    records.iter().map(id).collect()
}

#[tokio::test]
async fn only_active_featured_products_are_returned() {
    let (_dir, store) = store_with(CONTENT);
    let products = store.fetch_featured_products().await.unwrap();
    assert_eq!(ids(&products, |p| p.id.to_string()), vec!["1", "2"]);
    assert!(products[0].special);
    assert_eq!(products[0].price, Some(2.5));
}

#[tokio::test]
async fn categories_are_ordered_with_unordered_last() {
    let (_dir, store) = store_with(CONTENT);
    let categories = store.fetch_categories().await.unwrap();
    assert_eq!(
        ids(&categories, |c| c.id.to_string()),
        vec!["c2", "c1", "c3"]
    );
}

#[tokio::test]
async fn only_active_slide_announcements_are_returned() {
    let (_dir, store) = store_with(CONTENT);
    let announcements = store.fetch_active_slide_announcements().await.unwrap();
    assert_eq!(ids(&announcements, |a| a.id.to_string()), vec!["10"]);
}

#[tokio::test]
async fn settings_section_resolves_against_defaults() {
    let (_dir, store) = store_with(CONTENT);
    let stored = store.fetch_settings().await.unwrap();
    assert_eq!(stored.advance_ms, Some(4000));
    assert_eq!(stored.auto_rotate, None);

    let settings = stored.resolve(&Default::default()).unwrap();
    assert_eq!(settings.advance, Duration::from_secs(4));
    assert_eq!(settings.transition, Duration::from_millis(250));
    assert!(settings.auto_rotate);
}

#[tokio::test]
async fn missing_sections_are_empty() {
    let (_dir, store) = store_with("products: []\n");
    assert!(store.fetch_categories().await.unwrap().is_empty());
    assert!(store.fetch_active_slide_announcements().await.unwrap().is_empty());
    assert_eq!(store.fetch_settings().await.unwrap(), Default::default());
}

#[tokio::test]
async fn malformed_section_fails_only_its_source() {
    let (_dir, store) = store_with(
        r#"
products: [ { name: "no id" } ]
categories: [ { id: 1, name: "Coffee" } ]
"#,
    );
    assert!(matches!(
        store.fetch_featured_products().await,
        Err(SourceError::Malformed(_))
    ));
    assert_eq!(store.fetch_categories().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path().join("absent.yaml"));
    assert!(matches!(
        store.fetch_categories().await,
        Err(SourceError::Io(_))
    ));
}

#[tokio::test]
async fn non_mapping_document_is_unavailable() {
    let (_dir, store) = store_with("- just\n- a list\n");
    assert!(matches!(
        store.fetch_settings().await,
        Err(SourceError::Unavailable(_))
    ));
}

#[tokio::test]
async fn hub_reaches_store_subscribers() {
    let (_dir, store) = store_with(CONTENT);
    let (tx, mut rx) = mpsc::channel(4);
    let subscription = store.subscribe(Topic::Categories, tx);

    assert_eq!(store.hub().publish(Topic::Products), 0);
    assert_eq!(store.hub().publish(Topic::Categories), 1);
    assert_eq!(rx.recv().await.map(|c| c.0), Some(Topic::Categories));

    subscription.unsubscribe();
    assert_eq!(store.hub().publish(Topic::Categories), 0);
}
