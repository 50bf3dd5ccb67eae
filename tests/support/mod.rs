#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use content_model::{
    Announcement, AnnouncementKind, Category, Product, RecordId, StoredSettings,
};
use signage_display::error::{SourceError, SourceResult};
use signage_display::events::{DisplayFrame, EngineCommand, SourceChanged, Topic};
use signage_display::navigation::Navigator;
use signage_display::settings::SettingsProvider;
use signage_display::source::{ChangeHub, ContentSource, Subscription};
use signage_display::tasks::manager::{self, EngineOptions};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub fn product(id: &str, special: bool) -> Product {
    Product {
        id: RecordId::from(id),
        name: format!("Product {id}"),
        description: None,
        price: Some(4.5),
        image_url: None,
        category_id: None,
        active: true,
        featured: true,
        special,
    }
}

pub fn category(id: &str, order: Option<i64>) -> Category {
    Category {
        id: RecordId::from(id),
        name: format!("Category {id}"),
        description: None,
        image_url: None,
        display_order: order,
    }
}

pub fn announcement(id: &str) -> Announcement {
    Announcement {
        id: RecordId::from(id),
        title: format!("Announcement {id}"),
        body: None,
        image_url: None,
        kind: AnnouncementKind::Slide,
        active: true,
        start_date: None,
        end_date: None,
    }
}

pub fn stored_settings(advance_ms: u64, auto_rotate: bool) -> StoredSettings {
    StoredSettings {
        advance_ms: Some(advance_ms),
        transition_seconds: Some(0.5),
        auto_rotate: Some(auto_rotate),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub announcements: Vec<Announcement>,
    pub settings: StoredSettings,
    pub fail_products: bool,
    pub fail_categories: bool,
    pub fail_announcements: bool,
    pub fail_settings: bool,
    pub settings_fetches: usize,
}

impl MemoryState {
    pub fn fail_all_content(&mut self, fail: bool) {
        self.fail_products = fail;
        self.fail_categories = fail;
        self.fail_announcements = fail;
    }
}

/// In-memory source whose contents and failures the test controls.
pub struct MemorySource {
    hub: ChangeHub,
    state: Mutex<MemoryState>,
}

impl MemorySource {
    pub fn new(state: MemoryState) -> Arc<Self> {
        Arc::new(Self {
            hub: ChangeHub::new(),
            state: Mutex::new(state),
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut MemoryState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn notify(&self, topic: Topic) -> usize {
        self.hub.publish(topic)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn settings_fetches(&self) -> usize {
        self.state.lock().unwrap().settings_fetches
    }

    fn read<T>(&self, failed: impl Fn(&MemoryState) -> bool, f: impl Fn(&MemoryState) -> T) -> SourceResult<T> {
        let state = self.state.lock().unwrap();
        if failed(&state) {
            return Err(SourceError::Unavailable("simulated outage".to_string()));
        }
        Ok(f(&state))
    }
}

impl ContentSource for MemorySource {
    async fn fetch_featured_products(&self) -> SourceResult<Vec<Product>> {
        self.read(
            |s| s.fail_products,
            |s| {
                s.products
                    .iter()
                    .filter(|p| p.active && p.featured)
                    .cloned()
                    .collect()
            },
        )
    }

    async fn fetch_categories(&self) -> SourceResult<Vec<Category>> {
        self.read(|s| s.fail_categories, |s| s.categories.clone())
    }

    async fn fetch_active_slide_announcements(&self) -> SourceResult<Vec<Announcement>> {
        self.read(
            |s| s.fail_announcements,
            |s| {
                s.announcements
                    .iter()
                    .filter(|a| a.active && a.kind == AnnouncementKind::Slide)
                    .cloned()
                    .collect()
            },
        )
    }

    async fn fetch_settings(&self) -> SourceResult<StoredSettings> {
        let mut state = self.state.lock().unwrap();
        state.settings_fetches += 1;
        if state.fail_settings {
            return Err(SourceError::Unavailable("simulated outage".to_string()));
        }
        Ok(state.settings.clone())
    }

    fn subscribe(&self, topic: Topic, tx: mpsc::Sender<SourceChanged>) -> Subscription {
        self.hub.subscribe(topic, tx)
    }
}

pub type ProductResponder = oneshot::Sender<Vec<Product>>;

/// Source whose product fetches block until the test answers them, in any
/// order. Everything else resolves immediately and empty.
pub struct GatedSource {
    hub: ChangeHub,
    requests: mpsc::UnboundedSender<ProductResponder>,
}

impl GatedSource {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ProductResponder>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Arc::new(Self {
            hub: ChangeHub::new(),
            requests: tx,
        });
        (source, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

impl ContentSource for GatedSource {
    async fn fetch_featured_products(&self) -> SourceResult<Vec<Product>> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(tx)
            .map_err(|_| SourceError::Unavailable("test harness gone".to_string()))?;
        rx.await
            .map_err(|_| SourceError::Unavailable("gate dropped".to_string()))
    }

    async fn fetch_categories(&self) -> SourceResult<Vec<Category>> {
        Ok(Vec::new())
    }

    async fn fetch_active_slide_announcements(&self) -> SourceResult<Vec<Announcement>> {
        Ok(Vec::new())
    }

    async fn fetch_settings(&self) -> SourceResult<StoredSettings> {
        Ok(StoredSettings::default())
    }

    fn subscribe(&self, topic: Topic, tx: mpsc::Sender<SourceChanged>) -> Subscription {
        self.hub.subscribe(topic, tx)
    }
}

pub struct Harness {
    pub navigator: Navigator,
    pub frames: watch::Receiver<DisplayFrame>,
    pub cancel: CancellationToken,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

pub fn spawn_engine<S: ContentSource>(source: Arc<S>, options: EngineOptions) -> Harness {
    spawn_engine_with_ttl(source, options, Duration::from_secs(60))
}

pub fn spawn_engine_with_ttl<S: ContentSource>(
    source: Arc<S>,
    options: EngineOptions,
    settings_ttl: Duration,
) -> Harness {
    let settings = SettingsProvider::new(Arc::clone(&source), options.initial_settings, settings_ttl);
    let (command_tx, command_rx) = mpsc::channel::<EngineCommand>(16);
    let (frame_tx, frames) = watch::channel(DisplayFrame::startup());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager::run(
        source,
        settings,
        options,
        command_rx,
        frame_tx,
        cancel.clone(),
    ));
    Harness {
        navigator: Navigator::new(command_tx),
        frames,
        cancel,
        handle,
    }
}

impl Harness {
    /// Waits for a frame matching `pred`. Generous timeout so paused-clock
    /// tests can let auto-advance timers fire first.
    pub async fn wait(&mut self, pred: impl FnMut(&DisplayFrame) -> bool) -> DisplayFrame {
        tokio::time::timeout(Duration::from_secs(600), self.frames.wait_for(pred))
            .await
            .expect("timeout waiting for frame")
            .expect("engine stopped publishing")
            .clone()
    }

    pub fn latest(&self) -> DisplayFrame {
        self.frames.borrow().clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.handle
            .await
            .expect("engine task panicked")
            .expect("engine returned error");
    }
}
