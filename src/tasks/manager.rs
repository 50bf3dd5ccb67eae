use crate::compose::{compose, next_window_change};
use crate::error::SourceResult;
use crate::events::{DisplayFrame, DisplayStatus, EngineCommand, FrameCause, SourceChanged, Topic};
use crate::guard::{CycleTicket, LifecycleGuard};
use crate::rotation::{ManualNavPolicy, Rotation};
use crate::settings::SettingsProvider;
use crate::source::ContentSource;
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use content_model::{Announcement, Category, Product, Settings};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc::{self, Receiver};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const CHANGE_QUEUE: usize = 32;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Used until the first settings fetch lands.
    pub initial_settings: Settings,
    pub manual_nav: ManualNavPolicy,
    /// Delay before re-aggregating after a cycle in which a source failed.
    pub retry_after: Duration,
    /// Starts the announcement-window clock at this instant instead of the
    /// wall clock; it then runs forward with the engine's own clock.
    pub now_override: Option<DateTime<Utc>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            initial_settings: Settings::default(),
            manual_nav: ManualNavPolicy::default(),
            retry_after: Duration::from_secs(30),
            now_override: None,
        }
    }
}

/// Result of one aggregation cycle; every fetch has settled.
struct CycleOutcome {
    ticket: CycleTicket,
    settings: Settings,
    products: SourceResult<Vec<Product>>,
    categories: SourceResult<Vec<Category>>,
    announcements: SourceResult<Vec<Announcement>>,
}

/// Most recent successful result per source.
#[derive(Default)]
struct LastGood {
    products: Option<Vec<Product>>,
    categories: Option<Vec<Category>>,
    announcements: Option<Vec<Announcement>>,
}

impl LastGood {
    fn any_loaded(&self) -> bool {
        self.products.is_some() || self.categories.is_some() || self.announcements.is_some()
    }
}

/// Owns the rotation and serializes everything that may change it.
///
/// Rules:
/// - On start, subscribe to every topic and run one aggregation cycle.
/// - A change notification or `Refresh` starts a new cycle; a settings change
///   also invalidates the settings cache first.
/// - A cycle fetches settings and the three sources concurrently and commits
///   all of them at once, only if no newer cycle started meanwhile.
/// - A failing source keeps its last good records; any failure arms a single
///   retry timer.
/// - Announcement windows are re-checked locally at the next start or end
///   bound, without fetching.
/// - Timer ticks and manual commands mutate the current slide through the
///   same `Rotation` methods, one message at a time.
/// - On cancel, subscriptions are released, in-flight cycles aborted and all
///   timers dropped; nothing is published afterwards.
#[instrument(skip_all)]
pub async fn run<S: ContentSource>(
    source: Arc<S>,
    settings: SettingsProvider<S>,
    options: EngineOptions,
    mut commands: Receiver<EngineCommand>,
    frames: watch::Sender<DisplayFrame>,
    cancel: CancellationToken,
) -> Result<()> {
    let (change_tx, mut change_rx) = mpsc::channel::<SourceChanged>(CHANGE_QUEUE);
    let mut guard = LifecycleGuard::new();
    for topic in Topic::ALL {
        guard.hold(source.subscribe(topic, change_tx.clone()));
    }
    drop(change_tx);

    let mut engine = Engine {
        rotation: Rotation::new(options.initial_settings, options.manual_nav),
        last_good: LastGood::default(),
        loading: false,
        retry_at: None,
        window_at: None,
        clock_origin: Instant::now(),
        cycles: JoinSet::new(),
        options,
        frames,
    };
    engine.start_cycle(&mut guard, &source, &settings, "startup");

    loop {
        let advance_at = engine.rotation.deadline();
        let retry_at = engine.retry_at;
        let window_at = engine.window_at;

        select! {
            _ = cancel.cancelled() => break,

            Some(SourceChanged(topic)) = change_rx.recv() => {
                if topic == Topic::Settings {
                    settings.invalidate();
                }
                engine.start_cycle(&mut guard, &source, &settings, topic_label(topic));
            }

            Some(joined) = engine.cycles.join_next(), if !engine.cycles.is_empty() => {
                match joined {
                    Ok(outcome) if guard.is_current(outcome.ticket) => engine.apply(outcome),
                    Ok(outcome) => {
                        debug!(
                            generation = outcome.ticket.generation(),
                            current = guard.generation(),
                            "discarding stale cycle"
                        );
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => error!("aggregation cycle panicked: {err}"),
                }
            }

            Some(command) = commands.recv() => {
                engine.handle_command(command, &mut guard, &source, &settings);
            }

            _ = sleep_until(advance_at.unwrap_or_else(Instant::now)), if advance_at.is_some() => {
                if engine.rotation.tick(Instant::now()) {
                    engine.publish(FrameCause::Tick, guard.generation());
                }
            }

            _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                engine.retry_at = None;
                engine.start_cycle(&mut guard, &source, &settings, "retry");
            }

            _ = sleep_until(window_at.unwrap_or_else(Instant::now)), if window_at.is_some() => {
                engine.window_at = None;
                let current = *engine.rotation.settings();
                engine.recompose(current);
                debug!("announcement window boundary reached");
                engine.publish(FrameCause::Recomposed, guard.generation());
            }
        }
    }

    guard.teardown();
    engine.cycles.abort_all();
    engine.retry_at = None;
    engine.window_at = None;
    engine.rotation.teardown();
    info!("rotation engine stopped");
    Ok(())
}

struct Engine {
    rotation: Rotation,
    last_good: LastGood,
    loading: bool,
    retry_at: Option<Instant>,
    window_at: Option<Instant>,
    clock_origin: Instant,
    cycles: JoinSet<CycleOutcome>,
    options: EngineOptions,
    frames: watch::Sender<DisplayFrame>,
}

impl Engine {
    fn start_cycle<S: ContentSource>(
        &mut self,
        guard: &mut LifecycleGuard,
        source: &Arc<S>,
        settings: &SettingsProvider<S>,
        reason: &'static str,
    ) {
        let ticket = guard.begin_cycle();
        debug!(generation = ticket.generation(), reason, "aggregation cycle started");
        self.loading = true;
        self.retry_at = None;

        let source = Arc::clone(source);
        let settings = settings.clone();
        self.cycles.spawn(async move {
            let (settings, products, categories, announcements) = tokio::join!(
                settings.fetch(),
                source.fetch_featured_products(),
                source.fetch_categories(),
                source.fetch_active_slide_announcements(),
            );
            CycleOutcome {
                ticket,
                settings,
                products,
                categories,
                announcements,
            }
        });
        self.publish(FrameCause::Loading, ticket.generation());
    }

    fn apply(&mut self, outcome: CycleOutcome) {
        let CycleOutcome {
            ticket,
            settings,
            products,
            categories,
            announcements,
        } = outcome;

        let mut failures = 0;
        keep_or_fallback(products, &mut self.last_good.products, "products", &mut failures);
        keep_or_fallback(
            categories,
            &mut self.last_good.categories,
            "categories",
            &mut failures,
        );
        keep_or_fallback(
            announcements,
            &mut self.last_good.announcements,
            "announcements",
            &mut failures,
        );

        self.loading = false;
        self.recompose(settings);
        if failures > 0 {
            let delay = self.options.retry_after;
            warn!(failures, retry_in = ?delay, "aggregation cycle incomplete");
            self.retry_at = Some(Instant::now() + delay);
        }
        info!(
            generation = ticket.generation(),
            slides = self.rotation.slides().len(),
            "aggregation cycle applied"
        );
        self.publish(FrameCause::Recomposed, ticket.generation());
    }

    /// Composes from the last good records and arms the window timer.
    fn recompose(&mut self, settings: Settings) {
        let now = self.wall_clock();
        let announcements = self.last_good.announcements.as_deref().unwrap_or_default();
        let slides = compose(
            self.last_good.products.as_deref().unwrap_or_default(),
            self.last_good.categories.as_deref().unwrap_or_default(),
            announcements,
            now,
        );
        self.window_at = next_window_change(announcements, now).map(|bound| {
            let wait = (bound - now).to_std().unwrap_or_default();
            Instant::now() + wait
        });
        self.rotation.commit(settings, slides, Instant::now());
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        match self.options.now_override {
            Some(start) => {
                start + TimeDelta::from_std(self.clock_origin.elapsed()).unwrap_or_default()
            }
            None => Utc::now(),
        }
    }

    fn handle_command<S: ContentSource>(
        &mut self,
        command: EngineCommand,
        guard: &mut LifecycleGuard,
        source: &Arc<S>,
        settings: &SettingsProvider<S>,
    ) {
        let now = Instant::now();
        let generation = guard.generation();
        match command {
            EngineCommand::Pause => {
                if self.rotation.pause(now) {
                    self.publish(FrameCause::Paused, generation);
                }
            }
            EngineCommand::Resume => {
                if self.rotation.resume(now) {
                    self.publish(FrameCause::Resumed, generation);
                }
            }
            EngineCommand::Refresh => self.start_cycle(guard, source, settings, "refresh"),
            other => match other.navigation() {
                Some(request) => {
                    if self.rotation.navigate(request, now) {
                        self.publish(FrameCause::Manual, generation);
                    }
                }
                None => debug!(?other, "ignoring command"),
            },
        }
    }

    fn publish(&self, cause: FrameCause, generation: u64) {
        let rotation = &self.rotation;
        let slide = rotation.current_slide().cloned();
        let status = if slide.is_some() {
            DisplayStatus::Showing
        } else if self.last_good.any_loaded() {
            DisplayStatus::Empty
        } else {
            DisplayStatus::Loading
        };
        self.frames.send_replace(DisplayFrame {
            status,
            slide,
            index: rotation.current_index(),
            total: rotation.slides().len(),
            direction: rotation.direction(),
            transition: rotation.settings().transition,
            phase: rotation.phase(),
            loading: self.loading,
            generation,
            cause,
            stats: rotation.stats(),
        });
    }
}

fn keep_or_fallback<T, E: Display>(
    fetched: Result<Vec<T>, E>,
    last_good: &mut Option<Vec<T>>,
    label: &'static str,
    failures: &mut usize,
) {
    match fetched {
        Ok(records) => *last_good = Some(records),
        Err(err) => {
            *failures += 1;
            warn!(source = label, error = %err, kept = last_good.is_some(), "fetch failed");
        }
    }
}

fn topic_label(topic: Topic) -> &'static str {
    match topic {
        Topic::Products => "products changed",
        Topic::Categories => "categories changed",
        Topic::Announcements => "announcements changed",
        Topic::Settings => "settings changed",
    }
}
