use crate::events::Topic;
use crate::store::{FileStore, parse_sections};
use anyhow::Result;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use serde_yaml::Mapping;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use tracing::{debug, error, info, warn};

/// Watches the content file and publishes a change notification for every
/// section whose contents differ from the last successful read.
///
/// The parent directory is watched because editors commonly replace files
/// instead of writing them in place. Unreadable or malformed intermediate
/// states are skipped; the next good read is diffed against the last good one.
#[instrument(skip(store, cancel), fields(path = %store.path().display()))]
pub async fn run(store: FileStore, cancel: CancellationToken) -> Result<()> {
    let mut last = match store.read_sections().await {
        Ok(sections) => sections,
        Err(err) => {
            warn!(error = %err, "initial content read failed; diffing against empty");
            Mapping::new()
        }
    };

    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    let dir = watch_dir(store.path());
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!(watching = %dir.display(), "content watcher initialized");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting content watcher");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) => {
                    if !touches(&event, store.path()) {
                        continue;
                    }
                    debug!(kind = ?event.kind, "content file event");
                    let next = match store.read_sections().await {
                        Ok(next) => next,
                        Err(err) => {
                            debug!(error = %err, "content file not readable yet; skipping");
                            continue;
                        }
                    };
                    for topic in changed_topics(&last, &next) {
                        let reached = store.hub().publish(topic);
                        info!(?topic, reached, "content section changed");
                    }
                    last = next;
                }
                Err(err) => error!("watch error: {err}"),
            }
        }
    }
    Ok(())
}

/// Topics whose top-level section differs between two reads.
pub fn changed_topics(previous: &Mapping, next: &Mapping) -> Vec<Topic> {
    Topic::ALL
        .into_iter()
        .filter(|topic| {
            let key = topic.section_key();
            previous.get(key) != next.get(key)
        })
        .collect()
}

/// Diffs two raw documents; unparsable input counts as "no change".
pub fn changed_topics_in(previous: &str, next: &str) -> Vec<Topic> {
    match (parse_sections(previous), parse_sections(next)) {
        (Ok(a), Ok(b)) => changed_topics(&a, &b),
        _ => Vec::new(),
    }
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    );
    relevant && event.paths.iter().any(|p| p.file_name() == path.file_name())
}
