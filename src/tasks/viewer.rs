use crate::events::{DisplayFrame, DisplayStatus, FrameCause};
use crate::slide::{Direction, SlidePayload};
use anyhow::Result;
use std::time::Duration;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Paints frames. Holds no rotation logic.
pub trait RenderSurface: Send {
    fn paint(&mut self, frame: &DisplayFrame, controls_visible: bool);
}

/// Surface that writes what would be on screen to the log.
#[derive(Debug, Default)]
pub struct LogSurface;

impl RenderSurface for LogSurface {
    fn paint(&mut self, frame: &DisplayFrame, controls_visible: bool) {
        match (frame.status, &frame.slide) {
            (DisplayStatus::Showing, Some(slide)) => {
                let arrow = match frame.direction {
                    Direction::Forward => "->",
                    Direction::Backward => "<-",
                };
                let detail = match &slide.payload {
                    SlidePayload::Product(p) => p
                        .price
                        .map(|price| format!("{price:.2}"))
                        .unwrap_or_default(),
                    SlidePayload::Category(c) => c.description.clone().unwrap_or_default(),
                    SlidePayload::Announcement(a) => a.body.clone().unwrap_or_default(),
                };
                info!(
                    slide = %slide.id,
                    kind = %slide.kind(),
                    position = frame.index.map(|i| i + 1).unwrap_or(0),
                    total = frame.total,
                    controls = controls_visible,
                    "{arrow} {} {detail}",
                    slide.payload.title()
                );
            }
            (DisplayStatus::Empty, _) => info!("no content available"),
            _ => info!(generation = frame.generation, "loading content"),
        }
    }
}

/// Observes published frames and paints them.
///
/// Manual navigation reveals the controls overlay; a single hide timer
/// conceals it again after `controls_hide_after` without further input.
pub async fn run<R: RenderSurface>(
    mut frames: watch::Receiver<DisplayFrame>,
    mut surface: R,
    controls_hide_after: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut current = frames.borrow_and_update().clone();
    let mut hide_at: Option<Instant> = None;
    surface.paint(&current, false);

    loop {
        let hide_deadline = hide_at;
        select! {
            _ = cancel.cancelled() => break,

            changed = frames.changed() => {
                if changed.is_err() {
                    debug!("frame publisher closed; viewer exiting");
                    break;
                }
                current = frames.borrow_and_update().clone();
                if current.cause == FrameCause::Manual {
                    hide_at = Some(Instant::now() + controls_hide_after);
                }
                if skip_repaint(&current) {
                    continue;
                }
                surface.paint(&current, hide_at.is_some());
            }

            _ = sleep_until(hide_deadline.unwrap_or_else(Instant::now)), if hide_deadline.is_some() => {
                hide_at = None;
                surface.paint(&current, false);
            }
        }
    }
    Ok(())
}

/// A loading frame over slides already on screen changes nothing visible.
fn skip_repaint(frame: &DisplayFrame) -> bool {
    frame.cause == FrameCause::Loading && frame.status == DisplayStatus::Showing
}
