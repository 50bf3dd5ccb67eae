use std::time::Duration;

use crate::navigation::Key;
use crate::rotation::{Phase, RotationStats};
use crate::slide::{Direction, Slide};

/// Content areas that publish change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Products,
    Categories,
    Announcements,
    Settings,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Products,
        Topic::Categories,
        Topic::Announcements,
        Topic::Settings,
    ];
}

/// Emitted by a content source when records under `Topic` changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceChanged(pub Topic);

/// Requests accepted by the engine's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Next,
    Previous,
    JumpTo(usize),
    Key(Key),
    Pause,
    Resume,
    /// Start a fresh aggregation cycle.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    /// Nothing has been shown yet, or every source is unavailable.
    Loading,
    /// Sources answered but nothing matched; "no content available".
    Empty,
    Showing,
}

/// Why a frame was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCause {
    Startup,
    Loading,
    Recomposed,
    Tick,
    Manual,
    Paused,
    Resumed,
}

/// Everything the render surface needs to paint one state of the rotation.
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub status: DisplayStatus,
    pub slide: Option<Slide>,
    pub index: Option<usize>,
    pub total: usize,
    pub direction: Direction,
    pub transition: Duration,
    pub phase: Phase,
    pub loading: bool,
    pub generation: u64,
    pub cause: FrameCause,
    pub stats: RotationStats,
}

impl DisplayFrame {
    pub fn startup() -> Self {
        Self {
            status: DisplayStatus::Loading,
            slide: None,
            index: None,
            total: 0,
            direction: Direction::Forward,
            transition: Duration::ZERO,
            phase: Phase::Idle,
            loading: true,
            generation: 0,
            cause: FrameCause::Startup,
            stats: RotationStats::default(),
        }
    }
}
