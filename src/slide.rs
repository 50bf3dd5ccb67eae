use std::fmt;

use content_model::{Announcement, Category, Product, RecordId};

/// Kind of content a slide shows. Closed set: a new kind needs a new source
/// adapter and a composer rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideKind {
    Product,
    Category,
    Announcement,
}

impl SlideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Category => "category",
            Self::Announcement => "announcement",
        }
    }
}

impl fmt::Display for SlideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable slide identity, `"<kind>-<record id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlideId(String);

impl SlideId {
    pub fn new(kind: SlideKind, record: &RecordId) -> Self {
        Self(format!("{}-{}", kind.as_str(), record))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of the record a slide was composed from.
#[derive(Debug, Clone, PartialEq)]
pub enum SlidePayload {
    Product(Product),
    Category(Category),
    Announcement(Announcement),
}

impl SlidePayload {
    pub fn kind(&self) -> SlideKind {
        match self {
            Self::Product(_) => SlideKind::Product,
            Self::Category(_) => SlideKind::Category,
            Self::Announcement(_) => SlideKind::Announcement,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            Self::Product(p) => &p.id,
            Self::Category(c) => &c.id,
            Self::Announcement(a) => &a.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Product(p) => &p.name,
            Self::Category(c) => &c.name,
            Self::Announcement(a) => &a.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub id: SlideId,
    /// Only used for the initial ordering; never re-evaluated during display.
    pub priority: i32,
    pub payload: SlidePayload,
}

impl Slide {
    pub fn new(priority: i32, payload: SlidePayload) -> Self {
        Self {
            id: SlideId::new(payload.kind(), payload.record_id()),
            priority,
            payload,
        }
    }

    pub fn kind(&self) -> SlideKind {
        self.payload.kind()
    }
}

/// Animation hint for the render surface. Never affects ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}
