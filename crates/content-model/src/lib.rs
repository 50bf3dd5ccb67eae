use std::fmt;
use std::time::Duration;

use anyhow::{Result, ensure};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::{self, Deserializer, Visitor};

pub use records::{Announcement, AnnouncementKind, Category, Product};
pub use settings::{Settings, StoredSettings};

/// Identifier of a record in the content store.
///
/// Stores hand out either numeric keys or opaque strings; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RecordIdVisitor;

        impl<'de> Visitor<'de> for RecordIdVisitor {
            type Value = RecordId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer record id")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(E::invalid_value(de::Unexpected::Str(value), &self));
                }
                Ok(RecordId::new(trimmed))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(RecordId::new(value.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(RecordId::new(value.to_string()))
            }
        }

        deserializer.deserialize_any(RecordIdVisitor)
    }
}

mod records {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub struct Product {
        pub id: RecordId,
        pub name: String,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub price: Option<f64>,
        #[serde(default)]
        pub image_url: Option<String>,
        #[serde(default)]
        pub category_id: Option<RecordId>,
        #[serde(default = "default_true")]
        pub active: bool,
        #[serde(default)]
        pub featured: bool,
        /// Promoted products outrank ordinary featured ones.
        #[serde(default)]
        pub special: bool,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub struct Category {
        pub id: RecordId,
        pub name: String,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub image_url: Option<String>,
        #[serde(default)]
        pub display_order: Option<i64>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum AnnouncementKind {
        Slide,
        Banner,
        #[serde(other)]
        Other,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub struct Announcement {
        pub id: RecordId,
        pub title: String,
        #[serde(default)]
        pub body: Option<String>,
        #[serde(default)]
        pub image_url: Option<String>,
        #[serde(rename = "type")]
        pub kind: AnnouncementKind,
        #[serde(default = "default_true")]
        pub active: bool,
        #[serde(default)]
        pub start_date: Option<DateTime<Utc>>,
        #[serde(default)]
        pub end_date: Option<DateTime<Utc>>,
    }

    impl Announcement {
        /// Whether `now` falls inside the optional `[start-date, end-date]` window.
        ///
        /// Both bounds are inclusive; a missing bound is open.
        pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
            let started = self.start_date.is_none_or(|start| start <= now);
            let not_ended = self.end_date.is_none_or(|end| now <= end);
            started && not_ended
        }
    }

    const fn default_true() -> bool {
        true
    }
}

mod settings {
    use super::*;

    /// Display settings that drive rotation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct Settings {
        /// Time each slide stays on screen before auto-advance.
        #[serde(with = "humantime_serde")]
        pub advance: Duration,
        /// Length of the slide transition animation.
        #[serde(with = "humantime_serde")]
        pub transition: Duration,
        pub auto_rotate: bool,
    }

    impl Settings {
        const DEFAULT_ADVANCE: Duration = Duration::from_secs(10);
        const DEFAULT_TRANSITION: Duration = Duration::from_millis(800);

        pub fn validate(&self) -> Result<()> {
            ensure!(
                !self.advance.is_zero(),
                "advance duration must be greater than zero"
            );
            Ok(())
        }
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                advance: Self::DEFAULT_ADVANCE,
                transition: Self::DEFAULT_TRANSITION,
                auto_rotate: true,
            }
        }
    }

    /// Settings record as kept in the content store.
    ///
    /// Every field is optional; missing fields take the display's defaults.
    #[derive(Debug, Clone, Default, PartialEq, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct StoredSettings {
        pub advance_ms: Option<u64>,
        pub transition_seconds: Option<f64>,
        pub auto_rotate: Option<bool>,
    }

    impl StoredSettings {
        pub fn resolve(&self, defaults: &Settings) -> Result<Settings> {
            let advance = match self.advance_ms {
                Some(ms) => {
                    ensure!(ms > 0, "advance-ms must be greater than zero");
                    Duration::from_millis(ms)
                }
                None => defaults.advance,
            };
            let transition = match self.transition_seconds {
                Some(secs) => {
                    ensure!(
                        secs.is_finite() && secs >= 0.0,
                        "transition-seconds must be a non-negative number"
                    );
                    Duration::try_from_secs_f64(secs)?
                }
                None => defaults.transition,
            };
            let settings = Settings {
                advance,
                transition,
                auto_rotate: self.auto_rotate.unwrap_or(defaults.auto_rotate),
            };
            settings.validate()?;
            Ok(settings)
        }
    }
}
