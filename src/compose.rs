use std::cmp::Reverse;
use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use content_model::{Announcement, AnnouncementKind, Category, Product};
use tracing::{debug, warn};

use crate::slide::{Slide, SlidePayload};

pub const ANNOUNCEMENT_PRIORITY: i32 = 3;
pub const SPECIAL_PRODUCT_PRIORITY: i32 = 2;
pub const PRODUCT_PRIORITY: i32 = 1;
pub const CATEGORY_PRIORITY: i32 = 0;

/// Merges the three content sources into one slide sequence.
///
/// Rules:
/// - Active `slide` announcements inside their date window rank highest.
/// - Active featured products follow, specials ahead of ordinary ones.
/// - Categories come last, in the order they were supplied.
/// - The final sort is stable, so equal priorities keep source order and
///   composing unchanged inputs twice yields the same sequence.
/// - A record id seen twice within one source is dropped after the first.
pub fn compose(
    products: &[Product],
    categories: &[Category],
    announcements: &[Announcement],
    now: DateTime<Utc>,
) -> Vec<Slide> {
    let mut slides = Vec::with_capacity(products.len() + categories.len() + announcements.len());

    for announcement in announcements {
        if announcement.active
            && announcement.kind == AnnouncementKind::Slide
            && announcement.is_live_at(now)
        {
            slides.push(Slide::new(
                ANNOUNCEMENT_PRIORITY,
                SlidePayload::Announcement(announcement.clone()),
            ));
        } else {
            debug!(id = %announcement.id, "announcement filtered out");
        }
    }

    for product in products.iter().filter(|p| p.active && p.featured) {
        let priority = if product.special {
            SPECIAL_PRODUCT_PRIORITY
        } else {
            PRODUCT_PRIORITY
        };
        slides.push(Slide::new(priority, SlidePayload::Product(product.clone())));
    }

    for category in categories {
        slides.push(Slide::new(
            CATEGORY_PRIORITY,
            SlidePayload::Category(category.clone()),
        ));
    }

    let mut seen = HashSet::with_capacity(slides.len());
    slides.retain(|slide| {
        let fresh = seen.insert(slide.id.clone());
        if !fresh {
            warn!(id = %slide.id, "duplicate record id in source; keeping first occurrence");
        }
        fresh
    });

    // `sort_by_key` is stable.
    slides.sort_by_key(|slide| Reverse(slide.priority));
    slides
}

/// Earliest instant after `now` at which some announcement enters or leaves
/// its window. End dates are inclusive, so leaving happens just past them.
pub fn next_window_change(
    announcements: &[Announcement],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    announcements
        .iter()
        .filter(|a| a.active && a.kind == AnnouncementKind::Slide)
        .flat_map(|a| {
            let leaves = a.end_date.map(|end| end + TimeDelta::milliseconds(1));
            [a.start_date, leaves]
        })
        .flatten()
        .filter(|bound| *bound > now)
        .min()
}
