//! Sorting, categorization and per-name capping of speed samples.
//!
//! Samples are ordered in two passes: first by `(name, speed desc)`, then a
//! stable sort by the numeric ordinal found in the name. Each name's rows
//! therefore stay fastest first, and the cap keeps the fastest `K`.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};

use iptvscan_protocol::{Category, CategoryMarkers, RankedEntry, SpeedSample};

/// Numeric ordinal of a channel name. Names without digits sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Ordinal {
    Number(u64),
    Missing,
}

impl Ordinal {
    /// First run of ASCII digits in `name`.
    ///
    /// A run too long for `u64` saturates rather than being treated as missing.
    pub fn of(name: &str) -> Self {
        let digits: String = name
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return Ordinal::Missing;
        }
        Ordinal::Number(digits.parse().unwrap_or(u64::MAX))
    }
}

/// One output section.
#[derive(Debug, Clone)]
pub struct CategorySection {
    pub category: Category,
    pub label: &'static str,
    pub generated_at: DateTime<FixedOffset>,
    pub entries: Vec<RankedEntry>,
}

/// Final output of the pipeline.
#[derive(Debug, Clone)]
pub struct RankedPlaylist {
    /// Every sample in final sort order, uncapped.
    pub flat: Vec<SpeedSample>,
    /// Capped rows, one section per category in fixed order.
    pub sections: Vec<CategorySection>,
}

impl RankedPlaylist {
    pub fn entries(&self) -> impl Iterator<Item = &RankedEntry> {
        self.sections.iter().flat_map(|section| section.entries.iter())
    }
}

pub struct Ranker {
    markers: CategoryMarkers,
    cap: usize,
    utc_offset: FixedOffset,
}

impl Ranker {
    pub fn new(markers: CategoryMarkers, cap: usize, utc_offset: FixedOffset) -> Self {
        Self {
            markers,
            cap,
            utc_offset,
        }
    }

    /// Sort in place: `(name, speed desc)`, then stably by ordinal.
    pub fn sort(samples: &mut [SpeedSample]) {
        samples.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| b.speed_mb_s.total_cmp(&a.speed_mb_s))
        });
        samples.sort_by_key(|sample| Ordinal::of(&sample.name));
    }

    pub fn rank(&self, samples: Vec<SpeedSample>) -> RankedPlaylist {
        self.rank_at(samples, Utc::now())
    }

    /// Rank with an explicit generation time.
    pub fn rank_at(&self, mut samples: Vec<SpeedSample>, now: DateTime<Utc>) -> RankedPlaylist {
        Self::sort(&mut samples);

        let generated_at = now.with_timezone(&self.utc_offset);
        let mut sections: Vec<CategorySection> = Category::ALL
            .iter()
            .map(|category| CategorySection {
                category: *category,
                label: category.label(),
                generated_at,
                entries: Vec::new(),
            })
            .collect();

        let mut emitted: HashMap<(Category, &str), usize> = HashMap::new();
        for sample in &samples {
            let Some(category) = self.markers.classify(&sample.name) else {
                continue;
            };
            let count = emitted.entry((category, sample.name.as_str())).or_insert(0);
            if *count >= self.cap {
                continue;
            }
            *count += 1;

            if let Some(section) = sections.iter_mut().find(|s| s.category == category) {
                section.entries.push(RankedEntry {
                    category,
                    name: sample.name.clone(),
                    url: sample.url.clone(),
                    speed_mb_s: sample.speed_mb_s,
                });
            }
        }

        RankedPlaylist {
            flat: samples,
            sections,
        }
    }
}
