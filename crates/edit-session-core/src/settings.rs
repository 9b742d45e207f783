// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tunables shared by every edit session (derived-field limits, notices).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session tunables. Missing keys in a stored blob fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum slug length for derived url fields.
    pub slug_max_len: usize,
    /// Maximum characters of a derived SEO/meta title.
    pub seo_title_max: usize,
    /// Maximum characters of a derived SEO/meta description.
    pub seo_description_max: usize,
    /// Notices kept before the oldest is dropped.
    pub notice_capacity: usize,
    /// Identical notices within this window (ms) are merged.
    pub notice_dedupe_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slug_max_len: 80,
            seo_title_max: 60,
            seo_description_max: 160,
            notice_capacity: 16,
            notice_dedupe_ms: 2_000,
        }
    }
}

impl SessionConfig {
    /// Dedupe window as a `Duration`.
    pub fn notice_dedupe_window(&self) -> Duration {
        Duration::from_millis(self.notice_dedupe_ms)
    }

    /// Clamp zero limits to 1. A zero-length slug or an empty notice queue
    /// would make the derived fields and notices unusable.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        for limit in [
            &mut self.slug_max_len,
            &mut self.seo_title_max,
            &mut self.seo_description_max,
            &mut self.notice_capacity,
        ] {
            *limit = (*limit).max(1);
        }
        self
    }
}
