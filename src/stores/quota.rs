use crate::models::character::CharacterId;
use std::collections::HashMap;

/// Messages per character before the survey gate applies
pub const DEFAULT_THRESHOLD: u32 = 15;

/// Per-character count of user-authored messages.
///
/// The backend is the source of truth: a reported count replaces the local
/// value. Local increments only happen for sends whose response carried no
/// count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaTracker {
    threshold: u32,
    counts: HashMap<CharacterId, u32>,
    survey_unlocked: bool,
}

impl QuotaTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            counts: HashMap::new(),
            survey_unlocked: false,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record one successful send. `server_count` wins when present.
    pub fn record(&mut self, character_id: CharacterId, server_count: Option<u32>) -> u32 {
        let count = self.counts.entry(character_id).or_insert(0);
        *count = match server_count {
            Some(reported) => reported,
            None => count.saturating_add(1),
        };
        *count
    }

    /// Replace the local value with a backend-reported count
    pub fn resync(&mut self, character_id: CharacterId, count: u32) {
        self.counts.insert(character_id, count);
    }

    pub fn resync_all<I>(&mut self, counts: I)
    where
        I: IntoIterator<Item = (CharacterId, u32)>,
    {
        for (character_id, count) in counts {
            self.resync(character_id, count);
        }
    }

    pub fn current_count(&self, character_id: CharacterId) -> u32 {
        self.counts.get(&character_id).copied().unwrap_or(0)
    }

    pub fn has_reached_limit(&self, character_id: CharacterId) -> bool {
        self.current_count(character_id) >= self.threshold
    }

    pub fn can_send(&self, character_id: CharacterId) -> bool {
        !self.has_reached_limit(character_id)
    }

    /// True once every assigned character is complete, or the backend has
    /// already opened the survey. An empty assignment is never complete.
    pub fn all_complete(&self, assigned: &[CharacterId]) -> bool {
        if self.survey_unlocked {
            return true;
        }
        !assigned.is_empty() && assigned.iter().all(|id| self.has_reached_limit(*id))
    }

    /// Latch the survey state after the backend confirmed it
    pub fn unlock_survey(&mut self) {
        self.survey_unlocked = true;
    }

    pub fn survey_unlocked(&self) -> bool {
        self.survey_unlocked
    }

    /// "count/threshold" as shown next to each character
    pub fn progress(&self, character_id: CharacterId) -> String {
        format!("{}/{}", self.current_count(character_id), self.threshold)
    }

    pub fn counts(&self) -> &HashMap<CharacterId, u32> {
        &self.counts
    }

    pub fn reset(&mut self) {
        self.counts.clear();
        self.survey_unlocked = false;
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
