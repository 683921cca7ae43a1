use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::DAY_FORMAT;

/// Renders a day the way rate-limit keys store it.
pub fn day_string(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub fn get_rate_limit_key(identity: &str, day: NaiveDate) -> String {
    format!("{}_{}", identity, day_string(day))
}

/// Splits a stored key back into identity and day. The day never contains
/// an underscore, so the split happens at the last one.
pub fn parse_rate_limit_key(key: &str) -> Option<(&str, NaiveDate)> {
    let (identity, day) = key.rsplit_once('_')?;
    let day = NaiveDate::parse_from_str(day, DAY_FORMAT).ok()?;
    Some((identity, day))
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RateLimitCheck {
    pub current_attempts: u32,
    pub remaining_attempts: u32,
    pub is_locked: bool,
}

impl RateLimitCheck {
    pub fn new(attempts: u32, max_attempts: u32) -> Self {
        Self {
            current_attempts: attempts,
            remaining_attempts: max_attempts.saturating_sub(attempts),
            is_locked: attempts >= max_attempts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityRecord {
    pub identity: String,
    pub count: u32,
}

/// Draw counts per (identity, day).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RateLimiter {
    records: BTreeMap<String, u32>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: BTreeMap<String, u32>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &BTreeMap<String, u32> {
        &self.records
    }

    pub fn count_for(&self, identity: &str, day: NaiveDate) -> u32 {
        self.records
            .get(&get_rate_limit_key(identity, day))
            .copied()
            .unwrap_or(0)
    }

    pub fn increment(&mut self, identity: &str, day: NaiveDate) -> u32 {
        let count = self
            .records
            .entry(get_rate_limit_key(identity, day))
            .or_insert(0);
        *count += 1;
        *count
    }

    /// Undo for an increment whose persistence failed.
    pub(crate) fn decrement(&mut self, identity: &str, day: NaiveDate) {
        let key = get_rate_limit_key(identity, day);
        match self.records.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.records.remove(&key);
            }
            None => {}
        }
    }

    pub fn is_allowed(&self, identity: &str, day: NaiveDate, limit: u32) -> bool {
        self.count_for(identity, day) < limit
    }

    pub fn status(&self, identity: &str, day: NaiveDate, limit: u32) -> RateLimitCheck {
        RateLimitCheck::new(self.count_for(identity, day), limit)
    }

    pub fn records_for(&self, day: NaiveDate) -> Vec<IdentityRecord> {
        self.records
            .iter()
            .filter_map(|(key, &count)| match parse_rate_limit_key(key) {
                Some((identity, record_day)) if record_day == day => Some(IdentityRecord {
                    identity: identity.to_string(),
                    count,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn total_for(&self, day: NaiveDate) -> u32 {
        self.records_for(day).iter().map(|r| r.count).sum()
    }

    /// Drops every record dated before `cutoff`. Keys that do not parse are
    /// left alone. Returns how many records were removed.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.records.len();
        self.records.retain(|key, _| match parse_rate_limit_key(key) {
            Some((_, day)) => day >= cutoff,
            None => {
                log::debug!("Keeping unparseable rate limit key {}", key);
                true
            }
        });
        before - self.records.len()
    }
}
