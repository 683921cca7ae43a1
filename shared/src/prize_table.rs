use serde::{Deserialize, Serialize};

use crate::error::{LotteryError, LotteryResult};

/// The only prize that does not count as a win.
pub const CONSOLATION_PRIZE: &str = "銘謝惠顧";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PrizeEntry {
    pub name: String,
    /// Percentage points of probability mass.
    pub weight: u32,
    pub color: String,
}

impl PrizeEntry {
    pub fn new(name: impl Into<String>, weight: u32, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight,
            color: color.into(),
        }
    }

    pub fn is_win(&self) -> bool {
        self.name != CONSOLATION_PRIZE
    }
}

/// Ordered, immutable list of prizes. Order only affects tie-breaks and the
/// wheel layout, never the probabilities.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct PrizeTable {
    entries: Vec<PrizeEntry>,
}

impl PrizeTable {
    pub fn new(entries: Vec<PrizeEntry>) -> LotteryResult<Self> {
        if entries.is_empty() {
            return Err(LotteryError::InvalidInput("Prize table must not be empty".to_string()));
        }
        if let Some(bad) = entries.iter().find(|p| p.name.trim().is_empty()) {
            return Err(LotteryError::InvalidInput(format!(
                "Prize with weight {} has no name",
                bad.weight
            )));
        }
        if let Some(bad) = entries.iter().find(|p| p.weight == 0) {
            return Err(LotteryError::InvalidInput(format!(
                "Prize {} must have a positive weight",
                bad.name
            )));
        }
        Ok(Self { entries })
    }

    /// Parses a JSON array of prize entries.
    pub fn from_json(json: &str) -> LotteryResult<Self> {
        let entries: Vec<PrizeEntry> = serde_json::from_str(json)
            .map_err(|e| LotteryError::InvalidInput(format!("Invalid prize table: {}", e)))?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[PrizeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> u32 {
        self.entries.iter().map(|p| p.weight).sum()
    }

    pub fn last(&self) -> &PrizeEntry {
        // Construction guarantees at least one entry.
        &self.entries[self.entries.len() - 1]
    }
}

impl Default for PrizeTable {
    fn default() -> Self {
        Self {
            entries: vec![
                PrizeEntry::new("頭獎 - iPhone 15", 1, "#ff4757"),
                PrizeEntry::new("二獎 - iPad", 2, "#ff6348"),
                PrizeEntry::new("三獎 - AirPods", 5, "#ffa502"),
                PrizeEntry::new("四獎 - 購物金1000元", 10, "#ff7675"),
                PrizeEntry::new("五獎 - 購物金500元", 15, "#fdcb6e"),
                PrizeEntry::new("六獎 - 購物金200元", 20, "#6c5ce7"),
                PrizeEntry::new(CONSOLATION_PRIZE, 47, "#a0a0a0"),
            ],
        }
    }
}
