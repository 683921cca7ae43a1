use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::code_store::CodeStatus;
use crate::constants::{DEFAULT_BULK_COUNT, VERIFIED_MESSAGE};
use crate::error::{ErrorKind, LotteryError};
use crate::lottery::{DrawOutcome, LotteryStats};
use crate::prize_table::{PrizeEntry, PrizeTable};
use crate::rate_limit::IdentityRecord;
use crate::validation::*;

// Constants for frontend animation
pub const SPIN_DURATION_MS: u64 = 4000; // Suspense delay between spin and settle
pub const FULL_SPINS: f64 = 5.0; // Full rotations before landing

/// Angle covered by one wheel segment.
pub fn segment_angle(segments: usize) -> f64 {
    if segments == 0 {
        return 0.0;
    }
    360.0 / segments as f64
}

/// Rotation that lands the wheel on the middle of segment `index` after
/// [`FULL_SPINS`] full turns.
pub fn landing_rotation(index: usize, segments: usize) -> f64 {
    let segment = segment_angle(segments);
    let target = segment * index as f64 + segment / 2.0;
    360.0 * FULL_SPINS + (360.0 - target)
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct PrizeTableResponse {
    pub segment_angle: f64,
    pub prizes: Vec<PrizeEntry>,
}

impl From<&PrizeTable> for PrizeTableResponse {
    fn from(table: &PrizeTable) -> Self {
        Self {
            segment_angle: segment_angle(table.len()),
            prizes: table.entries().to_vec(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(max = 256))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub ok: bool,
    pub kind: Option<ErrorKind>,
    pub reason: Option<String>,
    pub session_id: Option<String>,
    pub remaining_draws: Option<u32>,
}

impl VerifyResponse {
    pub fn verified(session_id: String, remaining_draws: u32) -> Self {
        Self {
            ok: true,
            kind: None,
            reason: Some(VERIFIED_MESSAGE.to_string()),
            session_id: Some(session_id),
            remaining_draws: Some(remaining_draws),
        }
    }

    pub fn rejected(error: &LotteryError) -> Self {
        Self {
            ok: false,
            kind: Some(error.kind()),
            reason: Some(error.to_string()),
            session_id: None,
            remaining_draws: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpinResponse {
    pub success: bool,
    pub is_win: bool,
    pub prize: Option<PrizeEntry>,
    pub prize_index: Option<usize>,
    pub rotation_degrees: Option<f64>,
    pub code: Option<String>,
    pub remaining_draws: Option<u32>,
    pub message: Option<String>,
    pub kind: Option<ErrorKind>,
}

impl SpinResponse {
    pub fn settled(outcome: &DrawOutcome, segments: usize) -> Self {
        let message = if outcome.is_win {
            format!("Congratulations! You won {}! 🎉", outcome.prize.name)
        } else {
            "Thanks for playing! 😊".to_string()
        };
        Self {
            success: true,
            is_win: outcome.is_win,
            prize: Some(outcome.prize.clone()),
            prize_index: Some(outcome.prize_index),
            rotation_degrees: Some(landing_rotation(outcome.prize_index, segments)),
            code: Some(outcome.code.clone()),
            remaining_draws: Some(outcome.remaining_today),
            message: Some(message),
            kind: None,
        }
    }

    pub fn failed(error: &LotteryError) -> Self {
        Self {
            success: false,
            is_win: false,
            prize: None,
            prize_index: None,
            rotation_degrees: None,
            code: None,
            remaining_draws: None,
            message: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct IssueCodeRequest {
    /// Custom code; a random one is generated when absent or blank.
    #[validate(custom = "validate_optional_code")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BulkIssueRequest {
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_bulk_count")]
    pub count: u32,
}

fn default_bulk_count() -> u32 {
    DEFAULT_BULK_COUNT
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedCodesResponse {
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeListResponse {
    pub codes: Vec<CodeStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityRecordsResponse {
    pub day: String,
    pub records: Vec<IdentityRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PruneResponse {
    pub purged: usize,
}

pub type StatsResponse = LotteryStats;
