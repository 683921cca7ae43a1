use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LotteryError, LotteryResult};
use crate::prize_table::{PrizeEntry, PrizeTable};
use crate::selector;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Verified,
    Spinning,
    Settled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Verified => "verified",
            Self::Spinning => "spinning",
            Self::Settled => "settled",
        }
    }
}

/// The code and identity a session was verified for.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RedemptionAttempt {
    pub code: String,
    pub identity: String,
    pub started_at: DateTime<Utc>,
}

/// One redemption attempt: verify, spin, settle.
///
/// A session is single-use. Once it has been abandoned or settled it
/// rejects every further transition and a new session must be created.
#[derive(Debug, Clone)]
pub struct RedemptionSession {
    state: SessionState,
    attempt: Option<RedemptionAttempt>,
    pending: Option<(usize, PrizeEntry)>,
    retired: bool,
}

impl Default for RedemptionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RedemptionSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            attempt: None,
            pending: None,
            retired: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempt(&self) -> Option<&RedemptionAttempt> {
        self.attempt.as_ref()
    }

    pub fn pending_prize(&self) -> Option<&PrizeEntry> {
        self.pending.as_ref().map(|(_, prize)| prize)
    }

    /// Wheel slot of the drawn prize while spinning.
    pub fn pending_index(&self) -> Option<usize> {
        self.pending.as_ref().map(|(index, _)| *index)
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    fn invalid(&self, action: &'static str) -> LotteryError {
        let state = if self.retired && self.state == SessionState::Idle {
            "abandoned"
        } else {
            self.state.as_str()
        };
        LotteryError::InvalidSessionState { action, state }
    }

    /// Checks that the session can still be verified.
    pub(crate) fn ensure_fresh(&self) -> LotteryResult<()> {
        if self.state != SessionState::Idle || self.retired {
            return Err(self.invalid("verify"));
        }
        Ok(())
    }

    /// Idle -> Verified.
    pub(crate) fn mark_verified(&mut self, attempt: RedemptionAttempt) -> LotteryResult<()> {
        self.ensure_fresh()?;
        self.attempt = Some(attempt);
        self.state = SessionState::Verified;
        Ok(())
    }

    /// Verified -> Spinning. Draws the prize immediately; it is only awarded
    /// once the session settles. Returns the wheel slot and the prize.
    pub fn spin<F>(&mut self, table: &PrizeTable, source: F) -> LotteryResult<(usize, PrizeEntry)>
    where
        F: FnMut() -> f64,
    {
        match self.state {
            SessionState::Verified => {}
            SessionState::Spinning => return Err(LotteryError::SpinInProgress),
            _ => return Err(self.invalid("spin")),
        }
        let (index, prize) = selector::draw(table, source);
        self.pending = Some((index, prize.clone()));
        self.state = SessionState::Spinning;
        Ok((index, prize.clone()))
    }

    /// Hands out what settle needs while the session is Spinning.
    pub(crate) fn settling(&self) -> LotteryResult<(RedemptionAttempt, usize, PrizeEntry)> {
        match (self.state, &self.attempt, &self.pending) {
            (SessionState::Spinning, Some(attempt), Some((index, prize))) => {
                Ok((attempt.clone(), *index, prize.clone()))
            }
            _ => Err(self.invalid("settle")),
        }
    }

    /// Spinning -> Settled.
    pub(crate) fn mark_settled(&mut self) {
        self.state = SessionState::Settled;
        self.retired = true;
    }

    /// Verified or Spinning -> Idle. The drawn prize, if any, is discarded.
    pub fn abandon(&mut self) {
        if matches!(self.state, SessionState::Verified | SessionState::Spinning) {
            self.state = SessionState::Idle;
            self.pending = None;
            self.retired = true;
        }
    }
}
