use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, LocalClock};
use crate::code_store::{generate_code, CodeStatus, CodeStore};
use crate::constants::{
    CODES_KEY, DAILY_DRAW_LIMIT, IP_RECORDS_KEY, MAX_GENERATION_ATTEMPTS,
    RATE_RECORD_RETENTION_DAYS, UNKNOWN_IDENTITY, USED_CODES_KEY,
};
use crate::error::{LotteryError, LotteryResult};
use crate::prize_table::{PrizeEntry, PrizeTable};
use crate::rate_limit::{IdentityRecord, RateLimitCheck, RateLimiter};
use crate::session::{RedemptionAttempt, RedemptionSession};
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::validation::{check_code, normalize_code, require_code};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LotterySettings {
    pub daily_limit: u32,
    pub retention_days: u32,
    pub max_generation_attempts: u32,
}

impl Default for LotterySettings {
    fn default() -> Self {
        Self {
            daily_limit: DAILY_DRAW_LIMIT,
            retention_days: RATE_RECORD_RETENTION_DAYS,
            max_generation_attempts: MAX_GENERATION_ATTEMPTS,
        }
    }
}

/// A settled draw.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DrawOutcome {
    pub code: String,
    pub identity: String,
    pub prize: PrizeEntry,
    pub prize_index: usize,
    pub is_win: bool,
    pub draws_today: u32,
    pub remaining_today: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LotteryStats {
    pub total_draws: usize,
    pub today_draws: u32,
    pub issued_codes: usize,
    pub available_codes: usize,
}

/// Falls back to the shared `unknown` bucket when no identity is known.
pub fn normalize_identity(identity: &str) -> String {
    let identity = identity.trim();
    if identity.is_empty() {
        UNKNOWN_IDENTITY.to_string()
    } else {
        identity.to_string()
    }
}

/// The lottery engine: owns the code store, the rate limiter and the prize
/// table, and writes every change through to `storage` before reporting
/// success. A failed write rolls the in-memory change back.
pub struct Lottery<S, C = LocalClock> {
    storage: S,
    clock: C,
    prizes: PrizeTable,
    codes: CodeStore,
    limiter: RateLimiter,
    settings: LotterySettings,
}

impl<S: KeyValueStore, C: Clock> Lottery<S, C> {
    /// Loads the three persisted records and purges expired rate records.
    pub fn open(
        storage: S,
        clock: C,
        prizes: PrizeTable,
        settings: LotterySettings,
    ) -> LotteryResult<Self> {
        let mut lottery = Self {
            storage,
            clock,
            prizes,
            codes: CodeStore::new(),
            limiter: RateLimiter::new(),
            settings,
        };
        lottery.sync()?;

        match lottery.prune_rate_records() {
            Ok(0) => {}
            Ok(purged) => log::info!("Purged {} expired rate limit records", purged),
            Err(e) => log::warn!("Could not purge expired rate limit records: {}", e),
        }

        log::info!(
            "Lottery opened with {} codes ({} used) and {} prizes",
            lottery.codes.issued().len(),
            lottery.codes.consumed_count(),
            lottery.prizes.len()
        );
        Ok(lottery)
    }

    /// Reloads all records from storage, picking up changes made by other
    /// engines sharing the same storage.
    pub fn sync(&mut self) -> LotteryResult<()> {
        let issued: Vec<String> = load_json(&self.storage, CODES_KEY)?;
        let consumed: Vec<String> = load_json(&self.storage, USED_CODES_KEY)?;
        let records: BTreeMap<String, u32> = load_json(&self.storage, IP_RECORDS_KEY)?;

        self.codes = CodeStore::from_records(issued, consumed);
        self.limiter = RateLimiter::from_records(records);
        Ok(())
    }

    pub fn prizes(&self) -> &PrizeTable {
        &self.prizes
    }

    pub fn settings(&self) -> &LotterySettings {
        &self.settings
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn is_issued(&self, code: &str) -> bool {
        self.codes.is_issued(&normalize_code(code))
    }

    pub fn is_consumed(&self, code: &str) -> bool {
        self.codes.is_consumed(&normalize_code(code))
    }

    /// Idle -> Verified. Checks run in a fixed order and the first failure
    /// is reported: empty code, unknown code, used code, daily limit.
    pub fn verify(
        &self,
        session: &mut RedemptionSession,
        code: &str,
        identity: &str,
    ) -> LotteryResult<()> {
        session.ensure_fresh()?;

        let code = normalize_code(code);
        let identity = normalize_identity(identity);

        if let Err(e) = self.check_redeemable(&code, &identity) {
            log::debug!("Rejected code {:?} for {}: {}", code, identity, e);
            return Err(e);
        }

        session.mark_verified(RedemptionAttempt {
            code,
            identity,
            started_at: self.clock.now(),
        })
    }

    fn check_redeemable(&self, code: &str, identity: &str) -> LotteryResult<()> {
        require_code(code)?;
        if !self.codes.is_issued(code) {
            return Err(LotteryError::NotFound);
        }
        if self.codes.is_consumed(code) {
            return Err(LotteryError::AlreadyConsumed);
        }
        if !self.limiter.is_allowed(identity, self.today(), self.settings.daily_limit) {
            return Err(LotteryError::RateLimited {
                limit: self.settings.daily_limit,
            });
        }
        Ok(())
    }

    /// Verified -> Spinning.
    pub fn spin<F>(
        &self,
        session: &mut RedemptionSession,
        source: F,
    ) -> LotteryResult<(usize, PrizeEntry)>
    where
        F: FnMut() -> f64,
    {
        session.spin(&self.prizes, source)
    }

    /// Spinning -> Settled. Consumes the code and counts the draw against
    /// the identity as one unit. If the code was redeemed elsewhere in the
    /// meantime the drawn prize is discarded.
    pub fn settle(&mut self, session: &mut RedemptionSession) -> LotteryResult<DrawOutcome> {
        let (attempt, prize_index, prize) = session.settling()?;

        if let Err(e) = self.sync() {
            session.abandon();
            log::error!("Could not reload records before settling {}: {}", attempt.code, e);
            return Err(e);
        }

        if let Err(e) = self.codes.consume(&attempt.code) {
            session.abandon();
            log::warn!("Redemption of {} lost a race: {}", attempt.code, e);
            return Err(match e {
                LotteryError::AlreadyConsumed | LotteryError::NotFound => {
                    LotteryError::ConcurrentRedemptionConflict(attempt.code)
                }
                other => other,
            });
        }

        let today = self.today();
        let draws_today = self.limiter.increment(&attempt.identity, today);

        let written = save_json(&self.storage, USED_CODES_KEY, self.codes.consumed())
            .and_then(|_| save_json(&self.storage, IP_RECORDS_KEY, self.limiter.records()));
        if let Err(e) = written {
            self.codes.unconsume(&attempt.code);
            self.limiter.decrement(&attempt.identity, today);
            self.write_back();
            session.abandon();
            log::error!("Failed to record redemption of {}: {}", attempt.code, e);
            return Err(e.into());
        }

        session.mark_settled();

        let is_win = prize.is_win();
        log::info!(
            "Code {} redeemed by {} ({} of {} today): {}",
            attempt.code,
            attempt.identity,
            draws_today,
            self.settings.daily_limit,
            prize.name
        );

        Ok(DrawOutcome {
            code: attempt.code,
            identity: attempt.identity,
            prize,
            prize_index,
            is_win,
            draws_today,
            remaining_today: self.settings.daily_limit.saturating_sub(draws_today),
        })
    }

    /// Issues a custom code. Input is trimmed and uppercased first.
    pub fn issue(&mut self, code: &str) -> LotteryResult<String> {
        let code = normalize_code(code);
        check_code(&code)?;
        self.sync()?;

        let before = self.codes.clone();
        self.codes.issue(&code)?;
        self.commit_codes(before)?;

        log::info!("Issued code {}", code);
        Ok(code)
    }

    pub fn issue_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> LotteryResult<String> {
        self.sync()?;

        let before = self.codes.clone();
        let mut generator = || generate_code(&mut *rng);
        let code = self
            .codes
            .issue_random(&mut generator, self.settings.max_generation_attempts)?;
        self.commit_codes(before)?;

        log::info!("Issued random code {}", code);
        Ok(code)
    }

    pub fn bulk_issue_random<R: Rng + ?Sized>(
        &mut self,
        count: u32,
        rng: &mut R,
    ) -> LotteryResult<Vec<String>> {
        self.sync()?;

        let before = self.codes.clone();
        let mut generator = || generate_code(&mut *rng);
        let codes = self
            .codes
            .bulk_issue_random(count, &mut generator, self.settings.max_generation_attempts)?;
        self.commit_codes(before)?;

        log::info!("Issued {} random codes", codes.len());
        Ok(codes)
    }

    /// Removes a code from both the issued and the used records. Deleting an
    /// unknown code is not an error.
    pub fn delete(&mut self, code: &str) -> LotteryResult<()> {
        let code = normalize_code(code);
        self.sync()?;

        if !self.codes.is_issued(&code) {
            return Ok(());
        }

        let before = self.codes.clone();
        self.codes.delete(&code);
        self.commit_codes(before)?;

        log::info!("Deleted code {}", code);
        Ok(())
    }

    pub fn list(&self) -> Vec<CodeStatus> {
        self.codes.list()
    }

    pub fn rate_status(&self, identity: &str) -> RateLimitCheck {
        self.limiter.status(
            &normalize_identity(identity),
            self.today(),
            self.settings.daily_limit,
        )
    }

    pub fn today_records(&self) -> Vec<IdentityRecord> {
        self.limiter.records_for(self.today())
    }

    pub fn stats(&self) -> LotteryStats {
        let issued_codes = self.codes.issued().len();
        let total_draws = self.codes.consumed_count();
        LotteryStats {
            total_draws,
            today_draws: self.limiter.total_for(self.today()),
            issued_codes,
            available_codes: issued_codes.saturating_sub(total_draws),
        }
    }

    /// Drops rate records older than the retention window.
    pub fn prune_rate_records(&mut self) -> LotteryResult<usize> {
        let cutoff = self
            .today()
            .checked_sub_days(Days::new(u64::from(self.settings.retention_days)))
            .unwrap_or(NaiveDate::MIN);

        let before = self.limiter.clone();
        let purged = self.limiter.prune_before(cutoff);
        if purged == 0 {
            return Ok(0);
        }

        if let Err(e) = save_json(&self.storage, IP_RECORDS_KEY, self.limiter.records()) {
            self.limiter = before;
            return Err(e.into());
        }
        Ok(purged)
    }

    fn commit_codes(&mut self, before: CodeStore) -> LotteryResult<()> {
        let written = save_json(&self.storage, CODES_KEY, self.codes.issued())
            .and_then(|_| save_json(&self.storage, USED_CODES_KEY, self.codes.consumed()));
        if let Err(e) = written {
            self.codes = before;
            self.write_back();
            log::error!("Failed to save codes: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Rewrites storage from memory after a partially applied write.
    fn write_back(&self) {
        let restored = save_json(&self.storage, CODES_KEY, self.codes.issued())
            .and_then(|_| save_json(&self.storage, USED_CODES_KEY, self.codes.consumed()))
            .and_then(|_| save_json(&self.storage, IP_RECORDS_KEY, self.limiter.records()));
        if let Err(e) = restored {
            log::warn!("Storage may be out of date until the next successful write: {}", e);
        }
    }
}
