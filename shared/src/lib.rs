pub mod clock;
pub mod code_store;
pub mod constants;
pub mod error;
pub mod lottery;
pub mod prize_table;
pub mod rate_limit;
pub mod selector;
pub mod session;
pub mod shared_lottery;
pub mod storage;
pub mod validation;

pub use clock::{Clock, LocalClock, ManualClock};
pub use code_store::{CodeStatus, CodeStore};
pub use error::{ErrorKind, LotteryError, LotteryResult, StorageError};
pub use lottery::{DrawOutcome, Lottery, LotterySettings, LotteryStats};
pub use prize_table::{PrizeEntry, PrizeTable};
pub use rate_limit::RateLimiter;
pub use session::{RedemptionAttempt, RedemptionSession, SessionState};
pub use storage::{KeyValueStore, MemoryStore};
