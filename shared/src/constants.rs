// Storage records
pub const CODES_KEY: &str = "lotteryCodes";
pub const USED_CODES_KEY: &str = "usedCodes";
pub const IP_RECORDS_KEY: &str = "ipRecords";

// Code generation
pub const CODE_LENGTH: usize = 8;
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const MAX_CUSTOM_CODE_LENGTH: usize = 64;
pub const MAX_GENERATION_ATTEMPTS: u32 = 64;
pub const DEFAULT_BULK_COUNT: u32 = 10;
pub const MAX_BULK_COUNT: u32 = 1000;

// Rate limiting
pub const DAILY_DRAW_LIMIT: u32 = 3;
pub const RATE_RECORD_RETENTION_DAYS: u32 = 30;
pub const UNKNOWN_IDENTITY: &str = "unknown";
/// Day portion of a rate-limit key, e.g. `Sat Oct 17 2026`.
pub const DAY_FORMAT: &str = "%a %b %d %Y";

// Messages
pub const EMPTY_CODE_ERROR: &str = "Please enter a lottery code";
pub const MALFORMED_CODE_ERROR: &str = "Lottery codes may not contain spaces or control characters";
pub const CODE_TOO_LONG_ERROR: &str = "Lottery codes may be at most 64 characters";
pub const VERIFIED_MESSAGE: &str = "Code verified! You can spin the wheel now";
