pub const SERVER_PORT: u16 = 3000;

pub const SIGNUP_BONUS: i64 = 50;
pub const DAILY_BASE_BONUS: i64 = 1;

/// Upper bound for a single award or spend
pub const MAX_TRANSACTION_AMOUNT: i64 = 1_000_000;

/// Streak lengths with a fixed bonus of their own
pub const STREAK_MILESTONE_BONUSES: &[(i64, i64)] = &[(7, 5), (30, 20)];

/// Flat bonus for any other positive multiple of seven
pub const WEEKLY_STREAK_BONUS: i64 = 3;

/// Display milestones for streak progress, past the last one the pattern continues in weeks
pub const STREAK_MILESTONES: &[i64] = &[7, 14, 21, 30, 60, 90, 180, 365];
pub const STREAK_MILESTONE_STEP: i64 = 7;

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

pub const USERNAME_MAX_LEN: usize = 32;

/// Header carrying the acting user, set by the upstream gateway
pub const USER_ID_HEADER: &str = "x-user-id";
