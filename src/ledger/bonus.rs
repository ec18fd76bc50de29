//! Daily login bonus rules.
//!
//! Everything here is pure: "today" is always passed in as a calendar date so the caller decides
//! which clock (and which timezone) counts. Day gaps are computed on [`NaiveDate`]s rather than by
//! subtracting timestamps, so time-of-day never shifts a streak.

use chrono::NaiveDate;
use serde::Serialize;

use crate::constants::{
    DAILY_BASE_BONUS, STREAK_MILESTONE_BONUSES, STREAK_MILESTONE_STEP, STREAK_MILESTONES,
    WEEKLY_STREAK_BONUS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimRejection {
    AlreadyClaimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimAward {
    pub awarded: i64,
    pub base_bonus: i64,
    pub streak_bonus: i64,
    pub new_streak: i64,
}

impl ClaimAward {
    /// Ledger row description for this claim
    pub fn description(&self) -> String {
        match self.streak_bonus {
            0 => format!("Daily login bonus (day {})", self.new_streak),
            bonus => format!(
                "Daily login bonus (day {}, +{bonus} streak bonus)",
                self.new_streak
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDecision {
    Claimed(ClaimAward),
    Rejected(ClaimRejection),
}

pub fn evaluate_claim(
    last_claim: Option<NaiveDate>,
    current_streak: i64,
    today: NaiveDate,
) -> ClaimDecision {
    let new_streak = match last_claim {
        Some(last) if last == today => {
            return ClaimDecision::Rejected(ClaimRejection::AlreadyClaimed);
        }
        Some(last) if (today - last).num_days() == 1 => current_streak.max(0) + 1,
        // first claim, a missed day, or a last claim dated after today
        _ => 1,
    };

    let base_bonus = DAILY_BASE_BONUS;
    let streak_bonus = streak_bonus(new_streak);

    ClaimDecision::Claimed(ClaimAward {
        awarded: base_bonus + streak_bonus,
        base_bonus,
        streak_bonus,
        new_streak,
    })
}

pub fn streak_bonus(streak: i64) -> i64 {
    if let Some((_, bonus)) = STREAK_MILESTONE_BONUSES.iter().find(|(day, _)| *day == streak) {
        return *bonus;
    }

    if streak > 0 && streak % STREAK_MILESTONE_STEP == 0 {
        WEEKLY_STREAK_BONUS
    } else {
        0
    }
}

pub fn next_milestone(current_streak: i64) -> i64 {
    STREAK_MILESTONES
        .iter()
        .copied()
        .find(|m| *m > current_streak)
        .unwrap_or(current_streak + STREAK_MILESTONE_STEP)
}

pub fn milestone_progress_percent(current_streak: i64) -> f64 {
    let prev = STREAK_MILESTONES
        .iter()
        .copied()
        .rev()
        .find(|m| *m <= current_streak)
        .unwrap_or(0);
    let next = next_milestone(current_streak);

    let pct = (current_streak - prev) as f64 / (next - prev) as f64 * 100.0;
    pct.clamp(0.0, 100.0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn claimed(decision: ClaimDecision) -> ClaimAward {
        match decision {
            ClaimDecision::Claimed(award) => award,
            ClaimDecision::Rejected(r) => panic!("expected a claim, got {r:?}"),
        }
    }

    #[test]
    fn test_first_claim_starts_streak() {
        let award = claimed(evaluate_claim(None, 0, day("2026-01-09")));
        assert_eq!(
            award,
            ClaimAward {
                awarded: 1,
                base_bonus: 1,
                streak_bonus: 0,
                new_streak: 1
            }
        );
    }

    #[test]
    fn test_streak_continuity() {
        let last = Some(day("2026-01-08"));

        assert_eq!(claimed(evaluate_claim(last, 5, day("2026-01-09"))).new_streak, 6);
        assert_eq!(claimed(evaluate_claim(last, 5, day("2026-01-11"))).new_streak, 1);
        assert_eq!(claimed(evaluate_claim(last, 5, day("2026-01-07"))).new_streak, 1);
    }

    #[test]
    fn test_streak_across_month_and_year() {
        let award = claimed(evaluate_claim(Some(day("2025-12-31")), 29, day("2026-01-01")));
        assert_eq!(award.new_streak, 30);
        assert_eq!(award.awarded, 21);

        let award = claimed(evaluate_claim(Some(day("2028-02-28")), 1, day("2028-02-29")));
        assert_eq!(award.new_streak, 2);
    }

    #[test]
    fn test_same_day_rejected() {
        let today = day("2026-01-09");
        assert_eq!(
            evaluate_claim(Some(today), 6, today),
            ClaimDecision::Rejected(ClaimRejection::AlreadyClaimed)
        );
    }

    #[test]
    fn test_milestone_bonus_table() {
        let yesterday = day("2026-03-01");
        let today = day("2026-03-02");

        for (prev, total, streak_bonus) in [(6, 6, 5), (29, 21, 20), (13, 4, 3), (20, 4, 3), (9, 1, 0)] {
            let award = claimed(evaluate_claim(Some(yesterday), prev, today));
            assert_eq!(award.new_streak, prev + 1);
            assert_eq!(award.base_bonus, 1);
            assert_eq!(award.streak_bonus, streak_bonus, "streak {}", prev + 1);
            assert_eq!(award.awarded, total, "streak {}", prev + 1);
        }
    }

    #[test]
    fn test_claim_description() {
        let award = claimed(evaluate_claim(Some(day("2026-01-08")), 6, day("2026-01-09")));
        assert_eq!(award.description(), "Daily login bonus (day 7, +5 streak bonus)");

        let award = claimed(evaluate_claim(None, 0, day("2026-01-09")));
        assert_eq!(award.description(), "Daily login bonus (day 1)");
    }

    #[test]
    fn test_streak_bonus_values() {
        assert_eq!(streak_bonus(0), 0);
        assert_eq!(streak_bonus(1), 0);
        assert_eq!(streak_bonus(7), 5);
        assert_eq!(streak_bonus(28), 3);
        assert_eq!(streak_bonus(30), 20);
        assert_eq!(streak_bonus(35), 3);
        assert_eq!(streak_bonus(60), 0);
        assert_eq!(streak_bonus(364), 3);
    }

    #[test]
    fn test_next_milestone() {
        assert_eq!(next_milestone(0), 7);
        assert_eq!(next_milestone(3), 7);
        assert_eq!(next_milestone(7), 14);
        assert_eq!(next_milestone(25), 30);
        assert_eq!(next_milestone(364), 365);
        assert_eq!(next_milestone(365), 372);
        assert_eq!(next_milestone(400), 407);
    }

    #[test]
    fn test_milestone_progress() {
        assert_eq!(milestone_progress_percent(0), 0.0);
        assert_eq!(milestone_progress_percent(7), 0.0);
        assert_eq!(milestone_progress_percent(10), 3.0 / 7.0 * 100.0);
        assert_eq!(milestone_progress_percent(45), 50.0);
        assert_eq!(milestone_progress_percent(400), 35.0 / 42.0 * 100.0);
    }
}
