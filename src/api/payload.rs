//! Request and response bodies for the rpc procedures. Field names are camelCase on the wire.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::prelude::*;
use crate::ledger::bonus::{ClaimDecision, ClaimRejection};
use crate::ledger::{SpendOutcome, StreakStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInput {
    pub amount: i64,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub description: Option<String>,
    pub reference_id: Option<i64>,
}

impl EntryInput {
    pub fn into_entry(self) -> LedgerEntry {
        let entry = LedgerEntry::new(self.amount, self.tx_type).with_reference(self.reference_id);
        LedgerEntry {
            description: self.description,
            ..entry
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAdjustInput {
    pub user_id: UserId,
    pub amount: i64,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct AwardResponse {
    pub success: bool,
    pub balance: i64,
}

impl AwardResponse {
    pub fn new(balance: i64) -> Self {
        Self {
            success: true,
            balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<i64>,
}

impl From<SpendOutcome> for SpendResponse {
    fn from(outcome: SpendOutcome) -> Self {
        match outcome {
            SpendOutcome::Applied { balance } => Self {
                success: true,
                error: None,
                balance,
                required: None,
            },
            SpendOutcome::Insufficient { balance, required } => Self {
                success: false,
                error: Some("insufficient_balance"),
                balance,
                required: Some(required),
            },
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub claimed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awarded: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_bonus: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak_bonus: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_streak: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ClaimRejection>,
}

impl From<ClaimOutcome> for ClaimResponse {
    fn from(outcome: ClaimOutcome) -> Self {
        match outcome.decision {
            ClaimDecision::Claimed(award) => Self {
                claimed: true,
                awarded: Some(award.awarded),
                base_bonus: Some(award.base_bonus),
                streak_bonus: Some(award.streak_bonus),
                new_streak: Some(award.new_streak),
                balance: Some(outcome.balance),
                reason: None,
            },
            ClaimDecision::Rejected(reason) => Self {
                reason: Some(reason),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakResponse {
    pub streak: i64,
    pub last_claim_date: Option<NaiveDate>,
    pub next_milestone: i64,
    pub progress_percent: f64,
}

impl From<StreakStatus> for StreakResponse {
    fn from(status: StreakStatus) -> Self {
        Self {
            streak: status.streak,
            last_claim_date: status.last_claim_date,
            next_milestone: status.next_milestone,
            progress_percent: status.progress_percent,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::ledger::bonus::evaluate_claim;

    #[test]
    fn test_entry_input_wire_names() {
        let input: EntryInput = serde_json::from_value(json!({
            "amount": 5,
            "type": "prediction",
            "referenceId": 12
        }))
        .unwrap();

        let entry = input.into_entry();
        assert_eq!(entry.tx_type, TransactionType::Prediction);
        assert_eq!(entry.reference_id, Some(12));
        assert_eq!(entry.description, None);
    }

    #[test]
    fn test_claim_response_shapes() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();

        let claimed = ClaimResponse::from(ClaimOutcome {
            decision: evaluate_claim(None, 0, today),
            balance: 51,
        });
        assert_eq!(
            serde_json::to_value(claimed).unwrap(),
            json!({
                "claimed": true,
                "awarded": 1,
                "baseBonus": 1,
                "streakBonus": 0,
                "newStreak": 1,
                "balance": 51
            })
        );

        let rejected = ClaimResponse::from(ClaimOutcome {
            decision: evaluate_claim(Some(today), 1, today),
            balance: 51,
        });
        assert_eq!(
            serde_json::to_value(rejected).unwrap(),
            json!({ "claimed": false, "reason": "already_claimed" })
        );
    }

    #[test]
    fn test_spend_response_shapes() {
        let ok = SpendResponse::from(SpendOutcome::Applied { balance: 46 });
        assert_eq!(
            serde_json::to_value(ok).unwrap(),
            json!({ "success": true, "balance": 46 })
        );

        let short = SpendResponse::from(SpendOutcome::Insufficient {
            balance: 46,
            required: 100,
        });
        assert_eq!(
            serde_json::to_value(short).unwrap(),
            json!({
                "success": false,
                "error": "insufficient_balance",
                "balance": 46,
                "required": 100
            })
        );
    }
}
