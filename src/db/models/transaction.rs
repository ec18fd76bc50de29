use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    SignupBonus,
    SubmitTrack,
    Prediction,
    Comment,
    DailyLogin,
    SkipQueue,
    Referral,
    AdminGrant,
    AdminDeduct,
}

impl TransactionType {
    pub const ALL: [TransactionType; 9] = [
        TransactionType::SignupBonus,
        TransactionType::SubmitTrack,
        TransactionType::Prediction,
        TransactionType::Comment,
        TransactionType::DailyLogin,
        TransactionType::SkipQueue,
        TransactionType::Referral,
        TransactionType::AdminGrant,
        TransactionType::AdminDeduct,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SignupBonus => "signup_bonus",
            TransactionType::SubmitTrack => "submit_track",
            TransactionType::Prediction => "prediction",
            TransactionType::Comment => "comment",
            TransactionType::DailyLogin => "daily_login",
            TransactionType::SkipQueue => "skip_queue",
            TransactionType::Referral => "referral",
            TransactionType::AdminGrant => "admin_grant",
            TransactionType::AdminDeduct => "admin_deduct",
        }
    }

    /// Tags that take tokens away; everything else is an earn tag
    pub const fn is_spend(&self) -> bool {
        matches!(self, TransactionType::SkipQueue | TransactionType::AdminDeduct)
    }

    /// Earn tags a user may report for themselves
    pub const fn is_self_earn(&self) -> bool {
        matches!(
            self,
            TransactionType::SubmitTrack
                | TransactionType::Prediction
                | TransactionType::Comment
                | TransactionType::Referral
        )
    }
}

#[derive(Debug, Error)]
#[error("unknown transaction type '{0}'")]
pub struct UnknownTransactionType(pub String);

impl FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTransactionType(s.to_owned()))
    }
}

impl TryFrom<String> for TransactionType {
    type Error = UnknownTransactionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only ledger row; never updated once written
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransaction {
    pub id: i64,
    pub user_id: UserId,
    pub amount: i64,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub tx_type: TransactionType,
    pub reference_id: Option<i64>,
    pub description: Option<String>,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied part of a ledger entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub amount: i64,
    pub tx_type: TransactionType,
    pub description: Option<String>,
    pub reference_id: Option<i64>,
}

impl LedgerEntry {
    pub fn new(amount: i64, tx_type: TransactionType) -> Self {
        Self {
            amount,
            tx_type,
            description: None,
            reference_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reference(mut self, reference_id: Option<i64>) -> Self {
        self.reference_id = reference_id;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tags_parse_and_serialize_alike() {
        for tag in TransactionType::ALL {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
            assert_eq!(tag.as_str().parse::<TransactionType>().unwrap(), tag);
        }

        assert!("bribe".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_tag_classes() {
        let spends: Vec<_> = TransactionType::ALL.into_iter().filter(|t| t.is_spend()).collect();
        assert_eq!(
            spends,
            vec![TransactionType::SkipQueue, TransactionType::AdminDeduct]
        );

        assert!(TransactionType::Comment.is_self_earn());
        assert!(!TransactionType::AdminGrant.is_self_earn());
        assert!(!TransactionType::DailyLogin.is_self_earn());
        assert!(!TransactionType::SignupBonus.is_self_earn());
    }
}
