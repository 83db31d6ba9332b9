use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enrollments::Enrollment;
use crate::ids::{CourseId, PaymentId, UserId};
use crate::storage::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Pending -> Completed | Failed, Completed -> Refunded. Nothing else.
    pub const fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Completed, PaymentStatus::Refunded)
        )
    }

    pub fn transition(self, next: PaymentStatus) -> Result<PaymentStatus, RepositoryError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(RepositoryError::InvalidTransition {
                from: self.label(),
                to: next.label(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    MobileMoney,
    Card,
    Cash,
}

impl PaymentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "mobile_money" => Some(PaymentMethod::MobileMoney),
            "card" => Some(PaymentMethod::Card),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }
}

/// One row per payment attempt. Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: UserId,
    pub course_id: CourseId,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_reference: String,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<UserId>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub student_id: UserId,
    pub course_id: CourseId,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub transaction_reference: String,
    pub created_at: DateTime<Utc>,
}

/// What the student submits at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutRequest {
    pub method: PaymentMethod,
    pub transaction_reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationDecision {
    Approve,
    Reject,
}

impl VerificationDecision {
    pub const fn target_status(self) -> PaymentStatus {
        match self {
            VerificationDecision::Approve => PaymentStatus::Completed,
            VerificationDecision::Reject => PaymentStatus::Failed,
        }
    }
}

/// Admin decision applied atomically by [`super::PaymentRepository::settle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub payment_id: PaymentId,
    pub decision: VerificationDecision,
    pub verified_by: UserId,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementOutcome {
    pub payment: Payment,
    /// Present only for approvals.
    pub enrollment: Option<Enrollment>,
    pub enrollment_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundOutcome {
    pub payment: Payment,
    pub enrollment: Option<Enrollment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    #[test]
    fn only_three_transitions_are_legal() {
        let legal: Vec<(PaymentStatus, PaymentStatus)> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            legal,
            vec![
                (PaymentStatus::Pending, PaymentStatus::Completed),
                (PaymentStatus::Pending, PaymentStatus::Failed),
                (PaymentStatus::Completed, PaymentStatus::Refunded),
            ]
        );
    }

    #[test]
    fn illegal_transition_names_both_states() {
        match PaymentStatus::Failed.transition(PaymentStatus::Completed) {
            Err(RepositoryError::InvalidTransition { from, to }) => {
                assert_eq!((from, to), ("failed", "completed"));
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[test]
    fn labels_round_trip() {
        for status in ALL {
            assert_eq!(PaymentStatus::from_label(status.label()), Some(status));
        }
        for method in [
            PaymentMethod::BankTransfer,
            PaymentMethod::MobileMoney,
            PaymentMethod::Card,
            PaymentMethod::Cash,
        ] {
            assert_eq!(PaymentMethod::from_label(method.label()), Some(method));
        }
    }
}
