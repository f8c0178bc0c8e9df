// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

// endregion: --- Imports

// region:    --- Models

/// 결제 상태
/// REQUESTED에서 자동결제 또는 웹훅으로 PAID, 실패 시 FAILED로 전이된다.
/// EXPIRED/CANCELED는 타임아웃·취소 경로에서만 도달한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Requested,
    Processing,
    Paid,
    Failed,
    Expired,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Requested => "REQUESTED",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> ServiceResult<Self> {
        match s {
            "REQUESTED" => Ok(PaymentStatus::Requested),
            "PROCESSING" => Ok(PaymentStatus::Processing),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            "CANCELED" => Ok(PaymentStatus::Canceled),
            other => Err(ServiceError::Internal(format!(
                "알 수 없는 결제 상태: {other}"
            ))),
        }
    }
}

/// 결제
/// status가 자금 확보 여부의 단일 진실이며,
/// toss_payment_key는 외부 승인 확인의 멱등 키(유니크)다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub winner_id: i64,
    pub seller_id: i64,
    pub toss_payment_key: Option<String>,
    pub status: PaymentStatus,
    /// 실패 사유 등 자유 기록
    pub receipt: Option<String>,
    pub fee: i64,
    pub net: i64,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

// endregion: --- Models
