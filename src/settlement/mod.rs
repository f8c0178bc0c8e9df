/// 정산 도메인
/// 결제가 PAID가 되는 순간 HOLDING으로 생성되고,
/// 구매 확정 또는 보류 기간 경과 스윕으로 단 한 번 PAID로 전이된다.
// region:    --- Imports
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::store::LedgerStore;
use tracing::info;

// endregion: --- Imports

// region:    --- Models

/// 정산 상태: HOLDING → PAID(종단)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Holding,
    Paid,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Holding => "HOLDING",
            SettlementStatus::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> ServiceResult<Self> {
        match s {
            "HOLDING" => Ok(SettlementStatus::Holding),
            "PAID" => Ok(SettlementStatus::Paid),
            other => Err(ServiceError::Internal(format!(
                "알 수 없는 정산 상태: {other}"
            ))),
        }
    }
}

/// 판매자 지급 보류 레코드 - 결제당 정확히 하나(payment_id 유니크)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: i64,
    pub payment_id: i64,
    pub seller_id: i64,
    pub status: SettlementStatus,
    pub fee: i64,
    pub net: i64,
    pub hold_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

// endregion: --- Models

// region:    --- Settlement Release Service

/// 정산 해제 서비스
/// 두 해제 경로 모두 상태 가드 후 쓰기 패턴의 멱등 단일 행 전이다.
#[derive(Clone)]
pub struct SettlementReleaseService {
    store: Arc<dyn LedgerStore>,
    hold_days: i64,
}

impl SettlementReleaseService {
    pub fn new(store: Arc<dyn LedgerStore>, hold_days: i64) -> Self {
        Self { store, hold_days }
    }

    /// 구매 확정에 의한 조기 해제
    pub async fn release_by_purchase_confirm(&self, payment_id: i64) -> ServiceResult<()> {
        let settlement = self
            .store
            .settlement_by_payment(payment_id)
            .await?
            .ok_or(ServiceError::SettlementNotFound)?;

        if settlement.status == SettlementStatus::Paid {
            info!(
                "{:<12} --> 이미 해제된 정산입니다. paymentId={}",
                "Settlement", payment_id
            );
            return Ok(());
        }

        if self
            .store
            .release_settlement(payment_id, Utc::now())
            .await?
        {
            info!(
                "{:<12} --> 구매 확정으로 정산 해제 paymentId={}",
                "Settlement", payment_id
            );
        } else {
            // 자동 해제 스윕과 경합한 경우: 먼저 커밋된 쪽이 이기고 이쪽은 no-op
            info!(
                "{:<12} --> 정산이 이미 해제되어 건너뜀 paymentId={}",
                "Settlement", payment_id
            );
        }
        Ok(())
    }

    /// 보류 기간이 지난 정산 일괄 자동 해제
    pub async fn release_automatically(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let held_before = now - Duration::days(self.hold_days);
        let released = self
            .store
            .release_due_settlements(held_before, now)
            .await?;

        for settlement_id in &released {
            info!(
                "{:<12} --> 자동 해제 settlementId={}",
                "Settlement", settlement_id
            );
        }
        Ok(released.len())
    }
}

// endregion: --- Settlement Release Service
