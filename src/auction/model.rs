// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

// endregion: --- Imports

// region:    --- Models

/// 경매 상태
/// SCHEDULED → LIVE → ENDED 단방향 전이, CANCELLED/ENDED는 종단 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Scheduled,
    Live,
    Ended,
    Cancelled,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Scheduled => "SCHEDULED",
            AuctionStatus::Live => "LIVE",
            AuctionStatus::Ended => "ENDED",
            AuctionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> ServiceResult<Self> {
        match s {
            "SCHEDULED" => Ok(AuctionStatus::Scheduled),
            "LIVE" => Ok(AuctionStatus::Live),
            "ENDED" => Ok(AuctionStatus::Ended),
            "CANCELLED" => Ok(AuctionStatus::Cancelled),
            other => Err(ServiceError::Internal(format!(
                "알 수 없는 경매 상태: {other}"
            ))),
        }
    }
}

/// 판매 대상 상품
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub name: String,
}

/// 경매
/// current_price는 최고 입찰가의 비정규화 캐시로, 입찰 삽입과 원자적으로 갱신된다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub product_id: i64,
    pub start_price: i64,
    pub buy_now_price: Option<i64>,
    pub min_bid_step: i64,
    pub current_price: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AuctionStatus,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 입찰 - 불변 레코드
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    /// 자동 입찰 확장용 예약 플래그
    pub is_auto: bool,
}

/// 낙찰자 - 경매당 정확히 하나(auction_id 유니크)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Winner {
    pub id: i64,
    pub auction_id: i64,
    pub seller_id: i64,
    pub user_id: i64,
    pub final_price: i64,
    pub win_time: DateTime<Utc>,
}

// endregion: --- Models

// region:    --- Receipts

/// 입찰 성공 응답
#[derive(Debug, Clone, Serialize)]
pub struct BidReceipt {
    pub auction_id: i64,
    pub is_highest_bidder: bool,
    pub current_highest_bid: i64,
    pub bid_time: DateTime<Utc>,
}

/// 즉시 구매 성공 응답
#[derive(Debug, Clone, Serialize)]
pub struct BuyNowReceipt {
    pub auction_id: i64,
    pub status: AuctionStatus,
    pub winner_id: i64,
    pub final_price: i64,
    pub win_time: DateTime<Utc>,
}

// endregion: --- Receipts
