/// 서비스 전역 에러 타입
/// 도메인 에러는 안정적인 에러 코드와 함께 HTTP 경계까지 그대로 전파된다.
// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

// endregion: --- Imports

pub type ServiceResult<T> = Result<T, ServiceError>;

// region:    --- Service Error

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("요청하신 경매를 찾을 수 없습니다.")]
    AuctionNotFound,

    #[error("요청하신 상품을 찾을 수 없습니다.")]
    ProductNotFound,

    #[error("진행 중인 경매가 아닙니다.")]
    AuctionNotLive,

    #[error("이미 경매가 종료되었거나, 즉시 구매가 완료되었습니다.")]
    AuctionAlreadyEnded,

    #[error("입찰 금액이 현재 최고가보다 낮거나 최소 입찰 단위를 충족하지 못했습니다.")]
    BidTooLow,

    #[error("경매 상품의 판매자는 입찰할 수 없습니다.")]
    SelfBiddingNotAllowed,

    #[error("즉시 구매가 불가능한 경매입니다.")]
    BuyNowNotAvailable,

    #[error("허용되지 않는 경매 상태 전이입니다.")]
    InvalidStateTransition,

    #[error("낙찰자를 찾을 수 없습니다.")]
    WinnerNotFound,

    #[error("결제 정보를 찾을 수 없습니다.")]
    PaymentNotFound,

    #[error("정산 정보를 찾을 수 없습니다.")]
    SettlementNotFound,

    #[error("이미 다른 결제에서 처리된 결제 키입니다.")]
    AlreadyProcessed,

    #[error("결제 금액이 일치하지 않습니다.")]
    AmountMismatch,

    #[error("주문 번호 형식이 올바르지 않습니다: {0}")]
    InvalidReference(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("최대 재시도 횟수를 초과했습니다.")]
    MaxRetriesExceeded,

    #[error("저장소 오류: {0}")]
    Store(#[from] sqlx::Error),

    #[error("결제 게이트웨이 오류: {0}")]
    Gateway(String),

    #[error("내부 오류: {0}")]
    Internal(String),
}

impl ServiceError {
    /// 클라이언트에 노출되는 안정적인 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::AuctionNotFound => "AUCTION_NOT_FOUND",
            ServiceError::ProductNotFound => "PRODUCT_NOT_FOUND",
            ServiceError::AuctionNotLive => "AUCTION_NOT_LIVE",
            ServiceError::AuctionAlreadyEnded => "AUCTION_ALREADY_ENDED",
            ServiceError::BidTooLow => "BID_TOO_LOW",
            ServiceError::SelfBiddingNotAllowed => "SELF_BIDDING_NOT_ALLOWED",
            ServiceError::BuyNowNotAvailable => "BUY_NOW_NOT_AVAILABLE",
            ServiceError::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ServiceError::WinnerNotFound => "WINNER_NOT_FOUND",
            ServiceError::PaymentNotFound => "PAYMENT_NOT_FOUND",
            ServiceError::SettlementNotFound => "SETTLEMENT_NOT_FOUND",
            ServiceError::AlreadyProcessed => "ALREADY_PROCESSED",
            ServiceError::AmountMismatch => "AMOUNT_MISMATCH",
            ServiceError::InvalidReference(_) => "INVALID_REFERENCE",
            ServiceError::InvalidRequest(_) => "INVALID_REQUEST",
            ServiceError::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            ServiceError::Store(_) => "STORE_ERROR",
            ServiceError::Gateway(_) => "GATEWAY_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::AuctionNotFound
            | ServiceError::ProductNotFound
            | ServiceError::WinnerNotFound
            | ServiceError::PaymentNotFound
            | ServiceError::SettlementNotFound => StatusCode::NOT_FOUND,
            ServiceError::AlreadyProcessed => StatusCode::CONFLICT,
            ServiceError::Store(_) | ServiceError::Gateway(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.code(),
            "error": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

// endregion: --- Service Error
