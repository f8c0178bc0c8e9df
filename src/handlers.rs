/// HTTP 핸들러
/// 검증 오류는 상태를 건드리기 전에 거절되고, 도메인 에러는 ServiceError의
/// IntoResponse로 안정적인 코드와 함께 내려간다.
// region:    --- Imports
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::auction::model::{Auction, AuctionStatus, Bid, BidReceipt, BuyNowReceipt, Product};
use crate::auction::{bidding, winner};
use crate::error::{ServiceError, ServiceResult};
use crate::notifier::PriceNotifier;
use crate::payment::service::PaymentService;
use crate::payment::toss::{self, TossWebhookRequest};
use crate::query;
use crate::relay::{DomainEvent, EventRelay};
use crate::settlement::SettlementReleaseService;
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- App State

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub relay: EventRelay,
    pub notifier: Arc<PriceNotifier>,
    pub payments: PaymentService,
    pub settlements: SettlementReleaseService,
}

// endregion: --- App State

// region:    --- Request DTO

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub seller_id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAuctionRequest {
    pub product_id: i64,
    pub start_price: i64,
    pub buy_now_price: Option<i64>,
    pub min_bid_step: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub bidder_id: i64,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub buyer_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBillingKeyRequest {
    pub user_id: i64,
    pub billing_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementConfirmQuery {
    pub payment_id: i64,
}

// endregion: --- Request DTO

// region:    --- Command Handlers

/// 상품 등록
pub async fn handle_create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> ServiceResult<Json<Product>> {
    if req.name.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "상품 이름은 비울 수 없습니다.".to_string(),
        ));
    }
    let product = state.store.insert_product(req.seller_id, req.name).await?;
    Ok(Json(product))
}

/// 경매 등록 - SCHEDULED 상태로 생성된다
pub async fn handle_create_auction(
    State(state): State<AppState>,
    Json(req): Json<CreateAuctionRequest>,
) -> ServiceResult<Json<Auction>> {
    if req.start_price < 0 {
        return Err(ServiceError::InvalidRequest(
            "시작가는 0 이상이어야 합니다.".to_string(),
        ));
    }
    if req.min_bid_step <= 0 {
        return Err(ServiceError::InvalidRequest(
            "최소 입찰 단위는 0보다 커야 합니다.".to_string(),
        ));
    }
    if matches!(req.buy_now_price, Some(price) if price <= 0) {
        return Err(ServiceError::InvalidRequest(
            "즉시 구매 가격은 0보다 커야 합니다.".to_string(),
        ));
    }
    if req.end_at <= req.start_at {
        return Err(ServiceError::InvalidRequest(
            "종료 시각은 시작 시각 이후여야 합니다.".to_string(),
        ));
    }
    state
        .store
        .product(req.product_id)
        .await?
        .ok_or(ServiceError::ProductNotFound)?;

    let auction = state
        .store
        .insert_auction(Auction {
            id: 0,
            product_id: req.product_id,
            start_price: req.start_price,
            buy_now_price: req.buy_now_price,
            min_bid_step: req.min_bid_step,
            current_price: req.start_price,
            start_at: req.start_at,
            end_at: req.end_at,
            status: AuctionStatus::Scheduled,
            deleted_at: None,
            created_at: Utc::now(),
        })
        .await?;
    Ok(Json(auction))
}

/// 입찰 요청 처리
pub async fn handle_place_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(req): Json<PlaceBidRequest>,
) -> ServiceResult<Json<BidReceipt>> {
    if req.amount <= 0 {
        return Err(ServiceError::InvalidRequest(
            "입찰 금액은 0보다 커야 합니다.".to_string(),
        ));
    }
    let receipt = bidding::place_bid(
        state.store.as_ref(),
        &state.notifier,
        auction_id,
        req.bidder_id,
        req.amount,
    )
    .await?;
    Ok(Json(receipt))
}

/// 즉시 구매 요청 처리
pub async fn handle_buy_now(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(req): Json<BuyNowRequest>,
) -> ServiceResult<Json<BuyNowReceipt>> {
    let receipt = winner::buy_now(
        state.store.as_ref(),
        &state.relay,
        auction_id,
        req.buyer_id,
    )
    .await?;
    Ok(Json(receipt))
}

/// 토스 웹훅 처리
pub async fn handle_toss_webhook(
    State(state): State<AppState>,
    Json(req): Json<TossWebhookRequest>,
) -> ServiceResult<Json<serde_json::Value>> {
    info!(
        "{:<12} --> 토스 웹훅 수신 eventType={}",
        "Webhook", req.event_type
    );

    if req.event_type != "PAYMENT_STATUS_CHANGED" {
        info!(
            "{:<12} --> 무시된 이벤트 타입 eventType={}",
            "Webhook", req.event_type
        );
        return Ok(Json(serde_json::json!({ "message": "ignored" })));
    }
    if !req.data.status.eq_ignore_ascii_case("DONE") {
        info!(
            "{:<12} --> 완료되지 않은 결제 status={}",
            "Webhook", req.data.status
        );
        return Ok(Json(serde_json::json!({ "message": "ignored" })));
    }

    let winner_id = toss::extract_winner_id(&req.data.order_id)?;
    let confirmed = state
        .payments
        .confirm_payment_by_webhook(&req.data.payment_key, winner_id, req.data.total_amount)
        .await?;

    // 재전달된 웹훅은 상태를 바꾸지 않았으므로 이벤트도 다시 내지 않는다
    if confirmed.transitioned {
        state.relay.publish(DomainEvent::PaymentApproved {
            payment_id: confirmed.payment.id,
            toss_payment_key: req.data.payment_key.clone(),
        });
    }

    Ok(Json(serde_json::json!({
        "message": "결제가 승인되었습니다.",
        "payment_id": confirmed.payment.id,
    })))
}

/// 빌링 키 등록
pub async fn handle_register_billing_key(
    State(state): State<AppState>,
    Json(req): Json<RegisterBillingKeyRequest>,
) -> ServiceResult<Json<serde_json::Value>> {
    if req.billing_key.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "빌링 키는 비울 수 없습니다.".to_string(),
        ));
    }
    state
        .store
        .register_billing_key(req.user_id, req.billing_key)
        .await?;
    Ok(Json(
        serde_json::json!({ "message": "빌링 키가 등록되었습니다." }),
    ))
}

/// 구매 확정 - 정산 조기 해제
pub async fn handle_settlement_confirm(
    State(state): State<AppState>,
    Query(query): Query<SettlementConfirmQuery>,
) -> ServiceResult<Json<serde_json::Value>> {
    state
        .settlements
        .release_by_purchase_confirm(query.payment_id)
        .await?;
    Ok(Json(
        serde_json::json!({ "message": "구매 확정으로 정산이 해제되었습니다." }),
    ))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 경매 상태 조회
pub async fn handle_get_auction_state(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> ServiceResult<Json<Auction>> {
    let auction = query::get_auction_state(state.store.as_ref(), auction_id).await?;
    Ok(Json(auction))
}

/// 최고 입찰가 조회
pub async fn handle_get_highest_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> ServiceResult<Json<Option<Bid>>> {
    let bid = query::get_highest_bid(state.store.as_ref(), auction_id).await?;
    Ok(Json(bid))
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> ServiceResult<Json<Vec<Bid>>> {
    let bids = query::get_bid_history(state.store.as_ref(), auction_id).await?;
    Ok(Json(bids))
}

/// 실시간 최고가 SSE 스트림
pub async fn handle_price_stream(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    info!(
        "{:<12} --> SSE 구독 시작 auctionId={}",
        "Notifier", auction_id
    );
    let rx = state.notifier.subscribe(auction_id);
    let stream =
        ReceiverStream::new(rx).map(|update| Event::default().event("highestPrice").json_data(&update));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// endregion: --- Query Handlers
