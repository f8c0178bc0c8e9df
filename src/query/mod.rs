/// 조회 전용 핸들러
// region:    --- Imports
use tracing::info;

use crate::auction::model::{Auction, Bid};
use crate::error::{ServiceError, ServiceResult};
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Query Handlers

/// 경매 상태 조회
pub async fn get_auction_state(store: &dyn LedgerStore, auction_id: i64) -> ServiceResult<Auction> {
    info!("{:<12} --> 경매 상태 조회 id: {}", "Query", auction_id);
    store
        .auction(auction_id)
        .await?
        .filter(|a| a.deleted_at.is_none())
        .ok_or(ServiceError::AuctionNotFound)
}

/// 최고 입찰 조회
pub async fn get_highest_bid(
    store: &dyn LedgerStore,
    auction_id: i64,
) -> ServiceResult<Option<Bid>> {
    info!("{:<12} --> 최고 입찰가 조회 id: {}", "Query", auction_id);
    store.highest_bid(auction_id).await
}

/// 입찰 이력 조회(최신순)
pub async fn get_bid_history(store: &dyn LedgerStore, auction_id: i64) -> ServiceResult<Vec<Bid>> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    store.bid_history(auction_id).await
}

// endregion: --- Query Handlers
