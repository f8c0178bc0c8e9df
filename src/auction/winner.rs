/// 낙찰 확정 엔진
/// 스케줄러 경로(finalize_auction)와 즉시 구매 경로(buy_now)가 같은 멱등 코어로
/// 수렴한다: 낙찰자 삽입은 auction_id 유니크 제약으로 가드되고 ENDED 전이와
/// 같은 트랜잭션 경계에서 일어나므로, 스윕과 즉시 구매가 경합해도 낙찰자는
/// 정확히 하나다.
// region:    --- Imports
use chrono::{DateTime, Utc};
use tracing::info;

use crate::auction::model::{AuctionStatus, BuyNowReceipt, Winner};
use crate::error::{ServiceError, ServiceResult};
use crate::relay::{DomainEvent, EventRelay};
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Finalize Auction

/// 스케줄러 주도 확정. 이미 종료되었거나 아직 기간이 남았으면 no-op.
pub async fn finalize_auction(
    store: &dyn LedgerStore,
    relay: &EventRelay,
    auction_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let auction = store
        .auction(auction_id)
        .await?
        .ok_or(ServiceError::AuctionNotFound)?;

    if matches!(
        auction.status,
        AuctionStatus::Ended | AuctionStatus::Cancelled
    ) {
        return Ok(());
    }
    if auction.end_at > now {
        return Ok(());
    }

    let product = store
        .product(auction.product_id)
        .await?
        .ok_or(ServiceError::ProductNotFound)?;

    let Some(top_bid) = store.highest_bid(auction_id).await? else {
        // 유찰: 낙찰자 없이 종료하고 판매자 알림 이벤트만 발행
        if store.end_auction(auction_id, now).await? {
            info!("{:<12} --> 유찰로 종료 auctionId={}", "Winner", auction_id);
            relay.publish(DomainEvent::AuctionVoid { auction_id });
        }
        return Ok(());
    };

    let winner = Winner {
        id: 0,
        auction_id,
        seller_id: product.seller_id,
        user_id: top_bid.bidder_id,
        final_price: top_bid.amount,
        win_time: now,
    };

    match store.insert_winner_and_end(winner).await? {
        Some(winner) => {
            info!(
                "{:<12} --> 낙찰 확정 auctionId={} winnerId={} finalPrice={}",
                "Winner", auction_id, winner.id, winner.final_price
            );
            relay.publish(DomainEvent::WinnerFinalized {
                auction_id,
                winner_id: winner.id,
                seller_id: winner.seller_id,
                user_id: winner.user_id,
                final_price: winner.final_price,
            });
        }
        None => {
            // 즉시 구매 또는 다른 스윕이 먼저 확정한 경우: 오류가 아니라 no-op
            info!(
                "{:<12} --> 이미 확정된 경매 auctionId={}",
                "Winner", auction_id
            );
        }
    }
    Ok(())
}

// endregion: --- Finalize Auction

// region:    --- Buy Now

/// 즉시 구매. 낙찰자 생성과 경매 종료를 같은 원자 연산으로 처리한다.
pub async fn buy_now(
    store: &dyn LedgerStore,
    relay: &EventRelay,
    auction_id: i64,
    buyer_id: i64,
) -> ServiceResult<BuyNowReceipt> {
    info!(
        "{:<12} --> 즉시 구매 요청 auctionId={} buyerId={}",
        "Winner", auction_id, buyer_id
    );

    let auction = store
        .auction(auction_id)
        .await?
        .ok_or(ServiceError::AuctionNotFound)?;
    if auction.deleted_at.is_some() {
        return Err(ServiceError::AuctionNotFound);
    }

    let now = Utc::now();

    if auction.status != AuctionStatus::Live {
        return Err(ServiceError::AuctionNotLive);
    }
    if now >= auction.end_at {
        return Err(ServiceError::AuctionAlreadyEnded);
    }
    let Some(buy_now_price) = auction.buy_now_price else {
        return Err(ServiceError::BuyNowNotAvailable);
    };

    let product = store
        .product(auction.product_id)
        .await?
        .ok_or(ServiceError::ProductNotFound)?;
    if product.seller_id == buyer_id {
        return Err(ServiceError::SelfBiddingNotAllowed);
    }

    if store.winner_by_auction(auction_id).await?.is_some() {
        return Err(ServiceError::AuctionAlreadyEnded);
    }

    let winner = Winner {
        id: 0,
        auction_id,
        seller_id: product.seller_id,
        user_id: buyer_id,
        final_price: buy_now_price,
        win_time: now,
    };

    // 확정 스윕과 경합하면 유니크 제약이 한쪽을 탈락시킨다
    let Some(winner) = store.insert_winner_and_end(winner).await? else {
        return Err(ServiceError::AuctionAlreadyEnded);
    };

    info!(
        "{:<12} --> 즉시 구매 낙찰 auctionId={} winnerId={} finalPrice={}",
        "Winner", auction_id, winner.id, winner.final_price
    );
    relay.publish(DomainEvent::WinnerFinalized {
        auction_id,
        winner_id: winner.id,
        seller_id: winner.seller_id,
        user_id: winner.user_id,
        final_price: winner.final_price,
    });

    Ok(BuyNowReceipt {
        auction_id,
        status: AuctionStatus::Ended,
        winner_id: winner.id,
        final_price: winner.final_price,
        win_time: winner.win_time,
    })
}

// endregion: --- Buy Now
