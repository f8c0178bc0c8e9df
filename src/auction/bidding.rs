/// 입찰 승인 엔진
/// 같은 경매에 대한 성공 입찰은 선형화된다: 관측한 current_price에서만 전진하는
/// compare-and-set으로 입찰 삽입과 가격 갱신을 원자화하고, 충돌하면 최신 가격을
/// 다시 읽어 검증부터 재시도한다. 낡은 최고가로 계산한 최소 증분이
/// 그대로 통과하는 일은 없다.
// region:    --- Imports
use chrono::Utc;
use tracing::{info, warn};

use crate::auction::model::{AuctionStatus, Bid, BidReceipt};
use crate::error::{ServiceError, ServiceResult};
use crate::notifier::{PriceNotifier, PriceUpdate};
use crate::store::LedgerStore;

// endregion: --- Imports

// 낙관적 재시도 상한
const MAX_RETRIES: u32 = 100;

// region:    --- Place Bid

pub async fn place_bid(
    store: &dyn LedgerStore,
    notifier: &PriceNotifier,
    auction_id: i64,
    bidder_id: i64,
    amount: i64,
) -> ServiceResult<BidReceipt> {
    info!(
        "{:<12} --> 입찰 요청 auctionId={} bidderId={} amount={}",
        "Bid", auction_id, bidder_id, amount
    );

    let mut retries = 0;
    while retries < MAX_RETRIES {
        let auction = store
            .auction(auction_id)
            .await?
            .ok_or(ServiceError::AuctionNotFound)?;
        if auction.deleted_at.is_some() {
            return Err(ServiceError::AuctionNotFound);
        }

        let now = Utc::now();

        match auction.status {
            AuctionStatus::Scheduled => return Err(ServiceError::AuctionNotLive),
            AuctionStatus::Ended | AuctionStatus::Cancelled => {
                return Err(ServiceError::AuctionAlreadyEnded)
            }
            AuctionStatus::Live if now >= auction.end_at => {
                return Err(ServiceError::AuctionAlreadyEnded)
            }
            AuctionStatus::Live => {}
        }

        let product = store
            .product(auction.product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound)?;
        if product.seller_id == bidder_id {
            return Err(ServiceError::SelfBiddingNotAllowed);
        }

        // current_price는 (최고 입찰가 ?? 시작가)의 캐시
        let min_required = auction.current_price + auction.min_bid_step;
        if amount < min_required {
            return Err(ServiceError::BidTooLow);
        }

        let bid = Bid {
            id: 0,
            auction_id,
            bidder_id,
            amount,
            created_at: now,
            is_auto: false,
        };

        match store.record_bid(bid, auction.current_price).await? {
            Some(bid) => {
                info!(
                    "{:<12} --> 입찰 성공 auctionId={} currentPrice={}",
                    "Bid", auction_id, bid.amount
                );
                notifier.publish(PriceUpdate {
                    auction_id,
                    current_price: bid.amount,
                    bid_time: bid.created_at,
                });
                return Ok(BidReceipt {
                    auction_id,
                    is_highest_bidder: true,
                    current_highest_bid: bid.amount,
                    bid_time: bid.created_at,
                });
            }
            None => {
                warn!(
                    "{:<12} --> 동시 입찰로 가격이 바뀌어 재시도 auctionId={}",
                    "Bid", auction_id
                );
                retries += 1;
            }
        }
    }

    Err(ServiceError::MaxRetriesExceeded)
}

// endregion: --- Place Bid
