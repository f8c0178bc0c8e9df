use std::sync::Arc;

use chrono::{Duration, Utc};
use drop_auction_service::auction::model::{Auction, AuctionStatus, Product, Winner};
use drop_auction_service::auction::{bidding, lifecycle, winner};
use drop_auction_service::error::ServiceError;
use drop_auction_service::notifier::PriceNotifier;
use drop_auction_service::query;
use drop_auction_service::relay::{DomainEvent, EventRelay};
use drop_auction_service::store::{LedgerStore, MemoryStore};

/// 테스트 환경 구성
fn setup() -> (Arc<MemoryStore>, EventRelay, Arc<PriceNotifier>) {
    (
        Arc::new(MemoryStore::new()),
        EventRelay::new(64),
        Arc::new(PriceNotifier::new()),
    )
}

/// 진행 중인 경매 생성(시작가 1_000, 입찰 단위 100, 10분 후 종료)
async fn create_live_auction(
    store: &MemoryStore,
    seller_id: i64,
    buy_now_price: Option<i64>,
) -> (Product, Auction) {
    let product = store
        .insert_product(seller_id, "테스트 상품".to_string())
        .await
        .unwrap();
    let now = Utc::now();
    let auction = store
        .insert_auction(Auction {
            id: 0,
            product_id: product.id,
            start_price: 1_000,
            buy_now_price,
            min_bid_step: 100,
            current_price: 1_000,
            start_at: now - Duration::minutes(1),
            end_at: now + Duration::minutes(10),
            status: AuctionStatus::Live,
            deleted_at: None,
            created_at: now,
        })
        .await
        .unwrap();
    (product, auction)
}

/// 입찰 테스트
#[tokio::test]
async fn test_place_bid() {
    let (store, _relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    let receipt = bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_100)
        .await
        .unwrap();

    assert!(receipt.is_highest_bidder);
    assert_eq!(receipt.current_highest_bid, 1_100);

    let updated = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(updated.current_price, 1_100);
    assert_eq!(updated.status, AuctionStatus::Live);
}

/// 최소 입찰 단위 미달 거절 테스트
#[tokio::test]
async fn test_bid_below_min_step_rejected() {
    let (store, _relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    // 현재가 1_000 + 단위 100 = 최소 1_100, 1_050은 거절
    let result = bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_050).await;
    assert!(matches!(result, Err(ServiceError::BidTooLow)));

    // 거절된 입찰은 가격도 이력도 바꾸지 않는다
    let updated = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(updated.current_price, 1_000);
    assert!(store.bid_history(auction.id).await.unwrap().is_empty());
}

/// 판매자 본인 입찰 금지 테스트
#[tokio::test]
async fn test_seller_cannot_bid() {
    let (store, _relay, notifier) = setup();
    let (product, auction) = create_live_auction(&store, 7, None).await;

    let result =
        bidding::place_bid(store.as_ref(), &notifier, auction.id, product.seller_id, 2_000).await;
    assert!(matches!(result, Err(ServiceError::SelfBiddingNotAllowed)));
}

/// 진행 중이 아닌 경매 입찰 거절 테스트
#[tokio::test]
async fn test_bid_on_non_live_auction() {
    let (store, _relay, notifier) = setup();
    let product = store
        .insert_product(1, "아직 시작 전".to_string())
        .await
        .unwrap();
    let now = Utc::now();
    let scheduled = store
        .insert_auction(Auction {
            id: 0,
            product_id: product.id,
            start_price: 1_000,
            buy_now_price: None,
            min_bid_step: 100,
            current_price: 1_000,
            start_at: now + Duration::minutes(5),
            end_at: now + Duration::minutes(30),
            status: AuctionStatus::Scheduled,
            deleted_at: None,
            created_at: now,
        })
        .await
        .unwrap();

    let result = bidding::place_bid(store.as_ref(), &notifier, scheduled.id, 2, 1_100).await;
    assert!(matches!(result, Err(ServiceError::AuctionNotLive)));

    // 이미 종료된 경매도 거절된다
    let (_, expired) = create_live_auction(&store, 1, None).await;
    store.end_auction(expired.id, now).await.unwrap();
    let result = bidding::place_bid(store.as_ref(), &notifier, expired.id, 2, 1_100).await;
    assert!(matches!(result, Err(ServiceError::AuctionAlreadyEnded)));
}

/// 동시 입찰 테스트: 성공한 입찰은 승인 순서대로 단조 증가해야 한다
#[tokio::test]
async fn test_concurrent_bids_are_monotonic() {
    let (store, _relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    let mut handles = Vec::new();
    for i in 0..50i64 {
        let store = Arc::clone(&store);
        let notifier = Arc::clone(&notifier);
        let auction_id = auction.id;
        let amount = 1_100 + i * 100;
        handles.push(tokio::spawn(async move {
            bidding::place_bid(store.as_ref(), &notifier, auction_id, 100 + i, amount).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }
    assert!(succeeded >= 1);

    // 승인된 입찰을 승인 순서(id 오름차순)로 보면 금액이 강증가한다
    let mut bids = store.bid_history(auction.id).await.unwrap();
    bids.sort_by_key(|b| b.id);
    assert_eq!(bids.len(), succeeded);
    for pair in bids.windows(2) {
        assert!(pair[1].amount > pair[0].amount);
    }

    // current_price는 마지막 승인 입찰과 일치한다
    let updated = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(updated.current_price, bids.last().unwrap().amount);
}

/// 예정 경매 활성화 스윕 테스트
#[tokio::test]
async fn test_activate_due_auctions() {
    let (store, _relay, _notifier) = setup();
    let product = store.insert_product(1, "상품".to_string()).await.unwrap();
    let now = Utc::now();

    let due = store
        .insert_auction(Auction {
            id: 0,
            product_id: product.id,
            start_price: 1_000,
            buy_now_price: None,
            min_bid_step: 100,
            current_price: 1_000,
            start_at: now - Duration::seconds(1),
            end_at: now + Duration::minutes(10),
            status: AuctionStatus::Scheduled,
            deleted_at: None,
            created_at: now,
        })
        .await
        .unwrap();
    let not_due = store
        .insert_auction(Auction {
            id: 0,
            product_id: product.id,
            start_price: 1_000,
            buy_now_price: None,
            min_bid_step: 100,
            current_price: 1_000,
            start_at: now + Duration::minutes(5),
            end_at: now + Duration::minutes(30),
            status: AuctionStatus::Scheduled,
            deleted_at: None,
            created_at: now,
        })
        .await
        .unwrap();

    let activated = lifecycle::activate_due_auctions(store.as_ref(), now)
        .await
        .unwrap();
    assert_eq!(activated, 1);
    assert_eq!(
        store.auction(due.id).await.unwrap().unwrap().status,
        AuctionStatus::Live
    );
    assert_eq!(
        store.auction(not_due.id).await.unwrap().unwrap().status,
        AuctionStatus::Scheduled
    );
}

/// 만료 스윕 낙찰 확정 테스트
#[tokio::test]
async fn test_expire_sweep_finalizes_winner() {
    let (store, relay, notifier) = setup();
    let (product, auction) = create_live_auction(&store, 1, None).await;
    let mut rx = relay.subscribe();

    bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_100)
        .await
        .unwrap();
    bidding::place_bid(store.as_ref(), &notifier, auction.id, 3, 1_500)
        .await
        .unwrap();

    // 종료 시각이 지난 시점의 스윕
    let later = auction.end_at + Duration::seconds(1);
    lifecycle::expire_due_auctions(store.as_ref(), &relay, later)
        .await
        .unwrap();

    let ended = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(ended.status, AuctionStatus::Ended);

    let won = store.winner_by_auction(auction.id).await.unwrap().unwrap();
    assert_eq!(won.user_id, 3);
    assert_eq!(won.final_price, 1_500);
    assert_eq!(won.seller_id, product.seller_id);

    match rx.recv().await.unwrap() {
        DomainEvent::WinnerFinalized {
            auction_id,
            user_id,
            final_price,
            ..
        } => {
            assert_eq!(auction_id, auction.id);
            assert_eq!(user_id, 3);
            assert_eq!(final_price, 1_500);
        }
        other => panic!("예상하지 못한 이벤트: {other:?}"),
    }
}

/// 유찰 경매 테스트: 입찰이 없으면 낙찰자 없이 종료된다
#[tokio::test]
async fn test_expire_sweep_void_auction() {
    let (store, relay, _notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;
    let mut rx = relay.subscribe();

    let later = auction.end_at + Duration::seconds(1);
    lifecycle::expire_due_auctions(store.as_ref(), &relay, later)
        .await
        .unwrap();

    let ended = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(ended.status, AuctionStatus::Ended);
    assert!(store.winner_by_auction(auction.id).await.unwrap().is_none());

    assert!(matches!(
        rx.recv().await.unwrap(),
        DomainEvent::AuctionVoid { auction_id } if auction_id == auction.id
    ));
}

/// 낙찰 확정 멱등성 테스트: 스윕이 반복되어도 낙찰자는 하나
#[tokio::test]
async fn test_finalize_is_idempotent() {
    let (store, relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_100)
        .await
        .unwrap();

    let later = auction.end_at + Duration::seconds(1);
    winner::finalize_auction(store.as_ref(), &relay, auction.id, later)
        .await
        .unwrap();
    let first = store.winner_by_auction(auction.id).await.unwrap().unwrap();

    // 두 번째 확정은 no-op
    winner::finalize_auction(store.as_ref(), &relay, auction.id, later)
        .await
        .unwrap();
    let second = store.winner_by_auction(auction.id).await.unwrap().unwrap();
    assert_eq!(first.id, second.id);
}

/// 종료 전 확정 시도 테스트: 기간이 남은 경매는 건드리지 않는다
#[tokio::test]
async fn test_finalize_before_end_is_noop() {
    let (store, relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_100)
        .await
        .unwrap();

    winner::finalize_auction(store.as_ref(), &relay, auction.id, Utc::now())
        .await
        .unwrap();

    let unchanged = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, AuctionStatus::Live);
    assert!(store.winner_by_auction(auction.id).await.unwrap().is_none());
}

/// 즉시 구매 테스트
#[tokio::test]
async fn test_buy_now() {
    let (store, relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, Some(5_000)).await;
    let mut rx = relay.subscribe();

    let receipt = winner::buy_now(store.as_ref(), &relay, auction.id, 9)
        .await
        .unwrap();
    assert_eq!(receipt.status, AuctionStatus::Ended);
    assert_eq!(receipt.final_price, 5_000);

    let ended = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(ended.status, AuctionStatus::Ended);
    // end_at은 구매 시점으로 당겨진다
    assert!(ended.end_at <= receipt.win_time);

    assert!(matches!(
        rx.recv().await.unwrap(),
        DomainEvent::WinnerFinalized { final_price: 5_000, .. }
    ));

    // 종료된 경매에는 더 이상 입찰도 즉시 구매도 불가
    let result = bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 6_000).await;
    assert!(matches!(result, Err(ServiceError::AuctionAlreadyEnded)));
    let result = winner::buy_now(store.as_ref(), &relay, auction.id, 10).await;
    assert!(matches!(result, Err(ServiceError::AuctionNotLive)));
}

/// 즉시 구매 전제 조건 테스트
#[tokio::test]
async fn test_buy_now_preconditions() {
    let (store, relay, _notifier) = setup();

    // 즉시 구매 가격이 없는 경매
    let (_, without_price) = create_live_auction(&store, 1, None).await;
    let result = winner::buy_now(store.as_ref(), &relay, without_price.id, 2).await;
    assert!(matches!(result, Err(ServiceError::BuyNowNotAvailable)));

    // 판매자 본인의 즉시 구매
    let (product, auction) = create_live_auction(&store, 3, Some(5_000)).await;
    let result = winner::buy_now(store.as_ref(), &relay, auction.id, product.seller_id).await;
    assert!(matches!(result, Err(ServiceError::SelfBiddingNotAllowed)));
}

/// 즉시 구매 후 만료 스윕 테스트: 구매자가 낙찰자로 유지된다
#[tokio::test]
async fn test_finalize_after_buy_now_is_noop() {
    let (store, relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, Some(5_000)).await;

    bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 4_900)
        .await
        .unwrap();
    winner::buy_now(store.as_ref(), &relay, auction.id, 9)
        .await
        .unwrap();

    let later = auction.end_at + Duration::seconds(1);
    winner::finalize_auction(store.as_ref(), &relay, auction.id, later)
        .await
        .unwrap();

    let won = store.winner_by_auction(auction.id).await.unwrap().unwrap();
    assert_eq!(won.user_id, 9);
    assert_eq!(won.final_price, 5_000);
}

/// 즉시 구매와 확정 스윕 경합 테스트: 낙찰자는 정확히 하나
#[tokio::test]
async fn test_buy_now_races_with_finalize() {
    let (store, relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, Some(5_000)).await;

    bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_100)
        .await
        .unwrap();

    let later = auction.end_at + Duration::seconds(1);
    let finalize = {
        let store = Arc::clone(&store);
        let relay = relay.clone();
        let auction_id = auction.id;
        tokio::spawn(async move {
            winner::finalize_auction(store.as_ref(), &relay, auction_id, later).await
        })
    };
    let buy = {
        let store = Arc::clone(&store);
        let relay = relay.clone();
        let auction_id = auction.id;
        tokio::spawn(
            async move { winner::buy_now(store.as_ref(), &relay, auction_id, 9).await },
        )
    };

    // 어느 쪽이 이기든 낙찰자는 하나만 남는다
    let _ = finalize.await.unwrap();
    let _ = buy.await.unwrap();

    let won = store.winner_by_auction(auction.id).await.unwrap().unwrap();
    assert!(won.user_id == 2 || won.user_id == 9);
    assert_eq!(
        store.auction(auction.id).await.unwrap().unwrap().status,
        AuctionStatus::Ended
    );
}

/// 유찰 종료와 즉시 구매 경합 테스트: 종료된 경매에 낙찰자가 붙지 않는다
#[tokio::test]
async fn test_buy_now_loses_race_with_void_end() {
    let (store, relay, _notifier) = setup();
    let (product, auction) = create_live_auction(&store, 1, Some(5_000)).await;

    // 입찰 없는 경매가 만료 스윕으로 유찰 종료된다
    let later = auction.end_at + Duration::seconds(1);
    lifecycle::expire_due_auctions(store.as_ref(), &relay, later)
        .await
        .unwrap();
    assert_eq!(
        store.auction(auction.id).await.unwrap().unwrap().status,
        AuctionStatus::Ended
    );

    // LIVE 검증을 스윕 커밋 직전에 통과한 즉시 구매가 낙찰자를 밀어넣는 상황:
    // 저장소 수준의 LIVE 가드가 탈락시킨다
    let refused = store
        .insert_winner_and_end(Winner {
            id: 0,
            auction_id: auction.id,
            seller_id: product.seller_id,
            user_id: 9,
            final_price: 5_000,
            win_time: later,
        })
        .await
        .unwrap();
    assert!(refused.is_none());
    assert!(store.winner_by_auction(auction.id).await.unwrap().is_none());

    // 이후의 즉시 구매 요청도 종료 상태로 거절된다
    let result = winner::buy_now(store.as_ref(), &relay, auction.id, 9).await;
    assert!(matches!(result, Err(ServiceError::AuctionNotLive)));
}

/// 수동 조기 종료 테스트
#[tokio::test]
async fn test_manual_end_auction() {
    let (store, _relay, _notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    let now = Utc::now();
    lifecycle::end_auction(store.as_ref(), auction.id, now)
        .await
        .unwrap();

    let ended = store.auction(auction.id).await.unwrap().unwrap();
    assert_eq!(ended.status, AuctionStatus::Ended);
    assert!(ended.end_at <= now);

    // 이미 종료된 경매는 다시 종료할 수 없다
    let result = lifecycle::end_auction(store.as_ref(), auction.id, now).await;
    assert!(matches!(result, Err(ServiceError::InvalidStateTransition)));
}

/// 실시간 가격 푸시 테스트
#[tokio::test]
async fn test_price_notifier_fanout() {
    let (store, _relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    let mut rx1 = notifier.subscribe(auction.id);
    let mut rx2 = notifier.subscribe(auction.id);
    assert_eq!(notifier.subscriber_count(auction.id), 2);

    bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_100)
        .await
        .unwrap();

    let update = rx1.recv().await.unwrap();
    assert_eq!(update.auction_id, auction.id);
    assert_eq!(update.current_price, 1_100);
    assert_eq!(rx2.recv().await.unwrap().current_price, 1_100);

    // 끊긴 구독자는 다음 publish에서 정리된다
    drop(rx1);
    drop(rx2);
    bidding::place_bid(store.as_ref(), &notifier, auction.id, 3, 1_200)
        .await
        .unwrap();
    assert_eq!(notifier.subscriber_count(auction.id), 0);
}

/// 조회 테스트
#[tokio::test]
async fn test_query_handlers() {
    let (store, _relay, notifier) = setup();
    let (_, auction) = create_live_auction(&store, 1, None).await;

    bidding::place_bid(store.as_ref(), &notifier, auction.id, 2, 1_100)
        .await
        .unwrap();
    bidding::place_bid(store.as_ref(), &notifier, auction.id, 3, 1_300)
        .await
        .unwrap();

    let state = query::get_auction_state(store.as_ref(), auction.id)
        .await
        .unwrap();
    assert_eq!(state.current_price, 1_300);

    let highest = query::get_highest_bid(store.as_ref(), auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(highest.amount, 1_300);
    assert_eq!(highest.bidder_id, 3);

    // 이력은 최신순
    let history = query::get_bid_history(store.as_ref(), auction.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].amount >= history[1].amount);

    let result = query::get_auction_state(store.as_ref(), 999_999).await;
    assert!(matches!(result, Err(ServiceError::AuctionNotFound)));
}
