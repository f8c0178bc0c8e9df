/// 경매 수명주기 관리
/// 활성화 스윕과 만료 스윕을 분리해 타이머 스케줄러가 틱마다 여러 경매를
/// 행 단위의 독립적인 단방향 전이로 진행시킨다.
// region:    --- Imports
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::auction::model::AuctionStatus;
use crate::auction::winner;
use crate::error::{ServiceError, ServiceResult};
use crate::relay::EventRelay;
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Lifecycle Operations

/// 시작 시각이 지난 SCHEDULED 경매를 LIVE로 전환한다. 반복 호출에 안전하다.
pub async fn activate_due_auctions(
    store: &dyn LedgerStore,
    now: DateTime<Utc>,
) -> ServiceResult<u64> {
    let activated = store.activate_due_auctions(now).await?;
    if activated > 0 {
        debug!("{:<12} --> 경매 {}건 활성화", "Lifecycle", activated);
    }
    Ok(activated)
}

/// 종료 시각이 지난 LIVE 경매를 낙찰 확정으로 넘긴다.
/// ENDED 전이는 낙찰 확정과 같은 트랜잭션 경계에서 일어난다.
pub async fn expire_due_auctions(
    store: &dyn LedgerStore,
    relay: &EventRelay,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    for auction in store.expired_live_auctions(now).await? {
        if let Err(e) = winner::finalize_auction(store, relay, auction.id, now).await {
            // 한 건의 실패가 스윕 전체를 멈추지 않는다
            error!(
                "{:<12} --> 경매 만료 처리 실패 auctionId={}: {:?}",
                "Lifecycle", auction.id, e
            );
        }
    }
    Ok(())
}

/// 수동 조기 종료. LIVE가 아니면 InvalidStateTransition, end_at은 now로 당겨진다.
pub async fn end_auction(
    store: &dyn LedgerStore,
    auction_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let auction = store
        .auction(auction_id)
        .await?
        .ok_or(ServiceError::AuctionNotFound)?;

    if auction.status != AuctionStatus::Live {
        return Err(ServiceError::InvalidStateTransition);
    }
    if !store.end_auction(auction_id, now).await? {
        return Err(ServiceError::InvalidStateTransition);
    }
    Ok(())
}

// endregion: --- Lifecycle Operations
