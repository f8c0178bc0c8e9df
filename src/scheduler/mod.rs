/// 백그라운드 스윕 스케줄러
/// 경매 활성화/만료 스윕과 정산 자동 해제 스윕이 독립된 주기 타이머로 돈다.
/// 각 행 전이가 멱등·단방향이라 틱이 겹치거나 반복되어도 안전하다.
// region:    --- Imports
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

use crate::auction::lifecycle;
use crate::relay::EventRelay;
use crate::settlement::SettlementReleaseService;
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Auction Scheduler

/// 경매 상태 스윕: SCHEDULED → LIVE 활성화, 만료된 LIVE의 낙찰 확정
pub struct AuctionScheduler {
    store: Arc<dyn LedgerStore>,
    relay: EventRelay,
    period: Duration,
}

impl AuctionScheduler {
    pub fn new(store: Arc<dyn LedgerStore>, relay: EventRelay, period: Duration) -> Self {
        Self {
            store,
            relay,
            period,
        }
    }

    pub async fn start(&self) {
        let store = Arc::clone(&self.store);
        let relay = self.relay.clone();
        let period = self.period;
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;
                let now = Utc::now();
                if let Err(e) = lifecycle::activate_due_auctions(store.as_ref(), now).await {
                    error!("{:<12} --> 경매 활성화 스윕 오류: {:?}", "Scheduler", e);
                }
                if let Err(e) = lifecycle::expire_due_auctions(store.as_ref(), &relay, now).await {
                    error!("{:<12} --> 경매 만료 스윕 오류: {:?}", "Scheduler", e);
                }
                debug!("{:<12} --> 경매 스윕 완료", "Scheduler");
            }
        });
    }
}

// endregion: --- Auction Scheduler

// region:    --- Settlement Scheduler

/// 보류 기간이 지난 정산 자동 해제 스윕
pub struct SettlementScheduler {
    settlements: SettlementReleaseService,
    period: Duration,
}

impl SettlementScheduler {
    pub fn new(settlements: SettlementReleaseService, period: Duration) -> Self {
        Self {
            settlements,
            period,
        }
    }

    pub async fn start(&self) {
        let settlements = self.settlements.clone();
        let period = self.period;
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;
                match settlements.release_automatically(Utc::now()).await {
                    Ok(released) => {
                        if released > 0 {
                            debug!("{:<12} --> 정산 {}건 자동 해제", "Scheduler", released);
                        }
                    }
                    Err(e) => {
                        error!("{:<12} --> 정산 자동 해제 오류: {:?}", "Scheduler", e)
                    }
                }
            }
        });
    }
}

// endregion: --- Settlement Scheduler
