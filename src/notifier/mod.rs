/// 실시간 가격 푸시 팬아웃
/// 경매 id로 키잉된 구독자 맵. 연결/해제/오류 시 명시적으로 추가·제거되며
/// 전송은 best-effort at-most-once다. 코어 로직은 입찰 성공 후 publish 한 번만
/// 호출한다.
// region:    --- Imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

// endregion: --- Imports

// region:    --- Price Notifier

#[derive(Debug, Clone, Serialize)]
pub struct PriceUpdate {
    pub auction_id: i64,
    pub current_price: i64,
    pub bid_time: DateTime<Utc>,
}

#[derive(Default)]
pub struct PriceNotifier {
    subscribers: DashMap<i64, Vec<mpsc::Sender<PriceUpdate>>>,
}

impl PriceNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 구독 등록. 반환된 수신기가 드롭되면 다음 publish에서 정리된다.
    pub fn subscribe(&self, auction_id: i64) -> mpsc::Receiver<PriceUpdate> {
        let (tx, rx) = mpsc::channel(32);
        self.subscribers.entry(auction_id).or_default().push(tx);
        rx
    }

    /// 구독자 전원에게 전송하고, 닫혔거나 가득 찬 채널은 제거한다.
    pub fn publish(&self, update: PriceUpdate) {
        let auction_id = update.auction_id;
        if let Some(mut subscribers) = self.subscribers.get_mut(&auction_id) {
            subscribers.retain(|tx| tx.try_send(update.clone()).is_ok());
        }
        self.subscribers.remove_if(&auction_id, |_, v| v.is_empty());
    }

    pub fn subscriber_count(&self, auction_id: i64) -> usize {
        self.subscribers
            .get(&auction_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

// endregion: --- Price Notifier
