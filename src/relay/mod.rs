/// 인프로세스 이벤트 릴레이
/// 낙찰 확정 → 결제 생성 → 자동결제 → 정산의 체인을 직접 호출 대신
/// 메시지 전달로 연결한다. 각 단계는 재전달을 가정하고 멱등하게 설계되어 있어
/// at-least-once 전달로 충분하다.
// region:    --- Imports
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::ServiceResult;
use crate::payment::model::PaymentStatus;
use crate::payment::service::PaymentService;
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Domain Events

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// 낙찰자 확정(타이머 만료 또는 즉시 구매)
    WinnerFinalized {
        auction_id: i64,
        winner_id: i64,
        seller_id: i64,
        user_id: i64,
        final_price: i64,
    },
    /// 입찰 없이 종료된 유찰 경매
    AuctionVoid { auction_id: i64 },
    /// 등록된 빌링 키로 자동결제 요청
    AutoPaymentRequested { payment_id: i64, billing_key: String },
    PaymentApproved {
        payment_id: i64,
        toss_payment_key: String,
    },
    PaymentFailed { payment_id: i64, reason: String },
}

// endregion: --- Domain Events

// region:    --- Event Relay

/// 이벤트 발행 핸들
#[derive(Clone)]
pub struct EventRelay {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventRelay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            debug!("{:<12} --> 구독자가 없어 이벤트를 버립니다.", "Relay");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

// endregion: --- Event Relay

// region:    --- Event Consumer

/// 이벤트 소비 태스크
pub struct EventConsumer {
    store: Arc<dyn LedgerStore>,
    payments: PaymentService,
    relay: EventRelay,
    rx: broadcast::Receiver<DomainEvent>,
}

impl EventConsumer {
    /// 생성 시점에 구독을 시작해 기동 직후 발행되는 이벤트를 놓치지 않는다.
    pub fn new(store: Arc<dyn LedgerStore>, payments: PaymentService, relay: EventRelay) -> Self {
        let rx = relay.subscribe();
        Self {
            store,
            payments,
            relay,
            rx,
        }
    }

    pub async fn start(mut self) {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.process(event).await {
                        error!("{:<12} --> 이벤트 처리 오류: {:?}", "EventConsume", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "{:<12} --> 이벤트 {}건 유실(소비 지연)",
                        "EventConsume", skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn process(&self, event: DomainEvent) -> ServiceResult<()> {
        match event {
            DomainEvent::WinnerFinalized {
                winner_id,
                user_id,
                final_price,
                ..
            } => self.handle_winner_finalized(winner_id, user_id, final_price).await,
            DomainEvent::AutoPaymentRequested {
                payment_id,
                billing_key,
            } => self.handle_auto_payment_requested(payment_id, &billing_key).await,
            DomainEvent::AuctionVoid { auction_id } => {
                // 판매자 유찰 알림 경계
                info!("{:<12} --> 유찰 auctionId={}", "EventConsume", auction_id);
                Ok(())
            }
            DomainEvent::PaymentApproved {
                payment_id,
                toss_payment_key,
            } => {
                // 구매자/판매자 알림 경계, 추가 상태 변경 없음
                info!(
                    "{:<12} --> 결제 승인 paymentId={} paymentKey={}",
                    "EventConsume", payment_id, toss_payment_key
                );
                Ok(())
            }
            DomainEvent::PaymentFailed { payment_id, reason } => {
                info!(
                    "{:<12} --> 결제 실패 paymentId={} reason={}",
                    "EventConsume", payment_id, reason
                );
                Ok(())
            }
        }
    }

    /// WinnerFinalized: 결제 생성 후 빌링 키가 있으면 자동결제를 요청한다.
    async fn handle_winner_finalized(
        &self,
        winner_id: i64,
        user_id: i64,
        final_price: i64,
    ) -> ServiceResult<()> {
        let payment = self.payments.create_payment(winner_id, final_price).await?;
        info!(
            "{:<12} --> 결제 REQUESTED 생성 paymentId={}",
            "EventConsume", payment.id
        );

        match self.store.billing_key(user_id).await? {
            Some(billing_key) => {
                self.relay.publish(DomainEvent::AutoPaymentRequested {
                    payment_id: payment.id,
                    billing_key,
                });
            }
            None => {
                // 자동결제 불가 → 웹훅 수동 결제 대기
                info!(
                    "{:<12} --> 등록된 카드 없음 userId={}, 웹훅 결제 대기",
                    "EventConsume", user_id
                );
            }
        }
        Ok(())
    }

    /// AutoPaymentRequested: 재전달을 피하려면 현재 상태를 먼저 확인한다.
    /// 게이트웨이 쪽 멱등 키가 최종 안전망이다.
    async fn handle_auto_payment_requested(
        &self,
        payment_id: i64,
        billing_key: &str,
    ) -> ServiceResult<()> {
        let Some(payment) = self.store.payment(payment_id).await? else {
            warn!(
                "{:<12} --> 자동결제 대상 결제 없음 paymentId={}",
                "EventConsume", payment_id
            );
            return Ok(());
        };
        if payment.status != PaymentStatus::Requested {
            info!(
                "{:<12} --> 이미 처리된 결제, 자동결제 건너뜀 paymentId={} status={}",
                "EventConsume",
                payment_id,
                payment.status.as_str()
            );
            return Ok(());
        }

        let payment = self
            .payments
            .attempt_auto_payment(payment_id, billing_key)
            .await?;

        match payment.status {
            PaymentStatus::Paid => {
                self.relay.publish(DomainEvent::PaymentApproved {
                    payment_id: payment.id,
                    toss_payment_key: payment.toss_payment_key.unwrap_or_default(),
                });
            }
            PaymentStatus::Failed => {
                self.relay.publish(DomainEvent::PaymentFailed {
                    payment_id: payment.id,
                    reason: payment.receipt.unwrap_or_default(),
                });
            }
            other => {
                warn!(
                    "{:<12} --> 자동결제 후 예상치 못한 상태 paymentId={} status={}",
                    "EventConsume",
                    payment.id,
                    other.as_str()
                );
            }
        }
        Ok(())
    }
}

// endregion: --- Event Consumer
