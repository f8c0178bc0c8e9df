/// 결제 오케스트레이터
/// REQUESTED → (자동결제) → PAID | FAILED, REQUESTED → (웹훅) → PAID.
/// status가 자금 확보 여부의 단일 진실이며, 모든 전이는 상태 가드 후 쓰기다.
// region:    --- Imports
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::payment::model::{Payment, PaymentStatus};
use crate::payment::toss::{AutoPayRequest, BillingGateway};
use crate::settlement::{Settlement, SettlementStatus};
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Payment Service

/// 웹훅 승인 결과. transitioned가 true일 때만 이번 호출이 PAID 전이를 일으켰다.
#[derive(Debug, Clone)]
pub struct WebhookConfirmation {
    pub payment: Payment,
    pub transitioned: bool,
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn BillingGateway>,
    /// 수수료율(basis point)
    fee_rate_bps: i64,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn BillingGateway>,
        fee_rate_bps: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            fee_rate_bps,
        }
    }

    /// 낙찰자에 대한 결제 레코드 생성. 아무것도 청구하지 않는다.
    /// winner_id 유니크이므로 이벤트 재전달에도 결제는 하나만 생긴다.
    pub async fn create_payment(&self, winner_id: i64, amount: i64) -> ServiceResult<Payment> {
        let winner = self
            .store
            .winner(winner_id)
            .await?
            .ok_or(ServiceError::WinnerNotFound)?;

        // 반올림(half-up) 수수료, net은 청구 금액
        let fee = (amount * self.fee_rate_bps + 5_000) / 10_000;
        let payment = Payment {
            id: 0,
            winner_id,
            seller_id: winner.seller_id,
            toss_payment_key: None,
            status: PaymentStatus::Requested,
            receipt: None,
            fee,
            net: amount,
            requested_at: Utc::now(),
            approved_at: None,
        };

        self.store.insert_payment_if_absent(payment).await
    }

    /// 빌링 키 자동결제 시도
    /// 게이트웨이 실패·타임아웃·비정상 응답은 전부 종단 FAILED로 수렴하고,
    /// PROCESSING에 머무는 일은 없다. 재시도 정책은 상위 스케줄러 몫이다.
    pub async fn attempt_auto_payment(
        &self,
        payment_id: i64,
        billing_key: &str,
    ) -> ServiceResult<Payment> {
        let payment = self
            .store
            .payment(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)?;

        info!(
            "{:<12} --> 자동결제 시작 paymentId={} amount={}",
            "Payment", payment_id, payment.net
        );

        let request = AutoPayRequest {
            amount: payment.net,
            customer_key: format!("winner-{}", payment.winner_id),
            order_id: format!("payment-{}", payment.winner_id),
            order_name: "DROP 경매 자동결제".to_string(),
        };
        // 결제 id에서 결정적으로 유도되는 멱등 키: 재시도는 게이트웨이가 중복 제거
        let idempotency_key = format!("auto-pay-{payment_id}");

        match self
            .gateway
            .approve_billing(billing_key, &request, &idempotency_key)
            .await
        {
            Ok(response) if response.status.eq_ignore_ascii_case("DONE") => {
                let now = Utc::now();
                if self
                    .store
                    .mark_payment_paid(payment_id, &response.payment_key, now)
                    .await?
                {
                    self.create_settlement(&payment, now).await?;
                    info!("{:<12} --> 자동결제 성공 paymentId={}", "Payment", payment_id);
                } else {
                    info!(
                        "{:<12} --> 이미 처리된 결제 paymentId={}",
                        "Payment", payment_id
                    );
                }
            }
            Ok(response) => {
                let reason = format!("자동결제 실패: status={}", response.status);
                self.store.mark_payment_failed(payment_id, &reason).await?;
                warn!(
                    "{:<12} --> 자동결제 거절 paymentId={} status={}",
                    "Payment", payment_id, response.status
                );
            }
            Err(e) => {
                let reason = format!("자동결제 예외: {e}");
                self.store.mark_payment_failed(payment_id, &reason).await?;
                error!(
                    "{:<12} --> 자동결제 예외 paymentId={}: {:?}",
                    "Payment", payment_id, e
                );
            }
        }

        self.store
            .payment(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)
    }

    /// 웹훅 승인 확인 - 멱등성 계약의 핵심
    /// winnerId로 먼저 조회해 "이 결제는 이미 끝났다"(안전한 no-op)와
    /// "이 결제 키는 다른 레코드가 소비했다"(의심스러운 하드 실패)를 구분한다.
    /// 성공 모양의 응답은 의도한 결과(PAID)가 실제로 성립한 경우에만 내려간다.
    pub async fn confirm_payment_by_webhook(
        &self,
        payment_key: &str,
        winner_id: i64,
        amount: i64,
    ) -> ServiceResult<WebhookConfirmation> {
        let payment = self
            .store
            .payment_by_winner(winner_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)?;

        if payment.status == PaymentStatus::Paid {
            // 웹훅 재전달: 원래 성공과 같은 모양으로 응답
            info!(
                "{:<12} --> 이미 PAID, 웹훅 멱등 처리 paymentId={}",
                "Payment", payment.id
            );
            return Ok(WebhookConfirmation {
                payment,
                transitioned: false,
            });
        }

        if let Some(existing) = self.store.payment_by_toss_key(payment_key).await? {
            if existing.id != payment.id {
                warn!(
                    "{:<12} --> 결제 키 재사용 감지 paymentKey={} paymentId={}",
                    "Payment", payment_key, existing.id
                );
                return Err(ServiceError::AlreadyProcessed);
            }
        }

        if payment.net != amount {
            error!(
                "{:<12} --> 금액 불일치 expected={} actual={}",
                "Payment", payment.net, amount
            );
            return Err(ServiceError::AmountMismatch);
        }

        let now = Utc::now();
        if self
            .store
            .mark_payment_paid(payment.id, payment_key, now)
            .await?
        {
            self.create_settlement(&payment, now).await?;
            info!(
                "{:<12} --> 웹훅 결제 승인 paymentId={}",
                "Payment", payment.id
            );
            let payment = self
                .store
                .payment(payment.id)
                .await?
                .ok_or(ServiceError::PaymentNotFound)?;
            return Ok(WebhookConfirmation {
                payment,
                transitioned: true,
            });
        }

        // 가드에 걸렸으면 다시 읽어 왜 거절되었는지 확인한다
        let payment = self
            .store
            .payment(payment.id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)?;
        if payment.status == PaymentStatus::Paid {
            // 자동결제와 경합: 먼저 커밋된 쪽이 이기고 이쪽은 no-op
            info!(
                "{:<12} --> 웹훅 승인 경합, no-op paymentId={}",
                "Payment", payment.id
            );
            return Ok(WebhookConfirmation {
                payment,
                transitioned: false,
            });
        }

        // 외부에서는 승인됐다는데 결제가 FAILED 등 종단 상태다.
        // 묵인하면 정산 없이 자금만 잡힌 채로 남으므로 대사 대상으로 드러낸다.
        error!(
            "{:<12} --> 웹훅 승인 불가 상태 paymentId={} status={}",
            "Payment",
            payment.id,
            payment.status.as_str()
        );
        Err(ServiceError::InvalidStateTransition)
    }

    /// 결제 실패 처리
    pub async fn fail_payment(&self, payment_id: i64, reason: &str) -> ServiceResult<Payment> {
        self.store
            .payment(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)?;

        self.store.mark_payment_failed(payment_id, reason).await?;
        info!(
            "{:<12} --> 결제 실패 처리 paymentId={} reason={}",
            "Payment", payment_id, reason
        );

        self.store
            .payment(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)
    }

    /// 결제가 PAID가 되는 순간 HOLDING 정산을 생성한다. payment_id 유니크로 멱등.
    async fn create_settlement(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let settlement = Settlement {
            id: 0,
            payment_id: payment.id,
            seller_id: payment.seller_id,
            status: SettlementStatus::Holding,
            fee: payment.fee,
            net: payment.net,
            hold_at: now,
            paid_at: None,
        };
        match self.store.insert_settlement_if_absent(settlement).await? {
            Some(settlement) => {
                info!(
                    "{:<12} --> 정산 보류 생성 settlementId={} paymentId={}",
                    "Payment", settlement.id, payment.id
                );
            }
            None => {
                info!(
                    "{:<12} --> 정산이 이미 존재함 paymentId={}",
                    "Payment", payment.id
                );
            }
        }
        Ok(())
    }
}

// endregion: --- Payment Service
