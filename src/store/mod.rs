/// 원장 저장소(Ledger Store) 추상화
/// 모든 엔티티는 객체 그래프가 아니라 id 참조로 연결되고 저장소를 통해 조회된다.
/// 경합이 걸리는 전이는 전부 저장소 수준의 원자 연산으로 제공한다:
/// - record_bid: 입찰 삽입 + current_price 갱신의 compare-and-set
/// - insert_winner_and_end: 낙찰자 유니크 삽입 + ENDED 전이를 한 트랜잭션으로
/// - mark_payment_* / release_settlement: 상태 가드 후 쓰기
// region:    --- Imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auction::model::{Auction, Bid, Product, Winner};
use crate::error::ServiceResult;
use crate::payment::model::Payment;
use crate::settlement::Settlement;

// endregion: --- Imports

// region:    --- Modules
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

// endregion: --- Modules

// region:    --- Ledger Store Trait

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- 상품
    async fn insert_product(&self, seller_id: i64, name: String) -> ServiceResult<Product>;
    async fn product(&self, id: i64) -> ServiceResult<Option<Product>>;

    // -- 경매
    /// id가 0인 경매를 받아 id를 채워 저장한다.
    async fn insert_auction(&self, auction: Auction) -> ServiceResult<Auction>;
    async fn auction(&self, id: i64) -> ServiceResult<Option<Auction>>;
    /// SCHEDULED → LIVE 일괄 전이. 멱등하며 전이된 행 수를 반환한다.
    async fn activate_due_auctions(&self, now: DateTime<Utc>) -> ServiceResult<u64>;
    /// 종료 시각이 지난 LIVE 경매 목록
    async fn expired_live_auctions(&self, now: DateTime<Utc>) -> ServiceResult<Vec<Auction>>;
    /// LIVE → ENDED 전이. end_at이 now보다 뒤면 now로 당긴다.
    /// LIVE가 아니면 false.
    async fn end_auction(&self, auction_id: i64, now: DateTime<Utc>) -> ServiceResult<bool>;

    // -- 입찰
    /// 입찰 삽입과 current_price 갱신을 원자적으로 수행한다.
    /// current_price가 expected_price와 다르거나 경매가 LIVE가 아니면 None(재시도 대상).
    async fn record_bid(&self, bid: Bid, expected_price: i64) -> ServiceResult<Option<Bid>>;
    /// 최고 입찰(금액 최대, 동률이면 먼저 생성된 것)
    async fn highest_bid(&self, auction_id: i64) -> ServiceResult<Option<Bid>>;
    async fn bid_history(&self, auction_id: i64) -> ServiceResult<Vec<Bid>>;

    // -- 낙찰자
    /// 낙찰자 삽입과 ENDED 전이를 같은 트랜잭션 경계에서 수행한다.
    /// auction_id 유니크 제약에 걸리거나 경매가 이미 LIVE가 아니면
    /// "이미 확정·종료됨"으로 보고 None을 반환한다.
    async fn insert_winner_and_end(&self, winner: Winner) -> ServiceResult<Option<Winner>>;
    async fn winner(&self, id: i64) -> ServiceResult<Option<Winner>>;
    async fn winner_by_auction(&self, auction_id: i64) -> ServiceResult<Option<Winner>>;

    // -- 결제 수단
    async fn register_billing_key(&self, user_id: i64, billing_key: String) -> ServiceResult<()>;
    async fn billing_key(&self, user_id: i64) -> ServiceResult<Option<String>>;

    // -- 결제
    /// winner_id 유니크. 이미 존재하면 기존 행을 반환한다(at-least-once 전달 대비).
    async fn insert_payment_if_absent(&self, payment: Payment) -> ServiceResult<Payment>;
    async fn payment(&self, id: i64) -> ServiceResult<Option<Payment>>;
    async fn payment_by_winner(&self, winner_id: i64) -> ServiceResult<Option<Payment>>;
    async fn payment_by_toss_key(&self, key: &str) -> ServiceResult<Option<Payment>>;
    /// REQUESTED → PAID 전이 + 결제 키 할당. 가드에 걸리면 false.
    async fn mark_payment_paid(
        &self,
        payment_id: i64,
        toss_payment_key: &str,
        approved_at: DateTime<Utc>,
    ) -> ServiceResult<bool>;
    /// REQUESTED/PROCESSING → FAILED 전이 + 사유 기록. 가드에 걸리면 false.
    async fn mark_payment_failed(&self, payment_id: i64, receipt: &str) -> ServiceResult<bool>;

    // -- 정산
    /// payment_id 유니크. 이미 존재하면 None.
    async fn insert_settlement_if_absent(
        &self,
        settlement: Settlement,
    ) -> ServiceResult<Option<Settlement>>;
    async fn settlement_by_payment(&self, payment_id: i64) -> ServiceResult<Option<Settlement>>;
    /// HOLDING → PAID 전이. 가드에 걸리면 false.
    async fn release_settlement(&self, payment_id: i64, now: DateTime<Utc>) -> ServiceResult<bool>;
    /// held_before 이전부터 보류 중인 정산 일괄 해제, 해제된 id 목록 반환
    async fn release_due_settlements(
        &self,
        held_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<i64>>;
}

// endregion: --- Ledger Store Trait
