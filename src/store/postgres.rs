/// Postgres 원장 저장소
/// 상태 가드는 전부 UPDATE ... WHERE 조건으로 표현되어 단일 문장으로 원자적이다.
/// 입찰(record_bid)과 낙찰 확정(insert_winner_and_end)만 두 문장을 트랜잭션으로 묶는다.
// region:    --- Imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use crate::auction::model::{Auction, AuctionStatus, Bid, Product, Winner};
use crate::error::{ServiceError, ServiceResult};
use crate::payment::model::{Payment, PaymentStatus};
use crate::settlement::{Settlement, SettlementStatus};
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Row Types

/// 상태 컬럼은 TEXT로 저장하므로 행 구조체를 거쳐 enum으로 복원한다.
#[derive(FromRow)]
struct AuctionRow {
    id: i64,
    product_id: i64,
    start_price: i64,
    buy_now_price: Option<i64>,
    min_bid_step: i64,
    current_price: i64,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    status: String,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuctionRow> for Auction {
    type Error = ServiceError;

    fn try_from(row: AuctionRow) -> ServiceResult<Self> {
        Ok(Auction {
            id: row.id,
            product_id: row.product_id,
            start_price: row.start_price,
            buy_now_price: row.buy_now_price,
            min_bid_step: row.min_bid_step,
            current_price: row.current_price,
            start_at: row.start_at,
            end_at: row.end_at,
            status: AuctionStatus::parse(&row.status)?,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: i64,
    winner_id: i64,
    seller_id: i64,
    toss_payment_key: Option<String>,
    status: String,
    receipt: Option<String>,
    fee: i64,
    net: i64,
    requested_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = ServiceError;

    fn try_from(row: PaymentRow) -> ServiceResult<Self> {
        Ok(Payment {
            id: row.id,
            winner_id: row.winner_id,
            seller_id: row.seller_id,
            toss_payment_key: row.toss_payment_key,
            status: PaymentStatus::parse(&row.status)?,
            receipt: row.receipt,
            fee: row.fee,
            net: row.net,
            requested_at: row.requested_at,
            approved_at: row.approved_at,
        })
    }
}

#[derive(FromRow)]
struct SettlementRow {
    id: i64,
    payment_id: i64,
    seller_id: i64,
    status: String,
    fee: i64,
    net: i64,
    hold_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<SettlementRow> for Settlement {
    type Error = ServiceError;

    fn try_from(row: SettlementRow) -> ServiceResult<Self> {
        Ok(Settlement {
            id: row.id,
            payment_id: row.payment_id,
            seller_id: row.seller_id,
            status: SettlementStatus::parse(&row.status)?,
            fee: row.fee,
            net: row.net,
            hold_at: row.hold_at,
            paid_at: row.paid_at,
        })
    }
}

// endregion: --- Row Types

// region:    --- Postgres Store

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> ServiceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// 스키마 초기화
    pub async fn initialize_database(&self) -> ServiceResult<()> {
        let schema_sql = include_str!("../sql/01-create-schema.sql");
        for query in schema_sql.split(';') {
            let query = query.trim();
            if !query.is_empty() {
                sqlx::query(query).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn insert_product(&self, seller_id: i64, name: String) -> ServiceResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (seller_id, name) VALUES ($1, $2) RETURNING *",
        )
        .bind(seller_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn product(&self, id: i64) -> ServiceResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn insert_auction(&self, auction: Auction) -> ServiceResult<Auction> {
        let row = sqlx::query_as::<_, AuctionRow>(
            "INSERT INTO auctions (product_id, start_price, buy_now_price, min_bid_step,
                 current_price, start_at, end_at, status, deleted_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING *",
        )
        .bind(auction.product_id)
        .bind(auction.start_price)
        .bind(auction.buy_now_price)
        .bind(auction.min_bid_step)
        .bind(auction.current_price)
        .bind(auction.start_at)
        .bind(auction.end_at)
        .bind(auction.status.as_str())
        .bind(auction.deleted_at)
        .bind(auction.created_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn auction(&self, id: i64) -> ServiceResult<Option<Auction>> {
        let row = sqlx::query_as::<_, AuctionRow>("SELECT * FROM auctions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Auction::try_from).transpose()
    }

    async fn activate_due_auctions(&self, now: DateTime<Utc>) -> ServiceResult<u64> {
        let result = sqlx::query(
            "UPDATE auctions SET status = 'LIVE'
             WHERE status = 'SCHEDULED' AND start_at <= $1 AND deleted_at IS NULL",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn expired_live_auctions(&self, now: DateTime<Utc>) -> ServiceResult<Vec<Auction>> {
        let rows = sqlx::query_as::<_, AuctionRow>(
            "SELECT * FROM auctions
             WHERE status = 'LIVE' AND end_at <= $1 AND deleted_at IS NULL",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Auction::try_from).collect()
    }

    async fn end_auction(&self, auction_id: i64, now: DateTime<Utc>) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE auctions SET status = 'ENDED', end_at = LEAST(end_at, $2)
             WHERE id = $1 AND status = 'LIVE'",
        )
        .bind(auction_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_bid(&self, bid: Bid, expected_price: i64) -> ServiceResult<Option<Bid>> {
        let mut tx = self.pool.begin().await?;

        // 관측한 현재가에서만 전진하는 compare-and-set
        let updated = sqlx::query_scalar::<_, i64>(
            "UPDATE auctions SET current_price = $1
             WHERE id = $2 AND current_price = $3 AND status = 'LIVE'
             RETURNING id",
        )
        .bind(bid.amount)
        .bind(bid.auction_id)
        .bind(expected_price)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let bid = sqlx::query_as::<_, Bid>(
            "INSERT INTO bids (auction_id, bidder_id, amount, created_at, is_auto)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(bid.auction_id)
        .bind(bid.bidder_id)
        .bind(bid.amount)
        .bind(bid.created_at)
        .bind(bid.is_auto)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(bid))
    }

    async fn highest_bid(&self, auction_id: i64) -> ServiceResult<Option<Bid>> {
        let bid = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids WHERE auction_id = $1
             ORDER BY amount DESC, created_at ASC
             LIMIT 1",
        )
        .bind(auction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bid)
    }

    async fn bid_history(&self, auction_id: i64) -> ServiceResult<Vec<Bid>> {
        let bids = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids WHERE auction_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(auction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bids)
    }

    async fn insert_winner_and_end(&self, winner: Winner) -> ServiceResult<Option<Winner>> {
        let mut tx = self.pool.begin().await?;

        // LIVE 가드: 유찰 스윕 등으로 이미 종료된 경매는 여기서 탈락한다
        let ended = sqlx::query_scalar::<_, i64>(
            "UPDATE auctions SET status = 'ENDED', end_at = LEAST(end_at, $2)
             WHERE id = $1 AND status = 'LIVE'
             RETURNING id",
        )
        .bind(winner.auction_id)
        .bind(winner.win_time)
        .fetch_optional(&mut *tx)
        .await?;

        if ended.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        // 유니크 제약 충돌은 "이미 확정됨"이지 오류가 아니다
        let inserted = sqlx::query_as::<_, Winner>(
            "INSERT INTO winners (auction_id, seller_id, user_id, final_price, win_time)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (auction_id) DO NOTHING
             RETURNING *",
        )
        .bind(winner.auction_id)
        .bind(winner.seller_id)
        .bind(winner.user_id)
        .bind(winner.final_price)
        .bind(winner.win_time)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(winner) = inserted else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some(winner))
    }

    async fn winner(&self, id: i64) -> ServiceResult<Option<Winner>> {
        let winner = sqlx::query_as::<_, Winner>("SELECT * FROM winners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(winner)
    }

    async fn winner_by_auction(&self, auction_id: i64) -> ServiceResult<Option<Winner>> {
        let winner = sqlx::query_as::<_, Winner>("SELECT * FROM winners WHERE auction_id = $1")
            .bind(auction_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(winner)
    }

    async fn register_billing_key(&self, user_id: i64, billing_key: String) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO payment_methods (user_id, billing_key) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET billing_key = EXCLUDED.billing_key",
        )
        .bind(user_id)
        .bind(billing_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn billing_key(&self, user_id: i64) -> ServiceResult<Option<String>> {
        let key = sqlx::query_scalar::<_, String>(
            "SELECT billing_key FROM payment_methods WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn insert_payment_if_absent(&self, payment: Payment) -> ServiceResult<Payment> {
        let inserted = sqlx::query_as::<_, PaymentRow>(
            "INSERT INTO payments (winner_id, seller_id, toss_payment_key, status, receipt,
                 fee, net, requested_at, approved_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (winner_id) DO NOTHING
             RETURNING *",
        )
        .bind(payment.winner_id)
        .bind(payment.seller_id)
        .bind(&payment.toss_payment_key)
        .bind(payment.status.as_str())
        .bind(&payment.receipt)
        .bind(payment.fee)
        .bind(payment.net)
        .bind(payment.requested_at)
        .bind(payment.approved_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => row.try_into(),
            // 재전달된 이벤트: 기존 행 반환
            None => self
                .payment_by_winner(payment.winner_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::Internal("결제 중복 삽입 충돌 후 기존 행 조회 실패".to_string())
                }),
        }
    }

    async fn payment(&self, id: i64) -> ServiceResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn payment_by_winner(&self, winner_id: i64) -> ServiceResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE winner_id = $1")
            .bind(winner_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn payment_by_toss_key(&self, key: &str) -> ServiceResult<Option<Payment>> {
        let row =
            sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE toss_payment_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn mark_payment_paid(
        &self,
        payment_id: i64,
        toss_payment_key: &str,
        approved_at: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'PAID', toss_payment_key = $2, approved_at = $3
             WHERE id = $1 AND status = 'REQUESTED'",
        )
        .bind(payment_id)
        .bind(toss_payment_key)
        .bind(approved_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_payment_failed(&self, payment_id: i64, receipt: &str) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'FAILED', receipt = $2
             WHERE id = $1 AND status IN ('REQUESTED', 'PROCESSING')",
        )
        .bind(payment_id)
        .bind(receipt)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_settlement_if_absent(
        &self,
        settlement: Settlement,
    ) -> ServiceResult<Option<Settlement>> {
        let inserted = sqlx::query_as::<_, SettlementRow>(
            "INSERT INTO settlements (payment_id, seller_id, status, fee, net, hold_at, paid_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (payment_id) DO NOTHING
             RETURNING *",
        )
        .bind(settlement.payment_id)
        .bind(settlement.seller_id)
        .bind(settlement.status.as_str())
        .bind(settlement.fee)
        .bind(settlement.net)
        .bind(settlement.hold_at)
        .bind(settlement.paid_at)
        .fetch_optional(&self.pool)
        .await?;
        inserted.map(Settlement::try_from).transpose()
    }

    async fn settlement_by_payment(&self, payment_id: i64) -> ServiceResult<Option<Settlement>> {
        let row =
            sqlx::query_as::<_, SettlementRow>("SELECT * FROM settlements WHERE payment_id = $1")
                .bind(payment_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Settlement::try_from).transpose()
    }

    async fn release_settlement(&self, payment_id: i64, now: DateTime<Utc>) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE settlements SET status = 'PAID', paid_at = $2
             WHERE payment_id = $1 AND status = 'HOLDING'",
        )
        .bind(payment_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_due_settlements(
        &self,
        held_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<i64>> {
        let released = sqlx::query_scalar::<_, i64>(
            "UPDATE settlements SET status = 'PAID', paid_at = $2
             WHERE status = 'HOLDING' AND hold_at < $1
             RETURNING id",
        )
        .bind(held_before)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(released)
    }
}

// endregion: --- Postgres Store
