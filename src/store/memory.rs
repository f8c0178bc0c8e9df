/// 인메모리 원장 저장소
/// DATABASE_URL 없이 기동할 때와 통합 테스트에서 사용한다.
/// 행 맵 전체를 하나의 RwLock으로 감싸므로 모든 원자 연산이 자연히 선형화된다.
// region:    --- Imports
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auction::model::{Auction, AuctionStatus, Bid, Product, Winner};
use crate::error::ServiceResult;
use crate::payment::model::{Payment, PaymentStatus};
use crate::settlement::{Settlement, SettlementStatus};
use crate::store::LedgerStore;

// endregion: --- Imports

// region:    --- Memory Store

#[derive(Default)]
struct Inner {
    seq: i64,
    products: HashMap<i64, Product>,
    auctions: HashMap<i64, Auction>,
    bids: Vec<Bid>,
    winners: HashMap<i64, Winner>,
    billing_keys: HashMap<i64, String>,
    payments: HashMap<i64, Payment>,
    settlements: HashMap<i64, Settlement>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_product(&self, seller_id: i64, name: String) -> ServiceResult<Product> {
        let mut inner = self.write();
        let id = inner.next_id();
        let product = Product {
            id,
            seller_id,
            name,
        };
        inner.products.insert(id, product.clone());
        Ok(product)
    }

    async fn product(&self, id: i64) -> ServiceResult<Option<Product>> {
        Ok(self.read().products.get(&id).cloned())
    }

    async fn insert_auction(&self, mut auction: Auction) -> ServiceResult<Auction> {
        let mut inner = self.write();
        auction.id = inner.next_id();
        inner.auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    async fn auction(&self, id: i64) -> ServiceResult<Option<Auction>> {
        Ok(self.read().auctions.get(&id).cloned())
    }

    async fn activate_due_auctions(&self, now: DateTime<Utc>) -> ServiceResult<u64> {
        let mut inner = self.write();
        let mut activated = 0;
        for auction in inner.auctions.values_mut() {
            if auction.status == AuctionStatus::Scheduled && auction.start_at <= now {
                auction.status = AuctionStatus::Live;
                activated += 1;
            }
        }
        Ok(activated)
    }

    async fn expired_live_auctions(&self, now: DateTime<Utc>) -> ServiceResult<Vec<Auction>> {
        Ok(self
            .read()
            .auctions
            .values()
            .filter(|a| a.status == AuctionStatus::Live && a.end_at <= now)
            .cloned()
            .collect())
    }

    async fn end_auction(&self, auction_id: i64, now: DateTime<Utc>) -> ServiceResult<bool> {
        let mut inner = self.write();
        match inner.auctions.get_mut(&auction_id) {
            Some(auction) if auction.status == AuctionStatus::Live => {
                auction.status = AuctionStatus::Ended;
                if auction.end_at > now {
                    auction.end_at = now;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_bid(&self, mut bid: Bid, expected_price: i64) -> ServiceResult<Option<Bid>> {
        let mut inner = self.write();
        let admitted = match inner.auctions.get_mut(&bid.auction_id) {
            Some(auction)
                if auction.status == AuctionStatus::Live
                    && auction.current_price == expected_price =>
            {
                auction.current_price = bid.amount;
                true
            }
            _ => false,
        };
        if !admitted {
            return Ok(None);
        }
        bid.id = inner.next_id();
        inner.bids.push(bid.clone());
        Ok(Some(bid))
    }

    async fn highest_bid(&self, auction_id: i64) -> ServiceResult<Option<Bid>> {
        Ok(self
            .read()
            .bids
            .iter()
            .filter(|b| b.auction_id == auction_id)
            .max_by_key(|b| (b.amount, Reverse(b.created_at)))
            .cloned())
    }

    async fn bid_history(&self, auction_id: i64) -> ServiceResult<Vec<Bid>> {
        let mut bids: Vec<Bid> = self
            .read()
            .bids
            .iter()
            .filter(|b| b.auction_id == auction_id)
            .cloned()
            .collect();
        bids.sort_by_key(|b| Reverse((b.created_at, b.id)));
        Ok(bids)
    }

    async fn insert_winner_and_end(&self, mut winner: Winner) -> ServiceResult<Option<Winner>> {
        let mut inner = self.write();
        if inner
            .winners
            .values()
            .any(|w| w.auction_id == winner.auction_id)
        {
            return Ok(None);
        }
        // 유찰 등으로 이미 종료된 경매에는 낙찰자를 붙일 수 없다
        match inner.auctions.get_mut(&winner.auction_id) {
            Some(auction) if auction.status == AuctionStatus::Live => {
                auction.status = AuctionStatus::Ended;
                if auction.end_at > winner.win_time {
                    auction.end_at = winner.win_time;
                }
            }
            _ => return Ok(None),
        }
        winner.id = inner.next_id();
        inner.winners.insert(winner.id, winner.clone());
        Ok(Some(winner))
    }

    async fn winner(&self, id: i64) -> ServiceResult<Option<Winner>> {
        Ok(self.read().winners.get(&id).cloned())
    }

    async fn winner_by_auction(&self, auction_id: i64) -> ServiceResult<Option<Winner>> {
        Ok(self
            .read()
            .winners
            .values()
            .find(|w| w.auction_id == auction_id)
            .cloned())
    }

    async fn register_billing_key(&self, user_id: i64, billing_key: String) -> ServiceResult<()> {
        self.write().billing_keys.insert(user_id, billing_key);
        Ok(())
    }

    async fn billing_key(&self, user_id: i64) -> ServiceResult<Option<String>> {
        Ok(self.read().billing_keys.get(&user_id).cloned())
    }

    async fn insert_payment_if_absent(&self, mut payment: Payment) -> ServiceResult<Payment> {
        let mut inner = self.write();
        if let Some(existing) = inner
            .payments
            .values()
            .find(|p| p.winner_id == payment.winner_id)
        {
            return Ok(existing.clone());
        }
        payment.id = inner.next_id();
        inner.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn payment(&self, id: i64) -> ServiceResult<Option<Payment>> {
        Ok(self.read().payments.get(&id).cloned())
    }

    async fn payment_by_winner(&self, winner_id: i64) -> ServiceResult<Option<Payment>> {
        Ok(self
            .read()
            .payments
            .values()
            .find(|p| p.winner_id == winner_id)
            .cloned())
    }

    async fn payment_by_toss_key(&self, key: &str) -> ServiceResult<Option<Payment>> {
        Ok(self
            .read()
            .payments
            .values()
            .find(|p| p.toss_payment_key.as_deref() == Some(key))
            .cloned())
    }

    async fn mark_payment_paid(
        &self,
        payment_id: i64,
        toss_payment_key: &str,
        approved_at: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let mut inner = self.write();
        match inner.payments.get_mut(&payment_id) {
            Some(payment) if payment.status == PaymentStatus::Requested => {
                payment.status = PaymentStatus::Paid;
                payment.toss_payment_key = Some(toss_payment_key.to_string());
                payment.approved_at = Some(approved_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_payment_failed(&self, payment_id: i64, receipt: &str) -> ServiceResult<bool> {
        let mut inner = self.write();
        match inner.payments.get_mut(&payment_id) {
            Some(payment)
                if matches!(
                    payment.status,
                    PaymentStatus::Requested | PaymentStatus::Processing
                ) =>
            {
                payment.status = PaymentStatus::Failed;
                payment.receipt = Some(receipt.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_settlement_if_absent(
        &self,
        mut settlement: Settlement,
    ) -> ServiceResult<Option<Settlement>> {
        let mut inner = self.write();
        if inner
            .settlements
            .values()
            .any(|s| s.payment_id == settlement.payment_id)
        {
            return Ok(None);
        }
        settlement.id = inner.next_id();
        inner.settlements.insert(settlement.id, settlement.clone());
        Ok(Some(settlement))
    }

    async fn settlement_by_payment(&self, payment_id: i64) -> ServiceResult<Option<Settlement>> {
        Ok(self
            .read()
            .settlements
            .values()
            .find(|s| s.payment_id == payment_id)
            .cloned())
    }

    async fn release_settlement(&self, payment_id: i64, now: DateTime<Utc>) -> ServiceResult<bool> {
        let mut inner = self.write();
        match inner
            .settlements
            .values_mut()
            .find(|s| s.payment_id == payment_id)
        {
            Some(settlement) if settlement.status == SettlementStatus::Holding => {
                settlement.status = SettlementStatus::Paid;
                settlement.paid_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_due_settlements(
        &self,
        held_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<i64>> {
        let mut inner = self.write();
        let mut released = Vec::new();
        for settlement in inner.settlements.values_mut() {
            if settlement.status == SettlementStatus::Holding && settlement.hold_at < held_before {
                settlement.status = SettlementStatus::Paid;
                settlement.paid_at = Some(now);
                released.push(settlement.id);
            }
        }
        Ok(released)
    }
}

// endregion: --- Memory Store
