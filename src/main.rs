// region:    --- Imports
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use drop_auction_service::config::Config;
use drop_auction_service::handlers::{self, AppState};
use drop_auction_service::notifier::PriceNotifier;
use drop_auction_service::payment::service::PaymentService;
use drop_auction_service::payment::toss::TossPaymentsClient;
use drop_auction_service::relay::{EventConsumer, EventRelay};
use drop_auction_service::scheduler::{AuctionScheduler, SettlementScheduler};
use drop_auction_service::settlement::SettlementReleaseService;
use drop_auction_service::store::{LedgerStore, MemoryStore, PostgresStore};

// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env();

    // 저장소 선택: DATABASE_URL이 있으면 Postgres, 없으면 인메모리
    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            if let Err(e) = store.initialize_database().await {
                error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> 데이터베이스 초기화 성공", "Main");
            Arc::new(store)
        }
        None => {
            info!(
                "{:<12} --> DATABASE_URL 없음, 인메모리 저장소로 기동",
                "Main"
            );
            Arc::new(MemoryStore::new())
        }
    };

    // 이벤트 릴레이와 결제 오케스트레이터
    let relay = EventRelay::new(256);
    let notifier = Arc::new(PriceNotifier::new());
    let gateway = Arc::new(TossPaymentsClient::new(&config)?);
    let payments = PaymentService::new(Arc::clone(&store), gateway, config.fee_rate_bps);
    let settlements =
        SettlementReleaseService::new(Arc::clone(&store), config.settlement_hold_days);

    // 이벤트 소비 시작(낙찰 확정 → 결제 생성 → 자동결제 체인)
    let event_consumer =
        EventConsumer::new(Arc::clone(&store), payments.clone(), relay.clone());
    tokio::spawn(async move {
        event_consumer.start().await;
    });

    // 경매 활성화/만료 스윕과 정산 자동 해제 스윕
    let auction_scheduler = AuctionScheduler::new(
        Arc::clone(&store),
        relay.clone(),
        Duration::from_secs(config.auction_sweep_secs),
    );
    auction_scheduler.start().await;

    let settlement_scheduler = SettlementScheduler::new(
        settlements.clone(),
        Duration::from_secs(config.settlement_sweep_secs),
    );
    settlement_scheduler.start().await;

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        store,
        relay,
        notifier,
        payments,
        settlements,
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/products", post(handlers::handle_create_product))
        .route("/auctions", post(handlers::handle_create_auction))
        .route(
            "/auctions/:id/bids",
            post(handlers::handle_place_bid).get(handlers::handle_get_bid_history),
        )
        .route("/auctions/:id/buy-now", post(handlers::handle_buy_now))
        .route("/auctions/:id", get(handlers::handle_get_auction_state))
        .route(
            "/auctions/:id/highest-bid",
            get(handlers::handle_get_highest_bid),
        )
        .route("/auctions/:id/stream", get(handlers::handle_price_stream))
        .route("/webhooks/toss", post(handlers::handle_toss_webhook))
        .route(
            "/payment-methods",
            post(handlers::handle_register_billing_key),
        )
        .route(
            "/settlements/confirm",
            post(handlers::handle_settlement_confirm),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 20))
        .with_state(state);

    // 리스너 생성
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
