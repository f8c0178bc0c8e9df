/// 환경 변수 기반 설정
/// 수수료율과 정산 보류 기간은 정책 값이므로 하드코딩하지 않고 설정으로 관리한다.
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    /// 플랫폼 수수료율(basis point, 500 = 5%)
    pub fee_rate_bps: i64,
    /// 정산 자동 해제까지의 보류 기간(일)
    pub settlement_hold_days: i64,
    /// 경매 활성화/만료 스윕 주기(초)
    pub auction_sweep_secs: u64,
    /// 정산 자동 해제 스윕 주기(초)
    pub settlement_sweep_secs: u64,
    pub toss_base_url: String,
    pub toss_secret_key: String,
    /// 외부 빌링 호출 타임아웃(초)
    pub toss_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            database_url: env::var("DATABASE_URL").ok(),
            fee_rate_bps: parse_or("FEE_RATE_BPS", 500),
            settlement_hold_days: parse_or("SETTLEMENT_HOLD_DAYS", 7),
            auction_sweep_secs: parse_or("AUCTION_SWEEP_SECS", 60),
            settlement_sweep_secs: parse_or("SETTLEMENT_SWEEP_SECS", 86_400),
            toss_base_url: env_or("TOSS_BASE_URL", "https://api.tosspayments.com"),
            toss_secret_key: env_or("TOSS_SECRET_KEY", ""),
            toss_timeout_secs: parse_or("TOSS_TIMEOUT_SECS", 10),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
