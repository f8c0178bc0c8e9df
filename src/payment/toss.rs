/// 토스페이먼츠 빌링 게이트웨이 연동
/// 호출에는 반드시 타임아웃이 걸려 있어 결제가 애매한 상태로 남지 않는다.
// region:    --- Imports
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};

// endregion: --- Imports

// region:    --- DTO

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPayRequest {
    pub amount: i64,
    pub customer_key: String,
    pub order_id: String,
    pub order_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPayResponse {
    pub status: String,
    pub payment_key: String,
}

/// 토스 웹훅 본문
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TossWebhookRequest {
    pub event_type: String,
    pub data: TossWebhookData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TossWebhookData {
    pub payment_key: String,
    pub order_id: String,
    pub status: String,
    pub total_amount: i64,
}

/// 주문 번호(`payment-{winnerId}`)에서 낙찰자 id를 추출한다.
/// 형식이 틀리면 어떤 조회도 하기 전에 실패한다.
pub fn extract_winner_id(order_id: &str) -> ServiceResult<i64> {
    order_id
        .strip_prefix("payment-")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| ServiceError::InvalidReference(order_id.to_string()))
}

// endregion: --- DTO

// region:    --- Billing Gateway

#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// 빌링 키 자동결제 승인. idempotency_key로 게이트웨이 쪽에서 중복이 제거된다.
    async fn approve_billing(
        &self,
        billing_key: &str,
        request: &AutoPayRequest,
        idempotency_key: &str,
    ) -> ServiceResult<AutoPayResponse>;
}

pub struct TossPaymentsClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl TossPaymentsClient {
    pub fn new(config: &Config) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.toss_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.toss_base_url.clone(),
            secret_key: config.toss_secret_key.clone(),
        })
    }
}

#[async_trait]
impl BillingGateway for TossPaymentsClient {
    async fn approve_billing(
        &self,
        billing_key: &str,
        request: &AutoPayRequest,
        idempotency_key: &str,
    ) -> ServiceResult<AutoPayResponse> {
        let url = format!("{}/v1/billing/{}", self.base_url, billing_key);
        let response = self
            .client
            .post(url)
            .basic_auth(&self.secret_key, Some(""))
            .header("Idempotency-Key", idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?
            .error_for_status()
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))
    }
}

// endregion: --- Billing Gateway
