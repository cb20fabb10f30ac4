use crate::domain::BookId;
use crate::ports::pricing_gateway::{PricingError, PricingGateway as PricingGatewayTrait, Result};
use async_trait::async_trait;
use std::time::Duration;

/// PricingGatewayのHTTP実装
///
/// 価格サービスの`GET {base_url}/api/prices/{bookId}`を呼び出す。
/// JSONの`null`は価格0.0として扱う。
pub struct PricingGateway {
    client: reqwest::Client,
    base_url: String,
}

impl PricingGateway {
    /// 接続タイムアウトとリクエスト全体のタイムアウトを指定してクライアントを構築する
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(
            "Initializing pricing client for {} with {}ms connect timeout and {}ms read timeout",
            base_url,
            connect_timeout.as_millis(),
            read_timeout.as_millis()
        );

        Ok(Self { client, base_url })
    }

    fn price_url(&self, book_id: BookId) -> String {
        format!("{}/api/prices/{}", self.base_url, book_id)
    }
}

fn classify(err: reqwest::Error) -> PricingError {
    if err.is_timeout() {
        PricingError::Timeout
    } else if err.is_connect() {
        PricingError::Connect(err.to_string())
    } else if err.is_decode() {
        PricingError::InvalidResponse(err.to_string())
    } else {
        PricingError::Transport(err.to_string())
    }
}

#[async_trait]
impl PricingGatewayTrait for PricingGateway {
    async fn fetch_price(&self, book_id: BookId, force_failure: bool) -> Result<f64> {
        let url = self.price_url(book_id);
        tracing::debug!("Requesting price for book ID: {} from URL: {}", book_id, url);

        let mut request = self.client.get(&url);
        if force_failure {
            request = request.query(&[("fail", "true")]);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();

        if status.is_server_error() {
            return Err(PricingError::ServerError(status.as_u16()));
        }
        if !status.is_success() {
            return Err(PricingError::Rejected(status.as_u16()));
        }

        let price: Option<f64> = response.json().await.map_err(classify)?;
        Ok(price.unwrap_or(0.0))
    }
}
