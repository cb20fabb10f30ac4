use crate::domain::BookId;
use crate::ports::{PricingError, PricingGateway};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerMetrics,
    CircuitState, RetryPolicy, retry_with_predicate,
};
use std::sync::Arc;

/// 価格取得に失敗した場合のフォールバック価格
pub const FALLBACK_PRICE: f64 = 0.0;

/// 回復力のある価格取得クライアント
///
/// 価格サービスポートを再試行とサーキットブレーカーで包み、
/// どのような失敗でもフォールバック価格（0.0）に縮退させる。
///
/// 構成：
/// - 再試行が外側。各試行はサーキットブレーカーを通過する
/// - ブレーカーがOpenなら再試行を即座に打ち切る
/// - 一時的でないエラー（4xx、不正な応答）は再試行しない
pub struct PriceLookup {
    gateway: Arc<dyn PricingGateway>,
    retry_policy: RetryPolicy,
    breaker: CircuitBreaker,
}

impl PriceLookup {
    pub fn new(
        gateway: Arc<dyn PricingGateway>,
        retry_policy: RetryPolicy,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            gateway,
            retry_policy,
            breaker: CircuitBreaker::new(breaker_config),
        }
    }

    /// 書籍の価格を取得する
    ///
    /// 失敗は呼び出し元に伝播しない。再試行を使い切った場合や
    /// ブレーカーがOpenの場合は`FALLBACK_PRICE`を返す。
    pub async fn get_price(&self, book_id: BookId, force_failure: bool) -> f64 {
        tracing::info!("Requesting price for book ID: {}", book_id);

        let gateway = &self.gateway;
        let breaker = &self.breaker;

        let result = retry_with_predicate(
            &self.retry_policy,
            move || breaker.call(move || gateway.fetch_price(book_id, force_failure)),
            |err: &CircuitBreakerError<PricingError>| match err {
                CircuitBreakerError::Open => false,
                CircuitBreakerError::Inner(e) => e.is_transient(),
            },
        )
        .await;

        match result {
            Ok(price) => price,
            Err(err) => {
                tracing::warn!(
                    "Fallback triggered for book ID: {}. Reason: {}",
                    book_id,
                    err
                );
                FALLBACK_PRICE
            }
        }
    }

    pub async fn breaker_state(&self) -> CircuitState {
        self.breaker.state().await
    }

    pub fn breaker_metrics(&self) -> CircuitBreakerMetrics {
        self.breaker.metrics()
    }
}
