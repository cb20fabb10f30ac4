use crate::domain::BookId;
use crate::ports::pricing_gateway::{PricingError, PricingGateway as PricingGatewayTrait, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// PricingGatewayのモック実装
///
/// キューに積んだ失敗を1回の呼び出しにつき1つずつ先に返す。
/// キューが空になった後は固定価格（または恒常的な失敗）を返す。
/// `force_failure`は実際の価格サービスと同様に常に500となる。
pub struct PricingGateway {
    price: f64,
    permanent_failure: Option<PricingError>,
    queued_failures: Mutex<VecDeque<PricingError>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl PricingGateway {
    pub fn with_price(price: f64) -> Self {
        Self {
            price,
            permanent_failure: None,
            queued_failures: Mutex::new(VecDeque::new()),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_failing(error: PricingError) -> Self {
        Self {
            permanent_failure: Some(error),
            ..Self::with_price(0.0)
        }
    }

    /// すべての呼び出しを遅延させる（価格取得中の挙動の確認用）
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 次の呼び出しで返す失敗をキューに積む
    pub fn push_failure(&self, error: PricingError) {
        self.queued_failures.lock().unwrap().push_back(error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PricingGatewayTrait for PricingGateway {
    async fn fetch_price(&self, _book_id: BookId, force_failure: bool) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if force_failure {
            return Err(PricingError::ServerError(500));
        }

        if let Some(error) = self.queued_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        match &self.permanent_failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.price),
        }
    }
}
