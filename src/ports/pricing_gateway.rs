use crate::domain::BookId;
use async_trait::async_trait;
use thiserror::Error;

/// 価格サービス呼び出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// 接続またはレスポンス待ちがタイムアウトした
    #[error("Pricing request timed out")]
    Timeout,

    /// 接続できなかった
    #[error("Could not connect to pricing service: {0}")]
    Connect(String),

    /// 5xx応答
    #[error("Pricing service returned server error {0}")]
    ServerError(u16),

    /// 4xx応答
    #[error("Pricing service rejected the request with status {0}")]
    Rejected(u16),

    /// 応答ボディが価格として解釈できない
    #[error("Invalid pricing response: {0}")]
    InvalidResponse(String),

    /// その他の通信エラー
    #[error("Pricing transport error: {0}")]
    Transport(String),
}

impl PricingError {
    /// 再試行で回復し得るエラーか
    ///
    /// タイムアウト、接続失敗、5xx、通信エラーは一時的とみなす。
    /// 4xxと不正な応答は何度呼んでも同じ結果になるため再試行しない。
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PricingError::Timeout
                | PricingError::Connect(_)
                | PricingError::ServerError(_)
                | PricingError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PricingError>;

/// 価格サービスポート
///
/// 外部の価格サービスへの生の呼び出しを抽象化する。
/// 再試行・サーキットブレーカー・フォールバックはアプリケーション層の責務。
#[async_trait]
pub trait PricingGateway: Send + Sync {
    /// 書籍の価格を取得する
    ///
    /// `force_failure`が真の場合、価格サービスに強制失敗を要求する。
    async fn fetch_price(&self, book_id: BookId, force_failure: bool) -> Result<f64>;
}
