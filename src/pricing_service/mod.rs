//! 価格サービスのシミュレータ
//!
//! 貸出サービスの再試行・サーキットブレーカーを検証するため、
//! 強制失敗とランダム失敗を起こす不安定な価格APIを提供する。

pub mod handlers;
pub mod quote;
pub mod router;

pub use handlers::PricingState;
pub use router::create_router;
