use rand::Rng;

/// 基本価格
pub const BASE_PRICE: f64 = 50.0;

/// 書籍IDの下1桁ごとの加算額
pub const PRICE_STEP: f64 = 5.0;

/// 純粋関数：書籍IDから価格を算出する
///
/// `50.0 + (bookId mod 10) * 5.0`
pub fn calculate_price(book_id: i64) -> f64 {
    BASE_PRICE + (book_id % 10) as f64 * PRICE_STEP
}

/// 不安定なサービスを模擬するためのランダム失敗判定
///
/// `failure_percent`%の確率でtrueを返す。
pub fn should_fail_randomly(failure_percent: u8) -> bool {
    if failure_percent == 0 {
        return false;
    }
    rand::thread_rng().gen_range(0..100u8) < failure_percent
}
