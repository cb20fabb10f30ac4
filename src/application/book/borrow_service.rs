use crate::application::pricing::PriceLookup;
use crate::domain::{self, BorrowBook, BorrowBookError, BorrowPhase, BorrowResult, BookId};
use crate::ports::{LedgerTransaction, StockLedger};
use std::sync::Arc;

use super::errors::{BookApplicationError, Result};

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞いは持たず、純粋な関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub stock_ledger: Arc<dyn StockLedger>,
    pub price_lookup: Arc<PriceLookup>,
}

fn enter_phase(book_id: BookId, phase: BorrowPhase) {
    tracing::debug!(book_id = %book_id, phase = phase.as_str(), "Borrow phase reached");
}

/// 在庫減算前の失敗でトランザクションをロールバックする
///
/// ロールバック自体の失敗はログに残すのみ。元のエラーを優先して返す。
async fn abort<T>(
    tx: Box<dyn LedgerTransaction>,
    book_id: BookId,
    phase: BorrowPhase,
    err: BookApplicationError,
) -> Result<T> {
    debug_assert!(phase.rolls_back_on_failure());
    tracing::warn!(
        book_id = %book_id,
        phase = phase.as_str(),
        "Borrow aborted, rolling back: {}",
        err
    );

    if let Err(rollback_err) = tx.rollback().await {
        tracing::error!(book_id = %book_id, "Rollback failed: {}", rollback_err);
    }

    Err(err)
}

/// 書籍を1冊貸し出す
///
/// 処理フロー：
/// 1. 書籍レコードを排他ロック付きで取得（Locked）
/// 2. 在庫を1減らしてコミット（StockDecremented）
///    - 在庫切れの場合は全体をロールバックし、在庫に影響を残さない
/// 3. 価格サービスから表示価格を取得（Priced）
///    - 失敗しても0.0に縮退し、在庫減算は取り消さない
/// 4. 結果を返す（Completed）
///
/// # 価格取得のタイミング
///
/// 価格取得はコミット後、ロック解放後に行う。
/// 価格は貸出の成否に影響しないため、再試行を含めて数秒かかり得る外部呼び出しの間
/// 行ロックを保持すると、同じ書籍の貸出がすべて価格サービスの遅延に直列化されてしまう。
///
/// # エラー
/// - BookNotFound: 書籍が存在しない
/// - OutOfStock: 在庫が0
/// - LockTimeout: ロック待機が上限を超えた
/// - LedgerFailure: 在庫台帳の障害
pub async fn borrow_book(deps: &ServiceDependencies, cmd: BorrowBook) -> Result<BorrowResult> {
    let book_id = cmd.book_id;
    tracing::info!("Processing borrow request for book ID: {}", book_id);
    enter_phase(book_id, BorrowPhase::Started);

    let mut tx = deps.stock_ledger.begin().await?;

    // 1. 排他ロックを取得
    let book = match tx.find_for_update(book_id).await {
        Ok(Some(book)) => book,
        Ok(None) => {
            return abort(tx, book_id, BorrowPhase::Started, BookApplicationError::BookNotFound)
                .await;
        }
        Err(e) => return abort(tx, book_id, BorrowPhase::Started, e.into()).await,
    };
    enter_phase(book_id, BorrowPhase::Locked);

    // 2. ドメイン層の純粋関数で在庫を減算
    let updated = match domain::book::decrement_stock(book, cmd.borrowed_at) {
        Ok(updated) => updated,
        Err(BorrowBookError::OutOfStock) => {
            return abort(tx, book_id, BorrowPhase::Locked, BookApplicationError::OutOfStock)
                .await;
        }
    };

    if let Err(e) = tx.save(&updated).await {
        return abort(tx, book_id, BorrowPhase::Locked, e.into()).await;
    }

    // コミット失敗時はsqlx/台帳側でロールバック済み
    tx.commit().await.map_err(|e| {
        tracing::error!(book_id = %book_id, "Failed to commit stock decrement: {}", e);
        BookApplicationError::from(e)
    })?;
    enter_phase(book_id, BorrowPhase::StockDecremented);

    // 3. 価格取得（失敗は0.0に縮退）
    let price = deps
        .price_lookup
        .get_price(book_id, cmd.force_pricing_failure)
        .await;
    enter_phase(book_id, BorrowPhase::Priced);

    // 4. 結果を組み立てる
    let result = BorrowResult {
        book_id: updated.book_id,
        title: updated.title,
        stock_left: updated.stock,
        price,
    };
    enter_phase(book_id, BorrowPhase::Completed);

    tracing::info!(
        "Borrow successful for book: {}. Stock left: {}",
        result.title,
        result.stock_left.value()
    );
    Ok(result)
}
