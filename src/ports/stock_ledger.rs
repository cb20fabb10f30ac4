use crate::domain::{Book, BookId, NewBook};
use async_trait::async_trait;
use thiserror::Error;

/// 在庫台帳のエラー
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 同じタイトルの書籍が既に存在する
    #[error("Title already exists")]
    DuplicateTitle,

    /// ロック取得が待機上限を超えた（一時的な失敗、再試行可能）
    #[error("Timed out waiting for record lock")]
    LockTimeout,

    /// トランザクションがロックしていないレコードを保存しようとした
    #[error("Book {0} is not locked by this transaction")]
    NotLocked(BookId),

    /// ストレージ層のエラー
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// 在庫台帳ポート
///
/// 書籍レコードと在庫数を排他的に所有する。
/// 在庫の変更は`begin`で開始したトランザクション内のロック下でのみ行う。
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// 書籍を新規登録する
    ///
    /// 同じタイトルが存在する場合は`LedgerError::DuplicateTitle`を返し、
    /// 既存のレコードには一切触れない。
    async fn create(&self, new_book: NewBook) -> Result<Book>;

    /// 全書籍をID順で取得する
    ///
    /// レコードロックを待たない（コミット済みの値を返す）。
    async fn find_all(&self) -> Result<Vec<Book>>;

    /// IDで書籍を取得する（ロックなし）
    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>>;

    /// トランザクションを開始する
    ///
    /// コミットせずにドロップされたトランザクションはロールバックされ、
    /// 保持していたロックはすべて解放される。
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>>;
}

/// 在庫台帳のトランザクション
#[async_trait]
pub trait LedgerTransaction: Send {
    /// 書籍を排他ロック付きで取得する
    ///
    /// 同じIDに対する他トランザクションの`find_for_update`は、
    /// このトランザクションが終了（コミットまたはロールバック）するまでブロックされる。
    /// 書籍が存在しない場合は`None`。
    async fn find_for_update(&mut self, book_id: BookId) -> Result<Option<Book>>;

    /// ロック中の書籍の変更をステージする
    async fn save(&mut self, book: &Book) -> Result<()>;

    /// 変更を確定し、ロックを解放する
    async fn commit(self: Box<Self>) -> Result<()>;

    /// 変更を破棄し、ロックを解放する
    async fn rollback(self: Box<Self>) -> Result<()>;
}
