use crate::domain::{Author, Book, BookId, NewBook, Stock, Title};
use crate::ports::stock_ledger::{
    LedgerError, LedgerTransaction, Result, StockLedger as StockLedgerTrait,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use std::collections::HashSet;
use std::time::Duration;

/// SQLSTATE lock_not_available（lock_timeout超過時に返される）
const LOCK_NOT_AVAILABLE: &str = "55P03";

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(Box::new(err))
    }
}

fn invalid_data(message: String) -> LedgerError {
    LedgerError::Storage(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

/// PostgreSQLの行データをBookに変換する
///
/// DBのCHECK制約と値オブジェクトの不変条件が食い違った場合はエラーとする。
fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let stock_i32: i32 = row.get("stock");
    let stock = u32::try_from(stock_i32)
        .map(Stock::new)
        .map_err(|_| invalid_data(format!("stock out of range: {}", stock_i32)))?;

    let title: String = row.get("title");
    let title = Title::try_from(title).map_err(|e| invalid_data(e.to_string()))?;

    let author: String = row.get("author");
    let author = Author::try_from(author).map_err(|e| invalid_data(e.to_string()))?;

    Ok(Book {
        book_id: BookId::new(row.get("id")),
        title,
        author,
        stock,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn stock_to_db(stock: Stock) -> Result<i32> {
    i32::try_from(stock.value())
        .map_err(|_| invalid_data(format!("stock out of range: {}", stock.value())))
}

/// StockLedgerのPostgreSQL実装
///
/// 排他ロックは`SELECT ... FOR UPDATE`による行ロックで実現する。
/// 行ロックはトランザクション終了（COMMIT/ROLLBACK）まで保持される。
pub struct StockLedger {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl StockLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// 行ロック待機の上限を設定する（トランザクションごとに`lock_timeout`を設定）
    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

#[async_trait]
impl StockLedgerTrait for StockLedger {
    /// 書籍をINSERTする
    ///
    /// タイトルの一意性はUNIQUE制約で保証する。
    /// 事前SELECTによる確認と異なり、同時登録でも重複は発生しない。
    async fn create(&self, new_book: NewBook) -> Result<Book> {
        let row = sqlx::query(
            r#"
            INSERT INTO books (title, author, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, title, author, stock, created_at, updated_at
            "#,
        )
        .bind(new_book.title.as_str())
        .bind(new_book.author.as_str())
        .bind(stock_to_db(new_book.stock)?)
        .bind(new_book.registered_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => LedgerError::DuplicateTitle,
            _ => LedgerError::from(err),
        })?;

        map_row_to_book(&row)
    }

    async fn find_all(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, author, stock, created_at, updated_at
            FROM books
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }

    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, author, stock, created_at, updated_at
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            // SET LOCALはパラメータを取れないためset_configを使う（第3引数trueでトランザクション内のみ有効）
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *tx)
                .await?;
        }

        Ok(Box::new(Transaction {
            tx,
            locked: HashSet::new(),
        }))
    }
}

/// PostgreSQLトランザクション
///
/// ドロップ時にsqlxがROLLBACKを発行し、行ロックが解放される。
struct Transaction {
    tx: sqlx::Transaction<'static, Postgres>,
    locked: HashSet<BookId>,
}

#[async_trait]
impl LedgerTransaction for Transaction {
    async fn find_for_update(&mut self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, author, stock, created_at, updated_at
            FROM books
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
                LedgerError::LockTimeout
            }
            _ => LedgerError::from(err),
        })?;

        let book = row.as_ref().map(map_row_to_book).transpose()?;
        if book.is_some() {
            self.locked.insert(book_id);
        }

        Ok(book)
    }

    async fn save(&mut self, book: &Book) -> Result<()> {
        if !self.locked.contains(&book.book_id) {
            return Err(LedgerError::NotLocked(book.book_id));
        }

        sqlx::query(
            r#"
            UPDATE books
            SET stock = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(book.book_id.value())
        .bind(stock_to_db(book.stock)?)
        .bind(book.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
