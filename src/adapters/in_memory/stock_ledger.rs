use crate::domain::{Book, BookId, NewBook};
use crate::ports::stock_ledger::{
    LedgerError, LedgerTransaction, Result, StockLedger as StockLedgerTrait,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// StockLedgerのインメモリ実装
///
/// レコードごとに非同期Mutexを持ち、行ロックとして扱う。
/// コミット済みの値はテーブルに保持され、行ロックを取らずに読めるため、
/// 通常の参照は処理中の貸出を待たない。
pub struct StockLedger {
    table: Arc<Mutex<Table>>,
    lock_timeout: Option<Duration>,
}

struct Row {
    lock: Arc<tokio::sync::Mutex<()>>,
    book: Book,
}

struct Table {
    rows: BTreeMap<BookId, Row>,
    titles: HashMap<String, BookId>,
    next_id: i64,
}

fn lock_table(table: &Mutex<Table>) -> Result<MutexGuard<'_, Table>> {
    table
        .lock()
        .map_err(|_| LedgerError::Storage("in-memory ledger table lock poisoned".into()))
}

impl StockLedger {
    pub fn new() -> Self {
        Self::with_lock_timeout(None)
    }

    /// `find_for_update`が行ロックを待つ上限を`lock_timeout`で指定する
    pub fn with_lock_timeout(lock_timeout: Option<Duration>) -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                rows: BTreeMap::new(),
                titles: HashMap::new(),
                next_id: 1,
            })),
            lock_timeout,
        }
    }
}

impl Default for StockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StockLedgerTrait for StockLedger {
    async fn create(&self, new_book: NewBook) -> Result<Book> {
        let mut table = lock_table(&self.table)?;

        if table.titles.contains_key(new_book.title.as_str()) {
            return Err(LedgerError::DuplicateTitle);
        }

        let book_id = BookId::new(table.next_id);
        table.next_id += 1;

        let book = Book {
            book_id,
            title: new_book.title,
            author: new_book.author,
            stock: new_book.stock,
            created_at: new_book.registered_at,
            updated_at: new_book.registered_at,
        };

        table
            .titles
            .insert(book.title.as_str().to_string(), book_id);
        table.rows.insert(
            book_id,
            Row {
                lock: Arc::new(tokio::sync::Mutex::new(())),
                book: book.clone(),
            },
        );

        Ok(book)
    }

    async fn find_all(&self) -> Result<Vec<Book>> {
        let table = lock_table(&self.table)?;
        Ok(table.rows.values().map(|row| row.book.clone()).collect())
    }

    async fn find_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        let table = lock_table(&self.table)?;
        Ok(table.rows.get(&book_id).map(|row| row.book.clone()))
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>> {
        Ok(Box::new(Transaction {
            table: Arc::clone(&self.table),
            lock_timeout: self.lock_timeout,
            held: HashMap::new(),
            staged: HashMap::new(),
        }))
    }
}

/// インメモリテーブル上のトランザクション
///
/// ドロップ時に行ロックのガードが解放される（ロールバックも同じ動作）。
/// ステージした変更はコミット時にのみテーブルへ反映される。
struct Transaction {
    table: Arc<Mutex<Table>>,
    lock_timeout: Option<Duration>,
    held: HashMap<BookId, OwnedMutexGuard<()>>,
    staged: HashMap<BookId, Book>,
}

impl Transaction {
    fn committed(&self, book_id: BookId) -> Result<Option<Book>> {
        let table = lock_table(&self.table)?;
        Ok(table.rows.get(&book_id).map(|row| row.book.clone()))
    }
}

#[async_trait]
impl LedgerTransaction for Transaction {
    async fn find_for_update(&mut self, book_id: BookId) -> Result<Option<Book>> {
        if self.held.contains_key(&book_id) {
            if let Some(staged) = self.staged.get(&book_id) {
                return Ok(Some(staged.clone()));
            }
            return self.committed(book_id);
        }

        let row_lock = {
            let table = lock_table(&self.table)?;
            match table.rows.get(&book_id) {
                Some(row) => Arc::clone(&row.lock),
                None => return Ok(None),
            }
        };

        let guard = match self.lock_timeout {
            Some(timeout) => tokio::time::timeout(timeout, row_lock.lock_owned())
                .await
                .map_err(|_| LedgerError::LockTimeout)?,
            None => row_lock.lock_owned().await,
        };

        // 前の保持者がコミットした値を読み直す
        let book = self.committed(book_id)?;
        self.held.insert(book_id, guard);

        Ok(book)
    }

    async fn save(&mut self, book: &Book) -> Result<()> {
        if !self.held.contains_key(&book.book_id) {
            return Err(LedgerError::NotLocked(book.book_id));
        }
        self.staged.insert(book.book_id, book.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Transaction {
            table,
            held,
            staged,
            ..
        } = *self;

        {
            let mut table = lock_table(&table)?;
            for (book_id, book) in staged {
                if let Some(row) = table.rows.get_mut(&book_id) {
                    row.book.stock = book.stock;
                    row.book.updated_at = book.updated_at;
                }
            }
        }

        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        drop(self);
        Ok(())
    }
}
