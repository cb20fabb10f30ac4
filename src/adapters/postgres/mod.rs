pub mod stock_ledger;

// パブリックに型を再エクスポート
pub use stock_ledger::StockLedger as PostgresStockLedger;
