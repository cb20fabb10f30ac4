pub mod pricing_gateway;
pub mod stock_ledger;

pub use pricing_gateway::{PricingError, PricingGateway};
pub use stock_ledger::{LedgerError, LedgerTransaction, StockLedger};
