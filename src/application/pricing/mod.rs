mod price_lookup;

pub use price_lookup::{FALLBACK_PRICE, PriceLookup};
