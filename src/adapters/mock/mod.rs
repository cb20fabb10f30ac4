pub mod pricing_gateway;

pub use pricing_gateway::PricingGateway;
