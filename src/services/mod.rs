pub mod ingest;
pub mod sweeper;
pub mod token_registry;
pub mod webhook_store;

pub use ingest::IngestService;
pub use token_registry::TokenRegistry;
pub use webhook_store::WebhookStore;
