pub mod token;
pub mod webhook_log;

pub use token::{Token, TokenCreatedResponse, TokenStatusResponse};
pub use webhook_log::{NewWebhookLog, WebhookLog, WebhookLogResponse};
