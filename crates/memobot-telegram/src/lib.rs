//! Telegram Bot API transport and long-poll listener.

mod api;
mod listener;
mod transport;

pub use api::{BotApi, DEFAULT_API_BASE, Update, parse_update};
pub use listener::TelegramListener;
pub use transport::TelegramTransport;
