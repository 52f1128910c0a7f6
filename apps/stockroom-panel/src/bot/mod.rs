pub mod events;
pub mod handlers;
pub mod keyboards;
pub mod utils;

pub use events::BotEvent;
pub use handlers::dispatch;
