pub mod dedup_store;
pub mod gemini;
pub mod scheduler;
pub mod telegram_sender;
pub mod usage;

pub use dedup_store::RedisDedupStore;
pub use gemini::GeminiService;
pub use scheduler::StrategyScheduler;
pub use telegram_sender::TelegramSender;
pub use usage::RedisUsageCounter;
