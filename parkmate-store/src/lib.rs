pub mod app_config;
pub mod lot_repo;
pub mod redis_repo;
pub mod slot_repo;

pub use lot_repo::LotConfigRepository;
pub use redis_repo::RedisStore;
pub use slot_repo::SlotRepository;
