pub mod events;
pub mod slot;
