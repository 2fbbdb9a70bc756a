//! Repository implementations for the Vigia persistence layer

mod bridge_repo;
mod call_repo;
mod extension_repo;

pub use bridge_repo::PgBridgeRepository;
pub use call_repo::PgCallRepository;
pub use extension_repo::PgExtensionRepository;
