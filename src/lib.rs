pub mod backend;
pub mod config;
pub mod errors;
pub mod executor;
pub mod gateway;
pub mod heartbeat;
pub mod pool;
pub mod server;
pub mod service;
pub mod store;

pub use config::Config;
pub use errors::StartupError;
pub use executor::ExecutorPool;
pub use gateway::Gateway;
pub use service::StatusService;
pub use store::Stores;
