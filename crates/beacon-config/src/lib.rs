pub mod board;
pub mod loader;

pub use board::{BoardConfig, PollingConfig};
pub use loader::{ConfigLoader, CONFIG_FILE_NAME, ENV_PREFIX};
