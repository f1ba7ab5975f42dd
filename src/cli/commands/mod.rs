mod config;

pub use config::{cmd_check_config, cmd_init_config};
