pub mod mock;
pub mod utils;
pub mod wpa_cli;
