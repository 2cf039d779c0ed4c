pub mod export;
pub mod init_config;
pub mod list;
pub mod probe;
