mod server;
pub use server::{RestoreSessionCallback, Server};

mod server_config;
pub use server_config::ServerConfig;
