pub mod builtin_providers;
pub mod cipher;
pub mod config;
pub mod credentials;
pub mod keyring;
pub mod message;
pub mod proxy;
pub mod session;
