pub mod data;
pub mod defaults;
pub mod io;

pub use data::{Config, McpProviderConfig, McpSettings, ModelOverrides};
pub use io::{AppPaths, ConfigError};

#[cfg(test)]
mod tests;
