//! Command-line interface parsing and handling
//!
//! `serve` runs the IPC boundary over stdio for a UI process. The other
//! subcommands drive the same components directly for scripting and
//! debugging.

pub mod auth;
pub mod image;
pub mod mcp;
pub mod provider;
pub mod say;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::adapters::http::build_client;
use crate::core::cipher::KeyringCipher;
use crate::core::config::{AppPaths, Config};
use crate::core::credentials::CredentialStore;
use crate::core::proxy::ProviderProxy;
use crate::core::session::ChatSession;
use crate::ipc::server::serve_stdio;
use crate::ipc::IpcHost;
use crate::logging;
use crate::mcp::events::log_events;
use crate::mcp::openai_provider::OPENAI_MCP_PROVIDER_ID;
use crate::mcp::transport::TransportConfig;
use crate::mcp::{Backoff, McpContextService, SupervisedSession};

#[derive(Parser)]
#[command(name = "keipes")]
#[command(version)]
#[command(about = "Backend for the Keipes chat and image client")]
#[command(
    long_about = "Keipes routes chat and image requests to OpenAI, Anthropic, Gemini, or an \
offline dummy provider, keeps API keys encrypted at rest, and connects to a remote MCP tool \
server.\n\n\
Run without a subcommand (or with 'serve') to answer JSON-lines IPC requests on stdin/stdout.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY       Fallback key for OpenAI\n\
  ANTHROPIC_API_KEY    Fallback key for Anthropic\n\
  GEMINI_API_KEY       Fallback key for Gemini\n\
  KEIPES_LOG           Log filter (default: keipes=info)\n\
  KEIPES_CONFIG_DIR    Override the configuration directory\n\
  KEIPES_DATA_DIR      Override the data directory"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Write logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer IPC requests on stdin/stdout (default)
    Serve,
    /// Send one chat message and print the reply
    Say {
        /// Provider to use for this message only
        #[arg(short = 'p', long)]
        provider: Option<String>,
        /// Message text
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Generate an image and write it to disk
    Image {
        /// Provider to generate with (defaults to the active provider)
        #[arg(short = 'p', long)]
        provider: Option<String>,
        /// Output path (defaults to the generated file name)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        /// Image prompt
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Show or change the active provider
    Provider {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Manage stored API keys
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Inspect the MCP tool server and context providers
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List known providers; the active one is marked with *
    List,
    /// Print the active provider
    Get,
    /// Select the active provider
    Set { name: String },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store a key (read from stdin when omitted)
    Set { provider: String, key: Option<String> },
    /// Show whether a key is stored, masked
    Show { provider: String },
    /// Remove a stored key
    Clear { provider: String },
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Connect and list the server's tools
    Tools,
    /// Connect and print the session status
    Status,
    /// Call a tool with JSON object arguments
    Call {
        tool: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Send a message through an MCP context provider
    Send {
        /// Context provider id
        #[arg(short = 'p', long, default_value = OPENAI_MCP_PROVIDER_ID)]
        provider: String,
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },
}

/// Everything a command needs, built from the on-disk configuration.
pub struct AppContext {
    pub paths: AppPaths,
    pub config: Config,
    pub credentials: Arc<CredentialStore>,
    pub client: reqwest::Client,
}

impl AppContext {
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let paths = AppPaths::resolve()?;
        let config = Config::load_from_path(&paths.config_file())?;
        debug!(config = %paths.config_file().display(), "configuration loaded");
        let credentials = Arc::new(CredentialStore::new(
            paths.credentials_dir(),
            Arc::new(KeyringCipher::new()),
        ));
        Ok(Self {
            paths,
            config,
            credentials,
            client: build_client()?,
        })
    }

    /// A supervised MCP session when a server is configured and enabled.
    pub fn mcp_session(&self) -> Result<Option<Arc<SupervisedSession>>, Box<dyn Error>> {
        if self.config.mcp.active_url().is_none() {
            return Ok(None);
        }
        let transport = TransportConfig::from_settings(&self.config.mcp)?;
        let backoff = Backoff {
            max_attempts: self.config.mcp.max_reconnect_attempts(),
            ..Backoff::default()
        };
        Ok(Some(Arc::new(SupervisedSession::new(
            self.client.clone(),
            transport,
            backoff,
        ))))
    }

    /// The context service, with saved contexts restored.
    pub fn context_service(&self) -> McpContextService {
        McpContextService::new(
            self.client.clone(),
            self.credentials.clone(),
            Some(self.paths.mcp_contexts_file()),
        )
    }

    /// A proxy that persists provider changes.
    pub fn proxy(
        &self,
        mcp: Option<&Arc<SupervisedSession>>,
    ) -> Result<ProviderProxy, Box<dyn Error>> {
        self.build_proxy(self.config.clone(), Some(self.paths.config_file()), mcp)
    }

    /// A proxy pinned to `provider` without touching the saved selection.
    pub fn proxy_for(
        &self,
        provider: Option<&str>,
        mcp: Option<&Arc<SupervisedSession>>,
    ) -> Result<ProviderProxy, Box<dyn Error>> {
        match provider {
            Some(name) => {
                let mut config = self.config.clone();
                config.active_provider = Some(name.to_string());
                self.build_proxy(config, None, mcp)
            }
            None => self.proxy(mcp),
        }
    }

    fn build_proxy(
        &self,
        config: Config,
        config_path: Option<PathBuf>,
        mcp: Option<&Arc<SupervisedSession>>,
    ) -> Result<ProviderProxy, Box<dyn Error>> {
        let mut proxy = ProviderProxy::new(config, config_path, self.credentials.clone())?
            .with_http_client(self.client.clone());
        if let Some(session) = mcp {
            proxy = proxy.with_tool_catalog(session.clone());
        }
        Ok(proxy)
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let context = AppContext::load()?;

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let mcp = context.mcp_session()?;
            let proxy = context.proxy(mcp.as_ref())?;

            let contexts = Arc::new(context.context_service());
            tokio::spawn(log_events(contexts.subscribe()));
            let registered = contexts.register_defaults(&context.config.mcp_providers);
            debug!(registered, "MCP context providers ready");

            let chat = match context.config.max_context_messages {
                Some(limit) => ChatSession::with_context_limit(limit),
                None => ChatSession::new(),
            };
            let mut host = IpcHost::new(Arc::new(proxy), context.credentials.clone())
                .with_chat_session(Arc::new(chat))
                .with_context_service(contexts);
            if let Some(session) = mcp {
                session.start();
                host = host.with_mcp(session);
            }
            info!(version = %crate::ipc::host::app_version(), "serving IPC on stdio");
            serve_stdio(&host).await?;
            Ok(())
        }
        Commands::Say { provider, prompt } => {
            say::run_say(&context, provider.as_deref(), &prompt.join(" ")).await
        }
        Commands::Image {
            provider,
            output,
            prompt,
        } => image::run_image(&context, provider.as_deref(), output, &prompt.join(" ")).await,
        Commands::Provider { command } => provider::run(&context, command),
        Commands::Auth { command } => auth::run(&context, command),
        Commands::Mcp { command } => mcp::run(&context, command).await,
    }
}
