use std::error::Error;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cli::{AppContext, McpCommands};
use crate::core::config::McpProviderConfig;
use crate::mcp::types::SendOptions;
use crate::mcp::SupervisedSession;

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn server_session(context: &AppContext) -> Result<Arc<SupervisedSession>, Box<dyn Error>> {
    context.mcp_session()?.ok_or_else(|| {
        "No MCP server is configured. Set [mcp] enabled and server_url in config.toml.".into()
    })
}

async fn list_tools(session: &SupervisedSession) -> Result<(), Box<dyn Error>> {
    let tools = session.ensure_ready().await?;
    if tools.is_empty() {
        println!("The server offers no tools.");
    }
    for tool in &tools {
        match &tool.description {
            Some(description) => println!("{}: {description}", tool.name),
            None => println!("{}", tool.name),
        }
    }
    Ok(())
}

async fn call_tool(
    session: &SupervisedSession,
    tool: &str,
    args: &str,
) -> Result<(), Box<dyn Error>> {
    let arguments: Map<String, Value> = serde_json::from_str(args)?;
    let result = session.call_tool(tool, arguments).await?;
    print_json(&result)
}

async fn finish(
    session: &SupervisedSession,
    result: Result<(), Box<dyn Error>>,
) -> Result<(), Box<dyn Error>> {
    session.disconnect().await;
    result
}

pub async fn run(context: &AppContext, command: McpCommands) -> Result<(), Box<dyn Error>> {
    match command {
        McpCommands::Tools => {
            let session = server_session(context)?;
            finish(&session, list_tools(&session).await).await
        }
        McpCommands::Status => {
            let session = server_session(context)?;
            // A failed connect still leaves a status worth printing.
            let _ = session.ensure_ready().await;
            let printed = print_json(&session.status().await);
            finish(&session, printed).await
        }
        McpCommands::Call { tool, args } => {
            let session = server_session(context)?;
            finish(&session, call_tool(&session, &tool, &args).await).await
        }
        McpCommands::Send { provider, message } => {
            send(context, &provider, &message.join(" ")).await
        }
    }
}

async fn send(context: &AppContext, provider: &str, message: &str) -> Result<(), Box<dyn Error>> {
    let service = context.context_service();
    let config = context
        .config
        .mcp_provider(provider)
        .cloned()
        .unwrap_or_else(|| McpProviderConfig::new(provider, provider));
    service.register_provider(&config)?;

    let response = service
        .send_message(&config.provider_id, message, SendOptions::default())
        .await?;
    match (&response.message, &response.error) {
        (Some(reply), _) if response.success => println!("{}", reply.content),
        (_, Some(error)) => {
            return Err(format!("{} ({})", error.message, error.code).into());
        }
        _ => eprintln!("{provider} returned no text."),
    }
    Ok(())
}
