//! One-shot chat from the command line.

use std::error::Error;
use std::sync::Arc;

use crate::cli::AppContext;
use crate::core::session::ChatSession;

pub async fn run_say(
    context: &AppContext,
    provider: Option<&str>,
    prompt: &str,
) -> Result<(), Box<dyn Error>> {
    let mcp = context.mcp_session()?;
    let proxy = context.proxy_for(provider, mcp.as_ref())?;
    let chat = proxy.chat_service(Arc::new(ChatSession::new()))?;

    match chat.send_message(prompt).await? {
        Some(reply) => println!("{reply}"),
        None => eprintln!("{} returned no text.", proxy.provider_name()),
    }

    if let Some(session) = mcp {
        session.disconnect().await;
    }
    Ok(())
}
