use std::error::Error;

use crate::cli::{AppContext, ProviderCommands};
use crate::core::builtin_providers::find_builtin_provider;

pub fn run(context: &AppContext, command: ProviderCommands) -> Result<(), Box<dyn Error>> {
    let proxy = context.proxy(None)?;
    match command {
        ProviderCommands::List => {
            let active = proxy.provider_name();
            for id in proxy.list_providers() {
                let marker = if id == active { "*" } else { " " };
                let name = find_builtin_provider(&id)
                    .map(|provider| provider.display_name.as_str())
                    .unwrap_or_default();
                println!("{marker} {id:<10} {name}");
            }
        }
        ProviderCommands::Get => println!("{}", proxy.provider_name()),
        ProviderCommands::Set { name } => {
            if find_builtin_provider(&name).is_none() {
                eprintln!(
                    "⚠️  '{name}' is not a known provider; requests will fail until another is selected."
                );
            }
            proxy.set_provider(&name);
            println!("✅ Active provider: {name}");
        }
    }
    Ok(())
}
