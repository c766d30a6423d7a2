use std::error::Error;
use std::io::{self, BufRead};

use crate::cli::{AppContext, AuthCommands};

/// Shows only enough of a key to tell two apart.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

fn read_key_from_stdin(provider: &str) -> Result<String, Box<dyn Error>> {
    eprintln!("Enter API key for {provider}:");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let key = line.trim().to_string();
    if key.is_empty() {
        return Err("No key entered".into());
    }
    Ok(key)
}

pub fn run(context: &AppContext, command: AuthCommands) -> Result<(), Box<dyn Error>> {
    let store = &context.credentials;
    match command {
        AuthCommands::Set { provider, key } => {
            let key = match key {
                Some(key) => key,
                None => read_key_from_stdin(&provider)?,
            };
            store.store_api_key(&provider, &key)?;
            println!("✅ Stored key for {provider}");
        }
        AuthCommands::Show { provider } => match store.get_api_key(&provider)? {
            Some(key) => println!("{provider}: {}", mask_key(&key)),
            None => println!("{provider}: no key stored"),
        },
        AuthCommands::Clear { provider } => {
            if store.clear_api_key(&provider) {
                println!("✅ Removed key for {provider}");
            } else {
                return Err(format!("Could not remove key for {provider}").into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::mask_key;

    #[test]
    fn keys_are_masked() {
        assert_eq!(mask_key("sk-abcdef123456"), "sk-a…3456");
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key(""), "");
    }
}
