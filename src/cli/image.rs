//! One-shot image generation from the command line.

use std::error::Error;
use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};

use crate::cli::AppContext;
use crate::core::config::io::write_atomic;

pub async fn run_image(
    context: &AppContext,
    provider: Option<&str>,
    output: Option<PathBuf>,
    prompt: &str,
) -> Result<(), Box<dyn Error>> {
    let proxy = context.proxy(None)?;
    let image = proxy.image_service(provider)?.generate_image(prompt).await?;

    let bytes = general_purpose::STANDARD.decode(image.image_base64.as_bytes())?;
    let path = output.unwrap_or_else(|| PathBuf::from(&image.filename));
    write_atomic(&path, &bytes)?;
    println!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
