use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

/// First line of `<binary> -version`, e.g. "ffmpeg version 7.1 Copyright ..."
pub fn binary_version(binary: &Path) -> Result<String> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .with_context(|| format!("Failed to execute {}", binary.display()))?;

    if !output.status.success() {
        anyhow::bail!(
            "{} -version failed with status: {}",
            binary.display(),
            output.status
        );
    }

    Ok(first_line(&String::from_utf8_lossy(&output.stdout)))
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("Unknown version").trim().to_string()
}
