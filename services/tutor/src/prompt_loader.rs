use anyhow::{Context, Result};
use lingo_core::tutor::TutorProfile;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reads `<tutor-id>.md` system prompts from `dir_path`, keyed by file stem.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let tutor_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_lowercase();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            if content.trim().is_empty() {
                tracing::warn!("Ignoring empty prompt file {}", path.display());
                continue;
            }
            prompts.insert(tutor_id, content.trim().to_string());
        }
    }

    Ok(prompts)
}

/// Replaces the tutor's system prompt when the directory has one for it.
pub fn apply_prompt(tutor: TutorProfile, prompts: &HashMap<String, String>) -> TutorProfile {
    match prompts.get(&tutor.id) {
        Some(prompt) => {
            tracing::info!("Using custom system prompt for {}", tutor.name);
            tutor.with_system_prompt(prompt.clone())
        }
        None => tutor,
    }
}
