use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Result, GlossaError};

/// One unit of pipeline input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Names the output folder, must be unique and filesystem-safe
    pub id: String,
    /// Source-language instruction text
    pub text: String,
}

/// Batch input file: `{"prompts": [{"id": ..., "text": ...}, ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub prompts: Vec<Prompt>,
}

impl Manifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GlossaError::Manifest(format!("Failed to read {}: {}", path.display(), e)))?;

        let manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| GlossaError::Manifest(format!("Malformed manifest {}: {}", path.display(), e)))?;

        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.prompts.is_empty() {
            return Err(GlossaError::Manifest("Manifest contains no prompts".to_string()));
        }

        let mut seen = HashSet::new();
        for prompt in &self.prompts {
            if !is_safe_id(&prompt.id) {
                return Err(GlossaError::Manifest(format!(
                    "Prompt id '{}' is not filesystem-safe (use letters, digits, '-', '_')",
                    prompt.id
                )));
            }
            if !seen.insert(prompt.id.as_str()) {
                return Err(GlossaError::Manifest(format!(
                    "Duplicate prompt id '{}'",
                    prompt.id
                )));
            }
        }
        Ok(())
    }
}

/// A prompt id doubles as a directory name, so it must not be able to
/// escape the output root or collide across platforms.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_manifest(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write manifest");
        file
    }

    #[test]
    fn test_valid_manifest() {
        let file = write_manifest(
            r#"{"prompts": [{"id": "p1", "text": "Add two numbers."},
                            {"id": "p2", "text": "Reverse a string."}]}"#,
        );
        let manifest = Manifest::from_file(file.path()).expect("valid manifest");
        assert_eq!(manifest.prompts.len(), 2);
        assert_eq!(manifest.prompts[0].id, "p1");
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let file = write_manifest("{not json");
        assert!(matches!(
            Manifest::from_file(file.path()),
            Err(GlossaError::Manifest(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let file = write_manifest(
            r#"{"prompts": [{"id": "p1", "text": "a"}, {"id": "p1", "text": "b"}]}"#,
        );
        assert!(matches!(
            Manifest::from_file(file.path()),
            Err(GlossaError::Manifest(_))
        ));
    }

    #[test]
    fn test_unsafe_ids_rejected() {
        for id in ["../escape", "a/b", "", "white space"] {
            let file = write_manifest(&format!(
                r#"{{"prompts": [{{"id": "{}", "text": "a"}}]}}"#,
                id
            ));
            assert!(
                matches!(Manifest::from_file(file.path()), Err(GlossaError::Manifest(_))),
                "id '{}' should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_empty_prompt_list_rejected() {
        let file = write_manifest(r#"{"prompts": []}"#);
        assert!(matches!(
            Manifest::from_file(file.path()),
            Err(GlossaError::Manifest(_))
        ));
    }
}
