//! YAML manifest parser

use std::path::Path;

use super::ProviderManifest;
use crate::{Error, Result};

/// Parse a provider manifest from YAML content
pub fn parse_manifest(content: &str) -> Result<ProviderManifest> {
    serde_yaml::from_str(content)
        .map_err(|e| Error::Manifest(format!("Failed to parse manifest YAML: {e}")))
}

/// Parse a provider manifest from a file
pub async fn parse_manifest_file(path: &Path) -> Result<ProviderManifest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Manifest(format!("Failed to read manifest file {path:?}: {e}")))?;

    let mut manifest = parse_manifest(&content)?;

    // Use filename as provider id if not specified
    if manifest.provider.is_empty() {
        if let Some(stem) = path.file_stem() {
            manifest.provider = stem.to_string_lossy().to_string();
        }
    }

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_error_names_the_problem() {
        let err = parse_manifest("provider: x\ncategory: spreadsheet\n").unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
        assert!(err.to_string().contains("Failed to parse manifest YAML"));
    }

    #[tokio::test]
    async fn provider_defaults_to_file_stem() {
        let mut file = tempfile::Builder::new()
            .prefix("")
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "category: crm\nbase_url: https://api.example.com\nauth:\n  type: bearer\n"
        )
        .unwrap();

        let manifest = parse_manifest_file(file.path()).await.unwrap();
        let stem = file.path().file_stem().unwrap().to_string_lossy().to_string();
        assert_eq!(manifest.provider, stem);
    }

    #[tokio::test]
    async fn missing_file_is_manifest_error() {
        let err = parse_manifest_file(Path::new("/nonexistent/manifest.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }
}
