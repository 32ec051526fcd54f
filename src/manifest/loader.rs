//! Manifest directory loader

use std::path::Path;

use tracing::{debug, info, warn};

use super::{ProviderManifest, parse_manifest_file};
use crate::{Error, Result};

/// Loader for provider manifests from directories
pub struct ManifestLoader;

impl ManifestLoader {
    /// Load all manifests from a directory (recursive)
    ///
    /// Files that cannot be read or parsed are skipped with a warning.
    /// Structural validation happens when the registry is built.
    pub async fn load_directory(path: &str) -> Result<Vec<ProviderManifest>> {
        let path = Path::new(path);

        if !path.exists() {
            return Err(Error::Config(format!(
                "Manifest directory does not exist: {path:?}"
            )));
        }

        if !path.is_dir() {
            return Err(Error::Config(format!(
                "Manifest path is not a directory: {path:?}"
            )));
        }

        let mut manifests = Vec::new();
        Self::load_directory_recursive(path, &mut manifests).await?;

        info!(
            count = manifests.len(),
            path = %path.display(),
            "Loaded manifests"
        );

        Ok(manifests)
    }

    async fn load_directory_recursive(
        dir: &Path,
        manifests: &mut Vec<ProviderManifest>,
    ) -> Result<()> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| Error::Config(format!("Failed to read directory {dir:?}: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Config(format!("Failed to read directory entry: {e}")))?
        {
            let path = entry.path();

            // Skip hidden files/directories
            if path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'))
            {
                continue;
            }

            if path.is_dir() {
                Box::pin(Self::load_directory_recursive(&path, manifests)).await?;
            } else if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                match parse_manifest_file(&path).await {
                    Ok(manifest) => {
                        debug!(provider = %manifest.provider, path = %path.display(), "Loaded manifest");
                        manifests.push(manifest);
                    }
                    Err(e) => {
                        warn!(error = %e, path = %path.display(), "Failed to load manifest");
                    }
                }
            }
        }

        Ok(())
    }

    /// Load manifests from multiple directories
    ///
    /// A missing directory is logged and skipped.
    pub async fn load_directories(paths: &[String]) -> Vec<ProviderManifest> {
        let mut all = Vec::new();

        for path in paths {
            match Self::load_directory(path).await {
                Ok(found) => all.extend(found),
                Err(e) => {
                    warn!(error = %e, path = %path, "Failed to load manifest directory");
                }
            }
        }

        all
    }
}
