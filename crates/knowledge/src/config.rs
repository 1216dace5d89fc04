//! Knowledge configuration and durable artifact paths.

use crate::types::KnowledgeConfig;
use grounded_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Load the knowledge configuration.
///
/// Loads `.grounded/knowledge.yaml` if present, otherwise defaults. A
/// relative `knowledge_root` is resolved against the workspace.
pub fn load_config(workspace: &Path) -> AppResult<KnowledgeConfig> {
    let config_path = get_config_path(workspace);

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: KnowledgeConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!(
                "Failed to parse config at {:?}: {}",
                config_path, e
            ))
        })?;

        tracing::debug!("Loaded knowledge config from {:?}", config_path);
        config
    } else {
        tracing::debug!("No knowledge config at {:?}, using defaults", config_path);
        KnowledgeConfig::default()
    };

    if config.knowledge_root.is_relative() {
        config.knowledge_root = workspace.join(&config.knowledge_root);
    }

    if config.chunk_size == 0 {
        return Err(AppError::Config("chunk_size must be non-zero".to_string()));
    }

    Ok(config)
}

/// Save the knowledge configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge config to {:?}", config_path);
    Ok(())
}

/// Get the path to the knowledge config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".grounded").join("knowledge.yaml")
}

/// Get the durable index directory.
pub fn get_index_dir(workspace: &Path) -> PathBuf {
    workspace.join(".grounded").join("index")
}

/// Binary vector artifact inside an index directory.
pub fn vector_path(index_dir: &Path) -> PathBuf {
    index_dir.join("index.vec")
}

/// JSON side-table artifact inside an index directory.
pub fn side_table_path(index_dir: &Path) -> PathBuf {
    index_dir.join("index.meta.json")
}

/// Plain-text manifest inside an index directory.
pub fn manifest_path(index_dir: &Path) -> PathBuf {
    index_dir.join("manifest.txt")
}
