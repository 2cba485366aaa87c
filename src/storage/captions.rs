//! Caption templates kept in captions.json as `{ "<name>": { "text": "..." } }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::storage::{read_json, AppPaths};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionTemplate {
    #[serde(default)]
    pub text: String,
}

fn load_all(paths: &AppPaths) -> crate::error::Result<BTreeMap<String, CaptionTemplate>> {
    Ok(read_json(&paths.captions_file())?.unwrap_or_default())
}

/// Template names, sorted.
pub fn list(paths: &AppPaths) -> crate::error::Result<Vec<String>> {
    Ok(load_all(paths)?.into_keys().collect())
}

pub fn get_text(paths: &AppPaths, name: &str) -> crate::error::Result<String> {
    load_all(paths)?
        .remove(name)
        .map(|t| t.text)
        .ok_or_else(|| AppError::Config(format!("Caption template '{}' not found", name)))
}
