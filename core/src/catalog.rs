//! Template catalog
//!
//! Parses and validates template files, versions each template by a hash of
//! its source, and starts computations from them by name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::computation::{Computation, Limits};
use crate::config::Config;
use crate::executor::{Stmt, Val};
use crate::parser::semantic_validator::{validate_procedures, ValidationError};
use crate::parser::{parse_procedures, ParseError};

/// A validated procedure template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub params: Vec<String>,
    pub body: Stmt,
    /// SHA-256 of the template's source text
    pub version_hash: String,
    pub source: String,
    /// File (or other origin) the template came from
    pub origin: String,
}

impl Template {
    /// First 8 characters of the version hash
    pub fn short_hash(&self) -> &str {
        &self.version_hash[..self.version_hash.len().min(8)]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: ParseError,
    },

    #[error("{origin}: {}", format_diagnostics(.diagnostics))]
    Invalid {
        origin: String,
        diagnostics: Vec<ValidationError>,
    },

    #[error("template '{name}' from {origin} is already registered from {existing}")]
    Duplicate {
        name: String,
        origin: String,
        existing: String,
    },

    #[error("template '{0}' not found")]
    NotFound(String),
}

fn format_diagnostics(diagnostics: &[ValidationError]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Hash template source using SHA256
pub(crate) fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    templates: BTreeMap<String, Template>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the template paths in `config`
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for path in &config.templates.paths {
            catalog.load_dir(path, &config.templates.extension)?;
        }
        Ok(catalog)
    }

    /// Parse, validate and register every template in `source`
    ///
    /// Nothing is registered if any template in the source has an error.
    /// Returns the names registered, in source order.
    pub fn register_source(&mut self, origin: &str, source: &str) -> Result<Vec<String>, CatalogError> {
        let procedures = parse_procedures(source).map_err(|source| CatalogError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let (errors, warnings): (Vec<_>, Vec<_>) = validate_procedures(&procedures, source)
            .into_iter()
            .partition(|d| d.is_error());
        for warning in &warnings {
            tracing::warn!(origin, "{}", warning);
        }
        if !errors.is_empty() {
            return Err(CatalogError::Invalid {
                origin: origin.to_string(),
                diagnostics: errors,
            });
        }

        for procedure in &procedures {
            if let Some(existing) = self.templates.get(&procedure.name) {
                return Err(CatalogError::Duplicate {
                    name: procedure.name.clone(),
                    origin: origin.to_string(),
                    existing: existing.origin.clone(),
                });
            }
        }

        let mut names = Vec::with_capacity(procedures.len());
        for procedure in procedures {
            let template = Template {
                version_hash: hash_source(&procedure.source),
                name: procedure.name,
                params: procedure.params,
                body: procedure.body,
                source: procedure.source,
                origin: origin.to_string(),
            };
            tracing::debug!(
                name = %template.name,
                version = %template.short_hash(),
                origin,
                "Registered template"
            );
            names.push(template.name.clone());
            self.templates.insert(template.name.clone(), template);
        }

        Ok(names)
    }

    /// Read and register one template file
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<String>, CatalogError> {
        let source = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.register_source(&path.display().to_string(), &source)
    }

    /// Register every file with `extension` under `dir`, recursively
    ///
    /// Files are loaded in path order. Returns the number of templates added.
    pub fn load_dir(&mut self, dir: &Path, extension: &str) -> Result<usize, CatalogError> {
        let mut files = Vec::new();
        collect_files(dir, extension.trim_start_matches('.'), &mut files)?;
        files.sort();

        let mut count = 0;
        for file in &files {
            count += self.load_file(file)?.len();
        }

        tracing::info!(
            dir = %dir.display(),
            files = files.len(),
            templates = count,
            "Loaded templates"
        );
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// All templates, ordered by name
    pub fn list(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Create a computation of the named template
    pub fn start(&self, name: &str, args: Vec<Val>, limits: Limits) -> Result<Computation, CatalogError> {
        let template = self
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        Ok(Computation::new(template, args, limits))
    }
}

fn collect_files(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<(), CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_files(&path, extension, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            out.push(path);
        }
    }

    Ok(())
}
