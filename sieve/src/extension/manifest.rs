//! TOML manifests describing command-backed extensions.
//!
//! Each `*.toml` file in an extension directory declares one extension:
//!
//! ```toml
//! name = "media"
//! version = "0.1.0"
//! description = "File type helpers"
//!
//! [functions.mime_type]
//! command = ["file", "--brief", "--mime-type"]
//! returns = "string"
//!
//! [functions.add]
//! command = ["sh", "-c", "echo $(($2 + $3))", "add"]
//! args = ["integer", "integer"]
//! ```
//!
//! A relative program path containing a `/` is resolved against the
//! manifest's directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Backend, CommandSpec, ExtensionFunction, ExtensionInfo, Registry, ValueType};
use crate::{Error, Result};

/// One extension manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDef>,
}

/// Function entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Program followed by fixed arguments.
    pub command: Vec<String>,
    /// Declared parameter types, excluding the implicit file path.
    #[serde(default)]
    pub args: Vec<ValueType>,
    #[serde(default = "default_returns")]
    pub returns: ValueType,
}

fn default_returns() -> ValueType {
    ValueType::Integer
}

impl Manifest {
    /// Parse a manifest from TOML.
    pub fn parse(toml_str: &str, path: &Path) -> Result<Self> {
        let manifest: Manifest = toml::from_str(toml_str).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        for (name, def) in &manifest.functions {
            if def.command.is_empty() {
                return Err(Error::Manifest {
                    path: path.to_path_buf(),
                    message: format!("function \"{}\" has an empty command", name),
                });
            }
            if !is_identifier(name) {
                return Err(Error::Manifest {
                    path: path.to_path_buf(),
                    message: format!("\"{}\" is not a valid function name", name),
                });
            }
        }

        Ok(manifest)
    }

    /// Load a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents, path)
    }

    fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
        }
    }

    /// Turn the function entries into registry functions.
    fn functions(&self, base_dir: &Path) -> impl Iterator<Item = ExtensionFunction> + '_ {
        let base_dir = base_dir.to_path_buf();
        self.functions.iter().map(move |(name, def)| {
            let program = PathBuf::from(&def.command[0]);
            let program = if program.is_relative() && def.command[0].contains('/') {
                base_dir.join(program)
            } else {
                program
            };
            ExtensionFunction {
                name: name.clone(),
                extension: self.name.clone(),
                params: def.args.clone(),
                returns: def.returns,
                backend: Backend::Command(CommandSpec {
                    program,
                    args: def.command[1..].to_vec(),
                }),
            }
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Build a registry from every manifest found in `dirs`.
///
/// Missing directories are skipped. Directories are read in order and
/// manifests within a directory by file name, so earlier directories take
/// precedence for duplicate function names.
pub fn load_manifest_dirs(dirs: &[PathBuf]) -> Result<Registry> {
    let mut builder = Registry::builder();

    for dir in dirs {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "extension directory not found, skipping");
            continue;
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        for path in paths {
            let manifest = Manifest::load(&path)?;
            tracing::debug!(
                extension = %manifest.name,
                functions = manifest.functions.len(),
                path = %path.display(),
                "loaded extension manifest"
            );
            builder = builder.extension(manifest.info());
            for function in manifest.functions(dir) {
                builder = builder.function(function);
            }
        }
    }

    Ok(builder.build())
}
