//! Extension function registry.
//!
//! Expressions may call functions that are not part of the attribute table,
//! e.g. `py_add(19, 4) = 23` or `mime_type() = "image/png"`. The registry maps
//! a function name to its signature and to the backend that runs it. It is
//! built once before any evaluation and never mutated afterwards, so one
//! registry can serve concurrent evaluations.
//!
//! Every invocation receives the path of the file being tested as a leading
//! argument. That argument is not part of the declared signature.

mod manifest;

pub use manifest::{load_manifest_dirs, FunctionDef, Manifest};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Parameter and return types an extension function may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => f.write_str("string"),
            ValueType::Integer => f.write_str("integer"),
        }
    }
}

/// Argument or result of an extension call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(i64),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Integer(_) => ValueType::Integer,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// In-process function implementation.
pub type NativeFn =
    Arc<dyn Fn(&Path, &[Value]) -> std::result::Result<Value, String> + Send + Sync>;

/// External program run once per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// How an extension function is executed.
#[derive(Clone)]
pub enum Backend {
    Native(NativeFn),
    Command(CommandSpec),
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Native(_) => f.write_str("Native"),
            Backend::Command(spec) => f.debug_tuple("Command").field(spec).finish(),
        }
    }
}

/// A callable function and its signature.
#[derive(Debug, Clone)]
pub struct ExtensionFunction {
    pub name: String,
    /// Name of the extension that registered the function.
    pub extension: String,
    pub params: Vec<ValueType>,
    pub returns: ValueType,
    pub backend: Backend,
}

impl ExtensionFunction {
    /// Human-readable signature, e.g. `add(integer, integer) -> integer`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        format!("{}({}) -> {}", self.name, params.join(", "), self.returns)
    }

    /// Check a call's arity and, where known, its argument types.
    pub fn check_args(&self, args: &[Option<ValueType>]) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(Error::ArityMismatch {
                function: self.name.clone(),
                expected: self.params.len(),
                found: args.len(),
            });
        }
        for (i, (arg, param)) in args.iter().zip(&self.params).enumerate() {
            if let Some(arg) = arg {
                if arg != param {
                    return Err(Error::TypeMismatch(format!(
                        "argument {} of \"{}\" must be {}, got {}",
                        i + 1,
                        self.name,
                        param,
                        arg
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Metadata of a registered extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Immutable name -> function map.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    extensions: Vec<ExtensionInfo>,
    functions: BTreeMap<String, ExtensionFunction>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Find a function by name.
    pub fn lookup(&self, name: &str) -> Result<&ExtensionFunction> {
        self.functions
            .get(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    /// All functions, ordered by name.
    pub fn functions(&self) -> impl Iterator<Item = &ExtensionFunction> {
        self.functions.values()
    }

    pub fn extensions(&self) -> &[ExtensionInfo] {
        &self.extensions
    }

    /// Run `function` for the file at `filename`.
    pub fn invoke(
        &self,
        function: &ExtensionFunction,
        args: &[Value],
        filename: &Path,
    ) -> Result<Value> {
        let types: Vec<Option<ValueType>> = args.iter().map(|a| Some(a.value_type())).collect();
        function.check_args(&types)?;

        let result = match &function.backend {
            Backend::Native(f) => {
                f(filename, args).map_err(|message| Error::runtime(&function.name, message))?
            }
            Backend::Command(spec) => run_command(function, spec, args, filename)?,
        };

        if result.value_type() != function.returns {
            return Err(Error::runtime(
                &function.name,
                format!("returned {} instead of {}", result.value_type(), function.returns),
            ));
        }
        Ok(result)
    }
}

fn run_command(
    function: &ExtensionFunction,
    spec: &CommandSpec,
    args: &[Value],
    filename: &Path,
) -> Result<Value> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).arg(filename);
    for arg in args {
        cmd.arg(arg.to_string());
    }

    tracing::trace!(function = %function.name, program = %spec.program.display(), "running extension command");

    let output = cmd.output().map_err(|e| {
        Error::runtime(
            &function.name,
            format!("failed to run {}: {}", spec.program.display(), e),
        )
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::runtime(
            &function.name,
            format!("{} exited with {}: {}", spec.program.display(), output.status, stderr.trim()),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = stdout.trim();
    match function.returns {
        ValueType::String => Ok(Value::String(text.to_string())),
        ValueType::Integer => text.parse().map(Value::Integer).map_err(|_| {
            Error::runtime(&function.name, format!("expected an integer, got \"{}\"", text))
        }),
    }
}

/// Collects functions before freezing them into a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    extensions: Vec<ExtensionInfo>,
    functions: BTreeMap<String, ExtensionFunction>,
}

impl RegistryBuilder {
    /// Record extension metadata.
    pub fn extension(mut self, info: ExtensionInfo) -> Self {
        self.extensions.push(info);
        self
    }

    /// Add a function. The first registration of a name wins.
    pub fn function(mut self, function: ExtensionFunction) -> Self {
        if let Some(existing) = self.functions.get(&function.name) {
            tracing::warn!(
                function = %function.name,
                kept = %existing.extension,
                skipped = %function.extension,
                "duplicate extension function"
            );
            return self;
        }
        self.functions.insert(function.name.clone(), function);
        self
    }

    /// Add an in-process function.
    pub fn native<F>(
        self,
        extension: &str,
        name: &str,
        params: &[ValueType],
        returns: ValueType,
        f: F,
    ) -> Self
    where
        F: Fn(&Path, &[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.function(ExtensionFunction {
            name: name.to_string(),
            extension: extension.to_string(),
            params: params.to_vec(),
            returns,
            backend: Backend::Native(Arc::new(f)),
        })
    }

    pub fn build(self) -> Registry {
        tracing::debug!(
            extensions = self.extensions.len(),
            functions = self.functions.len(),
            "extension registry built"
        );
        Registry {
            extensions: self.extensions,
            functions: self.functions,
        }
    }
}
