//! Error taxonomy for the HEX solver.
//!
//! Every error kind named in the design (syntax, safety, plugin, usage, fatal,
//! contradictory-input) has its own variant. `HexError` is returned from every
//! library entry point; only the CLI binary widens it into `anyhow::Error`.

use thiserror::Error;

/// A single error produced anywhere in the pipeline.
#[derive(Debug, Clone, Error)]
pub enum HexError {
    /// Malformed input. Fatal for the current call.
    #[error("syntax error in {file}:{line}: {message}")]
    Syntax {
        file: String,
        line: u32,
        message: String,
    },

    /// A variable in a rule has no positive bound occurrence.
    #[error("unsafe rule: variable '{variable}' has no positive bound occurrence ({context})")]
    Safety { variable: String, context: String },

    /// Thrown by plugin code or raised when a plugin violates a declared property.
    #[error("plugin fault in '{atom}': {message}")]
    Plugin { atom: String, message: String },

    /// Invalid CLI combination; fatal at startup.
    #[error("usage error: {message}")]
    Usage { message: String },

    /// A contract violation inside the core. Never caught; always fatal.
    #[error("internal contract violation: {message}")]
    Fatal { message: String },

    /// Detected during propagation; not an error in the classical sense, the
    /// caller sees this as "zero models", but it is threaded as a value so the
    /// orchestrator can short-circuit cleanly.
    #[error("contradictory input (no answer sets)")]
    ContradictoryInput,
}

impl HexError {
    pub fn syntax(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        HexError::Syntax {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn safety(variable: impl Into<String>, context: impl Into<String>) -> Self {
        HexError::Safety {
            variable: variable.into(),
            context: context.into(),
        }
    }

    pub fn plugin(atom: impl Into<String>, message: impl Into<String>) -> Self {
        HexError::Plugin {
            atom: atom.into(),
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        HexError::Usage {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        HexError::Fatal {
            message: message.into(),
        }
    }

    /// Exit code contract of §6: 0 consistent, 1 inconsistent, 2 error.
    /// `ContradictoryInput` is not surfaced as an error at the CLI boundary at
    /// all (it produces exit code 1 via the normal "zero models" path); this
    /// mapping is for the remaining, genuinely-erroneous variants.
    pub fn exit_code(&self) -> i32 {
        match self {
            HexError::ContradictoryInput => 1,
            _ => 2,
        }
    }
}

pub type HexResult<T> = Result<T, HexError>;
