//! # Glint — shading-language compiler core
//!
//! The IR and transformation core of the Glint compiler, a small
//! GLSL-derived shading language. This crate owns the program tree an
//! upstream parser produces and rewrites it in place; lexing, type checking
//! and code generation live elsewhere.
//!
//! ## Pipeline
//!
//! ```text
//! Parser → Program (IR) → Inliner passes → Codegen
//! ```
//!
//! The centerpiece is the function-call inliner: a whole-program IR-to-IR
//! pass that substitutes callee bodies at call sites under strict safety
//! rules. The emission targets cannot express arbitrary control flow (no
//! `goto`), so early returns are emulated with a one-shot `do/while` loop,
//! out-parameters are copied back explicitly, and short-circuit evaluation
//! is never broken by moving side effects.
//!
//! ```
//! use glint::{inline_program, Program, Settings};
//!
//! let mut program = Program::new();
//! // ... build functions through the construction API ...
//! let changed = inline_program(&mut program, &Settings::default());
//! assert!(!changed);
//! ```

pub mod analysis;
pub mod inliner;
pub mod ir;
pub mod settings;

use thiserror::Error;

pub use inliner::{inline_program, InlinedCall, Inliner, VariableRewriteMap};
pub use ir::{Context, Modifiers, Program, RefKind, TypeId, VariableStorage};
pub use settings::{Caps, Settings, DEFAULT_INLINE_THRESHOLD};

/// Glint IR construction error types
#[derive(Error, Debug)]
pub enum GlintError {
    #[error("symbol '{name}' is already defined in this scope")]
    DuplicateSymbol { name: String },

    #[error("function '{name}' already has a definition")]
    DuplicateDefinition { name: String },

    #[error("call to '{name}' has {got} argument(s), expected {expected}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Result type for Glint operations
pub type Result<T> = std::result::Result<T, GlintError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GlintError::DuplicateSymbol {
            name: "x".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "symbol 'x' is already defined in this scope"
        );

        let err = GlintError::ArityMismatch {
            name: "f".to_string(),
            expected: 2,
            got: 1,
        };
        assert_eq!(err.to_string(), "call to 'f' has 1 argument(s), expected 2");
    }

    #[test]
    fn test_empty_program_reaches_fixpoint_immediately() {
        let mut program = Program::new();
        assert!(!inline_program(&mut program, &Settings::default()));
    }
}
