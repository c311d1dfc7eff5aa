//! YAIL compiler
//!
//! Compiles a blocks workspace into YAIL, the Scheme dialect the companion
//! runtime evaluates, and decides which blocks may be linked together.

pub mod assembler;
pub mod codegen;
pub mod coercion;
pub mod driver;
pub mod error;
pub mod rules;
pub mod scope;
pub mod yail;

pub use assembler::{ProjectAssembler, DEFAULT_PACKAGE};
pub use codegen::{apply_diagnostics, declaration_of, BlockCode, CodeGenerator, Declaration, Diagnostic, Severity};
pub use coercion::{CoercionResult, CoercionTable};
pub use driver::{CompileOptions, CompileOutput, Compiler};
pub use error::{CompileError, Result};
pub use rules::{LinkRules, FALLBACK_PROPERTY_TYPE};
pub use scope::Scope;
