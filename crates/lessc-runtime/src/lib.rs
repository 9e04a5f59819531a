/*
 * lessc-runtime
 * Copyright (c) 2025 Posit, PBC
 *
 * Runtime abstraction layer for the LESS preprocessor.
 *
 * This crate provides a trait-based abstraction for the system operations
 * the preprocessor performs (file reads, environment lookup, process
 * execution), so the import inliner and compiler shim can be exercised
 * without touching the real system:
 *
 * - NativeRuntime: Full system access using std (default)
 */

mod native;
mod traits;

// Re-export core types (API surface)
pub use traits::{CommandOutput, PathKind, RuntimeError, RuntimeResult, SystemRuntime};

// Re-export runtime implementations
pub use native::NativeRuntime;
