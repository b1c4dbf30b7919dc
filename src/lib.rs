//! # Symdex - Symbol indexing and scope resolution for Python source trees
//!
//! Symdex provides:
//! - Tree-sitter based symbol extraction (classes, functions, docstrings,
//!   conservative dependency sets)
//! - Line-oriented scope resolution with properly nested scope stacks
//! - A project-wide dependency/coverage index rebuilt by full tree rescans
//! - JSON index persistence with lock-file mutual exclusion and atomic writes

pub mod config;
pub mod extract;
pub mod hooks;
pub mod ignore;
pub mod index;
pub mod resolve;
pub mod store;
pub mod symbol;

// Re-exports for convenient access
pub use extract::Extractor;
pub use index::{Indexer, ScanReport};
pub use resolve::resolve_at;
pub use store::{Index, IndexStore};
pub use symbol::{ScopeContext, Symbol, SymbolKind};

/// Result type alias for Symdex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Symdex operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error in {path} (line {line}): {message}")]
    Parse {
        path: String,
        line: u32,
        message: String,
    },

    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Concurrent write conflict: {0}")]
    ConcurrentWriteConflict(String),

    #[error("Grammar error: {0}")]
    Grammar(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
