//! Generated module storage backends.

pub mod fs;
pub mod memory;

use async_trait::async_trait;

/// Trait for the intermediate store that generated modules are written to.
///
/// Module names are flat file names (`petstore-api.json`). Implementations
/// must make a completed `write_module` visible to later `read_module` calls.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync;

    /// Write (or overwrite) a module and return its location.
    async fn write_module(&self, name: &str, text: &str) -> Result<String, Self::Error>;

    /// Read a module back, if present.
    async fn read_module(&self, name: &str) -> Result<Option<String>, Self::Error>;

    /// Location a module with this name would be written to.
    fn location(&self, name: &str) -> String;

    /// Remove every module.
    async fn clear(&self) -> Result<(), Self::Error>;
}

pub use fs::FsModuleStore;
pub use memory::InMemoryModuleStore;
