//! mcpreg - MCP Registry client
//!
//! Browses, publishes, updates, and deletes entries of an MCP server registry
//! over its REST API.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod namespace;
pub mod paths;
pub mod session;
pub mod storage;
pub mod tree;
pub mod workspace;

pub use client::{ListQuery, RegistryClient, DEFAULT_LIMIT};
pub use commands::{CommandError, Registry, UpdateFields};
pub use config::{set_config_value, Settings, TokenStorage};
pub use error::{Operation, RegistryError};
pub use models::{Capability, EntryList, RegistryEntry, ServerConfig};
pub use namespace::Namespace;
pub use paths::Paths;
pub use session::SessionStore;
pub use storage::{KeyringSecretStore, SecretStore, SettingsStore, StorageError};
pub use tree::{children_of, CapabilityNode, EntryNode, TreeNode, TreeProjector};
