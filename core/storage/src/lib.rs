//! Box-backed storage mediation for shop downloads.
//!
//! This crate mediates access to a remote cloud-storage account on
//! behalf of a shop that attaches stored files to its products:
//! - OAuth2 authorization flow with CSRF state handling
//! - token persistence with refresh-on-expiry and 401 retry
//! - folder listing, multipart upload, and direct-download URLs
//! - human-readable path to file-id resolution with caching
//!
//! All state lives behind the [`store::KeyValueStore`] abstraction so
//! the crate stays independent of the host's persistence.

pub mod auth;
pub mod client;
pub mod config;
pub mod download;
pub mod oauth;
pub mod resolver;
pub mod store;
pub mod validate;

pub use auth::{AuthEndpoints, TokenManager};
pub use client::{BoxClient, ClientConfig, FolderDetails, RemoteEntry};
pub use config::{Credentials, StorageSettings, TokenSet, ROOT_FOLDER_ID};
pub use download::DownloadRedirector;
pub use oauth::{CallbackQuery, FlowError, OAuthFlow};
pub use resolver::PathResolver;
pub use store::{KeyValueStore, MemoryStore};
