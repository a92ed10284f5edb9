pub mod config;
pub mod pipeline;
pub mod step;
pub mod types;
pub mod vsphere;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

pub use config::FloppyConfig;
pub use pipeline::{Pipeline, RunReport, Step};
pub use step::StepAddFloppy;
pub use types::{AttachmentIntent, BuildContext, Termination};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vsphere error: {0}")]
    Vsphere(#[from] vsphere_api::Error),

    #[error("datastore not found: {name:?}{}", .host.as_deref().map(|h| format!(" on host {h}")).unwrap_or_default())]
    DatastoreNotFound { name: String, host: Option<String> },

    #[error("datastore lookup {name:?} failed: {reason}")]
    DatastoreLookup { name: String, reason: String },

    #[error("datastore {name:?} is ambiguous: {count} matches")]
    AmbiguousDatastore { name: String, count: usize },

    #[error("upload {src} -> {dst} failed: {reason}")]
    Upload {
        src: String,
        dst: String,
        reason: String,
    },

    #[error("delete {path} failed: {reason}")]
    Delete { path: String, reason: String },

    #[error("attach floppy {image} failed: {reason}")]
    Attach { image: String, reason: String },

    #[error("vm working directory unavailable: {0}")]
    VmDir(String),

    #[error("no virtual machine in build context")]
    MissingVm,

    #[error("invalid datastore path: {0}")]
    InvalidPath(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("build reported as both cancelled and halted")]
    ConflictingTermination,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure class, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Datastore cannot be found, looked up, or is ambiguous.
    Resolution,
    /// Upload or delete failed in transport, permissions or capacity.
    Transfer,
    /// The machine rejected the device.
    Attachment,
    /// The machine handle itself is unusable.
    Machine,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DatastoreNotFound { .. }
            | Self::DatastoreLookup { .. }
            | Self::AmbiguousDatastore { .. } => ErrorKind::Resolution,
            Self::Upload { .. } | Self::Delete { .. } | Self::Vsphere(_) => ErrorKind::Transfer,
            Self::Attach { .. } => ErrorKind::Attachment,
            Self::VmDir(_) | Self::MissingVm => ErrorKind::Machine,
            Self::InvalidPath(_)
            | Self::InvalidConfig(_)
            | Self::MissingEnv(_)
            | Self::ConflictingTermination => ErrorKind::Config,
        }
    }
}

/// Handle to the machine being built.
#[async_trait]
pub trait VirtualMachine: Send + Sync + 'static {
    /// Datastore directory holding the VM's files, e.g. `[ds1] vm/vm-name`.
    async fn dir(&self) -> Result<String>;

    /// Attach a floppy drive backed by a datastore-qualified image path.
    async fn add_floppy(&self, image_path: &str) -> Result<()>;
}

/// A resolved datastore.
#[async_trait]
pub trait Datastore: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Diagnostic only. Lookup failures report `false`.
    async fn file_exists(&self, path: &str) -> bool;

    /// Upload a local file to `dst` on this datastore.
    async fn upload_file(&self, src: &Path, dst: &str) -> Result<()>;

    /// Qualify `path` as `[name] path` unless it already is.
    fn resolve_path(&self, path: &str) -> String;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Looks datastores up by name, optionally pinned to one host.
#[async_trait]
pub trait DatastoreRegistry: Send + Sync + 'static {
    async fn find_datastore(&self, name: &str, host: Option<&str>) -> Result<Arc<dyn Datastore>>;
}
