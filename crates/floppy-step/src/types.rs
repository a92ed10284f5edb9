use std::path::PathBuf;
use std::sync::Arc;

use crate::{DatastoreRegistry, Error, Result, VirtualMachine};

/// State shared by the steps of one build.
///
/// Owned by the pipeline and lent to each step in turn.
pub struct BuildContext {
    /// Target machine. Set once the VM exists.
    pub vm: Option<Arc<dyn VirtualMachine>>,
    pub driver: Arc<dyn DatastoreRegistry>,
    /// Locally generated floppy image, produced by an earlier step.
    pub floppy_path: Option<PathBuf>,
    /// Datastore path of the floppy image uploaded for this build.
    pub uploaded_floppy_path: Option<String>,
}

impl BuildContext {
    pub fn new(driver: Arc<dyn DatastoreRegistry>) -> Self {
        Self {
            vm: None,
            driver,
            floppy_path: None,
            uploaded_floppy_path: None,
        }
    }

    pub fn with_vm(mut self, vm: Arc<dyn VirtualMachine>) -> Self {
        self.vm = Some(vm);
        self
    }

    pub fn with_floppy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.floppy_path = Some(path.into());
        self
    }

    pub fn vm(&self) -> Result<&Arc<dyn VirtualMachine>> {
        self.vm.as_ref().ok_or(Error::MissingVm)
    }
}

/// One floppy device the step should attach, in attach order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentIntent {
    /// Local image to upload next to the VM, then attach.
    Uploaded(PathBuf),
    /// Image already on a datastore; attach as-is.
    Static(String),
}

/// How the overall build ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Cancelled,
    Halted,
}

impl Termination {
    /// Build from the pipeline's two status flags. Both set is rejected.
    pub fn from_flags(cancelled: bool, halted: bool) -> Result<Self> {
        match (cancelled, halted) {
            (false, false) => Ok(Self::Success),
            (true, false) => Ok(Self::Cancelled),
            (false, true) => Ok(Self::Halted),
            (true, true) => Err(Error::ConflictingTermination),
        }
    }

    /// Whether compensating actions should run.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// A datastore-qualified path of the form `[datastore] relative/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastorePath {
    pub datastore: String,
    pub path: String,
}

impl DatastorePath {
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix('[')
            .ok_or_else(|| Error::InvalidPath(raw.to_string()))?;
        let (datastore, path) = rest
            .split_once(']')
            .ok_or_else(|| Error::InvalidPath(raw.to_string()))?;
        if datastore.is_empty() {
            return Err(Error::InvalidPath(raw.to_string()));
        }
        Ok(Self {
            datastore: datastore.to_string(),
            path: path.trim_start().to_string(),
        })
    }

    /// Parent directory, keeping the datastore prefix.
    pub fn parent(&self) -> Self {
        let path = match self.path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        };
        Self {
            datastore: self.datastore.clone(),
            path,
        }
    }
}

impl std::fmt::Display for DatastorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.datastore, self.path)
    }
}
