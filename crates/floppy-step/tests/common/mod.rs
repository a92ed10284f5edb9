#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use floppy_step::{BuildContext, Datastore, DatastoreRegistry, Error, Result, VirtualMachine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindDatastore { name: String, host: Option<String> },
    Dir,
    Exists(String),
    Upload { src: PathBuf, dst: String },
    Delete(String),
    AddFloppy(String),
}

/// Failure switches for the fake vCenter.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub find: bool,
    pub dir: bool,
    pub upload: bool,
    pub delete: bool,
    /// Attach fails for images containing this substring.
    pub attach: Option<String>,
}

/// Records every collaborator call in order.
pub struct FakeVcenter {
    vm_dir: String,
    faults: Faults,
    calls: Mutex<Vec<Call>>,
    files: Mutex<HashSet<String>>,
}

impl FakeVcenter {
    pub fn new(vm_dir: &str) -> Arc<Self> {
        Self::with_faults(vm_dir, Faults::default())
    }

    pub fn with_faults(vm_dir: &str, faults: Faults) -> Arc<Self> {
        Arc::new(Self {
            vm_dir: vm_dir.to_string(),
            faults,
            calls: Mutex::new(Vec::new()),
            files: Mutex::new(HashSet::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload { src, dst } => Some((src, dst)),
                _ => None,
            })
            .collect()
    }

    pub fn attaches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddFloppy(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Context wired to this fake, with a VM present.
    pub fn context(self: &Arc<Self>) -> BuildContext {
        BuildContext::new(Arc::new(FakeDriver(self.clone()))).with_vm(Arc::new(FakeVm(self.clone())))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub struct FakeVm(pub Arc<FakeVcenter>);

#[async_trait]
impl VirtualMachine for FakeVm {
    async fn dir(&self) -> Result<String> {
        self.0.record(Call::Dir);
        if self.0.faults.dir {
            return Err(Error::VmDir("vm has no file-backed disk".into()));
        }
        Ok(self.0.vm_dir.clone())
    }

    async fn add_floppy(&self, image_path: &str) -> Result<()> {
        self.0.record(Call::AddFloppy(image_path.to_string()));
        if let Some(pattern) = &self.0.faults.attach
            && image_path.contains(pattern.as_str())
        {
            return Err(Error::Attach {
                image: image_path.to_string(),
                reason: "device limit reached".into(),
            });
        }
        Ok(())
    }
}

pub struct FakeDriver(pub Arc<FakeVcenter>);

#[async_trait]
impl DatastoreRegistry for FakeDriver {
    async fn find_datastore(&self, name: &str, host: Option<&str>) -> Result<Arc<dyn Datastore>> {
        self.0.record(Call::FindDatastore {
            name: name.to_string(),
            host: host.map(str::to_string),
        });
        if self.0.faults.find {
            return Err(Error::DatastoreNotFound {
                name: name.to_string(),
                host: host.map(str::to_string),
            });
        }
        Ok(Arc::new(FakeDatastore(self.0.clone())))
    }
}

pub struct FakeDatastore(pub Arc<FakeVcenter>);

#[async_trait]
impl Datastore for FakeDatastore {
    fn name(&self) -> &str {
        "ds1"
    }

    async fn file_exists(&self, path: &str) -> bool {
        self.0.record(Call::Exists(path.to_string()));
        self.0.files.lock().unwrap().contains(path)
    }

    async fn upload_file(&self, src: &Path, dst: &str) -> Result<()> {
        self.0.record(Call::Upload {
            src: src.to_path_buf(),
            dst: dst.to_string(),
        });
        if self.0.faults.upload {
            return Err(Error::Upload {
                src: src.display().to_string(),
                dst: dst.to_string(),
                reason: "insufficient space".into(),
            });
        }
        self.0.files.lock().unwrap().insert(dst.to_string());
        Ok(())
    }

    fn resolve_path(&self, path: &str) -> String {
        if path.starts_with('[') {
            path.to_string()
        } else {
            format!("[ds1] {path}")
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.0.record(Call::Delete(path.to_string()));
        if self.0.faults.delete || !self.0.files.lock().unwrap().remove(path) {
            return Err(Error::Delete {
                path: path.to_string(),
                reason: "file not found".into(),
            });
        }
        Ok(())
    }
}
