use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vsphere_api::{DatastoreFilter, FloppyCreateSpec, VmInfo, VsphereClient};

use crate::types::DatastorePath;
use crate::{Datastore, DatastoreRegistry, Error, Result, VirtualMachine};

/// Connection settings for a vCenter.
#[derive(Debug, Clone)]
pub struct VsphereConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub datacenter: String,
    pub insecure: bool,
}

impl VsphereConfig {
    /// Create from env vars:
    ///
    /// - `VSPHERE_URL`, `VSPHERE_USERNAME`, `VSPHERE_PASSWORD` (required)
    /// - `VSPHERE_DATACENTER` (default: `"Datacenter"`)
    /// - `VSPHERE_INSECURE` (`true`/`1` to skip TLS verification)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let required = |key: &str| {
            std::env::var(key).map_err(|_| Error::MissingEnv(key.to_string()))
        };

        let insecure = std::env::var("VSPHERE_INSECURE")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            url: required("VSPHERE_URL")?,
            username: required("VSPHERE_USERNAME")?,
            password: required("VSPHERE_PASSWORD")?,
            datacenter: std::env::var("VSPHERE_DATACENTER").unwrap_or_else(|_| "Datacenter".into()),
            insecure,
        })
    }

    pub async fn connect(&self) -> Result<VsphereClient> {
        let client = VsphereClient::login(
            &self.url,
            &self.username,
            &self.password,
            &self.datacenter,
            self.insecure,
        )
        .await?;
        info!(url = %self.url, datacenter = %self.datacenter, "vsphere: session opened");
        Ok(client)
    }
}

/// Datastore lookup backed by the vCenter datastore listing.
pub struct VsphereDriver {
    client: VsphereClient,
}

impl VsphereDriver {
    pub fn new(client: VsphereClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DatastoreRegistry for VsphereDriver {
    async fn find_datastore(&self, name: &str, host: Option<&str>) -> Result<Arc<dyn Datastore>> {
        let filter = DatastoreFilter {
            names: if name.is_empty() { vec![] } else { vec![name.to_string()] },
            hosts: host.map(|h| vec![h.to_string()]).unwrap_or_default(),
        };

        let mut found = self
            .client
            .list_datastores(&filter)
            .await
            .map_err(|e| Error::DatastoreLookup {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        match found.len() {
            0 => Err(Error::DatastoreNotFound {
                name: name.to_string(),
                host: host.map(str::to_string),
            }),
            1 => {
                let summary = found.remove(0);
                debug!(datastore = %summary.name, id = %summary.datastore, "vsphere: datastore found");
                Ok(Arc::new(VsphereDatastore {
                    client: self.client.clone(),
                    name: summary.name,
                    host: host.map(str::to_string),
                }))
            }
            count => Err(Error::AmbiguousDatastore {
                name: name.to_string(),
                count,
            }),
        }
    }
}

/// One datastore, addressed through the `/folder` file endpoint.
///
/// `host` is the ESXi host the datastore was resolved against. vCenter's
/// `/folder` endpoint routes transfers itself, so it is kept for logging.
pub struct VsphereDatastore {
    client: VsphereClient,
    name: String,
    host: Option<String>,
}

impl VsphereDatastore {
    /// Split a path into (datastore, relative path). Unqualified paths are
    /// taken as relative to this datastore.
    fn locate(&self, path: &str) -> (String, String) {
        match DatastorePath::parse(path) {
            Ok(p) => (p.datastore, p.path),
            Err(_) => (self.name.clone(), path.trim_start_matches('/').to_string()),
        }
    }
}

#[async_trait]
impl Datastore for VsphereDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn file_exists(&self, path: &str) -> bool {
        let (ds, rel) = self.locate(path);
        match self.client.datastore_file_exists(&ds, &rel).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(path, error = %e, "vsphere: file lookup failed");
                false
            }
        }
    }

    async fn upload_file(&self, src: &Path, dst: &str) -> Result<()> {
        let upload_err = |reason: String| Error::Upload {
            src: src.display().to_string(),
            dst: dst.to_string(),
            reason,
        };

        let contents = tokio::fs::read(src)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        let size = contents.len();

        let (ds, rel) = self.locate(dst);
        self.client
            .upload_datastore_file(&ds, &rel, contents)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        info!(
            datastore = %ds,
            host = self.host.as_deref().unwrap_or(""),
            path = %rel,
            bytes = size,
            "vsphere: file uploaded"
        );
        Ok(())
    }

    fn resolve_path(&self, path: &str) -> String {
        if DatastorePath::parse(path).is_ok() {
            return path.to_string();
        }
        DatastorePath {
            datastore: self.name.clone(),
            path: path.trim_start_matches('/').to_string(),
        }
        .to_string()
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (ds, rel) = self.locate(path);
        self.client
            .delete_datastore_file(&ds, &rel)
            .await
            .map_err(|e| Error::Delete {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        info!(datastore = %ds, path = %rel, "vsphere: file deleted");
        Ok(())
    }
}

/// A VM addressed by its vCenter identifier (e.g. `vm-42`).
pub struct VsphereVm {
    client: VsphereClient,
    id: String,
}

impl VsphereVm {
    pub fn new(client: VsphereClient, id: impl Into<String>) -> Self {
        Self {
            client,
            id: id.into(),
        }
    }

    /// Directory of the first disk's backing file.
    fn dir_of(info: &VmInfo) -> Result<String> {
        let vmdk = info
            .disks
            .values()
            .find_map(|d| d.backing.vmdk_file.as_deref())
            .ok_or_else(|| Error::VmDir(format!("vm {} has no file-backed disk", info.name)))?;

        let path = DatastorePath::parse(vmdk).map_err(|_| Error::VmDir(vmdk.to_string()))?;
        Ok(path.parent().to_string())
    }
}

#[async_trait]
impl VirtualMachine for VsphereVm {
    async fn dir(&self) -> Result<String> {
        let info = self
            .client
            .get_vm(&self.id)
            .await
            .map_err(|e| Error::VmDir(e.to_string()))?;
        Self::dir_of(&info)
    }

    async fn add_floppy(&self, image_path: &str) -> Result<()> {
        let key = self
            .client
            .create_floppy(&self.id, &FloppyCreateSpec::image_file(image_path))
            .await
            .map_err(|e| Error::Attach {
                image: image_path.to_string(),
                reason: e.to_string(),
            })?;

        info!(vm = %self.id, device = %key, image = image_path, "vsphere: floppy added");
        Ok(())
    }
}
