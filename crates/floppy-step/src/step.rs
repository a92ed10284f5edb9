use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::FloppyConfig;
use crate::pipeline::Step;
use crate::types::{AttachmentIntent, BuildContext, Termination};
use crate::{Result, VirtualMachine};

/// File name of the generated image once uploaded into the VM directory.
pub const UPLOADED_FLOPPY_NAME: &str = "packer-tmp-created-floppy.flp";

/// Attaches floppy media to the build VM.
///
/// A generated image (from `BuildContext::floppy_path`) is uploaded into the
/// VM's own directory and attached first; a configured static image is
/// attached after it. Only the uploaded image is removed on unwind.
pub struct StepAddFloppy {
    config: FloppyConfig,
    datastore: String,
    host: Option<String>,
}

impl StepAddFloppy {
    /// An empty `datastore` selects the only datastore visible to `host`.
    pub fn new(config: FloppyConfig, datastore: impl Into<String>, host: Option<String>) -> Self {
        Self {
            config,
            datastore: datastore.into(),
            host: host.filter(|h| !h.is_empty()),
        }
    }

    /// Create from env vars: `FLOPPY_DATASTORE` (default: empty), `FLOPPY_HOST` (optional).
    pub fn from_env(config: FloppyConfig) -> Self {
        dotenvy::dotenv().ok();

        let datastore = std::env::var("FLOPPY_DATASTORE").unwrap_or_default();
        let host = std::env::var("FLOPPY_HOST").ok();

        Self::new(config, datastore, host)
    }

    pub fn config(&self) -> &FloppyConfig {
        &self.config
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Devices to attach for this build, in attach order.
    pub fn intents(&self, ctx: &BuildContext) -> Vec<AttachmentIntent> {
        let mut intents = Vec::with_capacity(2);
        if let Some(local) = &ctx.floppy_path {
            intents.push(AttachmentIntent::Uploaded(local.clone()));
        }
        if let Some(path) = &self.config.floppy_img_path {
            intents.push(AttachmentIntent::Static(path.clone()));
        }
        intents
    }

    /// Upload the generated image next to the VM and record it in the
    /// context. Returns the datastore-qualified reference to attach.
    async fn upload_generated(
        &self,
        ctx: &mut BuildContext,
        vm: &dyn VirtualMachine,
        local: &Path,
    ) -> Result<String> {
        info!(floppy_path = %local.display(), "uploading created floppy image");

        let ds = ctx.driver.find_datastore(&self.datastore, self.host()).await?;
        info!(datastore = ds.name(), host = self.host().unwrap_or(""), "datastore resolved");

        let vm_dir = vm.dir().await?;
        let upload_path = format!("{vm_dir}/{UPLOADED_FLOPPY_NAME}");

        let dir_exists = ds.file_exists(&vm_dir).await;
        debug!(dir = %vm_dir, exists = dir_exists, "checked vm directory on datastore");
        let target_exists = ds.file_exists(&upload_path).await;
        debug!(path = %upload_path, exists = target_exists, "checked upload target on datastore");

        info!(path = %upload_path, "uploading floppy to datastore");
        ds.upload_file(local, &upload_path).await?;
        ctx.uploaded_floppy_path = Some(upload_path.clone());

        Ok(ds.resolve_path(&upload_path))
    }
}

#[async_trait]
impl Step for StepAddFloppy {
    fn name(&self) -> &'static str {
        "add-floppy"
    }

    async fn run(&self, ctx: &mut BuildContext) -> Result<()> {
        let intents = self.intents(ctx);
        if intents.is_empty() {
            debug!("no floppy media configured");
            return Ok(());
        }

        let vm = ctx.vm()?.clone();

        for intent in intents {
            match intent {
                AttachmentIntent::Uploaded(local) => {
                    let image = self.upload_generated(ctx, vm.as_ref(), &local).await?;
                    info!(image = %image, "adding generated floppy");
                    vm.add_floppy(&image).await?;
                }
                AttachmentIntent::Static(image) => {
                    info!(image = %image, "adding floppy image");
                    vm.add_floppy(&image).await?;
                }
            }
        }

        Ok(())
    }

    async fn cleanup(&self, ctx: &BuildContext, termination: Termination) -> Result<()> {
        if !termination.is_abnormal() {
            return Ok(());
        }
        let Some(uploaded) = ctx.uploaded_floppy_path.as_deref() else {
            return Ok(());
        };

        info!(path = %uploaded, ?termination, "deleting uploaded floppy image");
        let ds = ctx.driver.find_datastore(&self.datastore, self.host()).await?;
        ds.delete(uploaded).await?;
        info!(path = %uploaded, "uploaded floppy image deleted");

        Ok(())
    }
}
