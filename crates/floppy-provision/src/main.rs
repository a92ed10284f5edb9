use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use floppy_step::vsphere::{VsphereConfig, VsphereDriver, VsphereVm};
use floppy_step::{BuildContext, Error, FloppyConfig, Pipeline, RunReport, StepAddFloppy};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let report = match provision().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "failed to start build");
            return ExitCode::FAILURE;
        }
    };

    for (step, e) in &report.cleanup_errors {
        tracing::error!(step, error = %e, "unwind incomplete");
    }

    if report.is_success() {
        tracing::info!("floppy media provisioned");
        ExitCode::SUCCESS
    } else {
        tracing::error!(
            termination = ?report.termination,
            error = report.error.as_ref().map(ToString::to_string),
            "build did not complete"
        );
        ExitCode::FAILURE
    }
}

async fn provision() -> floppy_step::Result<RunReport> {
    let vsphere = VsphereConfig::from_env()?;
    let floppy = FloppyConfig::from_env()?;
    let vm_id = std::env::var("VSPHERE_VM").map_err(|_| Error::MissingEnv("VSPHERE_VM".into()))?;

    let client = vsphere.connect().await?;

    let mut ctx = BuildContext::new(Arc::new(VsphereDriver::new(client.clone())))
        .with_vm(Arc::new(VsphereVm::new(client, vm_id)));

    // Generated image handed over by the image generator
    match std::env::var("FLOPPY_PATH") {
        Ok(path) if !path.is_empty() => ctx = ctx.with_floppy_path(path),
        _ if floppy.wants_generated_image() => {
            tracing::warn!("floppy_files/floppy_dirs set but FLOPPY_PATH is empty, nothing to upload");
        }
        _ => {}
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling after the current step");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let pipeline = Pipeline::new().step(StepAddFloppy::from_env(floppy));
    Ok(pipeline.run(&mut ctx, &cancel).await)
}
