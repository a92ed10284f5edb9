use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Datastore types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DatastoreSummary {
    /// Managed object id, e.g. `datastore-12`.
    pub datastore: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Query filter for listing datastores.
#[derive(Debug, Clone, Default)]
pub struct DatastoreFilter {
    pub names: Vec<String>,
    pub hosts: Vec<String>,
}

// ── VM types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct VmInfo {
    pub name: String,
    /// Keyed by device key; ordered so "first disk" is stable.
    #[serde(default)]
    pub disks: BTreeMap<String, Disk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Disk {
    pub backing: DiskBacking,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskBacking {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub vmdk_file: Option<String>,
}

// ── Floppy types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FloppyCreateSpec {
    pub backing: FloppyBacking,
    pub start_connected: bool,
    pub allow_guest_control: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloppyBacking {
    #[serde(rename = "type")]
    pub kind: FloppyBackingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FloppyBackingType {
    ImageFile,
}

impl FloppyCreateSpec {
    /// Floppy backed by an image file on a datastore, connected at power-on.
    pub fn image_file(image_file: impl Into<String>) -> Self {
        Self {
            backing: FloppyBacking {
                kind: FloppyBackingType::ImageFile,
                image_file: Some(image_file.into()),
            },
            start_connected: true,
            allow_guest_control: true,
        }
    }
}
