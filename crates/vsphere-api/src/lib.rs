//! Typed Rust client for the vCenter REST API.
//!
//! Covers the subset needed for attaching floppy media to a build VM:
//! sessions, datastore lookup, VM info, floppy devices, and datastore
//! file access over the `/folder` endpoint (exists, upload, delete).

mod types;

pub use types::*;

const SESSION_HEADER: &str = "vmware-api-session-id";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vsphere api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("vsphere api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid vsphere url: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// HTTP status returned by the server, if the request got that far.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status(),
            Self::InvalidUrl(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the vCenter REST API, bound to one authenticated session.
#[derive(Clone)]
pub struct VsphereClient {
    base_url: String,
    session: String,
    datacenter: String,
    http: reqwest::Client,
}

impl VsphereClient {
    /// Open a session with basic credentials.
    ///
    /// `insecure` disables certificate verification for lab vCenters with
    /// self-signed certificates.
    pub async fn login(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
        datacenter: impl Into<String>,
        insecure: bool,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;

        let resp = http
            .post(format!("{base_url}/api/session"))
            .basic_auth(username, Some(password))
            .send()
            .await?;

        let session: String = Self::check(resp, "create session")
            .await?
            .json()
            .await?;

        Ok(Self {
            base_url,
            session,
            datacenter: datacenter.into(),
            http,
        })
    }

    /// Build a client around an existing session token.
    pub fn with_session(
        base_url: impl Into<String>,
        session: impl Into<String>,
        datacenter: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: session.into(),
            datacenter: datacenter.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `/folder/<path>` with each segment percent-encoded, so names holding
    /// `#`, `?` or spaces stay in the path.
    fn folder_url(&self, path: &str) -> Result<reqwest::Url> {
        let mut url =
            reqwest::Url::parse(&self.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("folder")
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn folder_query<'a>(&'a self, datastore: &'a str) -> [(&'static str, &'a str); 2] {
        [("dcPath", self.datacenter.as_str()), ("dsName", datastore)]
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    // ── Datastores ───────────────────────────────────────────────────

    pub async fn list_datastores(&self, filter: &DatastoreFilter) -> Result<Vec<DatastoreSummary>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        for name in &filter.names {
            query.push(("names", name.as_str()));
        }
        for host in &filter.hosts {
            query.push(("hosts", host.as_str()));
        }

        let resp = self
            .http
            .get(self.url("/api/vcenter/datastore"))
            .header(SESSION_HEADER, &self.session)
            .query(&query)
            .send()
            .await?;

        Self::check(resp, "list datastores")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── VMs ──────────────────────────────────────────────────────────

    pub async fn get_vm(&self, vm: &str) -> Result<VmInfo> {
        let resp = self
            .http
            .get(self.url(&format!("/api/vcenter/vm/{vm}")))
            .header(SESSION_HEADER, &self.session)
            .send()
            .await?;

        Self::check(resp, "get vm")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    /// Add a floppy drive to a VM. Returns the new device key.
    pub async fn create_floppy(&self, vm: &str, spec: &FloppyCreateSpec) -> Result<String> {
        let resp = self
            .http
            .post(self.url(&format!("/api/vcenter/vm/{vm}/hardware/floppy")))
            .header(SESSION_HEADER, &self.session)
            .json(spec)
            .send()
            .await?;

        Self::check(resp, "create floppy")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Datastore files ──────────────────────────────────────────────

    /// `path` is relative to the datastore root (no `[ds]` prefix).
    pub async fn datastore_file_exists(&self, datastore: &str, path: &str) -> Result<bool> {
        let resp = self
            .http
            .head(self.folder_url(path)?)
            .header(SESSION_HEADER, &self.session)
            .query(&self.folder_query(datastore))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(resp, "stat datastore file").await?;
        Ok(true)
    }

    pub async fn upload_datastore_file(
        &self,
        datastore: &str,
        path: &str,
        contents: Vec<u8>,
    ) -> Result<()> {
        let resp = self
            .http
            .put(self.folder_url(path)?)
            .header(SESSION_HEADER, &self.session)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .query(&self.folder_query(datastore))
            .body(contents)
            .send()
            .await?;

        Self::check(resp, "upload datastore file").await?;
        Ok(())
    }

    /// Deleting a missing file is an error; callers own idempotency.
    pub async fn delete_datastore_file(&self, datastore: &str, path: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.folder_url(path)?)
            .header(SESSION_HEADER, &self.session)
            .query(&self.folder_query(datastore))
            .send()
            .await?;

        Self::check(resp, "delete datastore file").await?;
        Ok(())
    }
}
