//! Cloud provider client and credential handling.
//!
//! The [`NodeProvider`] trait is the seam between lifecycle logic and the actual cloud API, so
//! provisioning and teardown can be exercised against a fake in tests. The one real
//! implementation is [`LinodeProvider`], a thin client for the Linode v4 REST API.

use std::{env, fs, net::IpAddr, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base URL of the Linode v4 API.
const API_BASE: &str = "https://api.linode.com/v4";

/// Instance type to create: the smallest, cheapest tier.
pub const NODE_TYPE: &str = "g6-nanode-1";
/// Region to create instances in.
pub const NODE_REGION: &str = "us-east";
/// Image to deploy onto created instances.
pub const NODE_IMAGE: &str = "linode/fedora43";

/// Provider credentials pulled from the environment.
#[derive(Clone, Debug)]
pub struct Credentials {
    /// API token used as a bearer token on every request.
    pub token: String,
    /// Root password set on created instances.
    pub root_pass: String,
}

impl Credentials {
    /// Reads `LINODE_TOKEN` and `LINODE_ROOT_PASS` from the environment.
    ///
    /// # Errors
    ///
    /// Fails if either variable is unset; absence of credentials is a fatal startup error for
    /// every command that talks to the provider.
    pub fn from_env() -> anyhow::Result<Self> {
        let token = env::var("LINODE_TOKEN")
            .context("LINODE_TOKEN must be set (Linode API token)")?;
        let root_pass = env::var("LINODE_ROOT_PASS")
            .context("LINODE_ROOT_PASS must be set (root password for created instances)")?;
        Ok(Self { token, root_pass })
    }
}

/// Errors surfaced by a [`NodeProvider`].
///
/// The variants match the error taxonomy of the harness: `Auth` is fatal and aborts before any
/// mutation, the rest are contained to the node they occurred on.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected our credentials. Fatal.
    #[error("authentication rejected by provider: {0}")]
    Auth(String),
    /// The provider rate-limited or quota-limited the request. Per-resource, transient.
    #[error("provider rate limit hit: {0}")]
    RateLimited(String),
    /// The request could not be completed at the transport level.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The provider answered with an unexpected status or body.
    #[error("unexpected provider response: {0}")]
    Api(String),
}

/// Lifecycle status reported by the provider for an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Being allocated.
    Provisioning,
    /// Booting up.
    Booting,
    /// Up and serving; the only status that counts as ready.
    Running,
    /// Powered off.
    Offline,
    /// Shutting down.
    ShuttingDown,
    /// Rebooting.
    Rebooting,
    /// Being deleted.
    Deleting,
    /// Any lifecycle status this client does not model.
    #[serde(other)]
    Other,
}

/// A cloud instance as reported by the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    /// Provider-assigned instance id.
    pub id: u64,
    /// Label the instance was created with.
    pub label: String,
    /// Current lifecycle status.
    pub status: InstanceStatus,
    /// Assigned public IPv4 addresses, possibly empty early in the lifecycle.
    #[serde(default)]
    pub ipv4: Vec<IpAddr>,
}

/// Operations the lifecycle logic needs from a cloud provider.
///
/// Implemented by [`LinodeProvider`] for real runs and by fakes in tests.
#[allow(async_fn_in_trait)]
pub trait NodeProvider {
    /// Makes a cheap authenticated call to prove the credentials work.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] when the token is rejected; callers abort before mutating
    /// anything.
    async fn verify_credentials(&self) -> Result<(), ProviderError>;

    /// Requests creation of a new instance with the given label.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; rate limits and quota errors are expected to be handled per-node
    /// by the caller.
    async fn create_instance(&self, label: &str) -> Result<Instance, ProviderError>;

    /// Fetches the current state of an instance.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`].
    async fn get_instance(&self, id: u64) -> Result<Instance, ProviderError>;

    /// Requests deletion of an instance.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; deletion failures are best-effort for the caller.
    async fn delete_instance(&self, id: u64) -> Result<(), ProviderError>;
}

/// Client for the Linode v4 API.
///
/// Created instances are Nanodes ([`NODE_TYPE`]) in [`NODE_REGION`] running [`NODE_IMAGE`], with
/// the operator's `~/.ssh/id_rsa.pub` installed as an authorized key when one is readable.
pub struct LinodeProvider {
    http: reqwest::Client,
    token: String,
    root_pass: String,
    authorized_key: Option<String>,
    api_base: String,
}

impl LinodeProvider {
    /// Builds a client from credentials, picking up the operator's SSH public key if present.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: credentials.token.clone(),
            root_pass: credentials.root_pass.clone(),
            authorized_key: ssh_public_key(),
            api_base: API_BASE.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }
}

impl NodeProvider for LinodeProvider {
    async fn verify_credentials(&self) -> Result<(), ProviderError> {
        log::debug!("verifying provider credentials...");
        let response = self
            .http
            .get(self.url("/profile"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(response).await?;
        log::debug!("provider accepted credentials");
        Ok(())
    }

    async fn create_instance(&self, label: &str) -> Result<Instance, ProviderError> {
        let mut body = serde_json::json!({
            "label": label,
            "type": NODE_TYPE,
            "region": NODE_REGION,
            "image": NODE_IMAGE,
            "root_pass": self.root_pass,
        });
        if let Some(key) = &self.authorized_key {
            body["authorized_keys"] = serde_json::json!([key]);
        }

        let response = self
            .http
            .post(self.url("/linode/instances"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let instance = check(response).await?.json::<Instance>().await?;
        log::debug!("[{label}] creation accepted with instance id {}", instance.id);
        Ok(instance)
    }

    async fn get_instance(&self, id: u64) -> Result<Instance, ProviderError> {
        let response = self
            .http
            .get(self.url(&format!("/linode/instances/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json::<Instance>().await?)
    }

    async fn delete_instance(&self, id: u64) -> Result<(), ProviderError> {
        let response = self
            .http
            .delete(self.url(&format!("/linode/instances/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Maps a response to the error taxonomy: 401/403 are auth, 429 is a rate limit, any other
/// non-success status is an API error carrying the body text.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => ProviderError::Auth(body),
        429 => ProviderError::RateLimited(body),
        _ => ProviderError::Api(format!("{status}: {body}")),
    })
}

fn ssh_public_key() -> Option<String> {
    let home = env::var_os("HOME")?;
    let path = Path::new(&home).join(".ssh").join("id_rsa.pub");
    match fs::read_to_string(&path) {
        Ok(key) => Some(key.trim().to_string()),
        Err(err) => {
            log::warn!(
                "could not read {}: {err}, creating instances without an authorized key",
                path.display()
            );
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scriptable in-memory provider for lifecycle tests.

    use std::sync::Mutex;

    use super::{Instance, InstanceStatus, NodeProvider, ProviderError};

    pub struct MockProvider {
        pub auth_ok: bool,
        pub fail_create: Vec<String>,
        pub fail_delete: Vec<u64>,
        /// Every `get_instance` call fails with an auth error, as if the token was revoked
        /// after credential verification.
        pub fail_get_auth: bool,
        /// Every `delete_instance` call fails with an auth error.
        pub fail_delete_auth: bool,
        pub created: Mutex<Vec<String>>,
        pub deleted: Mutex<Vec<u64>>,
        next_id: Mutex<u64>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                auth_ok: true,
                fail_create: Vec::new(),
                fail_delete: Vec::new(),
                fail_get_auth: false,
                fail_delete_auth: false,
                created: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
            }
        }
    }

    impl NodeProvider for MockProvider {
        async fn verify_credentials(&self) -> Result<(), ProviderError> {
            if self.auth_ok {
                Ok(())
            } else {
                Err(ProviderError::Auth("bad token".to_string()))
            }
        }

        async fn create_instance(&self, label: &str) -> Result<Instance, ProviderError> {
            if self.fail_create.iter().any(|l| l == label) {
                return Err(ProviderError::RateLimited("quota exceeded".to_string()));
            }
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            self.created.lock().unwrap().push(label.to_string());
            Ok(Instance {
                id,
                label: label.to_string(),
                status: InstanceStatus::Provisioning,
                ipv4: Vec::new(),
            })
        }

        async fn get_instance(&self, id: u64) -> Result<Instance, ProviderError> {
            if self.fail_get_auth {
                return Err(ProviderError::Auth("token revoked".to_string()));
            }
            Ok(Instance {
                id,
                label: format!("instance-{id}"),
                status: InstanceStatus::Running,
                ipv4: vec![format!("10.0.0.{id}").parse().unwrap()],
            })
        }

        async fn delete_instance(&self, id: u64) -> Result<(), ProviderError> {
            if self.fail_delete_auth {
                return Err(ProviderError::Auth("token revoked".to_string()));
            }
            if self.fail_delete.contains(&id) {
                return Err(ProviderError::Api("500 Internal Server Error".to_string()));
            }
            self.deleted.lock().unwrap().push(id);
            Ok(())
        }
    }
}
