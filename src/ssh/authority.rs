//! The signing authority behind the SSH endpoints.
//!
//! Key material, token verification and the actual signing live behind
//! [`SshAuthority`]; the handlers only sequence calls into it.

use serde::{Deserialize, Serialize};
use ssh_key::{Certificate, PublicKey};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use super::wire::{base64_bytes, WireKey};
use crate::duration::TimeDuration;

pub const SSH_USER_CERT: &str = "user";
pub const SSH_HOST_CERT: &str = "host";

/// Operation a token is being authorized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    SignSsh,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::SignSsh => "sign-ssh",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeContext {
    method: Method,
}

impl AuthorizeContext {
    pub fn new(method: Method) -> Self {
        Self { method }
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

/// Constraint produced by [`SshAuthority::authorize`] and handed back
/// unchanged to [`SshAuthority::sign_ssh`]. Only the authority interprets it.
pub trait SignOption: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// What the client asked for; the authority decides what it gets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshOptions {
    pub cert_type: String,
    pub principals: Vec<String>,
    pub valid_after: TimeDuration,
    pub valid_before: TimeDuration,
}

/// CA public keys, split by the certificate type they sign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshKeys {
    pub user_keys: Vec<PublicKey>,
    pub host_keys: Vec<PublicKey>,
}

impl SshKeys {
    pub fn is_empty(&self) -> bool {
        self.user_keys.is_empty() && self.host_keys.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Snippet,
    File,
    Directory,
}

/// A rendered ssh client or server configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub comment: String,
    pub path: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

/// SSH certificate authority as seen by the HTTP layer.
///
/// Implementations own their locking; the handlers share one instance
/// across concurrent requests.
pub trait SshAuthority: Send + Sync {
    /// Verifies a one-time token and returns the constraints it grants.
    fn authorize(
        &self,
        ctx: &AuthorizeContext,
        ott: &str,
    ) -> anyhow::Result<Vec<Box<dyn SignOption>>>;

    fn sign_ssh(
        &self,
        key: &WireKey,
        opts: &SshOptions,
        sign_opts: &[Box<dyn SignOption>],
    ) -> anyhow::Result<Certificate>;

    /// Issues a certificate for `key` that lets it act as the single
    /// principal of `cert`.
    fn sign_ssh_add_user(&self, key: &WireKey, cert: &Certificate) -> anyhow::Result<Certificate>;

    fn get_ssh_roots(&self) -> anyhow::Result<SshKeys>;

    fn get_ssh_federation(&self) -> anyhow::Result<SshKeys>;

    fn get_ssh_config(
        &self,
        cert_type: &str,
        data: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<Template>>;

    fn check_ssh_host(&self, principal: &str) -> anyhow::Result<bool>;

    fn get_ssh_hosts(&self) -> anyhow::Result<Vec<String>>;
}
