//! Test double for the signing authority.
//!
//! Issues real ed25519-signed certificates so responses go through the
//! actual wire encoding, but makes no policy decisions of its own.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Context};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use simple_ssh_ca::ssh::authority::{
    AuthorizeContext, Method, SignOption, SshAuthority, SshKeys, SshOptions, Template,
};
use simple_ssh_ca::ssh::{router, WireKey};
use ssh_key::certificate::{Builder, CertType};
use ssh_key::rand_core::OsRng;
use ssh_key::{Algorithm, Certificate, PrivateKey, PublicKey};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const VALID_OTT: &str = "eyJhbGciOiJFUzI1NiIsImtpZCI6IjRVRUxKeDhlIn0.valid";

/// Sign option handed out by [`FakeAuthority::authorize`].
#[derive(Debug, PartialEq, Eq)]
pub struct ProvisionerOption(pub &'static str);

impl SignOption for ProvisionerOption {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn ed25519_key() -> PrivateKey {
    PrivateKey::random(&mut OsRng, Algorithm::Ed25519).expect("generate ed25519 key")
}

pub fn public_key_bytes(key: &PrivateKey) -> Vec<u8> {
    key.public_key().to_bytes().expect("encode public key")
}

pub struct FakeAuthority {
    pub ca: PrivateKey,
    /// Type of every certificate `sign_ssh` issues.
    pub issue_type: CertType,
    /// Principals of every certificate `sign_ssh` issues.
    pub issue_principals: Vec<String>,
    pub roots: SshKeys,
    pub federation: SshKeys,
    pub hosts: Vec<String>,
    pub fail_authorize: bool,
    pub fail_sign: bool,
    pub fail_add_user: bool,
    pub fail_lookups: bool,
    pub sign_calls: AtomicUsize,
    pub add_user_calls: AtomicUsize,
    pub last_method: Mutex<Option<Method>>,
    pub last_options: Mutex<Option<SshOptions>>,
    pub last_config_type: Mutex<Option<String>>,
}

impl Default for FakeAuthority {
    fn default() -> Self {
        Self {
            ca: ed25519_key(),
            issue_type: CertType::User,
            issue_principals: vec!["alice".to_string()],
            roots: SshKeys::default(),
            federation: SshKeys::default(),
            hosts: Vec::new(),
            fail_authorize: false,
            fail_sign: false,
            fail_add_user: false,
            fail_lookups: false,
            sign_calls: AtomicUsize::new(0),
            add_user_calls: AtomicUsize::new(0),
            last_method: Mutex::new(None),
            last_options: Mutex::new(None),
            last_config_type: Mutex::new(None),
        }
    }
}

impl FakeAuthority {
    fn issue(
        &self,
        key: &WireKey,
        cert_type: CertType,
        principals: &[String],
    ) -> anyhow::Result<Certificate> {
        let key_data = match key {
            WireKey::Plain(key) => key.key_data().clone(),
            WireKey::Certificate(cert) => cert.public_key().clone(),
        };
        let mut builder =
            Builder::new_with_random_nonce(&mut OsRng, key_data, 1_700_000_000, 1_700_086_400)?;
        builder.serial(1)?;
        builder.key_id("fake-authority")?;
        builder.cert_type(cert_type)?;
        if principals.is_empty() {
            builder.all_principals_valid()?;
        }
        for principal in principals {
            builder.valid_principal(principal)?;
        }
        Ok(builder.sign(&self.ca)?)
    }

    fn lookup<T: Clone>(&self, value: &T) -> anyhow::Result<T> {
        if self.fail_lookups {
            bail!("authority backend unavailable");
        }
        Ok(value.clone())
    }
}

impl SshAuthority for FakeAuthority {
    fn authorize(
        &self,
        ctx: &AuthorizeContext,
        ott: &str,
    ) -> anyhow::Result<Vec<Box<dyn SignOption>>> {
        *self.last_method.lock().unwrap() = Some(ctx.method());
        if self.fail_authorize || ott != VALID_OTT {
            return Err(anyhow!("token already used")).context("authorizing token");
        }
        Ok(vec![Box::new(ProvisionerOption("jwk/admin@example.com"))])
    }

    fn sign_ssh(
        &self,
        key: &WireKey,
        opts: &SshOptions,
        sign_opts: &[Box<dyn SignOption>],
    ) -> anyhow::Result<Certificate> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(opts.clone());

        let from_authorize = sign_opts
            .iter()
            .any(|opt| opt.as_any().downcast_ref::<ProvisionerOption>().is_some());
        if !from_authorize {
            bail!("sign options were not produced by authorize");
        }
        if self.fail_sign {
            bail!("requested principals are not allowed");
        }
        self.issue(key, self.issue_type, &self.issue_principals)
    }

    fn sign_ssh_add_user(&self, key: &WireKey, cert: &Certificate) -> anyhow::Result<Certificate> {
        self.add_user_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_add_user {
            bail!("add-user provisioning disabled");
        }
        self.issue(key, CertType::User, cert.valid_principals())
    }

    fn get_ssh_roots(&self) -> anyhow::Result<SshKeys> {
        self.lookup(&self.roots)
    }

    fn get_ssh_federation(&self) -> anyhow::Result<SshKeys> {
        self.lookup(&self.federation)
    }

    fn get_ssh_config(
        &self,
        cert_type: &str,
        data: &HashMap<String, String>,
    ) -> anyhow::Result<Vec<Template>> {
        *self.last_config_type.lock().unwrap() = Some(cert_type.to_string());
        if self.fail_lookups {
            bail!("template directory missing");
        }
        let user = data.get("user").map(String::as_str).unwrap_or("root");
        Ok(vec![Template {
            name: "config.tpl".to_string(),
            template_type: simple_ssh_ca::ssh::authority::TemplateType::Snippet,
            comment: "#".to_string(),
            path: "~/.ssh/config".to_string(),
            content: format!("Match exec \"step ssh check-host %h\"\n\tUser {user}\n").into_bytes(),
        }])
    }

    fn check_ssh_host(&self, principal: &str) -> anyhow::Result<bool> {
        let hosts = self.lookup(&self.hosts)?;
        Ok(hosts.iter().any(|h| h == principal))
    }

    fn get_ssh_hosts(&self) -> anyhow::Result<Vec<String>> {
        self.lookup(&self.hosts)
    }
}

pub fn user_keys(count: usize) -> Vec<PublicKey> {
    (0..count).map(|_| ed25519_key().public_key().clone()).collect()
}

/// Sends one request through the SSH router and returns status and JSON body.
pub async fn call(
    authority: Arc<FakeAuthority>,
    method: &str,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .expect("build request");

    let response = router(authority)
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON response body")
    };
    (status, json)
}
