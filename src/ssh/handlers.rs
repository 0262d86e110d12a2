use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use ssh_key::certificate::CertType;
use ssh_key::Certificate;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::authority::{
    AuthorizeContext, Method, SshAuthority, SshKeys, SshOptions, SSH_HOST_CERT, SSH_USER_CERT,
};
use super::error::SshApiError;
use super::requests::{
    CheckPrincipalRequest, CheckPrincipalResponse, ConfigRequest, ConfigResponse,
    GetHostsResponse, RootsResponse, SignRequest, SignResponse,
};
use super::wire::{parse_public_key, SshCertificate, SshPublicKey};

/// Shared state of the SSH endpoints. Holds nothing but the authority, so
/// requests never contend on anything owned here.
pub struct SshState {
    pub authority: Arc<dyn SshAuthority>,
}

/// Routes of the SSH API, ready to be merged into the CA router.
pub fn router(authority: Arc<dyn SshAuthority>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ssh/sign", post(handle_sign))
        .route("/ssh/roots", get(handle_roots))
        .route("/ssh/federation", get(handle_federation))
        .route("/ssh/config", post(handle_config))
        .route("/ssh/check-host", post(handle_check_host))
        .route("/ssh/hosts", get(handle_hosts))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(SshState::new(authority)))
}

impl SshState {
    pub fn new(authority: Arc<dyn SshAuthority>) -> Self {
        Self { authority }
    }

    /// Authorizes the token, signs the key and, when the policy allows it,
    /// issues the add-user certificate.
    pub fn sign(&self, body: SignRequest) -> Result<SignResponse, SshApiError> {
        tracing::debug!(ott = %body.ott, "SSH sign request");
        body.validate()?;

        let public_key =
            parse_public_key(&body.public_key).map_err(|source| SshApiError::KeyParse {
                field: "publicKey",
                source,
            })?;

        let add_user_key = body
            .add_user_public_key
            .as_deref()
            .map(parse_public_key)
            .transpose()
            .map_err(|source| SshApiError::KeyParse {
                field: "addUserPublicKey",
                source,
            })?;

        let ctx = AuthorizeContext::new(Method::SignSsh);
        let sign_opts = self
            .authority
            .authorize(&ctx, &body.ott)
            .map_err(SshApiError::Unauthorized)?;

        let opts = SshOptions {
            cert_type: body.cert_type,
            principals: body.principals,
            valid_after: body.valid_after,
            valid_before: body.valid_before,
        };
        let cert = self
            .authority
            .sign_ssh(&public_key, &opts, &sign_opts)
            .map_err(SshApiError::Forbidden)?;

        let add_user_certificate = match add_user_key {
            Some(key) if allows_add_user(&cert) => {
                let add_user_cert = self
                    .authority
                    .sign_ssh_add_user(&key, &cert)
                    .map_err(SshApiError::Forbidden)?;
                Some(SshCertificate::from(add_user_cert))
            }
            _ => None,
        };

        tracing::info!(
            "SSH certificate issued: serial={}, key_id={}, principals={:?}, add_user={}",
            cert.serial(),
            cert.key_id(),
            cert.valid_principals(),
            add_user_certificate.is_some()
        );

        Ok(SignResponse {
            certificate: SshCertificate::from(cert),
            add_user_certificate,
        })
    }

    pub fn roots(&self) -> Result<RootsResponse, SshApiError> {
        let keys = self
            .authority
            .get_ssh_roots()
            .map_err(SshApiError::Internal)?;
        keys_response(keys)
    }

    pub fn federation(&self) -> Result<RootsResponse, SshApiError> {
        let keys = self
            .authority
            .get_ssh_federation()
            .map_err(SshApiError::Internal)?;
        keys_response(keys)
    }

    pub fn config(&self, mut body: ConfigRequest) -> Result<ConfigResponse, SshApiError> {
        body.validate()?;

        let templates = self
            .authority
            .get_ssh_config(&body.cert_type, &body.data)
            .map_err(SshApiError::Internal)?;

        let mut response = ConfigResponse::default();
        match body.cert_type.as_str() {
            SSH_USER_CERT => response.user_templates = templates,
            SSH_HOST_CERT => response.host_templates = templates,
            other => {
                return Err(SshApiError::Internal(anyhow::anyhow!(
                    "unexpected ssh config type {other}"
                )))
            }
        }
        Ok(response)
    }

    pub fn check_host(
        &self,
        body: CheckPrincipalRequest,
    ) -> Result<CheckPrincipalResponse, SshApiError> {
        body.validate()?;
        let exists = self
            .authority
            .check_ssh_host(&body.principal)
            .map_err(SshApiError::Internal)?;
        Ok(CheckPrincipalResponse { exists })
    }

    pub fn hosts(&self) -> Result<GetHostsResponse, SshApiError> {
        let hosts = self
            .authority
            .get_ssh_hosts()
            .map_err(SshApiError::Internal)?;
        Ok(GetHostsResponse { hosts })
    }
}

/// Add-user certificates are only derived from user certificates with
/// exactly one principal.
fn allows_add_user(cert: &Certificate) -> bool {
    cert.cert_type() == CertType::User && cert.valid_principals().len() == 1
}

fn keys_response(keys: SshKeys) -> Result<RootsResponse, SshApiError> {
    if keys.is_empty() {
        return Err(SshApiError::NotFound);
    }
    Ok(RootsResponse {
        user_keys: keys.user_keys.into_iter().map(SshPublicKey::from).collect(),
        host_keys: keys.host_keys.into_iter().map(SshPublicKey::from).collect(),
    })
}

fn read_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, SshApiError> {
    serde_json::from_slice(body).map_err(SshApiError::Body)
}

pub async fn handle_sign(
    State(state): State<Arc<SshState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<SignResponse>), SshApiError> {
    let body = read_json(&body)?;
    Ok((StatusCode::CREATED, Json(state.sign(body)?)))
}

pub async fn handle_roots(
    State(state): State<Arc<SshState>>,
) -> Result<Json<RootsResponse>, SshApiError> {
    state.roots().map(Json)
}

pub async fn handle_federation(
    State(state): State<Arc<SshState>>,
) -> Result<Json<RootsResponse>, SshApiError> {
    state.federation().map(Json)
}

pub async fn handle_config(
    State(state): State<Arc<SshState>>,
    body: Bytes,
) -> Result<Json<ConfigResponse>, SshApiError> {
    let body = read_json(&body)?;
    state.config(body).map(Json)
}

pub async fn handle_check_host(
    State(state): State<Arc<SshState>>,
    body: Bytes,
) -> Result<Json<CheckPrincipalResponse>, SshApiError> {
    let body = read_json(&body)?;
    state.check_host(body).map(Json)
}

pub async fn handle_hosts(
    State(state): State<Arc<SshState>>,
) -> Result<Json<GetHostsResponse>, SshApiError> {
    state.hosts().map(Json)
}

async fn health_check() -> &'static str {
    "OK"
}
