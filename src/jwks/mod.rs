use serde::{Deserialize, Serialize};

/// JSON Web Key (JWK) a provisioner signs its one-time tokens with.
///
/// The CA only stores and persists the key; which members are meaningful
/// depends on `kty` (`EC`/`OKP` use `crv`, `x`, `y`; `RSA` uses `n`, `e`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type ("EC", "RSA", "OKP")
    pub kty: String,

    /// Public key use ("sig" for provisioner keys)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Curve name for EC and OKP keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Public coordinate / public key - base64url encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// RSA modulus (n) - base64url encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (e) - base64url encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}
