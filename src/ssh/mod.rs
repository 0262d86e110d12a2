pub mod authority;
pub mod error;
pub mod handlers;
pub mod requests;
pub mod wire;

pub use authority::SshAuthority;
pub use error::SshApiError;
pub use handlers::{router, SshState};
pub use wire::{SshCertificate, SshPublicKey, WireKey};
