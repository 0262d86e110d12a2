// Library modules for simple-ssh-ca

pub mod config;
pub mod duration;
pub mod jwks;
pub mod tls;

// SSH certificate API
pub mod ssh;
