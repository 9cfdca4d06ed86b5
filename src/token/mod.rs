//! Credential issuance and revocation.
//!
//! [`signer`] proves a credential's content is authentic, [`store`] tracks
//! which credentials are still live, and [`authority`] keeps the two in step.

pub(crate) mod authority;
pub(crate) mod backend;
pub(crate) mod signer;
pub(crate) mod store;
