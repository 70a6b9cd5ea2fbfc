//! Access policy lowering.
//!
//! An [`AccessPolicy`] is declarative: a protection tier plus a set of
//! presence proofs. The backend turns it into an opaque [`PolicyHandle`]
//! that is attached to a single write as the `accc` attribute.

use keysmith_core::AccessPolicy;
use tracing::debug;

use crate::attributes::PolicyHandle;
use crate::backend::Backend;
use crate::error::{Result, StoreError};
use crate::status;

/// Ask `backend` for an access-control object enforcing `policy`.
pub fn build_policy<B: Backend + ?Sized>(
    backend: &B,
    policy: &AccessPolicy,
) -> Result<PolicyHandle> {
    backend.create_access_control(policy).map_err(|code| {
        debug!(protection = %policy.protection, code = code.code(), "policy rejected");
        StoreError::PolicyConstruction {
            status: code,
            message: status::describe(backend, code),
        }
    })
}
