//! Identity verification — the gatekeeper stage.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::store::IdentityStore;
use crate::workflow::router::StageId;
use crate::workflow::stages::Stage;
use crate::workflow::state::{StageFailure, StatePatch, WorkflowState};

/// Checks the sender address against the vendor master.
///
/// A lookup error is treated exactly like an unknown sender: the request
/// continues down the rejection branch, never aborts.
pub struct VerifyIdentity {
    identity: Arc<dyn IdentityStore>,
}

impl VerifyIdentity {
    pub fn new(identity: Arc<dyn IdentityStore>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl Stage for VerifyIdentity {
    fn id(&self) -> StageId {
        StageId::VerifyIdentity
    }

    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &RequestContext,
    ) -> Result<StatePatch, StageFailure> {
        let sender = state.input.sender.trim().to_lowercase();

        match self.identity.find_by_email(&sender).await {
            Ok(Some(vendor)) => {
                info!(
                    request_id = %ctx.request_id,
                    vendor_code = %vendor.vendor_code,
                    "Identity verified"
                );
                Ok(StatePatch {
                    authorized: Some(true),
                    identity: Some(vendor),
                    ..Default::default()
                }
                .with_audit("identity_verified"))
            }
            Ok(None) => {
                warn!(request_id = %ctx.request_id, sender = %sender, "Unknown sender");
                Ok(StatePatch {
                    authorized: Some(false),
                    ..Default::default()
                }
                .with_audit("identity_rejected"))
            }
            Err(e) => {
                // Store trouble must not open the door: treat as unauthorized.
                warn!(
                    request_id = %ctx.request_id,
                    error = %e,
                    "Identity lookup failed, treating sender as unauthorized"
                );
                Ok(StatePatch {
                    authorized: Some(false),
                    ..Default::default()
                }
                .with_audit("identity_rejected"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmailInput, Vendor};
    use crate::error::StoreError;

    struct FakeIdentity {
        result: Result<Option<Vendor>, ()>,
    }

    #[async_trait]
    impl IdentityStore for FakeIdentity {
        async fn find_by_email(&self, email: &str) -> Result<Option<Vendor>, StoreError> {
            match &self.result {
                Ok(v) => {
                    // Stage must lowercase and trim before the lookup.
                    assert_eq!(email, email.trim().to_lowercase());
                    Ok(v.clone())
                }
                Err(()) => Err(StoreError::Query("boom".into())),
            }
        }
    }

    fn vendor() -> Vendor {
        Vendor {
            id: 1,
            vendor_code: "V1".into(),
            name: "Acme".into(),
            contact_name: None,
            email: "a@acme.com".into(),
            phone: None,
            address: None,
            category: "Supplier".into(),
        }
    }

    fn state(sender: &str) -> WorkflowState {
        WorkflowState::new(EmailInput {
            id: "m1".into(),
            thread_id: "t1".into(),
            sender: sender.into(),
            subject: "s".into(),
            body: "b".into(),
        })
    }

    #[tokio::test]
    async fn known_sender_is_authorized() {
        let stage = VerifyIdentity::new(Arc::new(FakeIdentity {
            result: Ok(Some(vendor())),
        }));
        let patch = stage
            .run(&state("  A@Acme.com "), &RequestContext::new("m1", "t1"))
            .await
            .unwrap();
        assert_eq!(patch.authorized, Some(true));
        assert!(patch.identity.is_some());
        assert_eq!(patch.audit, vec!["identity_verified".to_string()]);
    }

    #[tokio::test]
    async fn unknown_sender_is_rejected() {
        let stage = VerifyIdentity::new(Arc::new(FakeIdentity { result: Ok(None) }));
        let patch = stage
            .run(&state("x@y.com"), &RequestContext::new("m1", "t1"))
            .await
            .unwrap();
        assert_eq!(patch.authorized, Some(false));
        assert!(patch.identity.is_none());
    }

    #[tokio::test]
    async fn store_error_is_never_fatal() {
        let stage = VerifyIdentity::new(Arc::new(FakeIdentity { result: Err(()) }));
        let patch = stage
            .run(&state("x@y.com"), &RequestContext::new("m1", "t1"))
            .await
            .unwrap();
        assert_eq!(patch.authorized, Some(false));
    }
}
