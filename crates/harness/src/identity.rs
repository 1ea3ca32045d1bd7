//! Principal purge and identity provisioning.
//!
//! Runs once per suite, before any resync: every existing principal is
//! deleted, then a fresh one is registered and its bearer token becomes the
//! suite's [`Credential`]. Registration is not retried; a leftover principal
//! with the same email makes it fail, which is why the purge must complete
//! first.

use tracing::{debug, info};

use crate::client::ApiClient;
use crate::error::SetupError;
use crate::model::{Credential, PrincipalDescriptor, RegisterResponse};

/// Deletes every principal, one request at a time.
///
/// Returns the number of principals removed.
pub async fn purge_principals(client: &ApiClient) -> Result<usize, SetupError> {
    let principals = client
        .list_users()
        .await
        .map_err(SetupError::ListPrincipals)?;
    let total = principals.len();

    for (removed, principal) in principals.iter().enumerate() {
        client
            .delete_user(principal.id)
            .await
            .map_err(|source| SetupError::DeletePrincipal {
                id: principal.id,
                removed,
                total,
                source,
            })?;
        debug!(id = principal.id, "Deleted principal");
    }

    info!(removed = total, "Principal namespace purged");
    Ok(total)
}

/// Registers a principal and returns its bearer credential.
pub async fn register(
    client: &ApiClient,
    descriptor: &PrincipalDescriptor,
) -> Result<Credential, SetupError> {
    let email = descriptor.email.clone();

    let response = client
        .register(descriptor)
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|source| SetupError::Register {
            email: email.clone(),
            source,
        })?;

    let body: RegisterResponse = response.json().map_err(|source| SetupError::Register {
        email: email.clone(),
        source,
    })?;

    match body.access_token {
        Some(token) if !token.is_empty() => {
            info!(email = %email, "Registered principal");
            Ok(Credential::new(token))
        }
        _ => Err(SetupError::MissingToken { email }),
    }
}

/// Purges the principal namespace, then registers `descriptor`.
pub async fn provision(
    client: &ApiClient,
    descriptor: &PrincipalDescriptor,
) -> Result<Credential, SetupError> {
    purge_principals(client).await?;
    register(client, descriptor).await
}
