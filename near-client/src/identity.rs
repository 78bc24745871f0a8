//! Local identity and role assignment.

use crate::radio::Radio;
use async_trait::async_trait;
use nearlink_core::{resolve_role, KnownIds};
use nearlink_types::{Identity, Role, StableId};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Default location of the per-installation machine id.
pub const DEFAULT_MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Length of a derived stable id, in hex characters.
pub const STABLE_ID_LEN: usize = 16;

/// Identity errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The platform would not reveal the local identity.
    #[error("identity unavailable: {0}")]
    Unavailable(String),
}

/// Where the local identity comes from.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Resolve the local identity.
    async fn current_identity(&self) -> Result<Identity, IdentityError>;
}

/// A fixed, configured identity.
#[derive(Debug, Clone)]
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    /// Use `local_name` and `stable_id` as the identity.
    pub fn new(local_name: impl Into<String>, stable_id: StableId) -> Self {
        Self(Identity {
            local_name: local_name.into(),
            stable_id,
        })
    }
}

#[async_trait]
impl IdentitySource for StaticIdentity {
    async fn current_identity(&self) -> Result<Identity, IdentityError> {
        Ok(self.0.clone())
    }
}

/// Identity derived from the host: the radio's local name plus a stable id
/// hashed from the machine id file.
pub struct MachineIdentity<R: Radio> {
    radio: Arc<R>,
    machine_id_path: PathBuf,
}

impl<R: Radio> MachineIdentity<R> {
    /// Derive from `radio` and the machine id at `machine_id_path`.
    pub fn new(radio: Arc<R>, machine_id_path: impl Into<PathBuf>) -> Self {
        Self {
            radio,
            machine_id_path: machine_id_path.into(),
        }
    }
}

#[async_trait]
impl<R: Radio> IdentitySource for MachineIdentity<R> {
    async fn current_identity(&self) -> Result<Identity, IdentityError> {
        let seed = tokio::fs::read_to_string(&self.machine_id_path)
            .await
            .map_err(|e| {
                IdentityError::Unavailable(format!("{}: {}", self.machine_id_path.display(), e))
            })?;
        let seed = seed.trim();
        if seed.is_empty() {
            return Err(IdentityError::Unavailable(format!(
                "{} is empty",
                self.machine_id_path.display()
            )));
        }
        let local_name = self
            .radio
            .local_name()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        Ok(Identity {
            local_name,
            stable_id: derive_stable_id(seed),
        })
    }
}

/// First [`STABLE_ID_LEN`] hex chars of SHA-256 over `seed`.
pub fn derive_stable_id(seed: &str) -> StableId {
    let digest = Sha256::digest(seed.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(STABLE_ID_LEN);
    StableId::new(id)
}

/// Result of [`assign_role`].
#[derive(Debug)]
pub struct RoleAssignment {
    /// Resolved role (`Neutral` when the identity was unavailable).
    pub role: Role,
    /// The identity, when it could be resolved.
    pub identity: Option<Identity>,
    /// Why the identity could not be resolved.
    pub error: Option<IdentityError>,
}

/// Resolve the local identity and its role.
///
/// Never fails: an unavailable identity yields `Neutral` with the error
/// attached.
pub async fn assign_role<S>(source: &S, known: &KnownIds) -> RoleAssignment
where
    S: IdentitySource + ?Sized,
{
    match source.current_identity().await {
        Ok(identity) => {
            let role = resolve_role(&identity, known);
            info!("Identity {} resolved as {}", identity.stable_id, role);
            RoleAssignment {
                role,
                identity: Some(identity),
                error: None,
            }
        }
        Err(e) => {
            warn!("Identity unavailable, proceeding as neutral: {}", e);
            RoleAssignment {
                role: Role::Neutral,
                identity: None,
                error: Some(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{MockAir, MockRadio};
    use nearlink_core::BROADCASTER_ID;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn radio() -> Arc<MockRadio> {
        Arc::new(MockRadio::new(MockAir::new(), "AA:AA:AA:AA:AA:01"))
    }

    #[test]
    fn stable_id_is_sixteen_lowercase_hex() {
        let id = derive_stable_id("4c4c4544004b3510804ab4c04f503732");
        assert_eq!(id.as_str().len(), 16);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(id, derive_stable_id("4c4c4544004b3510804ab4c04f503732"));
        assert_ne!(id, derive_stable_id("other"));
    }

    #[tokio::test]
    async fn machine_identity_reads_file_and_radio_name() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "abc123").unwrap();
        let radio = radio();
        radio.set_local_name("Pixel").await.unwrap();

        let identity = MachineIdentity::new(radio, file.path())
            .current_identity()
            .await
            .unwrap();

        assert_eq!(identity.local_name, "Pixel");
        // Trailing newline is not part of the seed.
        assert_eq!(identity.stable_id, derive_stable_id("abc123"));
    }

    #[tokio::test]
    async fn missing_machine_id_is_unavailable() {
        let result = MachineIdentity::new(radio(), "/nonexistent/machine-id")
            .current_identity()
            .await;
        assert!(matches!(result, Err(IdentityError::Unavailable(_))));
    }

    #[tokio::test]
    async fn empty_machine_id_is_unavailable() {
        let file = NamedTempFile::new().unwrap();
        let result = MachineIdentity::new(radio(), file.path())
            .current_identity()
            .await;
        assert!(matches!(result, Err(IdentityError::Unavailable(_))));
    }

    #[tokio::test]
    async fn assign_role_for_broadcaster() {
        let source = StaticIdentity::new("B", StableId::new(BROADCASTER_ID));
        let assignment = assign_role(&source, &KnownIds::default()).await;
        assert_eq!(assignment.role, Role::Broadcaster);
        assert!(assignment.error.is_none());
    }

    #[tokio::test]
    async fn unavailable_identity_falls_back_to_neutral() {
        let source = MachineIdentity::new(radio(), "/nonexistent/machine-id");
        let assignment = assign_role(&source, &KnownIds::default()).await;
        assert_eq!(assignment.role, Role::Neutral);
        assert!(assignment.identity.is_none());
        assert!(assignment.error.is_some());
    }
}
