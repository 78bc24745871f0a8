//! NearClient - the main interface for nearlink.
//!
//! [`NearClient`] bundles the components that share one radio: the
//! adapter gate, the scanner, the bonder and the sender.
//!
//! ```text
//! Application → NearClient → Scanner / Bonder / Sender → Adapter → Radio
//!                                  ↓
//!                       near-core (pure state machines)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nearlink_client::{ClientConfig, MockAir, MockRadio, NearClient};
//!
//! let radio = MockRadio::new(MockAir::new(), "AA:AA:AA:AA:AA:01");
//! let client = NearClient::new(radio, ClientConfig::default());
//! let devices = client.scanner().scan_default().await?;
//! client.sender().send(&devices.records()[0].address, b"PING").await?;
//! ```

use crate::adapter::Adapter;
use crate::bonder::{BondConfig, Bonder};
use crate::identity::{assign_role, IdentitySource, RoleAssignment};
use crate::radio::{Radio, RadioError};
use crate::scanner::{ScanConfig, Scanner};
use crate::sender::{Sender, SenderConfig};
use nearlink_core::{broadcaster_name, KnownIds};
use nearlink_types::{DeviceRecord, Role};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for [`NearClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Discovery settings.
    pub scan: ScanConfig,
    /// Bonding settings.
    pub bond: BondConfig,
    /// Delivery settings.
    pub sender: SenderConfig,
    /// Ids roles are resolved against.
    pub known_ids: KnownIds,
}

/// Discovery, bonding and delivery over one radio.
pub struct NearClient<R: Radio> {
    adapter: Adapter<R>,
    scanner: Scanner<R>,
    bonder: Bonder<R>,
    sender: Sender<R>,
    known_ids: KnownIds,
}

impl<R: Radio> NearClient<R> {
    /// Create a client owning `radio`.
    pub fn new(radio: R, config: ClientConfig) -> Self {
        Self::with_adapter(Adapter::new(radio), config)
    }

    /// Create a client on an existing adapter (shared with a listener).
    pub fn with_adapter(adapter: Adapter<R>, config: ClientConfig) -> Self {
        Self {
            scanner: Scanner::new(adapter.clone(), config.scan),
            bonder: Bonder::new(adapter.clone(), config.bond),
            sender: Sender::new(adapter.clone(), config.sender),
            known_ids: config.known_ids,
            adapter,
        }
    }

    /// The adapter gate.
    pub fn adapter(&self) -> &Adapter<R> {
        &self.adapter
    }

    /// The underlying radio.
    pub fn radio(&self) -> &Arc<R> {
        self.adapter.radio()
    }

    /// The scanner.
    pub fn scanner(&self) -> &Scanner<R> {
        &self.scanner
    }

    /// The bonder.
    pub fn bonder(&self) -> &Bonder<R> {
        &self.bonder
    }

    /// The sender.
    pub fn sender(&self) -> &Sender<R> {
        &self.sender
    }

    /// Devices the platform already holds a bond with.
    ///
    /// These are valid send targets without a scan.
    pub async fn bonded_devices(&self) -> Result<Vec<DeviceRecord>, RadioError> {
        self.adapter.ensure_enabled().await?;
        let devices = self.radio().bonded_devices().await?;
        debug!("{} bonded devices", devices.len());
        Ok(devices)
    }

    /// Resolve the local role from `source`.
    pub async fn resolve_role<S>(&self, source: &S) -> RoleAssignment
    where
        S: IdentitySource + ?Sized,
    {
        assign_role(source, &self.known_ids).await
    }

    /// Resolve the local role and, for a broadcaster, rename the radio so
    /// peers can pick it out of a scan.
    pub async fn prepare_role<S>(&self, source: &S) -> Result<RoleAssignment, RadioError>
    where
        S: IdentitySource + ?Sized,
    {
        let assignment = self.resolve_role(source).await;
        if assignment.role == Role::Broadcaster {
            let current = self.radio().local_name().await?;
            let renamed = broadcaster_name(&current);
            if renamed != current {
                info!("Renaming radio {:?} -> {:?}", current, renamed);
                self.radio().set_local_name(&renamed).await?;
            }
        }
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use crate::radio::{MockAir, MockRadio};
    use nearlink_core::BROADCASTER_ID;
    use nearlink_types::StableId;

    fn client() -> (NearClient<MockRadio>, MockRadio) {
        let radio = MockRadio::new(MockAir::new(), "AA:AA:AA:AA:AA:01");
        (NearClient::new(radio.clone(), ClientConfig::default()), radio)
    }

    #[tokio::test]
    async fn broadcaster_is_renamed_once() {
        let (client, radio) = client();
        radio.set_local_name("Pixel").await.unwrap();
        let source = StaticIdentity::new("Pixel", StableId::new(BROADCASTER_ID));

        let assignment = client.prepare_role(&source).await.unwrap();
        assert_eq!(assignment.role, Role::Broadcaster);
        assert_eq!(radio.local_name().await.unwrap(), "ARES_Pixel");

        client.prepare_role(&source).await.unwrap();
        assert_eq!(radio.local_name().await.unwrap(), "ARES_Pixel");
    }

    #[tokio::test]
    async fn neutral_keeps_its_name() {
        let (client, radio) = client();
        radio.set_local_name("Laptop").await.unwrap();
        let source = StaticIdentity::new("Laptop", StableId::new("0000000000000000"));

        let assignment = client.prepare_role(&source).await.unwrap();

        assert_eq!(assignment.role, Role::Neutral);
        assert_eq!(radio.local_name().await.unwrap(), "Laptop");
    }

    #[tokio::test]
    async fn bonded_devices_include_newly_bonded_peer() {
        let (client, radio) = client();
        let peer = nearlink_types::BtAddress::new("11:22:33:44:55:66");
        assert!(client.bonded_devices().await.unwrap().is_empty());

        client.bonder().bond(&peer).await.unwrap();

        let bonded = client.bonded_devices().await.unwrap();
        assert_eq!(bonded.len(), 1);
        assert_eq!(bonded[0].address, peer);
        assert_eq!(bonded[0].status, nearlink_types::DeviceStatus::Paired);

        radio.set_enabled(false);
        assert!(matches!(
            client.bonded_devices().await,
            Err(RadioError::Unavailable)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn components_share_one_adapter() {
        let (client, radio) = client();
        let _handle = client
            .scanner()
            .start(std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert!(client.adapter().is_discovering().await);

        // Sending quiets the scan even though the send itself fails.
        let _ = client
            .sender()
            .send(&nearlink_types::BtAddress::new("11:11:11:11:11:11"), b"x")
            .await;
        assert!(!radio.is_scanning());
    }
}
