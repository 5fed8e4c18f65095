//! CBOR batch envelope for announcements on the wire.
//!
//! Transports ship announcement batches wrapped in a versioned envelope:
//!
//! ```text
//! AnnouncementEnvelope {
//!     version:       u8,       // Envelope version (1)
//!     msg_id:        [u8; 16], // Random unique envelope id
//!     timestamp:     u64,      // Milliseconds since the Unix epoch
//!     announcements: Vec<BlockAnnouncement>,
//! }
//! ```
//!
//! The envelope is CBOR-serialized (RFC 8949). Announcements themselves
//! remain language-neutral records; individual fields are also
//! JSON-representable for transports that prefer JSON.

use brightchain_crypto::random;
use brightchain_types::announcement::BlockAnnouncement;
use serde::{Deserialize, Serialize};

use crate::{GossipError, Result};

/// Current envelope version.
pub const ENVELOPE_VERSION: u8 = 1;

/// A batch of announcements as shipped to one peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnouncementEnvelope {
    /// Envelope version. Must be [`ENVELOPE_VERSION`].
    pub version: u8,
    /// Random 128-bit envelope identifier.
    pub msg_id: [u8; 16],
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// The batched announcements, in enqueue order.
    pub announcements: Vec<BlockAnnouncement>,
}

impl AnnouncementEnvelope {
    /// Wrap a batch with a fresh random envelope id.
    pub fn new(announcements: Vec<BlockAnnouncement>, timestamp: u64) -> Self {
        let mut msg_id = [0u8; 16];
        random::fill_bytes(&mut msg_id);
        Self {
            version: ENVELOPE_VERSION,
            msg_id,
            timestamp,
            announcements,
        }
    }

    /// Serialize to CBOR bytes for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| GossipError::Serialization(format!("CBOR serialization failed: {e}")))?;
        Ok(buf)
    }

    /// Deserialize an envelope received from the wire.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let envelope: AnnouncementEnvelope = ciborium::from_reader(data)
            .map_err(|e| GossipError::Deserialization(format!("CBOR parse failed: {e}")))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(GossipError::Deserialization(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }
}
