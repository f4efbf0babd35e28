//! Signed, versioned link payloads.
//!
//! Tokens look like `<base64url(json envelope)>.<base64url(hmac-sha256)>`.
//! The envelope carries a schema version, a payload kind tag, the issue time
//! and a nonce; the body is a strongly typed struct that rejects unknown
//! fields, so a token minted for one purpose cannot be decoded as another.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::SignerError;
use crate::types::{ProjectId, ScheduleId};

type HmacSha256 = Hmac<Sha256>;

pub const PAYLOAD_VERSION: u32 = 1;

/// A struct that can travel inside a signed token.
pub trait SignedPayload: Serialize + DeserializeOwned {
    const KIND: &'static str;
}

// ---------------------------------------------------------------------------
// Payload bodies
// ---------------------------------------------------------------------------

/// Everything a member's check-in link needs to locate its tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderPayload {
    pub member_email: String,
    /// Firing time at the schedule's offset.
    pub local_datetime: NaiveDateTime,
    pub local_weekday: String,
    pub offset_hours: i32,
    pub schedule_id: ScheduleId,
}

impl ReminderPayload {
    pub fn local_date(&self) -> NaiveDate {
        self.local_datetime.date()
    }
}

impl SignedPayload for ReminderPayload {
    const KIND: &'static str = "checkin_reminder";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteAction {
    Accept,
    Reject,
}

/// Body of the accept/reject links sent with project invitations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvitePayload {
    pub project_id: ProjectId,
    pub member_email: String,
    pub action: InviteAction,
}

impl SignedPayload for InvitePayload {
    const KIND: &'static str = "project_invite";
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope<T> {
    v: u32,
    kind: String,
    issued_at: i64,
    nonce: String,
    body: T,
}

// ---------------------------------------------------------------------------
// PayloadSigner
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PayloadSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSigner").finish_non_exhaustive()
    }
}

impl PayloadSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SignerError> {
        let key = secret.as_ref().to_vec();
        if key.is_empty() {
            return Err(SignerError::Malformed("signing secret is empty".into()));
        }
        Ok(Self { key })
    }

    pub fn sign<T: SignedPayload>(
        &self,
        body: &T,
        now: DateTime<Utc>,
    ) -> Result<String, SignerError> {
        let envelope = Envelope {
            v: PAYLOAD_VERSION,
            kind: T::KIND.to_string(),
            issued_at: now.timestamp(),
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            body,
        };
        self.seal(&envelope)
    }

    /// Check the signature, the version, the kind and the age of `token`
    /// and decode its body.
    pub fn verify<T: SignedPayload>(
        &self,
        token: &str,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<T, SignerError> {
        let (encoded, signature) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| SignerError::Malformed("missing signature segment".into()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| SignerError::Malformed(e.to_string()))?;
        self.mac()?
            .chain_update(encoded.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| SignerError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| SignerError::Malformed(e.to_string()))?;
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_slice(&json).map_err(|e| SignerError::Malformed(e.to_string()))?;

        if envelope.v != PAYLOAD_VERSION {
            return Err(SignerError::UnsupportedVersion(envelope.v));
        }
        if envelope.kind != T::KIND {
            return Err(SignerError::WrongKind {
                expected: T::KIND.to_string(),
                found: envelope.kind,
            });
        }
        let issued_at = DateTime::<Utc>::from_timestamp(envelope.issued_at, 0)
            .ok_or_else(|| SignerError::Malformed("issued_at out of range".into()))?;
        if now - issued_at > max_age {
            return Err(SignerError::Expired);
        }
        serde_json::from_value(envelope.body).map_err(|e| SignerError::Malformed(e.to_string()))
    }

    fn seal<T: Serialize>(&self, envelope: &Envelope<T>) -> Result<String, SignerError> {
        let json =
            serde_json::to_vec(envelope).map_err(|e| SignerError::Malformed(e.to_string()))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = self
            .mac()?
            .chain_update(encoded.as_bytes())
            .finalize()
            .into_bytes();
        Ok(format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    fn mac(&self) -> Result<HmacSha256, SignerError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| SignerError::Malformed(e.to_string()))
    }
}
