//! Access grants: key id, caveat chain and encryption key.
//!
//! A grant serializes to an URL-safe base64 string of its JSON form. Each
//! caveat appended by [`AccessGrant::share`] extends an HMAC-SHA256 chain
//! seeded by the API key. Only an unrestricted grant carries the API key
//! itself; a restricted grant carries the key id and the chain tail, so its
//! holder can append caveats but cannot recompute an earlier link. The
//! gateway authenticates a grant by its key id and tail, recomputing the
//! chain from the API key it issued.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::TRACING_TARGET_GRANT;
use crate::error::{ScopeError, ScopeResult};
use crate::permission::{Operation, Restriction};
use crate::satellite::SatelliteAddress;

type HmacSha256 = Hmac<Sha256>;

const GRANT_VERSION: u8 = 2;
const KEY_ID_LABEL: &[u8] = b"stow/api-key/id";
const ROOT_CHAIN_LABEL: &[u8] = b"stow/api-key/root";
const ENCRYPTION_KEY_INFO: &[u8] = b"stow/encryption-key";

/// An opaque, possibly restricted credential for one satellite.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessGrant {
    satellite: SatelliteAddress,
    /// Present on unrestricted grants only.
    api_key: Option<String>,
    key_id: [u8; 32],
    caveats: Vec<Restriction>,
    tail: [u8; 32],
    encryption_key: [u8; 32],
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantWire {
    version: u8,
    satellite: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    key_id: String,
    #[serde(default)]
    caveats: Vec<Restriction>,
    tail: String,
    encryption_key: String,
}

impl AccessGrant {
    /// Derives a root grant from an API key and an encryption passphrase.
    ///
    /// The passphrase may be empty; the API key may not.
    pub fn request_with_passphrase(
        satellite: &str,
        api_key: &str,
        passphrase: &str,
    ) -> ScopeResult<Self> {
        let satellite = SatelliteAddress::parse(satellite)?;
        validate_api_key(api_key)?;

        let encryption_key = derive_encryption_key(api_key, passphrase)?;

        tracing::debug!(
            target: TRACING_TARGET_GRANT,
            satellite = %satellite,
            "derived root access grant"
        );

        Ok(Self {
            satellite,
            api_key: Some(api_key.to_string()),
            key_id: key_id(api_key)?,
            caveats: Vec::new(),
            tail: root_tail(api_key)?,
            encryption_key,
        })
    }

    /// Parses a grant previously produced by [`serialize`](Self::serialize).
    ///
    /// An unrestricted grant is checked against its API key. A restricted
    /// grant must not carry the API key; its chain is authenticated by the
    /// gateway, or locally with [`verify_chain`](Self::verify_chain).
    pub fn parse(serialized: &str) -> ScopeResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(serialized.trim())
            .map_err(|e| ScopeError::malformed(format!("invalid encoding: {e}")))?;
        let wire: GrantWire = serde_json::from_slice(&raw)
            .map_err(|e| ScopeError::malformed(format!("invalid payload: {e}")))?;

        if wire.version != GRANT_VERSION {
            return Err(ScopeError::malformed(format!(
                "unsupported version {}",
                wire.version
            )));
        }

        let satellite = SatelliteAddress::parse(&wire.satellite)
            .map_err(|e| ScopeError::malformed(e.to_string()))?;
        let key_id = decode_key(&wire.key_id, "key id")?;
        let tail = decode_key(&wire.tail, "tail")?;
        let encryption_key = decode_key(&wire.encryption_key, "encryption key")?;

        match (&wire.api_key, wire.caveats.is_empty()) {
            (Some(api_key), true) => {
                validate_api_key(api_key).map_err(|e| ScopeError::malformed(e.to_string()))?;
                if self::key_id(api_key)? != key_id || root_tail(api_key)? != tail {
                    return Err(ScopeError::malformed("root key does not verify"));
                }
            }
            (Some(_), false) => {
                return Err(ScopeError::malformed(
                    "restricted scope must not carry the API key",
                ));
            }
            (None, true) => {
                return Err(ScopeError::malformed(
                    "unrestricted scope is missing its API key",
                ));
            }
            (None, false) => {
                for caveat in &wire.caveats {
                    caveat
                        .permission
                        .validate()
                        .map_err(|e| ScopeError::malformed(e.to_string()))?;
                }
            }
        }

        Ok(Self {
            satellite,
            api_key: wire.api_key,
            key_id,
            caveats: wire.caveats,
            tail,
            encryption_key,
        })
    }

    /// Serializes the grant into a shareable string.
    pub fn serialize(&self) -> ScopeResult<String> {
        let wire = GrantWire {
            version: GRANT_VERSION,
            satellite: self.satellite.to_string(),
            api_key: self.api_key.clone(),
            key_id: hex::encode(self.key_id),
            caveats: self.caveats.clone(),
            tail: hex::encode(self.tail),
            encryption_key: hex::encode(self.encryption_key),
        };
        let json = serde_json::to_vec(&wire)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Returns a new grant narrowed by `restriction`.
    ///
    /// `self` is left unchanged; restrictions only accumulate. The returned
    /// grant no longer holds the API key.
    pub fn share(&self, restriction: &Restriction) -> ScopeResult<Self> {
        restriction.permission.validate()?;

        let mut shared = self.clone();
        shared.api_key = None;
        shared.tail = chain(&self.tail, restriction)?;
        shared.caveats.push(restriction.clone());

        tracing::debug!(
            target: TRACING_TARGET_GRANT,
            caveats = shared.caveats.len(),
            "restricted access grant"
        );
        Ok(shared)
    }

    /// Checks that this grant was issued from `api_key` and that its caveats
    /// are exactly the ones its tail was chained over.
    pub fn verify_chain(&self, api_key: &str) -> ScopeResult<()> {
        if key_id(api_key)? != self.key_id {
            return Err(ScopeError::malformed("grant was issued by another API key"));
        }
        let mut expected = root_tail(api_key)?;
        for caveat in &self.caveats {
            expected = chain(&expected, caveat)?;
        }
        if expected != self.tail {
            return Err(ScopeError::malformed("caveat chain does not verify"));
        }
        Ok(())
    }

    /// Whether every caveat allows `operation` on `key` in `bucket` at `now`.
    pub fn allows(&self, operation: Operation, bucket: &str, key: &str, now: Timestamp) -> bool {
        self.caveats
            .iter()
            .all(|caveat| caveat.allows(operation, bucket, key, now))
    }

    /// Whether any restriction has been applied.
    pub fn is_restricted(&self) -> bool {
        !self.caveats.is_empty()
    }

    pub fn satellite(&self) -> &SatelliteAddress {
        &self.satellite
    }

    pub fn caveats(&self) -> &[Restriction] {
        &self.caveats
    }

    /// Hex form of the key id, a one-way digest of the API key.
    pub fn key_id_hex(&self) -> String {
        hex::encode(self.key_id)
    }

    /// Hex form of the chain tail; the secret the gateway authenticates.
    pub fn tail_hex(&self) -> String {
        hex::encode(self.tail)
    }

    /// Hex form of the derived encryption key.
    pub fn encryption_key_hex(&self) -> String {
        hex::encode(self.encryption_key)
    }
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrant")
            .field("satellite", &self.satellite)
            .field("key_id", &self.key_id_hex())
            .field("caveats", &self.caveats)
            .finish_non_exhaustive()
    }
}

fn validate_api_key(api_key: &str) -> ScopeResult<()> {
    if api_key.is_empty() {
        return Err(ScopeError::invalid_credentials("API key is empty"));
    }
    if !api_key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '/' | '='))
    {
        return Err(ScopeError::invalid_credentials(
            "API key contains invalid characters",
        ));
    }
    Ok(())
}

fn derive_encryption_key(api_key: &str, passphrase: &str) -> ScopeResult<[u8; 32]> {
    let salt = Sha256::digest(api_key.as_bytes());
    let hk = Hkdf::<Sha256>::new(Some(salt.as_slice()), passphrase.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(ENCRYPTION_KEY_INFO, &mut okm)
        .map_err(|e| ScopeError::invalid_credentials(format!("key derivation failed: {e}")))?;
    Ok(okm)
}

fn key_id(api_key: &str) -> ScopeResult<[u8; 32]> {
    mac(api_key.as_bytes(), KEY_ID_LABEL)
}

fn root_tail(api_key: &str) -> ScopeResult<[u8; 32]> {
    mac(api_key.as_bytes(), ROOT_CHAIN_LABEL)
}

fn chain(tail: &[u8; 32], caveat: &Restriction) -> ScopeResult<[u8; 32]> {
    let encoded = serde_json::to_vec(caveat)?;
    mac(tail, &encoded)
}

fn mac(key: &[u8], message: &[u8]) -> ScopeResult<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ScopeError::invalid_credentials(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

fn decode_key(value: &str, what: &str) -> ScopeResult<[u8; 32]> {
    let bytes = hex::decode(value).map_err(|e| ScopeError::malformed(format!("{what}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ScopeError::malformed(format!("{what}: expected 32 bytes")))
}
