use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcPoint, PointConversionForm};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of an uncompressed P-256 point (0x04 || X || Y).
pub const PUBLIC_KEY_LEN: usize = 65;
/// Length of a P-256 private scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

const MAILTO: &str = "mailto:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Public,
    Private,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Public => f.write_str("public"),
            KeyRole::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid VAPID {role} key: {reason}")]
    InvalidKeyEncoding { role: KeyRole, reason: String },

    #[error("incomplete VAPID key pair: the {missing} key was not supplied")]
    IncompleteKeyPair { missing: KeyRole },

    #[error("VAPID public key does not belong to the private key")]
    MismatchedKeyPair,

    #[error("elliptic curve operation failed: {0}")]
    Crypto(#[from] ErrorStack),
}

/// The sender identity used to sign VAPID tokens.
///
/// Keys are kept in their base64url (unpadded) wire form. A value of this type
/// always holds a complete, mathematically paired key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredIdentity", into = "StoredIdentity")]
pub struct VapidIdentity {
    subject: String,
    public_key: String,
    private_key: String,
}

impl VapidIdentity {
    /// Builds an identity from a contact and an optional key pair.
    ///
    /// With no keys a fresh P-256 pair is generated. Supplying only one half of
    /// the pair is rejected rather than silently replaced.
    pub fn create(
        subject: &str,
        public_key: Option<&str>,
        private_key: Option<&str>,
    ) -> Result<Self, IdentityError> {
        let public_key = public_key.filter(|k| !k.is_empty());
        let private_key = private_key.filter(|k| !k.is_empty());

        match (public_key, private_key) {
            (None, None) => Self::generate(subject),
            (Some(public_key), Some(private_key)) => {
                Self::from_keys(subject, public_key, private_key)
            }
            (Some(_), None) => Err(IdentityError::IncompleteKeyPair {
                missing: KeyRole::Private,
            }),
            (None, Some(_)) => Err(IdentityError::IncompleteKeyPair {
                missing: KeyRole::Public,
            }),
        }
    }

    /// Generates a new identity with a fresh key pair.
    pub fn generate(subject: &str) -> Result<Self, IdentityError> {
        let group = p256()?;
        let ec_key = EcKey::generate(&group)?;

        let mut ctx = BigNumContext::new()?;
        let public_key =
            ec_key
                .public_key()
                .to_bytes(&group, PointConversionForm::UNCOMPRESSED, &mut ctx)?;
        let private_key = ec_key.private_key().to_vec_padded(PRIVATE_KEY_LEN as i32)?;

        Ok(Self {
            subject: normalize_subject(subject),
            public_key: URL_SAFE_NO_PAD.encode(public_key),
            private_key: URL_SAFE_NO_PAD.encode(private_key),
        })
    }

    /// Builds an identity from an existing pair, checking both encodings and
    /// that the public key is the one derived from the private scalar.
    pub fn from_keys(
        subject: &str,
        public_key: &str,
        private_key: &str,
    ) -> Result<Self, IdentityError> {
        let public_bytes = decode_key(public_key, KeyRole::Public)?;
        let derived = derive_public_point(private_key)?;
        if derived != public_bytes {
            return Err(IdentityError::MismatchedKeyPair);
        }

        Ok(Self {
            subject: normalize_subject(subject),
            public_key: URL_SAFE_NO_PAD.encode(public_bytes),
            private_key: URL_SAFE_NO_PAD.encode(decode_key(private_key, KeyRole::Private)?),
        })
    }

    /// Re-derives the base64url public key from a base64url private scalar.
    pub fn derive_public_key(private_key: &str) -> Result<String, IdentityError> {
        Ok(URL_SAFE_NO_PAD.encode(derive_public_point(private_key)?))
    }

    /// Contact subject, always `mailto:`-prefixed.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Uncompressed public point, base64url without padding.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Private scalar, base64url without padding.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for VapidIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidIdentity")
            .field("subject", &self.subject)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// On-disk shape of an identity inside a device file.
#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    subject_email: String,
    public_key: String,
    private_key: String,
}

impl TryFrom<StoredIdentity> for VapidIdentity {
    type Error = IdentityError;

    fn try_from(stored: StoredIdentity) -> Result<Self, Self::Error> {
        if stored.public_key.is_empty() {
            return Err(IdentityError::IncompleteKeyPair {
                missing: KeyRole::Public,
            });
        }
        if stored.private_key.is_empty() {
            return Err(IdentityError::IncompleteKeyPair {
                missing: KeyRole::Private,
            });
        }
        Self::from_keys(
            &stored.subject_email,
            &stored.public_key,
            &stored.private_key,
        )
    }
}

impl From<VapidIdentity> for StoredIdentity {
    fn from(identity: VapidIdentity) -> Self {
        Self {
            subject_email: identity.subject,
            public_key: identity.public_key,
            private_key: identity.private_key,
        }
    }
}

fn normalize_subject(subject: &str) -> String {
    if subject.starts_with(MAILTO) {
        subject.to_string()
    } else {
        format!("{MAILTO}{subject}")
    }
}

fn p256() -> Result<EcGroup, ErrorStack> {
    EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)
}

fn decode_key(encoded: &str, role: KeyRole) -> Result<Vec<u8>, IdentityError> {
    // Padded input is accepted; keys produced elsewhere are often padded.
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| IdentityError::InvalidKeyEncoding {
            role,
            reason: e.to_string(),
        })?;

    let expected = match role {
        KeyRole::Public => PUBLIC_KEY_LEN,
        KeyRole::Private => PRIVATE_KEY_LEN,
    };
    if bytes.len() != expected {
        return Err(IdentityError::InvalidKeyEncoding {
            role,
            reason: format!("expected {expected} bytes, got {}", bytes.len()),
        });
    }
    if role == KeyRole::Public && bytes[0] != 0x04 {
        return Err(IdentityError::InvalidKeyEncoding {
            role,
            reason: "not an uncompressed EC point".to_string(),
        });
    }
    Ok(bytes)
}

fn derive_public_point(private_key: &str) -> Result<Vec<u8>, IdentityError> {
    let scalar = decode_key(private_key, KeyRole::Private)?;
    let invalid_scalar = |_: ErrorStack| IdentityError::InvalidKeyEncoding {
        role: KeyRole::Private,
        reason: "not a valid P-256 scalar".to_string(),
    };

    let group = p256()?;
    let mut ctx = BigNumContext::new()?;
    let d = BigNum::from_slice(&scalar)?;

    let mut point = EcPoint::new(&group)?;
    point.mul_generator2(&group, &d, &mut ctx)?;

    // Rejects zero and scalars outside the group order.
    EcKey::from_private_components(&group, &d, &point)
        .and_then(|key| key.check_key())
        .map_err(invalid_scalar)?;

    Ok(point.to_bytes(&group, PointConversionForm::UNCOMPRESSED, &mut ctx)?)
}
