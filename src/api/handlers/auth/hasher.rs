//! Password hashing and verification.
//!
//! Flow: normalize the plaintext (NFC), pre-hash it with HMAC-SHA-256 keyed
//! by a process-wide pepper, then feed the pre-hash to scrypt with a fresh
//! per-record salt. The result is stored as a self-describing string:
//!
//! `scrypt$v=1$norm=NFC$N=16384,r=8,p=1$<salt hex>$<derived key hex>`
//!
//! Verification parses scheme, version, normalization form, and cost
//! parameters from the stored string and re-derives with those, never with
//! the current defaults, so cost changes do not invalidate old hashes.
//! Rotating the pepper invalidates every stored hash; it is a long-lived
//! secret, not a config convenience.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use scrypt::Params;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use unicode_normalization::UnicodeNormalization;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "scrypt";
const VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

// Default cost: N = 2^14, r = 8, p = 1.
const DEFAULT_LOG_N: u8 = 14;
const DEFAULT_R: u32 = 8;
const DEFAULT_P: u32 = 1;

/// Unicode normalization form recorded in the encoded hash.
///
/// Composed and decomposed spellings of the same logical password must
/// produce the same derived key, so the form used at hash time is stored and
/// re-applied at verify time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum NormForm {
    Nfc,
    Nfd,
    Nfkc,
    Nfkd,
}

impl NormForm {
    fn tag(self) -> &'static str {
        match self {
            Self::Nfc => "NFC",
            Self::Nfd => "NFD",
            Self::Nfkc => "NFKC",
            Self::Nfkd => "NFKD",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "NFC" => Some(Self::Nfc),
            "NFD" => Some(Self::Nfd),
            "NFKC" => Some(Self::Nfkc),
            "NFKD" => Some(Self::Nfkd),
            _ => None,
        }
    }

    fn apply(self, password: &str) -> String {
        match self {
            Self::Nfc => password.nfc().collect(),
            Self::Nfd => password.nfd().collect(),
            Self::Nfkc => password.nfkc().collect(),
            Self::Nfkd => password.nfkd().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Cost {
    log_n: u8,
    r: u32,
    p: u32,
}

impl Cost {
    fn params(self, key_len: usize) -> Result<Params> {
        Params::new(self.log_n, self.r, self.p, key_len)
            .context("invalid scrypt cost parameters")
    }
}

/// Everything needed to re-verify a password, parsed from a stored hash.
struct ParsedHash {
    norm: NormForm,
    cost: Cost,
    salt: Vec<u8>,
    derived_key: Vec<u8>,
}

/// Derives and verifies peppered, salted scrypt password hashes.
///
/// The pepper is injected at construction and read-only for the process
/// lifetime. Each `hash` call draws a fresh random salt; salts are never
/// reused across calls or processes.
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: SecretString,
    cost: Cost,
}

impl PasswordHasher {
    #[must_use]
    pub fn new(pepper: SecretString) -> Self {
        Self {
            pepper,
            cost: Cost {
                log_n: DEFAULT_LOG_N,
                r: DEFAULT_R,
                p: DEFAULT_P,
            },
        }
    }

    /// Override the cost used for new hashes. Existing hashes keep verifying
    /// with their stored parameters.
    #[must_use]
    pub fn with_cost(mut self, log_n: u8, r: u32, p: u32) -> Self {
        self.cost = Cost { log_n, r, p };
        self
    }

    /// Hash a plaintext password into the self-describing encoded form.
    ///
    /// # Errors
    /// Fails only when the system random source or the configured cost
    /// parameters are unusable; never for the plaintext itself.
    pub fn hash(&self, password: &str) -> Result<String> {
        let norm = NormForm::Nfc;
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .context("failed to generate password salt")?;

        let derived_key = self.derive(password, norm, self.cost, &salt)?;

        Ok(format!(
            "{SCHEME}$v={VERSION}$norm={}$N={},r={},p={}${}${}",
            norm.tag(),
            1u64 << self.cost.log_n,
            self.cost.r,
            self.cost.p,
            hex::encode(salt),
            hex::encode(derived_key),
        ))
    }

    /// Verify a plaintext against a stored encoded hash.
    ///
    /// Returns `false` for any malformed encoding, foreign scheme, or
    /// unsupported version; a corrupt hash must never read as "no password
    /// set". The final comparison is length-checked and constant-time.
    #[must_use]
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some(parsed) = parse_encoded(encoded) else {
            return false;
        };

        // A truncated or padded stored key can never match; bail before
        // deriving so the comparison below only ever sees equal lengths.
        if parsed.derived_key.len() != KEY_LEN {
            return false;
        }

        let Ok(candidate) = self.derive(password, parsed.norm, parsed.cost, &parsed.salt) else {
            return false;
        };

        candidate.ct_eq(&parsed.derived_key).into()
    }

    fn derive(
        &self,
        password: &str,
        norm: NormForm,
        cost: Cost,
        salt: &[u8],
    ) -> Result<[u8; KEY_LEN]> {
        let normalized = norm.apply(password);

        let mut mac = HmacSha256::new_from_slice(self.pepper.expose_secret().as_bytes())
            .context("failed to key pepper HMAC")?;
        mac.update(normalized.as_bytes());
        let prehash = mac.finalize().into_bytes();

        let mut derived_key = [0u8; KEY_LEN];
        scrypt::scrypt(&prehash, salt, &cost.params(KEY_LEN)?, &mut derived_key)
            .context("scrypt derivation failed")?;
        Ok(derived_key)
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

/// Parse the encoded form. Any deviation yields `None`; verification then
/// fails closed.
fn parse_encoded(encoded: &str) -> Option<ParsedHash> {
    let mut fields = encoded.split('$');
    let scheme = fields.next()?;
    let version = fields.next()?;
    let norm = fields.next()?;
    let cost = fields.next()?;
    let salt = fields.next()?;
    let derived_key = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    if scheme != SCHEME {
        return None;
    }
    let version: u32 = version.strip_prefix("v=")?.parse().ok()?;
    if version != VERSION {
        return None;
    }
    let norm = NormForm::from_tag(norm.strip_prefix("norm=")?)?;
    let cost = parse_cost(cost)?;

    let salt = hex::decode(salt).ok()?;
    let derived_key = hex::decode(derived_key).ok()?;
    if salt.is_empty() || derived_key.is_empty() {
        return None;
    }

    Some(ParsedHash {
        norm,
        cost,
        salt,
        derived_key,
    })
}

fn parse_cost(field: &str) -> Option<Cost> {
    let mut n = None;
    let mut r = None;
    let mut p = None;
    for pair in field.split(',') {
        let (key, value) = pair.split_once('=')?;
        match key {
            "N" => n = Some(value.parse::<u64>().ok()?),
            "r" => r = Some(value.parse::<u32>().ok()?),
            "p" => p = Some(value.parse::<u32>().ok()?),
            _ => return None,
        }
    }
    let (n, r, p) = (n?, r?, p?);
    // N must be a power of two for scrypt; its log is what the KDF takes.
    if n < 2 || !n.is_power_of_two() {
        return None;
    }
    let log_n = u8::try_from(n.trailing_zeros()).ok()?;
    Some(Cost { log_n, r, p })
}

#[cfg(test)]
mod tests {
    use super::{PasswordHasher, parse_encoded};
    use secrecy::SecretString;

    fn hasher() -> PasswordHasher {
        // Low cost keeps the test suite fast; the format is identical.
        PasswordHasher::new(SecretString::from("test-pepper".to_string())).with_cost(10, 8, 1)
    }

    #[test]
    fn hash_then_verify_round_trips() {
        let hasher = hasher();
        let encoded = hasher.hash("P@ssw0rd").expect("hash");
        assert!(hasher.verify("P@ssw0rd", &encoded));
        assert!(!hasher.verify("p@ssw0rd", &encoded));
        assert!(!hasher.verify("", &encoded));
    }

    #[test]
    fn default_cost_is_recorded_in_encoding() {
        let hasher = PasswordHasher::new(SecretString::from("pepper".to_string()));
        let encoded = hasher.hash("secret").expect("hash");
        assert!(encoded.starts_with("scrypt$v=1$norm=NFC$N=16384,r=8,p=1$"));
    }

    #[test]
    fn salt_is_fresh_per_call() {
        let hasher = hasher();
        let first = hasher.hash("same input").expect("hash");
        let second = hasher.hash("same input").expect("hash");
        assert_ne!(first, second);

        let salt_of = |encoded: &str| parse_encoded(encoded).expect("parse").salt;
        assert_ne!(salt_of(&first), salt_of(&second));
    }

    #[test]
    fn verify_uses_stored_cost_not_current_defaults() {
        let pepper = SecretString::from("shared-pepper".to_string());
        let old = PasswordHasher::new(pepper.clone()).with_cost(10, 4, 1);
        let encoded = old.hash("unchanged").expect("hash");

        // A hasher configured with different (default) cost still verifies.
        let current = PasswordHasher::new(pepper);
        assert!(current.verify("unchanged", &encoded));
    }

    #[test]
    fn different_pepper_never_verifies() {
        let encoded = hasher().hash("hunter2hunter2").expect("hash");
        let other = PasswordHasher::new(SecretString::from("other-pepper".to_string()))
            .with_cost(10, 8, 1);
        assert!(!other.verify("hunter2hunter2", &encoded));
    }

    #[test]
    fn composed_and_decomposed_unicode_match() {
        let hasher = hasher();
        // "café" spelled with U+00E9 vs "e" + combining acute accent.
        let composed = "caf\u{e9}";
        let decomposed = "cafe\u{301}";
        let encoded = hasher.hash(composed).expect("hash");
        assert!(hasher.verify(decomposed, &encoded));
    }

    #[test]
    fn malformed_encodings_fail_closed() {
        let hasher = hasher();
        let valid = hasher.hash("secret").expect("hash");

        let cases = [
            String::new(),
            "not a hash".to_string(),
            // foreign scheme
            valid.replacen("scrypt", "argon2id", 1),
            // unsupported version
            valid.replacen("v=1", "v=2", 1),
            // unknown normalization tag
            valid.replacen("norm=NFC", "norm=NGF", 1),
            // non-power-of-two N
            valid.replacen("N=1024", "N=1000", 1),
            // missing field
            valid.rsplit_once('$').map(|(head, _)| head.to_string()).unwrap(),
            // extra field
            format!("{valid}$extra"),
            // non-hex derived key
            format!("{}zz", &valid[..valid.len() - 2]),
        ];
        for case in cases {
            assert!(!hasher.verify("secret", &case), "accepted: {case}");
        }
    }

    #[test]
    fn truncated_derived_key_fails_length_check() {
        let hasher = hasher();
        let valid = hasher.hash("secret").expect("hash");
        // Drop one hex byte from the derived key.
        let truncated = &valid[..valid.len() - 2];
        assert!(parse_encoded(truncated).is_some());
        assert!(!hasher.verify("secret", truncated));
    }

    #[test]
    fn parse_rejects_unknown_cost_keys() {
        let hasher = hasher();
        let valid = hasher.hash("secret").expect("hash");
        let tampered = valid.replacen("p=1", "p=1,m=65536", 1);
        assert!(parse_encoded(&tampered).is_none());
    }
}
