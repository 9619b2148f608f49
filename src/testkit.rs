//! Test harness: in-memory fixtures for exercising the policy engine, RSL, and verification
//! engine without a real on-disk repository.

pub use crate::store::MemoryStore;

use ring::rand::SystemRandom;
use ring::signature::Ed25519KeyPair;

use crate::signing::{KeyMaterial, SigningKey};

/// A generated keypair plus the stable principal ID its public key derives.
pub struct TestPrincipal {
    pub id: String,
    pub signing_key: SigningKey,
}

impl TestPrincipal {
    /// Generates a fresh Ed25519 keypair for use as a test fixture. Key generation goes
    /// through `ring`'s RNG directly so tests never rely on a shared global generator.
    pub fn generate(name: &str) -> TestPrincipal {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("key generation");
        let signing_key = SigningKey::from_pkcs8(pkcs8.as_ref()).expect("valid pkcs8");
        TestPrincipal {
            id: name.to_string(),
            signing_key,
        }
    }

    pub fn public_key(&self) -> KeyMaterial {
        self.signing_key.public_key()
    }
}

/// CAUTION: This two is same
/// 1.
/// tracing_subscriber::fmt().init();
///
/// 2.
/// env::set_var("RUST_LOG", "debug"); // must be set if use `fmt::init()`, or no output
/// tracing_subscriber::fmt::init();
pub fn init_logger() {
    use tracing_subscriber::util::SubscriberInitExt;
    let _ = tracing_subscriber::fmt::Subscriber::builder()
        .with_target(false)
        .without_time()
        .with_level(true)
        .with_max_level(tracing::Level::DEBUG)
        .finish()
        .try_init(); // avoid multi-init
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_principals_have_distinct_keys() {
        let alice = TestPrincipal::generate("alice");
        let bob = TestPrincipal::generate("bob");
        assert_ne!(alice.public_key().key_id(), bob.public_key().key_id());
    }
}
