//! Random credentials: activation tokens and generated passwords.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};

use crate::config::{ACTIVATION_TOKEN_BYTES, RECOVERY_PASSWORD_LENGTH};

/// Opaque single-use activation token, hex encoded.
///
/// Drawn from the OS CSPRNG; uniqueness rests on entropy alone.
pub fn generate_token() -> String {
    let mut bytes = [0u8; ACTIVATION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Alphanumeric password handed out by password recovery.
pub fn generate_password() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(RECOVERY_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}
