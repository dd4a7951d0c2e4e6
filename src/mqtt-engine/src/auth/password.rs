// Copyright 2023 RobustMQ Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! PBKDF2-HMAC password verification (§4.7). Credentials are stored per
//! username as an ordered list of records; the first one the supplied
//! password matches wins. `allow_anonymous` short-circuits the whole check.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    /// Base64-encoded expected PBKDF2 output.
    pub hash_b64: String,
    /// Base64-encoded salt.
    pub salt_b64: String,
    pub algorithm: String,
    pub hash_iterations: u32,
}

impl Default for CredentialRecord {
    fn default() -> Self {
        CredentialRecord {
            hash_b64: String::new(),
            salt_b64: String::new(),
            algorithm: "sha512".to_string(),
            hash_iterations: 101,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("credential record has invalid base64 data: {0}")]
    InvalidEncoding(base64::DecodeError),
    #[error("unsupported digest algorithm {0:?}")]
    UnsupportedAlgorithm(String),
}

fn pbkdf2_digest(
    algorithm: &str,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Result<Vec<u8>, PasswordError> {
    let mut out = vec![0u8; output_len];
    match algorithm {
        "sha256" => pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out),
        "sha512" => pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out),
        other => return Err(PasswordError::UnsupportedAlgorithm(other.to_string())),
    }
    Ok(out)
}

/// Verifies `password` against one credential record in constant time.
pub fn verify_record(password: &str, record: &CredentialRecord) -> Result<bool, PasswordError> {
    let expected = BASE64
        .decode(&record.hash_b64)
        .map_err(PasswordError::InvalidEncoding)?;
    let salt = BASE64
        .decode(&record.salt_b64)
        .map_err(PasswordError::InvalidEncoding)?;
    let computed = pbkdf2_digest(
        &record.algorithm,
        password.as_bytes(),
        &salt,
        record.hash_iterations,
        expected.len(),
    )?;
    Ok(bool::from(computed.ct_eq(&expected)))
}

/// Checks `password` against every record for a username, stopping at the
/// first match. `allow_anonymous` bypasses the check entirely (§4.7).
pub fn check_password(
    password: Option<&str>,
    records: &[CredentialRecord],
    allow_anonymous: bool,
) -> bool {
    if allow_anonymous {
        return true;
    }
    let Some(password) = password else {
        return false;
    };
    records
        .iter()
        .any(|record| verify_record(password, record).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(password: &str, algorithm: &str, iterations: u32) -> CredentialRecord {
        let salt = b"fixed-test-salt";
        let hash = pbkdf2_digest(algorithm, password.as_bytes(), salt, iterations, 32).unwrap();
        CredentialRecord {
            hash_b64: BASE64.encode(hash),
            salt_b64: BASE64.encode(salt),
            algorithm: algorithm.to_string(),
            hash_iterations: iterations,
        }
    }

    #[test]
    fn accepts_the_correct_password() {
        let record = make_record("hunter2", "sha512", 101);
        assert!(verify_record("hunter2", &record).unwrap());
    }

    #[test]
    fn rejects_the_wrong_password() {
        let record = make_record("hunter2", "sha512", 101);
        assert!(!verify_record("wrong", &record).unwrap());
    }

    #[test]
    fn supports_sha256_digest() {
        let record = make_record("hunter2", "sha256", 4096);
        assert!(verify_record("hunter2", &record).unwrap());
    }

    #[test]
    fn allow_anonymous_short_circuits() {
        assert!(check_password(None, &[], true));
    }

    #[test]
    fn first_matching_record_in_list_wins() {
        let records = vec![
            make_record("other", "sha512", 101),
            make_record("hunter2", "sha512", 101),
        ];
        assert!(check_password(Some("hunter2"), &records, false));
        assert!(!check_password(Some("nope"), &records, false));
    }
}
