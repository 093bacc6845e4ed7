//! TON Mnemonics
//!
//! TON uses the BIP39 English word list but its own seed derivation:
//! - entropy = HMAC-SHA512(key = phrase, data = password)
//! - seed = PBKDF2-HMAC-SHA512(entropy, "TON default seed", 100000)
//! - the ed25519 key is built from the first 32 seed bytes
//!
//! A phrase is only valid when PBKDF2(entropy, "TON seed version", 390)
//! starts with a zero byte ("basic seed").

use bip39::Language;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng};
use secrecy::SecretString;
use sha2::Sha512;
use zeroize::Zeroizing;

use super::keypair::KeyPair;
use crate::error::{HawalaError, HawalaResult};

/// Words in a TON mnemonic
pub const TON_MNEMONIC_WORDS: usize = 24;

const SEED_SALT: &[u8] = b"TON default seed";
const SEED_ITERATIONS: u32 = 100_000;
const BASIC_SEED_SALT: &[u8] = b"TON seed version";
const BASIC_SEED_ITERATIONS: u32 = 390;
const MAX_GENERATION_ATTEMPTS: usize = 100_000;

type HmacSha512 = Hmac<Sha512>;

/// Lowercase, trim and split a phrase into words
pub fn normalize_mnemonic(phrase: &str) -> Vec<String> {
    phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect()
}

/// HMAC-SHA512 of the space-joined words, keyed by the phrase
pub fn mnemonic_to_entropy(words: &[String], password: &str) -> HawalaResult<Zeroizing<[u8; 64]>> {
    let phrase = Zeroizing::new(words.join(" "));
    let mut mac = HmacSha512::new_from_slice(phrase.as_bytes())
        .map_err(|e| HawalaError::crypto_error(format!("HMAC init failed: {}", e)))?;
    mac.update(password.as_bytes());
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// 64-byte TON seed
pub fn mnemonic_to_seed(words: &[String], password: &str) -> HawalaResult<Zeroizing<[u8; 64]>> {
    let entropy = mnemonic_to_entropy(words, password)?;
    let mut seed = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2_hmac::<Sha512>(&entropy[..], SEED_SALT, SEED_ITERATIONS, &mut seed[..]);
    Ok(seed)
}

fn is_basic_seed(entropy: &[u8; 64]) -> bool {
    let mut check = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2_hmac::<Sha512>(entropy, BASIC_SEED_SALT, BASIC_SEED_ITERATIONS, &mut check[..]);
    check[0] == 0
}

fn check_words(words: &[String]) -> HawalaResult<()> {
    if words.len() != TON_MNEMONIC_WORDS {
        return Err(HawalaError::invalid_mnemonic(format!(
            "Expected {} words, got {}",
            TON_MNEMONIC_WORDS,
            words.len()
        )));
    }
    // The English list is sorted
    let list = Language::English.word_list();
    if let Some(pos) = words
        .iter()
        .position(|w| list.binary_search(&w.as_str()).is_err())
    {
        return Err(HawalaError::invalid_mnemonic(format!(
            "Word {} is not in the word list",
            pos + 1
        )));
    }
    Ok(())
}

/// Full validation: word count, word list membership and the basic-seed check
pub fn validate_mnemonic(phrase: &str, password: &str) -> HawalaResult<()> {
    let words = Zeroizing::new(normalize_mnemonic(phrase));
    check_words(&words)?;
    let entropy = mnemonic_to_entropy(&words, password)?;
    if !is_basic_seed(&entropy) {
        return Err(HawalaError::invalid_mnemonic("Phrase is not a valid TON seed"));
    }
    Ok(())
}

/// Derive the wallet key pair from a validated phrase
pub fn keypair_from_mnemonic(phrase: &str, password: &str) -> HawalaResult<KeyPair> {
    validate_mnemonic(phrase, password)?;
    let words = Zeroizing::new(normalize_mnemonic(phrase));
    let seed = mnemonic_to_seed(&words, password)?;
    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&seed[..32]);
    Ok(KeyPair::from_seed(&secret))
}

/// Generate a fresh 24-word phrase that passes the basic-seed check
pub fn generate_mnemonic(password: &str) -> HawalaResult<SecretString> {
    let list = Language::English.word_list();
    let mut rng = OsRng;

    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let words: Zeroizing<Vec<String>> = Zeroizing::new(
            (0..TON_MNEMONIC_WORDS)
                .map(|_| list[rng.gen_range(0..list.len())].to_string())
                .collect(),
        );
        let entropy = mnemonic_to_entropy(&words, password)?;
        if is_basic_seed(&entropy) {
            return Ok(SecretString::from(words.join(" ")));
        }
    }

    Err(HawalaError::internal("Failed to generate a valid TON mnemonic"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const PHRASE: &str = "advance achieve above agree addict airport accident allow alien adjust afford accident airport almost alpha air amount already absorb addict almost acoustic amazing adapt";

    #[test]
    fn test_known_phrase_derives_known_key() {
        let kp = keypair_from_mnemonic(PHRASE, "").unwrap();
        assert_eq!(
            hex::encode(kp.public_key()),
            "ee5ced52345b7e8b702309a95d48ea004425cd0ec8d42893569ebceec9a3238a"
        );
        assert_eq!(
            hex::encode(&kp.secret_key()[..32]),
            "5a5cccbe6238f0897c2433663eb2969eaab85d35e57d5b56151e578f12f6597c"
        );
    }

    #[test]
    fn test_normalization() {
        let messy = format!("  {}  ", PHRASE.to_uppercase().replace(' ', "   "));
        validate_mnemonic(&messy, "").unwrap();
    }

    #[test]
    fn test_rejects_bad_phrases() {
        let err = validate_mnemonic("abandon abandon", "").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidMnemonic);

        let unknown = PHRASE.replacen("advance", "zzzz", 1);
        assert!(validate_mnemonic(&unknown, "").is_err());

        // Valid words, but not a TON basic seed
        let abandon = vec!["abandon"; 24].join(" ");
        assert!(validate_mnemonic(&abandon, "").is_err());
    }

    #[test]
    fn test_generated_phrase_validates() {
        let phrase = generate_mnemonic("").unwrap();
        assert_eq!(normalize_mnemonic(phrase.expose_secret()).len(), 24);
        validate_mnemonic(phrase.expose_secret(), "").unwrap();
    }
}
