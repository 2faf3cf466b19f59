//! Handshake key generation.

use crate::config::KeyScheme;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use std::ops::RangeInclusive;

/// Characters the legacy scheme sprinkles into the numeric token.
const NOISE_LOW: RangeInclusive<u8> = 0x21..=0x2f;
const NOISE_HIGH: RangeInclusive<u8> = 0x3a..=0x7e;

/// Generate a `Sec-WebSocket-Key` value using the given scheme.
pub fn generate_key(scheme: KeyScheme) -> String {
    match scheme {
        KeyScheme::Rfc6455 => generate_rfc6455_key(),
        KeyScheme::Legacy => generate_legacy_key(),
    }
}

/// 16 random bytes, base64 encoded.
pub fn generate_rfc6455_key() -> String {
    let mut nonce = [0u8; 16];
    rand::rng().fill(&mut nonce);
    STANDARD.encode(nonce)
}

/// Numeric token with noise and spaces mixed in, base64 encoded.
pub fn generate_legacy_key() -> String {
    generate_legacy_key_with(&mut rand::rng())
}

pub(crate) fn generate_legacy_key_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let spaces: u32 = rng.random_range(1..=12);
    let number = rng.random_range(0..=u32::MAX / spaces);
    let mut key = (u64::from(number) * u64::from(spaces))
        .to_string()
        .into_bytes();

    let noise = rng.random_range(1..=12);
    for _ in 0..noise {
        let pos = rng.random_range(0..=key.len());
        key.insert(pos, noise_byte(rng));
    }

    // Never at the front, never after the last character.
    for _ in 0..spaces {
        let pos = rng.random_range(1..key.len());
        key.insert(pos, b' ');
    }

    STANDARD.encode(&key)
}

fn noise_byte<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    let low_span = NOISE_LOW.end() - NOISE_LOW.start() + 1;
    let high_span = NOISE_HIGH.end() - NOISE_HIGH.start() + 1;
    let pick = rng.random_range(0..low_span + high_span);
    if pick < low_span {
        NOISE_LOW.start() + pick
    } else {
        NOISE_HIGH.start() + (pick - low_span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_rfc6455_key_is_16_bytes() {
        let key = generate_rfc6455_key();
        assert_eq!(key.len(), 24);
        let decoded = STANDARD.decode(&key).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn test_rfc6455_keys_differ() {
        assert_ne!(generate_rfc6455_key(), generate_rfc6455_key());
    }

    #[test]
    fn test_legacy_key_structure() {
        for seed in 0..500 {
            let mut rng = StdRng::seed_from_u64(seed);
            let key = generate_legacy_key_with(&mut rng);
            assert!(!key.contains('\n'));

            let decoded = String::from_utf8(STANDARD.decode(&key).unwrap()).unwrap();
            assert!(!decoded.starts_with(' '), "leading space in {decoded:?}");
            assert!(!decoded.ends_with(' '), "trailing space in {decoded:?}");

            let spaces = decoded.chars().filter(|c| *c == ' ').count() as u64;
            assert!((1..=12).contains(&spaces));

            let noise = decoded
                .bytes()
                .filter(|b| NOISE_LOW.contains(b) || NOISE_HIGH.contains(b))
                .count();
            assert!((1..=12).contains(&noise), "noise count {noise} in {decoded:?}");

            let digits: String = decoded.chars().filter(char::is_ascii_digit).collect();
            assert_eq!(digits.len() + noise + spaces as usize, decoded.len());
            let value: u64 = digits.parse().unwrap();
            assert!(value <= u64::from(u32::MAX));
            assert_eq!(value % spaces, 0);
        }
    }

    #[test]
    fn test_noise_byte_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let b = noise_byte(&mut rng);
            assert!(NOISE_LOW.contains(&b) || NOISE_HIGH.contains(&b));
            assert!(!b.is_ascii_digit());
        }
    }

    #[test]
    fn test_generate_key_dispatches_on_scheme() {
        let rfc = generate_key(KeyScheme::Rfc6455);
        assert_eq!(STANDARD.decode(rfc).unwrap().len(), 16);

        let legacy = generate_key(KeyScheme::Legacy);
        let decoded = STANDARD.decode(legacy).unwrap();
        assert!(decoded.contains(&b' '));
    }
}
