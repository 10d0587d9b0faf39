//! 写真暗号化モジュール
//!
//! 診断結果ごとのランダムなパスフレーズをSHA-256でハッシュ化して
//! AES-256-CTRの鍵とする。暗号文は `IV(16バイト) || 暗号化データ`。
//!
//! CTRモードには改ざん検知がないため、保存データのビット反転は
//! 復号エラーにならず画像の破損として現れる。

use crate::error::CryptoError;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// IV長（AESブロックサイズ）
pub const IV_LEN: usize = 16;
/// 鍵長（AES-256）
pub const KEY_LEN: usize = 32;
/// 保存時に使うパスフレーズ長
pub const DEFAULT_PASSPHRASE_LEN: usize = 32;

/// パスフレーズの文字セット（小文字・大文字・数字）
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 偏りを出さないための受理上限（62の倍数で最大の値）
const ACCEPT_LIMIT: usize = 256 - 256 % CHARSET.len();

/// ランダムなパスフレーズを生成（OSの暗号学的乱数を使用）
pub fn generate_passphrase(length: usize) -> Result<String, CryptoError> {
    generate_passphrase_with(&mut OsRng, length)
}

/// 乱数源を指定してパスフレーズを生成
pub fn generate_passphrase_with<R: RngCore>(rng: &mut R, length: usize) -> Result<String, CryptoError> {
    let mut passphrase = String::with_capacity(length);
    let mut buf = [0u8; 64];

    while passphrase.len() < length {
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| CryptoError::RandomSource(e.to_string()))?;

        for &byte in buf.iter() {
            if passphrase.len() == length {
                break;
            }
            let byte = byte as usize;
            if byte < ACCEPT_LIMIT {
                passphrase.push(CHARSET[byte % CHARSET.len()] as char);
            }
        }
    }

    Ok(passphrase)
}

/// パスフレーズから32バイトの鍵を導出（SHA-256を1回）
pub fn derive_key(passphrase: &str) -> Zeroizing<[u8; KEY_LEN]> {
    let digest = Sha256::digest(passphrase.as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&digest);
    key
}

/// AES-256-CTRで暗号化し `IV || 暗号文` を返す
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    encrypt_with(&mut OsRng, plaintext, key)
}

/// 乱数源を指定して暗号化
pub fn encrypt_with<R: RngCore>(rng: &mut R, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::CipherInit(key.len()));
    }

    let mut output = vec![0u8; IV_LEN + plaintext.len()];
    rng.try_fill_bytes(&mut output[..IV_LEN])
        .map_err(|e| CryptoError::RandomSource(e.to_string()))?;

    let (iv, body) = output.split_at_mut(IV_LEN);
    body.copy_from_slice(plaintext);
    apply_keystream(key, iv, body)?;

    Ok(output)
}

/// 先頭16バイトをIVとして復号
pub fn decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < IV_LEN {
        return Err(CryptoError::TruncatedInput(data.len()));
    }
    let (iv, ciphertext) = data.split_at(IV_LEN);
    let mut plaintext = ciphertext.to_vec();
    apply_keystream(key, iv, &mut plaintext)?;
    Ok(plaintext)
}

fn apply_keystream(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<(), CryptoError> {
    let mut cipher = Aes256Ctr::new_from_slices(key, iv).map_err(|_| CryptoError::CipherInit(key.len()))?;
    cipher.apply_keystream(buf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    /// 常に失敗する乱数源
    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy source unavailable"))
        }
    }

    /// 固定値を返す乱数源
    struct FixedRng(u8);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0 as u32
        }
        fn next_u64(&mut self) -> u64 {
            self.0 as u64
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_passphrase_length_and_charset() {
        let passphrase = generate_passphrase(32).expect("生成失敗");
        assert_eq!(passphrase.len(), 32);
        assert!(passphrase.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_passphrase_zero_length() {
        assert_eq!(generate_passphrase(0).unwrap(), "");
    }

    #[test]
    fn test_passphrases_differ() {
        let a = generate_passphrase(32).unwrap();
        let b = generate_passphrase(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_passphrase_maps_bytes_onto_charset() {
        // 61 % 62 = 61 -> '9'
        let passphrase = generate_passphrase_with(&mut FixedRng(61), 4).unwrap();
        assert_eq!(passphrase, "9999");
        // 62 % 62 = 0 -> 'a'
        let passphrase = generate_passphrase_with(&mut FixedRng(62), 2).unwrap();
        assert_eq!(passphrase, "aa");
    }

    #[test]
    fn test_passphrase_random_source_error() {
        let err = generate_passphrase_with(&mut BrokenRng, 8).unwrap_err();
        assert!(matches!(err, CryptoError::RandomSource(_)));
    }

    #[test]
    fn test_derive_key_is_sha256() {
        let key = derive_key("abc");
        assert_eq!(
            key.as_slice(),
            from_hex("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad").as_slice()
        );
    }

    #[test]
    fn test_roundtrip_various_lengths() {
        let key = derive_key("0123456789abcdefABCDEF0123456789");
        for len in [0usize, 1, 1_000_000] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let encrypted = encrypt(&plaintext, key.as_slice()).expect("暗号化失敗");
            assert_eq!(encrypted.len(), IV_LEN + len);
            let decrypted = decrypt(&encrypted, key.as_slice()).expect("復号失敗");
            assert_eq!(decrypted, plaintext, "len={}", len);
        }
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let key = derive_key("passphrase");
        let a = encrypt(b"same photo", key.as_slice()).unwrap();
        let b = encrypt(b"same photo", key.as_slice()).unwrap();
        assert_ne!(a[..IV_LEN], b[..IV_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_nist_ctr_vector() {
        // SP 800-38A F.5.5 CTR-AES256.Encrypt（1ブロック目）
        let key = from_hex("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4");
        let mut data = from_hex("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
        data.extend(from_hex("601ec313775789a5b7a7f504bbf3d228"));

        let plaintext = decrypt(&data, &key).unwrap();
        assert_eq!(plaintext, from_hex("6bc1bee22e409f96e93d7e117393172a"));
    }

    #[test]
    fn test_decrypt_truncated() {
        let key = derive_key("x");
        let err = decrypt(&[0u8; 15], key.as_slice()).unwrap_err();
        assert_eq!(err, CryptoError::TruncatedInput(15));

        // IVのみは空の平文
        assert!(decrypt(&[0u8; 16], key.as_slice()).unwrap().is_empty());
    }

    #[test]
    fn test_bad_key_length() {
        assert_eq!(encrypt(b"data", &[0u8; 16]).unwrap_err(), CryptoError::CipherInit(16));
        assert_eq!(decrypt(&[0u8; 20], &[0u8; 31]).unwrap_err(), CryptoError::CipherInit(31));
    }

    #[test]
    fn test_encrypt_random_source_error() {
        let key = derive_key("x");
        let err = encrypt_with(&mut BrokenRng, b"data", key.as_slice()).unwrap_err();
        assert!(matches!(err, CryptoError::RandomSource(_)));
    }

    #[test]
    fn test_bit_flip_is_not_detected() {
        let key = derive_key("integrity");
        let mut encrypted = encrypt(b"\xFF\xD8\xFF\xE0 jpeg body", key.as_slice()).unwrap();
        encrypted[IV_LEN] ^= 0x01;
        let decrypted = decrypt(&encrypted, key.as_slice()).expect("CTRは改ざんを検知しない");
        assert_eq!(decrypted[0], 0xFE);
    }
}
