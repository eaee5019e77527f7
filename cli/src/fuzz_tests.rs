//! Property-based tests for the swap vault
//!
//! Properties tested:
//! - Encryption round-trips any secret material
//! - A wrong password never decrypts
//! - Swap ids that could escape the vault directory are refused
//! - Display shortening keeps both ends of the value

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use tempfile::tempdir;

    use crate::config::short_hex;
    use crate::secure_storage::{EncryptedSwapFile, SwapSecretData, SwapVault};

    fn record(secret: [u8; 32], blinding: [u8; 32], amount: u128) -> SwapSecretData {
        SwapSecretData {
            swap_id: "swap_prop".into(),
            direction: "zcash_to_starknet".into(),
            from_token: "ZEC".into(),
            to_token: "STRK".into(),
            amount: amount.to_string(),
            commitment: "0xabc".into(),
            hash_lock: hex::encode(secret),
            secret,
            blinding_factor: blinding,
            deposit_tx_hash: None,
        }
    }

    proptest! {
        // Argon2 with production parameters is slow; a handful of cases is enough
        #![proptest_config(ProptestConfig::with_cases(4))]

        #[test]
        fn prop_vault_roundtrip(
            secret in prop::array::uniform32(any::<u8>()),
            blinding in prop::array::uniform32(any::<u8>()),
            amount in any::<u128>(),
        ) {
            let data = record(secret, blinding, amount);
            let encrypted = EncryptedSwapFile::encrypt(&data, "PropPassword1").unwrap();
            let decrypted = encrypted.decrypt("PropPassword1").unwrap();
            prop_assert_eq!(decrypted.secret, secret);
            prop_assert_eq!(decrypted.blinding_factor, blinding);
            prop_assert_eq!(&decrypted.amount, &amount.to_string());
        }

        #[test]
        fn prop_wrong_password_rejected(suffix in "[a-z0-9]{1,8}") {
            let encrypted = EncryptedSwapFile::encrypt(&record([1; 32], [2; 32], 5), "PropPassword1").unwrap();
            let wrong = format!("PropPassword1{}", suffix);
            prop_assert!(encrypted.decrypt(&wrong).is_err());
        }
    }

    proptest! {
        #[test]
        fn prop_ids_with_separators_refused(
            prefix in "[a-z0-9]{0,8}",
            sep in prop::sample::select(vec!["/", "\\", ".", " ", ":"]),
            suffix in "[a-z0-9]{0,8}",
        ) {
            let dir = tempdir().unwrap();
            let vault = SwapVault::new(dir.path().to_path_buf());
            let id = format!("{}{}{}", prefix, sep, suffix);
            prop_assert!(!vault.exists(&id));
            prop_assert!(vault.read(&id).is_err());
        }

        #[test]
        fn prop_short_hex_keeps_ends(digits in "[0-9a-f]{13,64}") {
            let value = format!("0x{}", digits);
            let short = short_hex(&value);
            prop_assert!(short.starts_with(&value[..6]));
            prop_assert!(short.ends_with(&value[value.len() - 4..]));
            prop_assert_eq!(short.len(), 13);
        }
    }
}
