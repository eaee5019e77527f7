//! Known-answer vectors
//!
//! Fixed inputs with values computed independently of this crate:
//! SHA256 and HMAC-SHA256 from their RFCs, Starknet Poseidon and
//! entry-point selectors from the ledger chain's own tooling, BN254
//! Poseidon from circomlib.

#[cfg(test)]
mod known_answer_vectors {
    use crate::amount::{from_base_units, split_u256, to_base_units, U256};
    use crate::crypto::{
        compute_hash_lock, generate_commitment, verify_secret, CommitmentScheme, PoseidonBn254, Secret,
    };
    use crate::felt::Felt;
    use crate::relayer::http::sign_request;

    // ==================== Amounts ====================

    /// "10" of an 18-decimal token
    #[test]
    fn test_vector_scenario_a() {
        let base = to_base_units("10", 18).unwrap();
        assert_eq!(base, "10000000000000000000");

        let (low, high) = split_u256(&base).unwrap();
        assert_eq!(format!("{:#x}", low), "0x8ac7230489e80000");
        assert_eq!(format!("{:#x}", high), "0x0");

        let (low_hex, high_hex) = U256::from_dec_str(&base).unwrap().to_hex_limbs();
        assert_eq!(low_hex, "0x8ac7230489e80000");
        assert_eq!(high_hex, "0x0");
    }

    #[test]
    fn test_vector_limb_boundaries() {
        assert_eq!(
            split_u256("340282366920938463463374607431768211455").unwrap(),
            (u128::MAX, 0)
        );
        assert_eq!(
            split_u256("340282366920938463463374607431768211456").unwrap(),
            (0, 1)
        );
        // 2^256 - 1
        assert_eq!(
            split_u256("115792089237316195423570985008687907853269984665640564039457584007913129639935").unwrap(),
            (u128::MAX, u128::MAX)
        );
        // 2^256
        assert!(split_u256("115792089237316195423570985008687907853269984665640564039457584007913129639936").is_err());
    }

    #[test]
    fn test_vector_display_amounts() {
        assert_eq!(from_base_units("1500000", 6).unwrap(), "1.5");
        assert_eq!(from_base_units("100000000", 8).unwrap(), "1");
        assert_eq!(from_base_units("1", 18).unwrap(), "0.000000000000000001");
        assert_eq!(to_base_units("0.000000000000000001", 18).unwrap(), "1");
        assert_eq!(to_base_units("1.123456789", 6).unwrap(), "1123456");
    }

    // ==================== Hash Lock ====================

    /// FIPS 180-2 / well-known SHA256 digests
    #[test]
    fn test_vector_hash_lock_sha256() {
        assert_eq!(
            compute_hash_lock(&[0u8; 32]),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
        assert_eq!(
            compute_hash_lock(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            compute_hash_lock(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_vector_verify_secret_zero_bytes() {
        let secret = "00".repeat(32);
        let lock = "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925";
        assert!(verify_secret(&secret, lock));
        assert!(verify_secret(&format!("0x{secret}"), &format!("0x{lock}")));
        assert!(!verify_secret(&"00".repeat(31), lock));
    }

    // ==================== Commitment ====================

    /// Starknet poseidon_hash_many([1, 2])
    #[test]
    fn test_vector_starknet_poseidon_commitment() {
        let blinding = format!("0x{}02", "00".repeat(31));
        let commitment = generate_commitment("1", &blinding).unwrap();
        assert_eq!(
            commitment,
            Felt::from_hex("0x371cb6995ea5e7effcd2e174de264b5b407027a75a231a70c2c8d196107f0e7").unwrap()
        );
    }

    /// Scenario A amount with a short blinding factor
    #[test]
    fn test_vector_starknet_poseidon_ten_strk() {
        let blinding = format!("{}1234", "00".repeat(30));
        let commitment = generate_commitment("10000000000000000000", &blinding).unwrap();
        assert_eq!(
            commitment,
            Felt::from_hex("0x58e090e6475dc69f12f46f09adb52c1850c566f8b4590882b40a304a9e32879").unwrap()
        );
    }

    /// Blinding factors above the field prime are reduced before hashing
    #[test]
    fn test_vector_starknet_poseidon_reduces_blinding() {
        let commitment = generate_commitment("1", &"ff".repeat(32)).unwrap();
        assert_eq!(
            commitment,
            Felt::from_hex("0x16c1d5281e84dfd8385735a0351e0555c057eca7c66ecc9e51d63145b03f2cc").unwrap()
        );
    }

    #[test]
    fn test_commitment_amount_must_fit_felt() {
        assert!(generate_commitment(&U256::MAX.to_string(), &"01".repeat(32)).is_err());
    }

    /// circomlib Poseidon([1, 2]) =
    /// 0x115cc0f5e7d690413df64c6b9662e9cf2a3617f2743245519e19607a4417189a,
    /// masked to 251 bits
    #[test]
    fn test_vector_bn254_poseidon_commitment() {
        let blinding = Secret::from_hex(&format!("{}02", "00".repeat(31))).unwrap();
        let commitment = PoseidonBn254.commit(&U256::from(1u128), &blinding).unwrap();
        assert_eq!(
            commitment,
            Felt::from_hex("0x015cc0f5e7d690413df64c6b9662e9cf2a3617f2743245519e19607a4417189a").unwrap()
        );
    }

    // ==================== Felt / Selector ====================

    #[test]
    fn test_vector_entry_point_selectors() {
        assert_eq!(
            Felt::selector("transfer").to_hex(),
            "0x83afd3f4caedc6eebf44246fe54e38c95e3179a5ec9ea81740eca5b482d12e"
        );
        assert_eq!(
            Felt::selector("balanceOf").to_hex(),
            "0x2e4263afad30923c891518314c3c95dbe830a16874e8abc5777a9a20b54c76e"
        );
    }

    #[test]
    fn test_vector_felt_modulus() {
        // P - 1 is the largest field element
        assert!(Felt::from_hex("0x800000000000011000000000000000000000000000000000000000000000000").is_ok());
        assert!(Felt::from_hex("0x800000000000011000000000000000000000000000000000000000000000001").is_err());
    }

    // ==================== Request Signing ====================

    /// RFC 4231 test case 1, data split as timestamp || body
    #[test]
    fn test_vector_hmac_rfc4231_case_1() {
        let key = [0x0bu8; 20];
        assert_eq!(
            sign_request(&key, "Hi ", b"There").unwrap(),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }
}
