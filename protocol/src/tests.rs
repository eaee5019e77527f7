//! Cross-module tests for the protocol core
//!
//! Tests cover:
//! - Pool ABI encoding of amounts and optional secrets
//! - Token registry and direction resolution
//! - Status reports flowing into swap intents

#[cfg(test)]
mod abi_tests {
    use crate::amount::{parse_units, U256};
    use crate::felt::Felt;
    use crate::pool::{approve_calldata, deposit_calldata, withdraw_calldata};

    #[test]
    fn test_deposit_calldata_scenario_a() {
        let token = Felt::from_u128(0xaa);
        let commitment = Felt::from_u128(0xcc);
        let amount = parse_units("10", 18).unwrap();

        let calldata = deposit_calldata(token, commitment, amount);
        assert_eq!(
            calldata,
            vec![token, commitment, Felt::from_u128(0x8ac7230489e80000), Felt::ZERO]
        );
    }

    #[test]
    fn test_withdraw_optional_secret_tagging() {
        let (token, nullifier, recipient) = (Felt::from_u128(1), Felt::from_u128(2), Felt::from_u128(3));

        let none = withdraw_calldata(token, nullifier, recipient, None);
        assert_eq!(none, vec![token, nullifier, recipient, Felt::ZERO]);

        let secret = Felt::from_u128(0x5ec);
        let some = withdraw_calldata(token, nullifier, recipient, Some(secret));
        assert_eq!(some, vec![token, nullifier, recipient, Felt::ONE, secret]);
    }

    #[test]
    fn test_approve_calldata_high_limb() {
        let amount = U256::from_limbs(5, 1);
        let spender = Felt::from_u128(0x900);
        let calldata = approve_calldata(spender, amount);
        assert_eq!(calldata, vec![spender, Felt::from_u128(5), Felt::ONE]);
        assert_eq!(U256::from_felts(&calldata[1], &calldata[2]), Some(amount));
    }
}

#[cfg(test)]
mod registry_tests {
    use crate::swap::{Chain, SwapDirection, TokenRegistry};

    #[test]
    fn test_default_registry_chains() {
        let registry = TokenRegistry::default();
        for symbol in ["STRK", "VEIL", "ETH", "USDC", "USDT", "DAI"] {
            let token = registry.by_symbol(symbol).unwrap();
            assert_eq!(token.chain, Chain::Starknet, "{symbol}");
            assert!(token.address.is_some(), "{symbol}");
        }
        let zec = registry.by_symbol("zec").unwrap();
        assert_eq!(zec.chain, Chain::Zcash);
        assert_eq!(zec.decimals, 8);
        assert!(zec.address.is_none());
    }

    #[test]
    fn test_direction_follows_token_chains() {
        let registry = TokenRegistry::default();
        let strk = registry.by_symbol("STRK").unwrap();
        let usdc = registry.by_symbol("USDC").unwrap();
        let zec = registry.by_symbol("ZEC").unwrap();

        assert_eq!(SwapDirection::for_tokens(strk, zec).unwrap(), SwapDirection::LedgerToPrivate);
        assert_eq!(SwapDirection::for_tokens(zec, strk).unwrap(), SwapDirection::PrivateToLedger);
        assert_eq!(SwapDirection::for_tokens(usdc, strk).unwrap(), SwapDirection::LedgerInternal);
        assert!(SwapDirection::for_tokens(zec, zec).is_err());
    }

    #[test]
    fn test_lookup_by_address() {
        let registry = TokenRegistry::default();
        let eth = registry.by_symbol("ETH").unwrap();
        let found = registry.by_address(&eth.address.unwrap()).unwrap();
        assert_eq!(found.symbol, "ETH");
    }
}

#[cfg(test)]
mod intent_tests {
    use crate::amount::U256;
    use crate::felt::Felt;
    use crate::relayer::{RelayerClient, SimulatedRelayer};
    use crate::swap::{SwapDirection, SwapIntent, SwapStatus};

    #[tokio::test]
    async fn test_reports_drive_intent_to_terminal() {
        let relayer = SimulatedRelayer::new();
        let swap_id = relayer
            .initiate_swap(&crate::relayer::InitiateSwapRequest {
                user_address: "0xfeedface".into(),
                swap_direction: SwapDirection::PrivateToLedger,
                commitment: "0x10".into(),
                hash_lock: "ef".repeat(32),
                starknet_amount: "0".into(),
                zcash_amount: "1".into(),
            })
            .await
            .unwrap();

        let mut intent = SwapIntent::new(
            swap_id.clone(),
            SwapDirection::PrivateToLedger,
            "ZEC".into(),
            "STRK".into(),
            U256::from(1u128),
            Felt::from_u128(0x10),
            "ef".repeat(32),
        );

        let mut changes = 0;
        for _ in 0..6 {
            let report = relayer.get_swap_status(&swap_id).await.unwrap();
            if intent.observe(report.status).unwrap() {
                changes += 1;
            }
        }
        assert_eq!(changes, 2);
        assert_eq!(intent.status(), SwapStatus::Redeemed);

        // settled intents refuse to move again
        assert!(intent.observe(SwapStatus::Locked).is_err());
        assert_eq!(intent.status(), SwapStatus::Redeemed);
    }
}
