//! Swap data model
//!
//! Tokens and pools, swap directions, and the relayer-authoritative status
//! state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::amount::U256;
use crate::error::TransitionError;
use crate::felt::Felt;

// ============================================================================
// Chains and Tokens
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Smart-contract chain hosting the privacy pools
    Starknet,
    /// Shielded-transaction chain
    Zcash,
}

impl Chain {
    pub fn is_ledger(&self) -> bool {
        matches!(self, Chain::Starknet)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Starknet => f.write_str("starknet"),
            Chain::Zcash => f.write_str("zcash"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    /// Token contract; private-chain assets have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Felt>,
    pub decimals: u32,
    pub chain: Chain,
}

impl Token {
    pub fn ledger(symbol: &str, name: &str, address: Felt, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address: Some(address),
            decimals,
            chain: Chain::Starknet,
        }
    }

    pub fn private(symbol: &str, name: &str, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address: None,
            decimals,
            chain: Chain::Zcash,
        }
    }
}

/// Known tokens, looked up by symbol (case-insensitive) or contract address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn by_address(&self, address: &Felt) -> Option<&Token> {
        self.tokens.iter().find(|t| t.address.as_ref() == Some(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// Tokens that live on the ledger chain
    pub fn ledger_tokens(&self) -> Vec<Token> {
        self.tokens.iter().filter(|t| t.chain.is_ledger()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        let addr = |hex: &str| Felt::from_hex(hex).unwrap_or_default();
        Self::new(vec![
            Token::ledger(
                "STRK",
                "Starknet Token",
                addr("0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d"),
                18,
            ),
            Token::ledger(
                "VEIL",
                "Veil Token",
                addr("0x02e90f89aecddf3f6b15bd52286a33c743b684fa8c17ed1d7ae57713a81459e1"),
                18,
            ),
            Token::ledger(
                "ETH",
                "Ether",
                addr("0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7"),
                18,
            ),
            Token::ledger(
                "USDC",
                "USD Coin",
                addr("0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8"),
                6,
            ),
            Token::ledger(
                "USDT",
                "Tether USD",
                addr("0x068f5c6a61780768455de69077e07e89787839bf8166decfbf92b645209c0fb8"),
                6,
            ),
            Token::ledger(
                "DAI",
                "Dai Stablecoin",
                addr("0x03fe2b97c1fd336e750087d68b9b867997fd64a2661ff3ca5a7c771641e8e7ac"),
                18,
            ),
            Token::private("ZEC", "Zcash", 8),
        ])
    }
}

// ============================================================================
// Pools
// ============================================================================

/// Pools trade settlement speed for anonymity-set size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoolId {
    #[default]
    Fast,
    Standard,
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolId::Fast => f.write_str("fast"),
            PoolId::Standard => f.write_str("standard"),
        }
    }
}

impl FromStr for PoolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(PoolId::Fast),
            "standard" => Ok(PoolId::Standard),
            other => Err(format!("unknown pool {other:?} (expected fast or standard)")),
        }
    }
}

/// Contract address of each pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAddresses {
    pub fast: Felt,
    pub standard: Felt,
}

impl PoolAddresses {
    pub fn address(&self, pool: PoolId) -> Felt {
        match pool {
            PoolId::Fast => self.fast,
            PoolId::Standard => self.standard,
        }
    }
}

impl Default for PoolAddresses {
    fn default() -> Self {
        Self {
            fast: Felt::from_hex("0x01749627bb08da4f8c3df6c55045ac429abdceada025262d4c51430d643db84e")
                .unwrap_or_default(),
            standard: Felt::from_hex("0x05cf3a281b3932cb4fec5648558c05fe796bd2d1b6e75554e3306c4849b82ed8")
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Direction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Deposit into a Starknet pool, receive on Zcash
    #[serde(rename = "starknet_to_zcash")]
    LedgerToPrivate,
    /// Send from Zcash, receive into a Starknet pool
    #[serde(rename = "zcash_to_starknet")]
    PrivateToLedger,
    /// Token-to-token through the pool, no HTLC
    #[serde(rename = "starknet_internal")]
    LedgerInternal,
}

impl SwapDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapDirection::LedgerToPrivate => "starknet_to_zcash",
            SwapDirection::PrivateToLedger => "zcash_to_starknet",
            SwapDirection::LedgerInternal => "starknet_internal",
        }
    }

    /// Whether the user funds a ledger-chain pool deposit
    pub fn has_ledger_deposit(&self) -> bool {
        !matches!(self, SwapDirection::PrivateToLedger)
    }

    pub fn is_cross_chain(&self) -> bool {
        !matches!(self, SwapDirection::LedgerInternal)
    }

    /// The only direction consistent with the chains of `from` and `to`
    pub fn for_tokens(from: &Token, to: &Token) -> Result<Self, String> {
        match (from.chain, to.chain) {
            (Chain::Starknet, Chain::Zcash) => Ok(SwapDirection::LedgerToPrivate),
            (Chain::Zcash, Chain::Starknet) => Ok(SwapDirection::PrivateToLedger),
            (Chain::Starknet, Chain::Starknet) => Ok(SwapDirection::LedgerInternal),
            (Chain::Zcash, Chain::Zcash) => Err(format!(
                "{} -> {} is private-to-private; nothing to swap through the pool",
                from.symbol, to.symbol
            )),
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starknet_to_zcash" => Ok(SwapDirection::LedgerToPrivate),
            "zcash_to_starknet" => Ok(SwapDirection::PrivateToLedger),
            "starknet_internal" => Ok(SwapDirection::LedgerInternal),
            other => Err(format!("unknown swap direction {other:?}")),
        }
    }
}

// ============================================================================
// Status State Machine
// ============================================================================

/// Relayer-reported swap status.
///
/// ```text
/// initiated -> locked -> redeemed
///     |          |
///     +----------+----> refunded | failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Initiated,
    Locked,
    Redeemed,
    Refunded,
    Failed,
}

impl SwapStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Redeemed | SwapStatus::Refunded | SwapStatus::Failed)
    }

    /// Only `redeemed` means the user got paid
    pub fn is_success(&self) -> bool {
        matches!(self, SwapStatus::Redeemed)
    }

    /// Whether `self -> next` is a legal forward move.
    ///
    /// `initiated -> redeemed` is allowed: polling can miss the `locked` window.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        use SwapStatus::*;
        match self {
            Initiated => matches!(next, Locked | Redeemed | Refunded | Failed),
            Locked => matches!(next, Redeemed | Refunded | Failed),
            Redeemed | Refunded | Failed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Initiated => "initiated",
            SwapStatus::Locked => "locked",
            SwapStatus::Redeemed => "redeemed",
            SwapStatus::Refunded => "refunded",
            SwapStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(SwapStatus::Initiated),
            "locked" => Ok(SwapStatus::Locked),
            "redeemed" => Ok(SwapStatus::Redeemed),
            "refunded" => Ok(SwapStatus::Refunded),
            "failed" => Ok(SwapStatus::Failed),
            other => Err(other.to_string()),
        }
    }
}

// ============================================================================
// Swap Intent
// ============================================================================

/// Client-side view of one swap. `commitment` and `hash_lock` never change;
/// `status` only follows what the relayer reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapIntent {
    pub swap_id: String,
    pub direction: SwapDirection,
    pub from_token: String,
    pub to_token: String,
    pub amount: U256,
    pub commitment: Felt,
    pub hash_lock: String,
    status: SwapStatus,
}

impl SwapIntent {
    pub fn new(
        swap_id: String,
        direction: SwapDirection,
        from_token: String,
        to_token: String,
        amount: U256,
        commitment: Felt,
        hash_lock: String,
    ) -> Self {
        Self {
            swap_id,
            direction,
            from_token,
            to_token,
            amount,
            commitment,
            hash_lock,
            status: SwapStatus::Initiated,
        }
    }

    pub fn status(&self) -> SwapStatus {
        self.status
    }

    /// Apply a status reported by the relayer.
    ///
    /// Returns whether the status changed. Reports that would leave a
    /// terminal state or move backwards are rejected and leave the intent as is.
    pub fn observe(&mut self, reported: SwapStatus) -> Result<bool, TransitionError> {
        if reported == self.status {
            return Ok(false);
        }
        if !self.status.can_transition_to(reported) {
            return Err(TransitionError {
                from: self.status,
                to: reported,
            });
        }
        self.status = reported;
        Ok(true)
    }

    /// Historical once terminal
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> SwapIntent {
        SwapIntent::new(
            "swap_1".into(),
            SwapDirection::LedgerToPrivate,
            "STRK".into(),
            "ZEC".into(),
            U256::from(10u128),
            Felt::from_u128(1),
            "00".repeat(32),
        )
    }

    #[test]
    fn test_direction_wire_names() {
        assert_eq!(
            serde_json::to_string(&SwapDirection::LedgerToPrivate).unwrap(),
            "\"starknet_to_zcash\""
        );
        assert_eq!("zcash_to_starknet".parse::<SwapDirection>().unwrap(), SwapDirection::PrivateToLedger);
        assert!(!SwapDirection::PrivateToLedger.has_ledger_deposit());
        assert!(SwapDirection::LedgerInternal.has_ledger_deposit());
    }

    #[test]
    fn test_direction_for_tokens() {
        let registry = TokenRegistry::default();
        let strk = registry.by_symbol("strk").unwrap();
        let veil = registry.by_symbol("VEIL").unwrap();
        let zec = registry.by_symbol("ZEC").unwrap();

        assert_eq!(SwapDirection::for_tokens(strk, zec).unwrap(), SwapDirection::LedgerToPrivate);
        assert_eq!(SwapDirection::for_tokens(zec, strk).unwrap(), SwapDirection::PrivateToLedger);
        assert_eq!(SwapDirection::for_tokens(strk, veil).unwrap(), SwapDirection::LedgerInternal);
        assert!(SwapDirection::for_tokens(zec, zec).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use SwapStatus::*;
        for terminal in [Redeemed, Refunded, Failed] {
            assert!(terminal.is_terminal());
            for next in [Initiated, Locked, Redeemed, Refunded, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Initiated.is_terminal());
        assert!(!Locked.is_terminal());
    }

    #[test]
    fn test_no_backwards_transition() {
        assert!(!SwapStatus::Locked.can_transition_to(SwapStatus::Initiated));
        assert!(SwapStatus::Initiated.can_transition_to(SwapStatus::Redeemed));
    }

    #[test]
    fn test_intent_observe() {
        let mut intent = intent();
        assert_eq!(intent.observe(SwapStatus::Initiated), Ok(false));
        assert_eq!(intent.observe(SwapStatus::Locked), Ok(true));
        assert_eq!(intent.observe(SwapStatus::Redeemed), Ok(true));
        assert!(intent.is_settled());

        let err = intent.observe(SwapStatus::Refunded).unwrap_err();
        assert_eq!(err.from, SwapStatus::Redeemed);
        assert_eq!(intent.status(), SwapStatus::Redeemed);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = TokenRegistry::default();
        let usdc = registry.by_symbol("USDC").unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(registry.by_address(usdc.address.as_ref().unwrap()).unwrap().symbol, "USDC");
        assert_eq!(registry.by_symbol("ZEC").unwrap().chain, Chain::Zcash);
        assert!(registry.by_symbol("DOGE").is_none());
        assert_eq!(registry.ledger_tokens().len(), 6);
    }

    #[test]
    fn test_pool_id_parse() {
        assert_eq!("Fast".parse::<PoolId>().unwrap(), PoolId::Fast);
        assert_eq!("standard".parse::<PoolId>().unwrap(), PoolId::Standard);
        assert!("slow".parse::<PoolId>().is_err());
    }
}
