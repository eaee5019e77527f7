//! In-memory ledger chain
//!
//! Executes the token and pool entry points this crate calls, with the same
//! revert behaviour a real deployment has. Used for offline demos and tests.
//! Fault hooks let tests inject transient read failures, capped approvals and
//! balance changes racing an approval.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::{Call, ExecutionStatus, FinalityStatus, LedgerAccount, LedgerReader, TxHash, TxReceipt};
use crate::amount::U256;
use crate::error::{ChainError, CryptoError};
use crate::felt::Felt;
use crate::merkle::CommitmentTree;

#[derive(Debug, Clone, Default)]
struct TokenState {
    balances: HashMap<Felt, U256>,
    allowances: HashMap<(Felt, Felt), U256>,
}

#[derive(Debug, Clone)]
struct PoolState {
    supported: HashSet<Felt>,
    balances: HashMap<Felt, U256>,
    tree: CommitmentTree,
    commitments: HashSet<Felt>,
    nullifiers: HashSet<Felt>,
}

/// Contract storage. Cloned per transaction so a revert leaves it untouched.
#[derive(Debug, Clone, Default)]
struct Contracts {
    tokens: HashMap<Felt, TokenState>,
    pools: HashMap<Felt, PoolState>,
}

#[derive(Debug, Clone, Copy)]
struct PendingBalanceChange {
    token: Felt,
    owner: Felt,
    balance: U256,
}

#[derive(Debug, Default)]
struct LedgerState {
    contracts: Contracts,
    receipts: HashMap<TxHash, TxReceipt>,
    executed: Vec<(Felt, Call)>,
    next_tx: u128,
    failing_reads: u32,
    malformed_receipts: u32,
    withhold_finality: bool,
    approval_cap: Option<U256>,
    after_next_approval: Option<PendingBalanceChange>,
}

/// Shared handle to one simulated chain
#[derive(Debug, Clone, Default)]
pub struct SimulatedLedger {
    state: Arc<Mutex<LedgerState>>,
}

/// A signing account on a [`SimulatedLedger`]
#[derive(Debug, Clone)]
pub struct SimulatedAccount {
    ledger: SimulatedLedger,
    address: Felt,
}

type Revert = String;

fn revert<T>(reason: &str) -> Result<T, Revert> {
    Err(reason.to_string())
}

fn arg(calldata: &[Felt], index: usize) -> Result<Felt, Revert> {
    calldata
        .get(index)
        .copied()
        .ok_or_else(|| "Input too short for arguments".to_string())
}

fn u256_arg(calldata: &[Felt], index: usize) -> Result<U256, Revert> {
    U256::from_felts(&arg(calldata, index)?, &arg(calldata, index + 1)?)
        .ok_or_else(|| "Failed to deserialize param: u256 limb out of range".to_string())
}

fn u256_words(value: U256) -> Vec<Felt> {
    let (low, high) = value.to_felts();
    vec![low, high]
}

impl Contracts {
    fn token(&self, address: &Felt) -> Result<&TokenState, Revert> {
        self.tokens
            .get(address)
            .ok_or_else(|| format!("Requested contract address {} is not deployed", address))
    }

    fn token_mut(&mut self, address: &Felt) -> Result<&mut TokenState, Revert> {
        self.tokens
            .get_mut(address)
            .ok_or_else(|| format!("Requested contract address {} is not deployed", address))
    }

    fn pool(&self, address: &Felt) -> Result<&PoolState, Revert> {
        self.pools
            .get(address)
            .ok_or_else(|| format!("Requested contract address {} is not deployed", address))
    }

    fn view(&self, call: &Call) -> Result<Vec<Felt>, Revert> {
        let data = &call.calldata;
        if self.tokens.contains_key(&call.contract_address) {
            let token = self.token(&call.contract_address)?;
            return match call.entry_point.as_str() {
                "balanceOf" | "balance_of" => {
                    let owner = arg(data, 0)?;
                    Ok(u256_words(token.balances.get(&owner).copied().unwrap_or_default()))
                }
                "allowance" => {
                    let key = (arg(data, 0)?, arg(data, 1)?);
                    Ok(u256_words(token.allowances.get(&key).copied().unwrap_or_default()))
                }
                other => revert(&format!("Entry point {} not found in contract", other)),
            };
        }

        let pool = self.pool(&call.contract_address)?;
        match call.entry_point.as_str() {
            "get_balance" => {
                let token = arg(data, 0)?;
                Ok(u256_words(pool.balances.get(&token).copied().unwrap_or_default()))
            }
            "get_current_root" => Ok(vec![pool.tree.root()]),
            "get_next_leaf_index" => Ok(vec![Felt::from(pool.tree.next_leaf_index() as u64)]),
            "is_token_supported" => Ok(vec![Felt::from(pool.supported.contains(&arg(data, 0)?))]),
            other => revert(&format!("Entry point {} not found in contract", other)),
        }
    }

    fn apply(&mut self, caller: Felt, call: &Call, approval_cap: Option<U256>) -> Result<(), Revert> {
        let data = &call.calldata;
        let target = call.contract_address;

        if self.tokens.contains_key(&target) {
            return match call.entry_point.as_str() {
                "approve" => {
                    let spender = arg(data, 0)?;
                    let requested = u256_arg(data, 1)?;
                    let granted = approval_cap.map_or(requested, |cap| requested.min(cap));
                    self.token_mut(&target)?.allowances.insert((caller, spender), granted);
                    Ok(())
                }
                "transfer" => {
                    let recipient = arg(data, 0)?;
                    let amount = u256_arg(data, 1)?;
                    self.move_tokens(&target, caller, recipient, amount)
                }
                other => revert(&format!("Entry point {} not found in contract", other)),
            };
        }

        match call.entry_point.as_str() {
            "deposit" => {
                let token = arg(data, 0)?;
                let commitment = arg(data, 1)?;
                let amount = u256_arg(data, 2)?;

                let pool = self.pool(&target)?;
                if !pool.supported.contains(&token) {
                    return revert("Pool: token not supported");
                }
                if amount.is_zero() {
                    return revert("Pool: amount must be positive");
                }
                if pool.commitments.contains(&commitment) {
                    return revert("Pool: commitment already exists");
                }

                // transferFrom(caller -> pool), spending the pool's allowance
                let token_state = self.token_mut(&token)?;
                let allowance = token_state.allowances.get(&(caller, target)).copied().unwrap_or_default();
                let remaining = allowance
                    .checked_sub(amount)
                    .ok_or_else(|| "ERC20: insufficient allowance".to_string())?;
                token_state.allowances.insert((caller, target), remaining);
                self.move_tokens(&token, caller, target, amount)?;

                let pool = self
                    .pools
                    .get_mut(&target)
                    .ok_or_else(|| "Pool: not deployed".to_string())?;
                let held = pool.balances.get(&token).copied().unwrap_or_default();
                let held = held
                    .checked_add(amount)
                    .ok_or_else(|| "Pool: balance overflow".to_string())?;
                pool.balances.insert(token, held);
                pool.commitments.insert(commitment);
                match pool.tree.insert(&commitment) {
                    Ok(Some(_)) => Ok(()),
                    Ok(None) => revert("Pool: merkle tree is full"),
                    Err(e) => revert(&e.to_string()),
                }
            }
            "withdraw" => {
                let token = arg(data, 0)?;
                let nullifier = arg(data, 1)?;
                let _recipient = arg(data, 2)?;
                match arg(data, 3)? {
                    tag if tag == Felt::ZERO => {}
                    tag if tag == Felt::ONE => {
                        arg(data, 4)?;
                    }
                    _ => return revert("Failed to deserialize param: invalid Option tag"),
                }

                let pool = self
                    .pools
                    .get_mut(&target)
                    .ok_or_else(|| format!("Requested contract address {} is not deployed", target))?;
                if !pool.supported.contains(&token) {
                    return revert("Pool: token not supported");
                }
                if !pool.nullifiers.insert(nullifier) {
                    return revert("Pool: nullifier already used");
                }
                Ok(())
            }
            other => revert(&format!("Entry point {} not found in contract", other)),
        }
    }

    fn move_tokens(&mut self, token: &Felt, from: Felt, to: Felt, amount: U256) -> Result<(), Revert> {
        let state = self.token_mut(token)?;
        let from_balance = state.balances.get(&from).copied().unwrap_or_default();
        let from_balance = from_balance
            .checked_sub(amount)
            .ok_or_else(|| "ERC20: insufficient balance".to_string())?;
        state.balances.insert(from, from_balance);

        let to_balance = state.balances.get(&to).copied().unwrap_or_default();
        let to_balance = to_balance
            .checked_add(amount)
            .ok_or_else(|| "ERC20: balance overflow".to_string())?;
        state.balances.insert(to, to_balance);
        Ok(())
    }
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: Felt) -> SimulatedAccount {
        SimulatedAccount {
            ledger: self.clone(),
            address,
        }
    }

    // ------------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------------

    pub async fn deploy_token(&self, token: Felt) {
        let mut state = self.state.lock().await;
        state.contracts.tokens.entry(token).or_default();
    }

    pub async fn deploy_pool(&self, pool: Felt, supported_tokens: &[Felt]) -> Result<(), CryptoError> {
        let tree = CommitmentTree::new()?;
        let mut state = self.state.lock().await;
        state.contracts.pools.insert(
            pool,
            PoolState {
                supported: supported_tokens.iter().copied().collect(),
                balances: HashMap::new(),
                tree,
                commitments: HashSet::new(),
                nullifiers: HashSet::new(),
            },
        );
        Ok(())
    }

    /// Set a token balance directly, deploying the token if needed
    pub async fn set_balance(&self, token: Felt, owner: Felt, balance: U256) {
        let mut state = self.state.lock().await;
        state.contracts.tokens.entry(token).or_default().balances.insert(owner, balance);
    }

    pub async fn set_allowance(&self, token: Felt, owner: Felt, spender: Felt, allowance: U256) {
        let mut state = self.state.lock().await;
        state
            .contracts
            .tokens
            .entry(token)
            .or_default()
            .allowances
            .insert((owner, spender), allowance);
    }

    // ------------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------------

    /// The next `n` view calls fail with a transport error
    pub async fn fail_next_reads(&self, n: u32) {
        self.state.lock().await.failing_reads = n;
    }

    /// The next `n` receipt lookups fail as if the node spoke another dialect
    pub async fn malform_next_receipts(&self, n: u32) {
        self.state.lock().await.malformed_receipts = n;
    }

    /// Transactions still execute but their receipts never reach finality
    pub async fn withhold_finality(&self, withhold: bool) {
        self.state.lock().await.withhold_finality = withhold;
    }

    /// Approvals grant at most `cap`, whatever was requested
    pub async fn cap_approvals(&self, cap: U256) {
        self.state.lock().await.approval_cap = Some(cap);
    }

    /// Once the next approval lands, overwrite `owner`'s balance of `token`
    pub async fn set_balance_after_next_approval(&self, token: Felt, owner: Felt, balance: U256) {
        self.state.lock().await.after_next_approval = Some(PendingBalanceChange { token, owner, balance });
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Every submitted call with its caller, reverted ones included
    pub async fn executed_calls(&self) -> Vec<(Felt, Call)> {
        self.state.lock().await.executed.clone()
    }

    pub async fn count_calls(&self, entry_point: &str) -> usize {
        self.state
            .lock()
            .await
            .executed
            .iter()
            .filter(|(_, call)| call.entry_point == entry_point)
            .count()
    }

    pub async fn pool_has_commitment(&self, pool: Felt, commitment: &Felt) -> bool {
        self.state
            .lock()
            .await
            .contracts
            .pools
            .get(&pool)
            .is_some_and(|p| p.commitments.contains(commitment))
    }

    async fn submit(&self, caller: Felt, calls: &[Call]) -> TxHash {
        let mut state = self.state.lock().await;
        state.next_tx += 1;
        let tx_hash = Felt::from_u128(0x5157_0000_0000 + state.next_tx);

        let approval_cap = state.approval_cap;
        let mut draft = state.contracts.clone();
        let outcome = calls
            .iter()
            .try_for_each(|call| draft.apply(caller, call, approval_cap));

        let execution = match outcome {
            Ok(()) => {
                state.contracts = draft;
                if calls.iter().any(|c| c.entry_point == "approve") {
                    if let Some(change) = state.after_next_approval.take() {
                        state
                            .contracts
                            .tokens
                            .entry(change.token)
                            .or_default()
                            .balances
                            .insert(change.owner, change.balance);
                    }
                }
                ExecutionStatus::Succeeded
            }
            Err(reason) => ExecutionStatus::Reverted { reason },
        };
        debug!(%tx_hash, ?execution, calls = calls.len(), "simulated transaction");

        state
            .executed
            .extend(calls.iter().map(|call| (caller, call.clone())));
        let finality = if state.withhold_finality {
            FinalityStatus::Received
        } else {
            FinalityStatus::AcceptedOnL2
        };
        state.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                finality,
                execution,
            },
        );
        tx_hash
    }
}

impl LedgerReader for SimulatedLedger {
    async fn call(&self, call: &Call) -> Result<Vec<Felt>, ChainError> {
        let mut state = self.state.lock().await;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(ChainError::Transport("simulated network failure".into()));
        }
        state
            .contracts
            .view(call)
            .map_err(|reason| ChainError::Reverted { reason })
    }

    async fn transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>, ChainError> {
        let mut state = self.state.lock().await;
        if state.malformed_receipts > 0 {
            state.malformed_receipts -= 1;
            return Err(ChainError::MalformedResponse(
                "unknown execution status \"PENDING_V2\"".into(),
            ));
        }
        Ok(state.receipts.get(tx_hash).cloned())
    }
}

impl SimulatedAccount {
    pub fn ledger(&self) -> &SimulatedLedger {
        &self.ledger
    }
}

impl LedgerAccount for SimulatedAccount {
    fn address(&self) -> Felt {
        self.address
    }

    async fn execute(&self, calls: &[Call]) -> Result<TxHash, ChainError> {
        Ok(self.ledger.submit(self.address, calls).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u128) -> Felt {
        Felt::from_u128(n)
    }

    fn u256_call(target: Felt, entry: &str, mut prefix: Vec<Felt>, amount: u128) -> Call {
        let (low, high) = U256::from(amount).to_felts();
        prefix.push(low);
        prefix.push(high);
        Call::new(target, entry, prefix)
    }

    #[tokio::test]
    async fn test_balance_and_allowance_views() {
        let ledger = SimulatedLedger::new();
        let (token, alice, pool) = (addr(0xa), addr(0x1), addr_pool());
        ledger.set_balance(token, alice, U256::from(100u128)).await;
        ledger.set_allowance(token, alice, pool, U256::from(50u128)).await;

        let balance = ledger.call(&Call::new(token, "balanceOf", vec![alice])).await.unwrap();
        assert_eq!(balance, vec![addr(100), Felt::ZERO]);
        let allowance = ledger.call(&Call::new(token, "allowance", vec![alice, pool])).await.unwrap();
        assert_eq!(allowance, vec![addr(50), Felt::ZERO]);
    }

    fn addr_pool() -> Felt {
        addr(0xb00)
    }

    #[tokio::test]
    async fn test_deposit_moves_funds_and_inserts_leaf() {
        let ledger = SimulatedLedger::new();
        let (token, alice, pool) = (addr(0xa), addr(0x1), addr_pool());
        ledger.set_balance(token, alice, U256::from(100u128)).await;
        ledger.deploy_pool(pool, &[token]).await.unwrap();
        let account = ledger.account(alice);

        let approve = u256_call(token, "approve", vec![pool], 80);
        let deposit = u256_call(pool, "deposit", vec![token, addr(0xc0)], 80);
        let tx = account.execute(&[approve, deposit]).await.unwrap();

        let receipt = ledger.transaction_receipt(&tx).await.unwrap().unwrap();
        assert_eq!(receipt.execution, ExecutionStatus::Succeeded);

        let pool_balance = ledger.call(&Call::new(pool, "get_balance", vec![token])).await.unwrap();
        assert_eq!(pool_balance[0], addr(80));
        let index = ledger.call(&Call::new(pool, "get_next_leaf_index", vec![])).await.unwrap();
        assert_eq!(index, vec![Felt::ONE]);
        assert!(ledger.pool_has_commitment(pool, &addr(0xc0)).await);
    }

    #[tokio::test]
    async fn test_reverted_transaction_changes_nothing() {
        let ledger = SimulatedLedger::new();
        let (token, alice, pool) = (addr(0xa), addr(0x1), addr_pool());
        ledger.set_balance(token, alice, U256::from(100u128)).await;
        ledger.deploy_pool(pool, &[token]).await.unwrap();
        let account = ledger.account(alice);

        // approval lands inside the same multicall, then the deposit overdraws
        let approve = u256_call(token, "approve", vec![pool], 500);
        let deposit = u256_call(pool, "deposit", vec![token, addr(0xc0)], 500);
        let tx = account.execute(&[approve, deposit]).await.unwrap();

        let receipt = ledger.transaction_receipt(&tx).await.unwrap().unwrap();
        assert_eq!(
            receipt.execution,
            ExecutionStatus::Reverted {
                reason: "ERC20: insufficient balance".into()
            }
        );
        let allowance = ledger.call(&Call::new(token, "allowance", vec![alice, pool])).await.unwrap();
        assert_eq!(allowance[0], Felt::ZERO);
    }

    #[tokio::test]
    async fn test_duplicate_commitment_reverts() {
        let ledger = SimulatedLedger::new();
        let (token, alice, pool) = (addr(0xa), addr(0x1), addr_pool());
        ledger.set_balance(token, alice, U256::from(100u128)).await;
        ledger.set_allowance(token, alice, pool, U256::from(100u128)).await;
        ledger.deploy_pool(pool, &[token]).await.unwrap();
        let account = ledger.account(alice);

        let deposit = u256_call(pool, "deposit", vec![token, addr(0xc0)], 10);
        account.execute(&[deposit.clone()]).await.unwrap();
        let tx = account.execute(&[deposit]).await.unwrap();

        let receipt = ledger.transaction_receipt(&tx).await.unwrap().unwrap();
        assert_eq!(
            receipt.execution,
            ExecutionStatus::Reverted {
                reason: "Pool: commitment already exists".into()
            }
        );
    }

    #[tokio::test]
    async fn test_nullifier_reuse_reverts() {
        let ledger = SimulatedLedger::new();
        let (token, alice, pool) = (addr(0xa), addr(0x1), addr_pool());
        ledger.deploy_token(token).await;
        ledger.deploy_pool(pool, &[token]).await.unwrap();
        let account = ledger.account(alice);

        let withdraw = Call::new(pool, "withdraw", vec![token, addr(0x99), alice, Felt::ZERO]);
        let first = account.execute(&[withdraw.clone()]).await.unwrap();
        let second = account.execute(&[withdraw]).await.unwrap();

        assert_eq!(
            ledger.transaction_receipt(&first).await.unwrap().unwrap().execution,
            ExecutionStatus::Succeeded
        );
        assert_eq!(
            ledger.transaction_receipt(&second).await.unwrap().unwrap().execution,
            ExecutionStatus::Reverted {
                reason: "Pool: nullifier already used".into()
            }
        );
    }

    #[tokio::test]
    async fn test_injected_read_faults() {
        let ledger = SimulatedLedger::new();
        let token = addr(0xa);
        ledger.deploy_token(token).await;
        ledger.fail_next_reads(1).await;

        let call = Call::new(token, "balanceOf", vec![addr(1)]);
        assert!(ledger.call(&call).await.unwrap_err().is_transient());
        assert!(ledger.call(&call).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_receipt_faults() {
        let ledger = SimulatedLedger::new();
        let token = addr(0xa);
        ledger.set_balance(token, addr(1), U256::from(10u128)).await;
        let account = ledger.account(addr(1));

        ledger.withhold_finality(true).await;
        let tx = account.execute(&[u256_call(token, "approve", vec![addr(2)], 5)]).await.unwrap();
        let receipt = ledger.transaction_receipt(&tx).await.unwrap().unwrap();
        assert_eq!(receipt.execution, ExecutionStatus::Succeeded);
        assert!(!receipt.is_final());

        ledger.malform_next_receipts(1).await;
        let err = ledger.transaction_receipt(&tx).await.unwrap_err();
        assert!(matches!(err, ChainError::MalformedResponse(_)));
        assert!(!err.is_transient());
        assert!(ledger.transaction_receipt(&tx).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_approval_cap() {
        let ledger = SimulatedLedger::new();
        let (token, alice, pool) = (addr(0xa), addr(0x1), addr_pool());
        ledger.deploy_token(token).await;
        ledger.cap_approvals(U256::from(10u128)).await;

        ledger
            .account(alice)
            .execute(&[u256_call(token, "approve", vec![pool], 80)])
            .await
            .unwrap();
        let allowance = ledger.call(&Call::new(token, "allowance", vec![alice, pool])).await.unwrap();
        assert_eq!(allowance[0], addr(10));
        assert_eq!(ledger.count_calls("approve").await, 1);
    }

    #[tokio::test]
    async fn test_unknown_contract_view_reverts() {
        let ledger = SimulatedLedger::new();
        let err = ledger
            .call(&Call::new(addr(0xdead), "get_current_root", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Reverted { .. }));
    }
}
