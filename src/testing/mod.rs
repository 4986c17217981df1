//! In-memory testing environment.
//!
//! [`FakeChain`] plays the wallet, the deployment manifest and both contracts:
//! it implements [`Wallet`], [`ContractLoader`], [`TokenContract`] and
//! [`ExchangeContract`] over in-memory balances.
//!
//! Submitted transactions get a hash right away and stay pending until
//! [`FakeChain::mine`] executes them, emitting exchange events to the event
//! log and to live subscribers. Reverted transactions are skipped silently.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy::primitives::{Address, TxHash, U256, address, keccak256};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::{
    abi::ETHER_ADDRESS,
    binding::{ContractLoader, Contracts, EventStream, ExchangeContract, TokenContract},
    error::ExchangeError,
    num,
    session::Session,
    state::{StateUpdate, Store},
    types::{EventContext, EventKind, ExchangeEvent, Order, OrderId, OrderParams, Trade, Transfer},
    wallet::{Wallet, WalletNotification},
};

pub const TOKEN: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
pub const EXCHANGE: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
pub const FEE_ACCOUNT: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const ALICE: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const BOB: Address = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

/// Fee charged for filling an order, in wei.
pub const FILL_FEE: U256 = U256::from_limbs([1_000_000_000_000_000, 0, 0, 0]);

const GENESIS_TIMESTAMP: u64 = 1_600_000_000;
const BLOCK_TIME_SEC: u64 = 12;
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transaction submitted to the [`FakeChain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeCall {
    Approve {
        from: Address,
        spender: Address,
        amount: U256,
    },
    MakeOrder {
        from: Address,
        params: OrderParams,
    },
    CancelOrder {
        from: Address,
        id: OrderId,
    },
    FillOrder {
        from: Address,
        id: OrderId,
        fee: U256,
    },
    DepositEther {
        from: Address,
        amount: U256,
    },
    WithdrawEther {
        from: Address,
        amount: U256,
    },
    DepositToken {
        from: Address,
        token: Address,
        amount: U256,
    },
    WithdrawToken {
        from: Address,
        token: Address,
        amount: U256,
    },
}

/// In-memory chain with the token and exchange contracts deployed.
#[derive(Clone)]
pub struct FakeChain {
    inner: Arc<Inner>,
}

struct Inner {
    chain_id: AtomicU64,
    deployed_on: Mutex<HashSet<u64>>,
    account: Mutex<Option<Address>>,
    notifications: broadcast::Sender<WalletNotification>,

    native: DashMap<Address, U256>,
    tokens: DashMap<Address, U256>,
    allowances: DashMap<(Address, Address), U256>,
    deposits: DashMap<(Address, Address), U256>,
    orders: DashMap<OrderId, (Order, bool)>,
    order_count: AtomicU64,

    block_number: AtomicU64,
    nonce: AtomicU64,
    pending: Mutex<Vec<(TxHash, FakeCall)>>,
    sent: Mutex<Vec<(TxHash, FakeCall)>>,
    log: Mutex<Vec<EventContext<ExchangeEvent>>>,
    live: broadcast::Sender<EventContext<ExchangeEvent>>,

    fail_reads: AtomicBool,
    fail_sends: AtomicBool,
}

/// Token contract handle of the [`FakeChain`].
#[derive(Clone)]
pub struct FakeToken(FakeChain);

/// Exchange contract handle of the [`FakeChain`].
#[derive(Clone)]
pub struct FakeExchange(FakeChain);

impl FakeChain {
    /// Creates chain with contracts deployed to the network with given ID,
    /// with no account selected.
    pub fn new(chain_id: u64) -> Self {
        let (notifications, _) = broadcast::channel(16);
        let (live, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(Inner {
                chain_id: AtomicU64::new(chain_id),
                deployed_on: Mutex::new(HashSet::from([chain_id])),
                account: Mutex::new(None),
                notifications,
                native: DashMap::new(),
                tokens: DashMap::new(),
                allowances: DashMap::new(),
                deposits: DashMap::new(),
                orders: DashMap::new(),
                order_count: AtomicU64::new(0),
                block_number: AtomicU64::new(1),
                nonce: AtomicU64::new(0),
                pending: Mutex::new(vec![]),
                sent: Mutex::new(vec![]),
                log: Mutex::new(vec![]),
                live,
                fail_reads: AtomicBool::new(false),
                fail_sends: AtomicBool::new(false),
            }),
        }
    }

    /// Store, wallet and loader wired into a new session.
    pub fn session(&self, store: &Store) -> Session {
        Session::new(store.clone(), Arc::new(self.clone()), Arc::new(self.clone()))
    }

    pub fn contracts(&self) -> Contracts {
        Contracts {
            token: Arc::new(FakeToken(self.clone())),
            exchange: Arc::new(FakeExchange(self.clone())),
        }
    }

    /// Selects the account without notifying.
    pub fn set_account(&self, account: Option<Address>) {
        *self.inner.account.lock().unwrap() = account;
    }

    /// Selects the account as the user would in the wallet.
    pub fn switch_account(&self, account: Option<Address>) {
        self.set_account(account);
        _ = self
            .inner
            .notifications
            .send(WalletNotification::AccountsChanged(account));
    }

    /// Switches network as the user would in the wallet.
    pub fn switch_network(&self, chain_id: u64) {
        self.inner.chain_id.store(chain_id, Ordering::SeqCst);
        _ = self
            .inner
            .notifications
            .send(WalletNotification::ChainChanged(chain_id));
    }

    pub fn deploy_on(&self, chain_id: u64) {
        self.inner.deployed_on.lock().unwrap().insert(chain_id);
    }

    /// Sets wallet balances of the account in whole units.
    pub fn fund(&self, account: Address, ether: u64, tokens: u64) {
        self.inner.native.insert(account, units(ether));
        self.inner.tokens.insert(account, units(tokens));
    }

    /// Makes all balance and event log reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes all transaction submissions fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Transactions submitted so far, in submission order.
    pub fn sent(&self) -> Vec<(TxHash, FakeCall)> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }

    /// Number of live exchange event streams.
    pub fn live_subscribers(&self) -> usize {
        self.inner.live.receiver_count()
    }

    pub fn exchange_balance(&self, token: Address, user: Address) -> U256 {
        balance(&self.inner.deposits, (token, user))
    }

    /// Executes pending transactions in a new block, returning the number of
    /// transactions that did not revert.
    pub fn mine(&self) -> usize {
        let pending = std::mem::take(&mut *self.inner.pending.lock().unwrap());
        let block_number = self.inner.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = GENESIS_TIMESTAMP + block_number * BLOCK_TIME_SEC;
        let mut executed = 0;
        let mut log_index = 0;
        for (tx_hash, call) in pending {
            match self.execute(&call, timestamp) {
                Ok(event) => {
                    executed += 1;
                    if let Some(event) = event {
                        self.emit(EventContext::new(tx_hash, block_number, log_index, event));
                        log_index += 1;
                    }
                }
                Err(reason) => debug!(%tx_hash, ?call, reason, "Transaction reverted"),
            }
        }
        executed
    }

    /// Appends the event to the log and delivers it to live subscribers.
    pub fn emit(&self, event: EventContext<ExchangeEvent>) {
        let mut log = self.inner.log.lock().unwrap();
        log.push(event.clone());
        // Nobody may be subscribed
        _ = self.inner.live.send(event);
    }

    /// Number of the last mined block.
    pub fn block_number(&self) -> u64 {
        self.inner.block_number.load(Ordering::SeqCst)
    }

    fn submit(&self, call: FakeCall) -> Result<TxHash, ExchangeError> {
        if self.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(ExchangeError::Transport(
                "user rejected transaction".to_string(),
            ));
        }
        let nonce = self.inner.nonce.fetch_add(1, Ordering::SeqCst);
        let hash = keccak256(nonce.to_be_bytes());
        self.inner.pending.lock().unwrap().push((hash, call.clone()));
        self.inner.sent.lock().unwrap().push((hash, call));
        Ok(hash)
    }

    fn read<T>(&self, value: impl FnOnce() -> T) -> Result<T, ExchangeError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(ExchangeError::Transport("header not found".to_string()));
        }
        Ok(value())
    }

    fn execute(
        &self,
        call: &FakeCall,
        timestamp: u64,
    ) -> Result<Option<ExchangeEvent>, &'static str> {
        let inner = &self.inner;
        match call {
            FakeCall::Approve {
                from,
                spender,
                amount,
            } => {
                inner.allowances.insert((*from, *spender), *amount);
                Ok(None)
            }
            FakeCall::DepositEther { from, amount } => {
                debit(&inner.native, *from, *amount)?;
                let balance = credit(&inner.deposits, (ETHER_ADDRESS, *from), *amount);
                Ok(Some(ExchangeEvent::Deposit(Transfer {
                    token: ETHER_ADDRESS,
                    user: *from,
                    amount: *amount,
                    balance,
                })))
            }
            FakeCall::WithdrawEther { from, amount } => {
                debit(&inner.deposits, (ETHER_ADDRESS, *from), *amount)?;
                credit(&inner.native, *from, *amount);
                Ok(Some(ExchangeEvent::Withdraw(Transfer {
                    token: ETHER_ADDRESS,
                    user: *from,
                    amount: *amount,
                    balance: balance(&inner.deposits, (ETHER_ADDRESS, *from)),
                })))
            }
            FakeCall::DepositToken {
                from,
                token,
                amount,
            } => {
                if *token != TOKEN {
                    return Err("unknown token");
                }
                debit(&inner.allowances, (*from, EXCHANGE), *amount)?;
                debit(&inner.tokens, *from, *amount)?;
                let balance = credit(&inner.deposits, (*token, *from), *amount);
                Ok(Some(ExchangeEvent::Deposit(Transfer {
                    token: *token,
                    user: *from,
                    amount: *amount,
                    balance,
                })))
            }
            FakeCall::WithdrawToken {
                from,
                token,
                amount,
            } => {
                debit(&inner.deposits, (*token, *from), *amount)?;
                credit(&inner.tokens, *from, *amount);
                Ok(Some(ExchangeEvent::Withdraw(Transfer {
                    token: *token,
                    user: *from,
                    amount: *amount,
                    balance: balance(&inner.deposits, (*token, *from)),
                })))
            }
            FakeCall::MakeOrder { from, params } => {
                let id = U256::from(inner.order_count.fetch_add(1, Ordering::SeqCst) + 1);
                let order = Order::new(
                    id,
                    *from,
                    params.token_get,
                    params.amount_get,
                    params.token_give,
                    params.amount_give,
                    timestamp,
                );
                inner.orders.insert(id, (order.clone(), false));
                Ok(Some(ExchangeEvent::Order(order)))
            }
            FakeCall::CancelOrder { from, id } => {
                let mut entry = inner.orders.get_mut(id).ok_or("order not found")?;
                let (order, closed) = entry.value_mut();
                if *closed {
                    return Err("order closed");
                }
                if order.trader() != *from {
                    return Err("not the order owner");
                }
                *closed = true;
                Ok(Some(ExchangeEvent::Cancel(order.clone())))
            }
            FakeCall::FillOrder { from, id, fee } => {
                let order = match inner.orders.get(id) {
                    Some(entry) if !entry.1 => entry.0.clone(),
                    Some(_) => return Err("order closed"),
                    None => return Err("order not found"),
                };
                if *fee != FILL_FEE {
                    return Err("fee mismatch");
                }
                if balance(&inner.deposits, (order.token_get(), *from)) < order.amount_get()
                    || balance(&inner.deposits, (order.token_give(), order.trader()))
                        < order.amount_give()
                {
                    return Err("insufficient balance");
                }
                debit(&inner.native, *from, *fee)?;
                credit(&inner.native, FEE_ACCOUNT, *fee);
                debit(&inner.deposits, (order.token_get(), *from), order.amount_get())?;
                credit(
                    &inner.deposits,
                    (order.token_get(), order.trader()),
                    order.amount_get(),
                );
                debit(
                    &inner.deposits,
                    (order.token_give(), order.trader()),
                    order.amount_give(),
                )?;
                credit(&inner.deposits, (order.token_give(), *from), order.amount_give());
                if let Some(mut entry) = inner.orders.get_mut(id) {
                    entry.1 = true;
                }
                Ok(Some(ExchangeEvent::Trade(Trade::new(
                    Order::new(
                        order.id(),
                        order.trader(),
                        order.token_get(),
                        order.amount_get(),
                        order.token_give(),
                        order.amount_give(),
                        timestamp,
                    ),
                    *from,
                ))))
            }
        }
    }
}

/// Whole units to 18-decimal fixed point.
pub fn units(value: u64) -> U256 {
    U256::from(value) * U256::from(10).pow(U256::from(num::ETHER_DECIMALS))
}

/// Waits for the next update matching the predicate, skipping others.
///
/// # Panics
///
/// If no such update arrives in time.
pub async fn wait_for(
    updates: &mut broadcast::Receiver<StateUpdate>,
    predicate: impl Fn(&StateUpdate) -> bool,
) -> StateUpdate {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            match updates.recv().await {
                Ok(update) if predicate(&update) => return update,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("store closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for state update")
}

/// Updates published so far and not yet received.
pub fn drain(updates: &mut broadcast::Receiver<StateUpdate>) -> Vec<StateUpdate> {
    let mut drained = vec![];
    while let Ok(update) = updates.try_recv() {
        drained.push(update);
    }
    drained
}

fn balance<K: std::hash::Hash + Eq>(map: &DashMap<K, U256>, key: K) -> U256 {
    map.get(&key).map(|v| *v).unwrap_or_default()
}

fn credit<K: std::hash::Hash + Eq>(map: &DashMap<K, U256>, key: K, amount: U256) -> U256 {
    let mut entry = map.entry(key).or_default();
    *entry += amount;
    *entry
}

fn debit<K: std::hash::Hash + Eq>(
    map: &DashMap<K, U256>,
    key: K,
    amount: U256,
) -> Result<(), &'static str> {
    let mut entry = map.entry(key).or_default();
    if *entry < amount {
        return Err("insufficient balance");
    }
    *entry -= amount;
    Ok(())
}

#[async_trait]
impl Wallet for FakeChain {
    async fn current_account(&self) -> Result<Option<Address>, ExchangeError> {
        Ok(*self.inner.account.lock().unwrap())
    }

    async fn current_network(&self) -> Result<u64, ExchangeError> {
        self.read(|| self.inner.chain_id.load(Ordering::SeqCst))
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ExchangeError> {
        self.read(|| balance(&self.inner.native, account))
    }

    fn notifications(&self) -> broadcast::Receiver<WalletNotification> {
        self.inner.notifications.subscribe()
    }
}

impl ContractLoader for FakeChain {
    fn load(&self, chain_id: u64) -> Option<Contracts> {
        self.inner
            .deployed_on
            .lock()
            .unwrap()
            .contains(&chain_id)
            .then(|| self.contracts())
    }
}

#[async_trait]
impl TokenContract for FakeToken {
    fn address(&self) -> Address {
        TOKEN
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, ExchangeError> {
        self.0.read(|| balance(&self.0.inner.tokens, owner))
    }

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::Approve {
            from,
            spender,
            amount,
        })
    }
}

#[async_trait]
impl ExchangeContract for FakeExchange {
    fn address(&self) -> Address {
        EXCHANGE
    }

    async fn balance_of(&self, token: Address, user: Address) -> Result<U256, ExchangeError> {
        self.0.read(|| self.0.exchange_balance(token, user))
    }

    async fn calc_fee(&self, _from: Address) -> Result<U256, ExchangeError> {
        self.0.read(|| FILL_FEE)
    }

    async fn make_order(
        &self,
        from: Address,
        params: OrderParams,
    ) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::MakeOrder { from, params })
    }

    async fn cancel_order(&self, from: Address, id: OrderId) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::CancelOrder { from, id })
    }

    async fn fill_order(
        &self,
        from: Address,
        id: OrderId,
        fee: U256,
    ) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::FillOrder { from, id, fee })
    }

    async fn deposit_ether(&self, from: Address, amount: U256) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::DepositEther { from, amount })
    }

    async fn withdraw_ether(&self, from: Address, amount: U256) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::WithdrawEther { from, amount })
    }

    async fn deposit_token(
        &self,
        from: Address,
        token: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::DepositToken {
            from,
            token,
            amount,
        })
    }

    async fn withdraw_token(
        &self,
        from: Address,
        token: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError> {
        self.0.submit(FakeCall::WithdrawToken {
            from,
            token,
            amount,
        })
    }

    async fn block_number(&self) -> Result<u64, ExchangeError> {
        self.0.read(|| self.0.block_number())
    }

    async fn past_events(
        &self,
        kind: EventKind,
        to_block: u64,
    ) -> Result<Vec<EventContext<ExchangeEvent>>, ExchangeError> {
        self.0.read(|| {
            self.0
                .inner
                .log
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.event().kind() == kind && e.block_number() <= to_block)
                .cloned()
                .collect()
        })
    }

    async fn events(&self, from_block: u64) -> Result<EventStream, ExchangeError> {
        // Holding the log keeps backlog and live deliveries disjoint
        let (backlog, rx) = {
            let log = self.0.inner.log.lock().unwrap();
            let backlog = log
                .iter()
                .filter(|e| e.block_number() >= from_block)
                .cloned()
                .map(Ok::<_, ExchangeError>)
                .collect::<Vec<_>>();
            (backlog, self.0.inner.live.subscribe())
        };
        let live = futures::stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.block_number() >= from_block => {
                        return Some((Ok::<_, ExchangeError>(event), rx));
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(futures::stream::iter(backlog).chain(live).boxed())
    }
}
