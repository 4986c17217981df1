//! Exchange CLI.
//!
//! Connects to the wallet provider, binds the exchange deployed to its
//! network and either follows it or submits a single transaction.

mod config;
mod error;

use std::{process::exit, sync::Arc};

use alloy::primitives::TxHash;
use clap::Parser;
use exchange_client::{
    binding::{DeploymentManifest, RpcLoader},
    dispatch::Dispatcher,
    error::ExchangeError,
    num,
    session::{self, Session, SessionStatus},
    state::{AppState, StateUpdate, Store},
    types::{Order, OrderSide, Trade},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use url::Url;

use config::{CliConfig, EnvConfig, Request, TxRequest};

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();
    let request = match cli_config.command.to_request() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Invalid command: {}", e);
            exit(1);
        }
    };

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(env_config, request).await {
        error!(%e, "Exchange CLI encountered an error, shutting down");
        exit(1);
    }
}

async fn run(env_config: EnvConfig, request: Request) -> error::Result<()> {
    let node_url = Url::parse(&env_config.node_rpc_url)?;
    let signer = env_config.signer()?;
    let manifest = DeploymentManifest::from_file(&env_config.deployments_path)?;

    let store = Store::new();
    let watch = matches!(request, Request::Watch);
    tokio::spawn(log_updates(store.subscribe(), watch));

    let wallet = Arc::new(
        session::connect_wallet(&store, node_url, signer, env_config.poll_interval()).await?,
    );
    let loader = Arc::new(RpcLoader::new(wallet.provider().clone(), manifest));
    let mut session = Session::new(store.clone(), wallet, loader);

    if watch {
        session.run().await;
        return Ok(());
    }

    if session.update().await? == SessionStatus::Degraded {
        return Err(error::Error::NotReady);
    }
    let state = store.snapshot().await;

    match request {
        Request::Watch => {}
        Request::Balances => print_balances(&state),
        Request::Orders => print_orders(&state),
        Request::Submit(tx) => {
            let dispatcher = session.dispatcher().ok_or(error::Error::NotReady)?;
            let hash = submit(&dispatcher, tx).await?;
            println!("{hash}");
        }
    }

    session.release().await;
    Ok(())
}

async fn submit(dispatcher: &Dispatcher, tx: TxRequest) -> Result<TxHash, ExchangeError> {
    match tx {
        TxRequest::MakeOrder(order) => dispatcher.make_order(order).await,
        TxRequest::Cancel(id) => dispatcher.cancel_order(id).await,
        TxRequest::Fill(id) => dispatcher.fill_order(id).await,
        TxRequest::DepositEther(amount) => dispatcher.deposit_ether(amount).await,
        TxRequest::WithdrawEther(amount) => dispatcher.withdraw_ether(amount).await,
        TxRequest::DepositToken(amount) => dispatcher.deposit_token(amount).await,
        TxRequest::WithdrawToken(amount) => dispatcher.withdraw_token(amount).await,
    }
}

/// Logs alerts, and every other update in watch mode.
async fn log_updates(mut updates: broadcast::Receiver<StateUpdate>, verbose: bool) {
    loop {
        match updates.recv().await {
            Ok(StateUpdate::Alert(alert)) => warn!(%alert),
            Ok(StateUpdate::BalancesLoaded(balances)) if verbose => info!(%balances),
            Ok(StateUpdate::OrderMade(order)) if verbose => info!(
                id = %order.id(),
                side = %order.side(),
                amount = %token_amount(&order),
                price = %order.price(),
                "Order made"
            ),
            Ok(StateUpdate::OrderCancelled(order)) if verbose => {
                info!(id = %order.id(), "Order cancelled")
            }
            Ok(StateUpdate::OrderFilled(trade)) if verbose => info!(
                id = %trade.id(),
                filled_by = %trade.filled_by(),
                price = %trade.order().price(),
                "Order filled"
            ),
            Ok(update) if verbose => info!(?update),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "State updates lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn token_amount(order: &Order) -> fastnum::UD256 {
    num::Converter::wei().from_unsigned(order.token_amount())
}

fn print_balances(state: &AppState) {
    let [wallet_ether, wallet_token, exchange_ether, exchange_token] = state.balances().units();
    println!("\n{:=^60}", " BALANCES ");
    println!("{:<12} {:>22} {:>22}", "", "WALLET", "EXCHANGE");
    println!("{:-^60}", "");
    println!("{:<12} {:>22} {:>22}", "ETH", wallet_ether, exchange_ether);
    println!("{:<12} {:>22} {:>22}", "TOKEN", wallet_token, exchange_token);
    println!("{:=^60}", "");
}

fn print_orders(state: &AppState) {
    let orders = state.orders();
    let book = orders.order_book();

    println!("\n{:=^72}", " ORDER BOOK ");
    println!("{:^72}", "SELL");
    print_order_header();
    for order in &book.sell {
        print_order(order);
    }
    println!("{:^72}", "BUY");
    print_order_header();
    for order in &book.buy {
        print_order(order);
    }

    println!("\n{:=^72}", " TRADES ");
    match orders.last_price() {
        Some(price) => println!("Last price: {price}"),
        None => println!("No trades yet"),
    }
    println!("{:<8} {:<6} {:>22} {:>16} {:>14}", "ID", "SIDE", "AMOUNT", "PRICE", "TIME");
    println!("{:-^72}", "");
    for trade in orders.trade_history() {
        print_trade(trade);
    }

    if let Some(account) = state.account() {
        println!("\n{:=^72}", " MY OPEN ORDERS ");
        print_order_header();
        for order in orders.open_orders_of(account) {
            print_order(order);
        }

        println!("\n{:=^72}", " MY TRADES ");
        print_order_header();
        for trade in orders.trades_of(account) {
            if let Some(side) = trade.side_for(account) {
                print_row(trade.order(), side);
            }
        }
    }
}

fn print_order_header() {
    println!("{:<8} {:<6} {:>22} {:>16} {:>14}", "ID", "SIDE", "AMOUNT", "PRICE", "TIME");
    println!("{:-^72}", "");
}

fn print_order(order: &Order) {
    print_row(order, order.side());
}

fn print_row(order: &Order, side: OrderSide) {
    println!(
        "{:<8} {:<6} {:>22} {:>16} {:>14}",
        order.id(),
        side,
        token_amount(order),
        order.price(),
        order.timestamp()
    );
}

fn print_trade(trade: &Trade) {
    print_order(trade.order());
}
