use anyhow::Context;

use clpool_bootstrap::bootstrap::AppState;
use clpool_bootstrap::config::Config;
use clpool_bootstrap::engine::diagnostics::DiagnosticEngine;
use clpool_bootstrap::engine::lifecycle::PoolLifecycleManager;
use clpool_bootstrap::engine::swap::SwapExecutor;
use clpool_bootstrap::models::{InitializeOutcome, SwapDirection};

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("bootstrap aborted: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    // Build application state
    let app = AppState::new(&config).context("failed to initialize application state")?;
    let session = &app.session;
    log::info!("signer {:?} on chain {}", session.account(), session.settings().chain_id);

    let lifecycle = PoolLifecycleManager::new(session);

    // 1. pool
    let descriptor = lifecycle
        .create_pool(app.token_a, app.token_b, app.fee_tier)
        .await
        .context("create pool")?;
    let pool = descriptor
        .address
        .context("factory returned no pool address")?;

    // 2. price
    match lifecycle
        .initialize_pool(pool, app.initial_sqrt_price_x96)
        .await
        .context("initialize pool")?
    {
        InitializeOutcome::AlreadyInitialized(state) => {
            log::info!("pool already priced at {:.8} (tick {})", state.price(), state.tick)
        }
        InitializeOutcome::Initialized { tx_hash, .. } => log::info!("initialize tx {tx_hash:?}"),
    }

    // 3. liquidity
    let mut position_id = app.position_id;
    if let Some((amount0, amount1)) = app.fund_amounts {
        let minted = lifecycle
            .add_full_range_liquidity(pool, amount0, amount1)
            .await
            .context("add full-range liquidity")?;
        log::info!(
            "position {} minted, boundary ticks initialized: {}/{}",
            minted.token_id,
            minted.lower_initialized,
            minted.upper_initialized
        );
        position_id = Some(minted.token_id);
    }

    // 4. test swap
    if let Some(amount_in) = app.swap_amount_in {
        if lifecycle.pool_has_liquidity(pool).await.context("check pool liquidity")? {
            let swap = SwapExecutor::new(session)
                .exact_input_single(pool, SwapDirection::ZeroForOne, amount_in)
                .await
                .context("test swap")?;
            log::info!("test swap {:?} mined in block {:?}", swap.tx_hash, swap.block_number);
        } else {
            log::warn!("skipping test swap: pool {pool:?} has no active liquidity");
        }
    }

    // 5. diagnosis
    let report = DiagnosticEngine::new(session)
        .run_full_diagnosis(pool, position_id, session.account())
        .await
        .context("diagnose pool")?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    // 6. history
    if session.settings().log_start_block > 0 {
        let events = session
            .events()
            .get_pool_activity(pool, None, None)
            .await
            .context("fetch pool events")?;
        log::info!("{} pool events since block {}", events.len(), session.settings().log_start_block);
        for event in &events {
            log::info!("  block {} {:?} {:?}", event.block_number, event.kind, event.tx_hash);
        }
    }

    Ok(())
}
