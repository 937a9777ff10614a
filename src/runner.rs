//! Run loops tying a timer, a provider and the strategy together.

use crate::adapters::backtest_timer::BacktestTimer;
use crate::adapters::provider::Provider;
use crate::domain::error::CandlebotError;
use crate::domain::market::Market;
use crate::domain::strategy::CrossoverStrategy;
use crate::ports::dataset_port::DatasetPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::timer_port::FrameTimer;
use tracing::{debug, info};

/// Replay every remaining frame and collect `(frame, output)` pairs.
///
/// Per step: pull, execute, record, then advance the provider before the
/// timer so both cursors point at the same frame on the next pull.
pub async fn run_backtest(
    strategy: &mut CrossoverStrategy,
    provider: &mut Provider,
    timer: &mut BacktestTimer,
) -> Result<Market, CandlebotError> {
    info!(start = timer.index(), "starting backtest");
    let mut result = Market::new();

    while let Some(frame) = timer.next_frame(&*provider).await? {
        debug!(timestamp = frame.timestamp, index = timer.index(), "tick");
        let output = strategy.execute(&*provider, &frame).await?;
        for t in &output.transactions {
            info!(
                timestamp = t.timestamp,
                symbol = %t.symbol,
                operation = %t.operation,
                "transaction"
            );
        }
        result.push_with_output(frame, output);
        provider.tick();
        timer.tick();
    }

    info!(frames = result.len(), "backtest finished");
    Ok(result)
}

/// Trade until the timer runs dry or something fails.
///
/// The interval timer never runs dry, so in practice this returns only on
/// error. With a recorder, every frame and output is written as it arrives.
pub async fn run_live(
    strategy: &mut CrossoverStrategy,
    provider: &dyn MarketDataPort,
    timer: &mut dyn FrameTimer,
    recorder: Option<&dyn DatasetPort>,
) -> Result<(), CandlebotError> {
    info!(
        symbols = strategy.config().symbols.len(),
        timeframe_minutes = strategy.config().timeframe_minutes,
        "starting live loop"
    );

    while let Some(frame) = timer.next_frame(provider).await? {
        let output = strategy.execute(provider, &frame).await?;
        for t in &output.transactions {
            info!(
                timestamp = t.timestamp,
                symbol = %t.symbol,
                operation = %t.operation,
                notes = t.notes.as_deref().unwrap_or(""),
                "transaction"
            );
        }
        if let Some(recorder) = recorder {
            recorder.save_frame(&frame)?;
            recorder.save_output(&output)?;
        }
    }

    Ok(())
}
