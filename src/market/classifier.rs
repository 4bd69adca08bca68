use crate::market::types::{DepthSnapshot, Trade, TradeRow, TradeSide};

/// Labels a trade price against the best bid/ask that were in force just before it.
pub fn classify(price: f64, best_bid: Option<f64>, best_ask: Option<f64>) -> TradeSide {
    if let Some(ask) = best_ask {
        if price >= ask {
            return TradeSide::Outer;
        }
    }
    if let Some(bid) = best_bid {
        if price <= bid {
            return TradeSide::Inner;
        }
    }
    TradeSide::Neutral
}

/// Classifies every trade against the latest snapshot strictly older than it.
///
/// Both slices must be sorted ascending by time. Trades are walked newest first
/// while a single cursor retreats through the depth history, so the whole pass
/// is linear. The output keeps the input order.
pub fn classify_trades(trades: &[TradeRow], depths: &[DepthSnapshot]) -> Vec<Trade> {
    let mut sides = vec![TradeSide::Neutral; trades.len()];
    // number of snapshots with timestamp < current trade time
    let mut preceding = depths.len();

    for (position, trade) in trades.iter().enumerate().rev() {
        while preceding > 0 && depths[preceding - 1].timestamp_us >= trade.time_us {
            preceding -= 1;
        }

        sides[position] = match preceding.checked_sub(1).map(|index| &depths[index]) {
            Some(depth) => classify(trade.price, depth.best_bid(), depth.best_ask()),
            None => TradeSide::Neutral,
        };
    }

    trades
        .iter()
        .zip(sides)
        .map(|(trade, side)| trade.classified(side))
        .collect()
}
