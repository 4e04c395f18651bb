//! ADX, the Average Directional Index (Wilder).
//!
//! 1. +DM / -DM from consecutive bars
//! 2. Wilder-smooth +DM, -DM and TR (alpha = 1/period)
//! 3. ±DI = 100 * smoothed(±DM) / smoothed(TR)
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! First valid point sits at index 2 * period - 1.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, wilder_smooth};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Adx(period);
    let n = bars.len();
    if period == 0 || n < 2 {
        return IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint::invalid(b.timestamp))
                .collect(),
        };
    }

    let mut tr = vec![None; n];
    let mut plus_dm = vec![None; n];
    let mut minus_dm = vec![None; n];

    for i in 1..n {
        let (prev, bar) = (&bars[i - 1], &bars[i]);
        let up_move = bar.high - prev.high;
        let down_move = prev.low - bar.low;

        tr[i] = Some(bar.true_range(prev.close));
        plus_dm[i] = Some(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm[i] = Some(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let dx: Vec<Option<f64>> = (0..n)
        .map(|i| {
            let (atr, plus, minus) = (smooth_tr[i]?, smooth_plus[i]?, smooth_minus[i]?);
            if atr == 0.0 {
                return None;
            }
            let plus_di = 100.0 * plus / atr;
            let minus_di = 100.0 * minus / atr;
            let di_sum = plus_di + minus_di;
            Some(if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            })
        })
        .collect();

    let values = wilder_smooth(&dx, period)
        .into_iter()
        .zip(bars)
        .map(|(adx, bar)| match adx {
            Some(v) => IndicatorPoint::simple(bar.timestamp, v),
            None => IndicatorPoint::invalid(bar.timestamp),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
