//! Property tests for exchange invariants.
//!
//! 1. Position state: entry price is zero exactly when the position is flat
//! 2. Order ids grow by one and history never shrinks
//! 3. A queued limit never executes on the tick it was placed

use barplay::config::ExchangeConfig;
use barplay::data::Bar;
use barplay::engine::Emulator;
use proptest::prelude::*;

fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((10.0..500.0_f64, 0.0..0.1_f64), 1..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(close, width)| {
                Bar::new(close, close * (1.0 + width), close * (1.0 - width), close).unwrap()
            })
            .collect()
    })
}

fn config(fee: f64, spread: Option<f64>) -> ExchangeConfig {
    ExchangeConfig {
        symbol: "enj".to_string(),
        start_usd: 1000.0,
        fee,
        slippage_pct: 0.0,
        spread_pct: spread,
    }
}

//one order-placement action between two steps, failures are expected and ignored
fn apply(emulator: &mut Emulator, action: u8, price: f64) {
    let exchange = emulator.exchange_mut();
    let _ = match action % 7 {
        0 => exchange.open_long(0.5).map(|_| ()),
        1 => exchange.open_short(0.5).map(|_| ()),
        2 => exchange.close_deal("").map(|_| ()),
        3 => exchange.long_limit(price, 1.0).map(|_| ()),
        4 => exchange.short_limit(price, 1.0).map(|_| ()),
        5 => exchange.close_limit(price, "", "").map(|_| ()),
        _ => {
            exchange.cancel_pending();
            Ok(())
        }
    };
}

proptest! {
    #[test]
    fn position_and_entry_price_agree(
        bars in arb_bars(),
        actions in prop::collection::vec(any::<u8>(), 40),
        fee in 0.0..0.01_f64,
    ) {
        let mut emulator = Emulator::new(&config(fee, None), bars).unwrap();
        let mut step = 0;
        while let Ok((bar, _)) = emulator.next() {
            apply(&mut emulator, actions[step % actions.len()], bar.average);
            step += 1;

            let balance = emulator.exchange().balance();
            prop_assert_eq!(balance.position == 0.0, balance.entry_price == 0.0);
            prop_assert!(balance.usd >= 0.0);
            prop_assert!(balance.short_cash >= 0.0);
            prop_assert!(balance.short_margin >= 0.0);
        }
    }

    #[test]
    fn order_ids_are_dense_and_history_grows(
        bars in arb_bars(),
        actions in prop::collection::vec(any::<u8>(), 40),
    ) {
        let mut emulator = Emulator::new(&config(0.001, Some(0.0)), bars).unwrap();
        let mut seen = 0;
        let mut step = 0;
        while let Ok((bar, executed)) = emulator.next() {
            let orders = emulator.exchange().orders();
            prop_assert!(orders.len() >= seen);
            for order in &executed {
                prop_assert!(order.tick > order.placed_tick);
            }

            apply(&mut emulator, actions[step % actions.len()], bar.average);
            step += 1;
            seen = emulator.exchange().orders().len();
        }

        let ids: Vec<u64> = emulator.exchange().orders().iter().map(|o| o.id).collect();
        let expected: Vec<u64> = (1..=ids.len() as u64).collect();
        prop_assert_eq!(ids, expected);
    }
}
