// Net asset value against a baseline currency

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::balance::Balances;
use crate::error::{ReplayError, ReplayResult};

/// Currency NAV is measured in, with its amount at the start of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub ccy: String,
    pub initial: Decimal,
}

/// Pick the baseline: the designated currency if any, else the only initial currency.
/// Several initial currencies without a designation is rejected.
pub fn resolve_baseline(
    initial: &Balances,
    designated: Option<&str>,
) -> ReplayResult<Option<Baseline>> {
    if let Some(ccy) = designated {
        return Ok(Some(Baseline {
            ccy: ccy.to_string(),
            initial: initial.get(ccy).unwrap_or(Decimal::ZERO),
        }));
    }

    match initial.len() {
        0 => Ok(None),
        1 => Ok(initial.iter().next().map(|(ccy, amount)| Baseline {
            ccy: ccy.to_string(),
            initial: amount,
        })),
        _ => Err(ReplayError::AmbiguousBaseline(
            initial.currencies().map(str::to_string).collect(),
        )),
    }
}

/// Convert `amount` of `src` into `dst` through the latest `src_dst` (multiply)
/// or `dst_src` (divide) price. Unknown rates contribute zero.
pub fn convert<F>(amount: Decimal, src: &str, dst: &str, price_of: &F) -> Decimal
where
    F: Fn(&str) -> Option<Decimal>,
{
    if src == dst {
        return amount;
    }

    if let Some(px) = price_of(&format!("{}_{}", src, dst)) {
        return amount * px;
    }

    price_of(&format!("{}_{}", dst, src))
        .and_then(|px| amount.checked_div(px))
        .unwrap_or(Decimal::ZERO)
}

/// NAV = (balances + unrealized profit, in baseline) / initial baseline amount.
/// Without a baseline, or with a zero initial amount, NAV is 1.
pub fn nav<'a, I, F>(
    baseline: Option<&Baseline>,
    balances: &Balances,
    unrealized: I,
    price_of: F,
) -> Decimal
where
    I: IntoIterator<Item = (&'a str, Decimal)>,
    F: Fn(&str) -> Option<Decimal>,
{
    let Some(baseline) = baseline else {
        return Decimal::ONE;
    };
    if baseline.initial.is_zero() {
        return Decimal::ONE;
    }

    let mut total = Decimal::ZERO;
    for (ccy, amount) in balances.iter() {
        total += convert(amount, ccy, &baseline.ccy, &price_of);
    }
    for (ccy, amount) in unrealized {
        total += convert(amount, ccy, &baseline.ccy, &price_of);
    }

    total / baseline.initial
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn prices(pairs: &[(&str, Decimal)]) -> impl Fn(&str) -> Option<Decimal> {
        let map: HashMap<String, Decimal> =
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        move |id: &str| map.get(id).copied()
    }

    #[test]
    fn test_nav_single_currency() {
        let initial: Balances = [("usdt", dec!(1000))].into_iter().collect();
        let baseline = resolve_baseline(&initial, None).unwrap();
        let current: Balances = [("usdt", dec!(1100))].into_iter().collect();

        let value = nav(baseline.as_ref(), &current, std::iter::empty(), prices(&[]));
        assert_eq!(value, dec!(1.1));
    }

    #[test]
    fn test_nav_converts_both_directions() {
        let baseline = Baseline {
            ccy: "usdt".to_string(),
            initial: dec!(1000),
        };
        let current: Balances = [("usdt", dec!(500)), ("btc", dec!(0.01)), ("xyz", dec!(7))]
            .into_iter()
            .collect();
        let lookup = prices(&[("btc_usdt", dec!(50000))]);

        // xyz has no rate and contributes nothing
        let value = nav(Some(&baseline), &current, [("usdt", dec!(-100))], lookup);
        assert_eq!(value, dec!(0.9));

        let reverse = prices(&[("usdt_btc", dec!(0.00002))]);
        assert_eq!(convert(dec!(1), "btc", "usdt", &reverse), dec!(50000));
    }

    #[test]
    fn test_baseline_resolution() {
        let empty = Balances::new();
        assert!(resolve_baseline(&empty, None).unwrap().is_none());

        let two: Balances = [("usdt", dec!(1)), ("btc", dec!(1))].into_iter().collect();
        assert!(matches!(
            resolve_baseline(&two, None),
            Err(ReplayError::AmbiguousBaseline(_))
        ));

        let chosen = resolve_baseline(&two, Some("btc")).unwrap().unwrap();
        assert_eq!(chosen.initial, dec!(1));
    }

    #[test]
    fn test_zero_initial_is_unit_nav() {
        let baseline = Baseline {
            ccy: "usdt".to_string(),
            initial: Decimal::ZERO,
        };
        let current: Balances = [("usdt", dec!(10))].into_iter().collect();
        assert_eq!(nav(Some(&baseline), &current, std::iter::empty(), prices(&[])), Decimal::ONE);
    }
}
