use crate::types::{ItemConfig, NormalizedPrice, TrackingOutcome};

/// Decide what to do with a freshly extracted price, given the last recorded one.
///
/// Persist whenever the price is new or differs from the last record. Notify when the
/// price is at or below target and it either just crossed the target (no history, or the
/// previous price was above target) or dropped further while already below it.
/// Only `value` is compared; currency hints never influence the outcome.
pub fn decide(
    item: &ItemConfig,
    new_price: &NormalizedPrice,
    previous: Option<NormalizedPrice>,
) -> TrackingOutcome {
    let target = item.target_price;
    let new = new_price.value;

    let should_persist = previous.as_ref().map_or(true, |prev| prev.value != new);
    let should_notify = new <= target
        && previous
            .as_ref()
            .map_or(true, |prev| prev.value > target || new < prev.value);

    TrackingOutcome {
        item_name: item.name.clone(),
        new_price: new_price.clone(),
        previous_price: previous,
        should_persist,
        should_notify,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CompiledSelector;
    use crate::types::HistoryState;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn item(target: &str) -> ItemConfig {
        ItemConfig {
            name: "Kettle".to_string(),
            url: "https://shop.test/kettle".to_string(),
            selectors: vec![CompiledSelector::parse(".price").unwrap()],
            target_price: Decimal::from_str(target).unwrap(),
        }
    }

    fn price(v: &str) -> NormalizedPrice {
        NormalizedPrice::new(Decimal::from_str(v).unwrap())
    }

    fn flags(target: &str, new: &str, prev: Option<&str>) -> (bool, bool) {
        let out = decide(&item(target), &price(new), prev.map(price));
        (out.should_persist, out.should_notify)
    }

    #[test]
    fn first_observation_below_target_persists_and_notifies() {
        let out = decide(&item("100"), &price("95"), None);
        assert_eq!(out.state(), HistoryState::NoHistory);
        assert!(out.should_persist);
        assert!(out.should_notify);
    }

    #[test]
    fn renotify_boundary_at_target_100() {
        assert_eq!(flags("100", "90", None), (true, true));
        assert_eq!(flags("100", "90", Some("90")), (false, false));
        assert_eq!(flags("100", "95", Some("90")), (true, false));
    }

    #[test]
    fn first_observation_above_target_only_persists() {
        assert_eq!(flags("100", "150", None), (true, false));
    }

    #[test]
    fn unchanged_price_below_target_is_silent() {
        let out = decide(&item("100"), &price("95"), Some(price("95")));
        assert_eq!(out.state(), HistoryState::Unchanged);
        assert!(!out.should_persist);
        assert!(!out.should_notify);
    }

    #[test]
    fn crossing_the_target_notifies() {
        assert_eq!(flags("100", "95", Some("120")), (true, true));
    }

    #[test]
    fn exactly_at_target_counts_as_reached() {
        assert_eq!(flags("100", "100", Some("101")), (true, true));
        assert_eq!(flags("100", "100.00", None), (true, true));
    }

    #[test]
    fn further_drop_below_target_renotifies() {
        assert_eq!(flags("100", "80", Some("95")), (true, true));
    }

    #[test]
    fn rise_while_below_target_persists_without_notifying() {
        let out = decide(&item("100"), &price("95"), Some(price("90")));
        assert_eq!(out.state(), HistoryState::Changed);
        assert!(out.should_persist);
        assert!(!out.should_notify);
    }

    #[test]
    fn rise_above_target_is_silent() {
        assert_eq!(flags("100", "130", Some("95")), (true, false));
    }

    #[test]
    fn currency_hint_does_not_affect_the_decision() {
        let mut prev = price("95");
        prev.currency_hint = Some("USD".to_string());
        let mut new = price("95");
        new.currency_hint = Some("$".to_string());
        let out = decide(&item("100"), &new, Some(prev));
        assert!(!out.should_persist);
        assert!(!out.should_notify);
    }
}
