use crate::types::{Comparison, Direction};

/// Compare one metric across the two windows.
///
/// Zero-baseline policy: `(0, 0)` is flat with a 0% delta; `(n, 0)` with
/// `n > 0` has no defined percentage, so `delta_pct` is `None`, direction
/// is up, and the formatter reports the absolute current value instead.
/// Values are kept unrounded here; display rounding happens in the
/// formatter.
pub fn compare(metric_name: &str, current: u64, previous: u64) -> Comparison {
    let (delta_pct, direction) = if previous > 0 {
        let pct = (current as f64 - previous as f64) / previous as f64 * 100.0;
        let direction = if pct > 0.0 {
            Direction::Up
        } else if pct < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        };
        (Some(pct), direction)
    } else if current == 0 {
        (Some(0.0), Direction::Flat)
    } else {
        (None, Direction::Up)
    };

    Comparison {
        metric_name: metric_name.to_string(),
        current_value: current,
        previous_value: previous,
        delta_pct,
        direction,
    }
}
