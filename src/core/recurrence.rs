#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RunningTotal;

impl RunningTotal {
    pub fn next(self, previous: f64, increment: f64) -> f64 {
        previous + increment
    }

    pub fn previous(self, current: f64, increment: f64) -> f64 {
        current - increment
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompoundedBalance {
    pub rate: f64,
}

impl CompoundedBalance {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn next(self, previous: f64, withdrawal: f64) -> f64 {
        (previous - withdrawal) * (1.0 + self.rate)
    }

    // A zero growth factor cannot be inverted and yields the withdrawal alone.
    pub fn previous(self, current: f64, withdrawal: f64) -> f64 {
        let growth = 1.0 + self.rate;
        if growth == 0.0 {
            return withdrawal;
        }
        current / growth + withdrawal
    }
}

pub fn previous_cumulative_expected_return(
    month: u32,
    current: f64,
    rental_gains: f64,
    monthly_rate: f64,
    downpayment: f64,
) -> f64 {
    match month {
        0 => 0.0,
        1 => downpayment,
        _ => CompoundedBalance::new(monthly_rate).previous(current, rental_gains),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "actual={actual}, expected={expected}"
        );
    }

    #[test]
    fn running_total_recovers_previous() {
        let total = RunningTotal;
        assert_approx(total.previous(1_250.0, 250.0), 1_000.0);
        assert_approx(total.next(1_000.0, 250.0), 1_250.0);
    }

    #[test]
    fn compounded_balance_inverts_growth() {
        let balance = CompoundedBalance::new(0.005);
        let current = balance.next(10_000.0, 200.0);
        assert_approx(current, 9_800.0 * 1.005);
        assert_approx(balance.previous(current, 200.0), 10_000.0);
    }

    #[test]
    fn compounded_balance_with_zero_growth_is_guarded() {
        let balance = CompoundedBalance::new(-1.0);
        assert_approx(balance.previous(500.0, 20.0), 20.0);
    }

    #[test]
    fn expected_return_start_of_month_special_cases() {
        assert_approx(previous_cumulative_expected_return(0, 123.0, 5.0, 0.01, 80_000.0), 0.0);
        assert_approx(
            previous_cumulative_expected_return(1, 123.0, 5.0, 0.01, 80_000.0),
            80_000.0,
        );
        assert_approx(
            previous_cumulative_expected_return(2, 101.0, 5.0, 0.01, 80_000.0),
            101.0 / 1.01 + 5.0,
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn running_total_round_trip(
            current in -1_000_000.0f64..1_000_000.0,
            increment in -50_000.0f64..50_000.0,
        ) {
            let total = RunningTotal;
            let previous = total.previous(current, increment);
            prop_assert!((total.next(previous, increment) - current).abs() <= EPS);
        }

        #[test]
        fn compounded_balance_round_trip(
            current in -1_000_000.0f64..1_000_000.0,
            withdrawal in -50_000.0f64..50_000.0,
            rate in -0.05f64..0.05,
        ) {
            let balance = CompoundedBalance::new(rate);
            let previous = balance.previous(current, withdrawal);
            prop_assert!((balance.next(previous, withdrawal) - current).abs() <= EPS);
        }
    }
}
