use std::collections::BTreeMap;

use super::metric::Metric;
use super::types::{InputParameters, MonthRecord, YearGroup};

pub const MAX_PROJECTION_YEARS: u32 = 100;

pub const CAPITAL_GAINS_INCLUSION_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct SaleFigures {
    home_value: f64,
    sales_fees: f64,
    capital_gains_tax: f64,
    sale_income: f64,
    sale_net: f64,
}

#[derive(Debug, Clone, Copy)]
struct MortgageMonth {
    principal_paid: f64,
    interest_paid: f64,
    principal_remaining: f64,
}

#[derive(Debug, Clone, Copy)]
struct ReturnFigures {
    cumulative_investment: f64,
    net_return: f64,
    return_percent: f64,
    return_comparison: f64,
}

pub fn monthly_payment(inputs: &InputParameters) -> f64 {
    let principal = inputs.loan_principal();
    let rate = inputs.monthly_interest_rate();
    let payments = f64::from(inputs.payment_count());
    if principal <= 0.0 || payments <= 0.0 {
        return 0.0;
    }
    if inputs.is_interest_only() {
        return principal * rate;
    }
    if inputs.annual_interest_rate() == 0.0 {
        return principal / payments;
    }
    let compounded = (1.0 + rate).powf(payments);
    principal * (rate * compounded) / (compounded - 1.0)
}

pub fn grown(base: f64, increase: f64, increases: u32) -> f64 {
    if increases == 0 {
        return base;
    }
    base * (1.0 + increase).powf(f64::from(increases))
}

// None until month 13.
pub fn increases_for_month(month: u32) -> u32 {
    month.saturating_sub(1) / 12
}

pub fn home_value(inputs: &InputParameters, month: u32) -> f64 {
    let price = inputs.purchase_price();
    if month == 0 {
        return price;
    }
    price * (1.0 + inputs.monthly_market_rate()).powf(f64::from(month))
}

pub fn capital_gains_tax(inputs: &InputParameters, home_value: f64, sales_fees: f64) -> f64 {
    let gain = home_value - inputs.purchase_price() - sales_fees;
    if gain <= 0.0 {
        return 0.0;
    }
    gain * CAPITAL_GAINS_INCLUSION_RATE * inputs.marginal_tax_rate()
}

fn sale_figures(inputs: &InputParameters, month: u32, principal_remaining: f64) -> SaleFigures {
    let home_value = home_value(inputs, month);
    let sales_fees = home_value * inputs.commission_rate();
    let capital_gains_tax = capital_gains_tax(inputs, home_value, sales_fees);
    let sale_income = home_value - sales_fees - capital_gains_tax;
    SaleFigures {
        home_value,
        sales_fees,
        capital_gains_tax,
        sale_income,
        sale_net: sale_income - principal_remaining,
    }
}

fn return_figures(
    downpayment: f64,
    sale_net: f64,
    cumulative_rental_gains: f64,
    cumulative_expected_return: f64,
) -> ReturnFigures {
    let cumulative_investment = downpayment + (-cumulative_rental_gains).max(0.0);
    let net_return = (sale_net - downpayment) + cumulative_rental_gains.max(0.0);
    let return_percent = if cumulative_investment > 0.0 {
        net_return / cumulative_investment
    } else {
        0.0
    };
    let return_comparison = if cumulative_expected_return == 0.0 {
        0.0
    } else {
        net_return / cumulative_expected_return
    };
    ReturnFigures {
        cumulative_investment,
        net_return,
        return_percent,
        return_comparison,
    }
}

fn mortgage_month(inputs: &InputParameters, remaining: f64, payment: f64) -> MortgageMonth {
    if remaining <= 0.0 {
        return MortgageMonth {
            principal_paid: 0.0,
            interest_paid: 0.0,
            principal_remaining: 0.0,
        };
    }
    let interest_paid = remaining * inputs.monthly_interest_rate();
    let principal_paid = if inputs.is_interest_only() {
        0.0
    } else {
        (payment - interest_paid).min(remaining)
    };
    MortgageMonth {
        principal_paid,
        interest_paid,
        principal_remaining: (remaining - principal_paid).max(0.0),
    }
}

pub fn run_projection(inputs: &InputParameters, num_years: u32) -> Vec<MonthRecord> {
    let num_years = num_years.min(MAX_PROJECTION_YEARS);
    let payment = monthly_payment(inputs);
    let downpayment = inputs.downpayment();
    let insurance = inputs.annual_insurance() / 12.0;
    let utilities = inputs.monthly_utilities();
    let repairs = inputs.annual_repairs() / 12.0;
    let marginal_rate = inputs.marginal_tax_rate();
    let expected_rate = inputs.monthly_expected_return_rate();

    let mut records = Vec::with_capacity(num_years as usize * 12 + 1);
    records.push(initial_record(inputs));

    let mut remaining = inputs.loan_principal();
    // Capital still working in the alternative investment: rental gains are
    // withdrawn from it, losses are topped up.
    let mut invested_alternative = downpayment;
    let mut cumulative_rental_gains = 0.0;
    let mut cumulative_expected_return = 0.0;

    for month in 1..=num_years * 12 {
        let mortgage = mortgage_month(inputs, remaining, payment);
        remaining = mortgage.principal_remaining;

        let increases = increases_for_month(month);
        let maintenance_fees = grown(
            inputs.maintenance_base(),
            inputs.maintenance_increase(),
            increases,
        );
        let property_tax = grown(
            inputs.property_tax_base(),
            inputs.property_tax_increase(),
            increases,
        ) / 12.0;
        let rental_income = grown(
            inputs.rental_income_base(),
            inputs.rental_increase(),
            increases,
        );

        let total_expenses =
            payment + maintenance_fees + property_tax + insurance + utilities + repairs;
        let deductible_expenses = mortgage.interest_paid
            + maintenance_fees
            + property_tax
            + insurance
            + utilities
            + repairs;
        let taxable_income = rental_income - deductible_expenses;
        let taxes_due = if taxable_income <= 0.0 {
            0.0
        } else {
            taxable_income * marginal_rate
        };
        let rental_gains = rental_income - total_expenses - taxes_due;
        cumulative_rental_gains += rental_gains;

        invested_alternative -= rental_gains;
        let expected_return = (invested_alternative + cumulative_expected_return) * expected_rate;
        cumulative_expected_return += expected_return;

        let sale = sale_figures(inputs, month, remaining);
        let returns = return_figures(
            downpayment,
            sale.sale_net,
            cumulative_rental_gains,
            cumulative_expected_return,
        );

        records.push(MonthRecord {
            month,
            year: Some((month - 1) / 12 + 1),
            principal_remaining: remaining,
            mortgage_payments: payment,
            principal_paid: mortgage.principal_paid,
            interest_paid: mortgage.interest_paid,
            maintenance_fees,
            property_tax,
            insurance_paid: insurance,
            utilities,
            repairs,
            total_expenses,
            deductible_expenses,
            rental_income,
            taxable_income,
            taxes_due,
            rental_gains,
            cumulative_rental_gains,
            cumulative_investment: returns.cumulative_investment,
            expected_return,
            cumulative_expected_return,
            home_value: sale.home_value,
            sales_fees: sale.sales_fees,
            capital_gains_tax: sale.capital_gains_tax,
            sale_income: sale.sale_income,
            sale_net: sale.sale_net,
            net_return: returns.net_return,
            return_percent: returns.return_percent * 100.0,
            return_comparison: returns.return_comparison,
            ..MonthRecord::default()
        });
    }

    records
}

fn initial_record(inputs: &InputParameters) -> MonthRecord {
    let principal = inputs.loan_principal();
    let downpayment = inputs.downpayment();
    let sale = sale_figures(inputs, 0, principal);
    let returns = return_figures(downpayment, sale.sale_net, 0.0, 0.0);
    MonthRecord {
        month: 0,
        year: None,
        principal_remaining: principal,
        cumulative_investment: returns.cumulative_investment,
        home_value: sale.home_value,
        sales_fees: sale.sales_fees,
        capital_gains_tax: sale.capital_gains_tax,
        sale_income: sale.sale_income,
        sale_net: sale.sale_net,
        net_return: returns.net_return,
        return_percent: returns.return_percent * 100.0,
        return_comparison: returns.return_comparison,
        ..MonthRecord::default()
    }
}

pub fn group_by_year(records: &[MonthRecord]) -> Vec<YearGroup> {
    let mut years: BTreeMap<u32, YearGroup> = BTreeMap::new();
    for record in records {
        if let Some(year) = record.year_number() {
            years.entry(year).or_default().push(record.clone());
        }
    }
    years
        .into_values()
        .map(|mut group| {
            group.sort_by_key(|record| record.month);
            group
        })
        .collect()
}

pub fn summarize_year(group: &[MonthRecord]) -> Option<MonthRecord> {
    let last = group.last()?;
    let mut summary = last.clone();
    summary.year = last.year_number();
    for metric in Metric::ALL {
        if metric.is_summed_in_summary() {
            let total = group.iter().map(|record| metric.value_in(record)).sum();
            metric.set_in(&mut summary, total);
        }
    }
    Some(summary)
}
