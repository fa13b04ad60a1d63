use super::breakdown::Breakdown;
use super::expression::{ExpressionBuilder, Operator};
use super::format::{format_count, format_currency, format_percent};
use super::metric::{Metric, SummaryPolicy, ValueFormat};
use super::projection::{CAPITAL_GAINS_INCLUSION_RATE, grown, monthly_payment};
use super::recurrence::{RunningTotal, previous_cumulative_expected_return};
use super::types::{InputParameters, MonthRecord};

const PREVIOUS_CUMULATIVE_EXPECTED_RETURN: &str = "Previous Cumulative Expected Return";
const MONTHLY_RATE: &str = "Monthly Rate (r)";
const PAYMENT_COUNT: &str = "Number of Payments (n)";

#[derive(Copy, Clone, Debug)]
pub struct Row<'a> {
    pub data: &'a MonthRecord,
    pub inputs: &'a InputParameters,
    group: Option<&'a [MonthRecord]>,
}

impl<'a> Row<'a> {
    pub fn new(
        data: &'a MonthRecord,
        inputs: &'a InputParameters,
        year_group: Option<&'a [MonthRecord]>,
    ) -> Self {
        Self {
            data,
            inputs,
            group: year_group.filter(|group| !group.is_empty()),
        }
    }

    pub fn year_group(&self) -> Option<&'a [MonthRecord]> {
        self.group
    }

    fn is_summary(&self) -> bool {
        self.group.is_some()
    }

    fn month_count(&self) -> u32 {
        self.group.map_or(1, |group| group.len() as u32)
    }

    fn first_record(&self) -> &'a MonthRecord {
        self.group.and_then(<[MonthRecord]>::first).unwrap_or(self.data)
    }

    fn final_record(&self) -> &'a MonthRecord {
        self.group.and_then(<[MonthRecord]>::last).unwrap_or(self.data)
    }

    fn year(&self) -> u32 {
        self.first_record()
            .year_number()
            .or_else(|| self.data.year_number())
            .unwrap_or(1)
    }

    fn total(&self, metric: Metric) -> f64 {
        match self.group {
            Some(group) => group.iter().map(|record| metric.value_in(record)).sum(),
            None => metric.value_in(self.data),
        }
    }

    fn total_source(&self, metric: Metric) -> String {
        match self.group {
            Some(group) => format!(
                "{} column (sum of {} months)",
                metric.display_name(),
                group.len()
            ),
            None => format!("{} column", metric.display_name()),
        }
    }

    // Illustrative totals would expand into a single month, so they stay inert.
    fn total_target(&self, metric: Metric) -> Option<Metric> {
        let illustrative = metric.summary_policy() == SummaryPolicy::Illustrative;
        (!self.is_summary() || !illustrative).then_some(metric)
    }

    fn final_target(&self, metric: Metric) -> Option<Metric> {
        let final_value = metric.summary_policy() == SummaryPolicy::FinalValue;
        (!self.is_summary() || final_value).then_some(metric)
    }

    fn final_qualifier(&self) -> &'static str {
        if self.is_summary() { " (final month)" } else { "" }
    }

    fn months_in_year(&self, builder: ExpressionBuilder) -> ExpressionBuilder {
        builder.op(Operator::Times).constant(
            "Number of Months",
            format_count(self.month_count()),
            format!("Months in Year {}", self.year()),
        )
    }
}

pub fn derive(metric: Metric, row: Row<'_>) -> Breakdown {
    match metric {
        Metric::MortgagePayments => mortgage_payments(row),
        Metric::PrincipalPaid => principal_paid(row),
        Metric::InterestPaid => interest_paid(row),
        Metric::PrincipalRemaining => principal_remaining(row),
        Metric::MaintenanceFees => grown_expense(
            row,
            Growth {
                base_label: "Base Maintenance",
                base_source: "Input: Monthly Base",
                base: row.inputs.maintenance_base(),
                increase: row.inputs.maintenance_increase(),
                increase_source: "Input: Maintenance Increase %",
                annual_base: false,
            },
        ),
        Metric::PropertyTax => grown_expense(
            row,
            Growth {
                base_label: "Base Property Tax",
                base_source: "Input: Annual Base",
                base: row.inputs.property_tax_base(),
                increase: row.inputs.property_tax_increase(),
                increase_source: "Input: Property Tax Increase %",
                annual_base: true,
            },
        ),
        Metric::RentalIncome => grown_expense(
            row,
            Growth {
                base_label: "Base Rent",
                base_source: "Input: Monthly Rental",
                base: row.inputs.rental_income_base(),
                increase: row.inputs.rental_increase(),
                increase_source: "Input: Rental Increase %",
                annual_base: false,
            },
        ),
        Metric::InsurancePaid => annual_input(
            row,
            "Annual Insurance",
            "Input: Annual Insurance",
            row.inputs.annual_insurance(),
        ),
        Metric::Repairs => annual_input(
            row,
            "Annual Repairs",
            "Input: Annual Repairs",
            row.inputs.annual_repairs(),
        ),
        Metric::Utilities => utilities(row),
        Metric::TotalExpenses => combine(
            row,
            &[
                (Operator::Plus, Metric::MortgagePayments, "Mortgage Payments"),
                (Operator::Plus, Metric::MaintenanceFees, "Maintenance"),
                (Operator::Plus, Metric::PropertyTax, "Property Tax"),
                (Operator::Plus, Metric::InsurancePaid, "Insurance"),
                (Operator::Plus, Metric::Utilities, "Utilities"),
                (Operator::Plus, Metric::Repairs, "Repairs"),
            ],
            Span::Year,
        ),
        Metric::DeductibleExpenses => combine(
            row,
            &[
                (Operator::Plus, Metric::InterestPaid, "Interest Paid"),
                (Operator::Plus, Metric::MaintenanceFees, "Maintenance"),
                (Operator::Plus, Metric::PropertyTax, "Property Tax"),
                (Operator::Plus, Metric::InsurancePaid, "Insurance"),
                (Operator::Plus, Metric::Utilities, "Utilities"),
                (Operator::Plus, Metric::Repairs, "Repairs"),
            ],
            Span::Year,
        ),
        Metric::TaxableIncome => combine(
            row,
            &[
                (Operator::Plus, Metric::RentalIncome, "Rental Income"),
                (Operator::Minus, Metric::DeductibleExpenses, "Deductible Expenses"),
            ],
            Span::Year,
        ),
        Metric::TaxesDue => taxes_due(row),
        Metric::RentalGains => combine(
            row,
            &[
                (Operator::Plus, Metric::RentalIncome, "Rental Income"),
                (Operator::Minus, Metric::TotalExpenses, "Total Expenses"),
                (Operator::Minus, Metric::TaxesDue, "Taxes Due"),
            ],
            Span::Year,
        ),
        Metric::CumulativeRentalGains => cumulative_rental_gains(row),
        Metric::CumulativeInvestment => cumulative_investment(row),
        Metric::ExpectedReturn => expected_return(row),
        Metric::CumulativeExpectedReturn => cumulative_expected_return(row),
        Metric::HomeValue => home_value(row),
        Metric::CapitalGainsTax => capital_gains_tax(row),
        Metric::SalesFees => sales_fees(row),
        Metric::SaleIncome => combine(
            row,
            &[
                (Operator::Plus, Metric::HomeValue, "Home Value"),
                (Operator::Minus, Metric::SalesFees, "Sales Fees"),
                (Operator::Minus, Metric::CapitalGainsTax, "Capital Gains Tax"),
            ],
            Span::FinalMonth,
        ),
        Metric::SaleNet => combine(
            row,
            &[
                (Operator::Plus, Metric::SaleIncome, "Sale Income"),
                (Operator::Minus, Metric::PrincipalRemaining, "Principal Remaining"),
            ],
            Span::FinalMonth,
        ),
        Metric::NetReturn => net_return(row),
        Metric::ReturnPercent => return_percent(row),
        Metric::ReturnComparison => return_comparison(row),
    }
}

fn money(value: f64) -> String {
    format_currency(value)
}

fn currency(builder: ExpressionBuilder, amount: f64) -> Breakdown {
    Breakdown::conclude(builder, amount, ValueFormat::Currency)
}

fn illustrate(row: Row<'_>, breakdown: Breakdown, metric: Metric, noun: &str) -> Breakdown {
    if !row.is_summary() {
        return breakdown;
    }
    let note = format!(
        "Note: This formula shows the calculation for the final month of the year for \
         illustrative purposes. The summary value is the sum of {noun} across all {} months.",
        row.month_count()
    );
    breakdown.illustrating(row.total(metric), note)
}

fn starting_value() -> Breakdown {
    currency(
        ExpressionBuilder::new().constant("Starting Value", money(0.0), "Month 0 (Initial State)"),
        0.0,
    )
}

fn start_of_month_principal(record: &MonthRecord, inputs: &InputParameters) -> (f64, bool) {
    let start = record.principal_remaining + record.principal_paid;
    if start.is_finite() {
        (start, false)
    } else {
        (inputs.loan_principal(), true)
    }
}

fn growth_increases(record: &MonthRecord) -> u32 {
    record.year_number().map_or(0, |year| year - 1)
}

fn apply(operator: Operator, left: f64, right: f64) -> f64 {
    match operator {
        Operator::Plus => left + right,
        Operator::Minus => left - right,
        Operator::Times => left * right,
        Operator::Divide if right == 0.0 => 0.0,
        Operator::Divide => left / right,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Span {
    Year,
    FinalMonth,
}

fn combine(row: Row<'_>, terms: &[(Operator, Metric, &str)], span: Span) -> Breakdown {
    let mut builder = ExpressionBuilder::new();
    let mut amount = 0.0;
    for (index, &(operator, metric, label)) in terms.iter().enumerate() {
        let (value, source, target) = match span {
            Span::Year => (
                row.total(metric),
                row.total_source(metric),
                row.total_target(metric),
            ),
            Span::FinalMonth => (
                metric.value_in(row.final_record()),
                format!("{} column", metric.display_name()),
                row.final_target(metric),
            ),
        };
        if index == 0 {
            amount = value;
        } else {
            builder = builder.op(operator);
            amount = apply(operator, amount, value);
        }
        builder = builder.column_as(target, label, money(value), source);
    }
    currency(builder, amount)
}

fn mortgage_payments(row: Row<'_>) -> Breakdown {
    let inputs = row.inputs;
    let principal = inputs.loan_principal();
    let annual_rate = inputs.annual_interest_rate();
    let rate = format_percent(inputs.monthly_interest_rate());
    let payments = format_count(inputs.payment_count());
    let principal_source = format!(
        "Purchase Price ({}) − Downpayment ({})",
        money(inputs.purchase_price()),
        format_percent(inputs.downpayment_fraction())
    );
    let rate_source = format!("Annual Rate ({}) ÷ 12", format_percent(annual_rate));
    let payments_source = format!("Loan Years ({}) × 12", inputs.loan_years());

    let mut builder = ExpressionBuilder::new()
        .text_if(row.is_summary(), "(")
        .input("Loan Principal", money(principal), principal_source);
    builder = if inputs.is_interest_only() {
        builder
            .op(Operator::Times)
            .input(MONTHLY_RATE, rate, rate_source)
    } else if annual_rate == 0.0 {
        builder
            .op(Operator::Divide)
            .input("Number of Payments", payments, payments_source)
    } else {
        builder
            .op(Operator::Times)
            .text("(")
            .input(MONTHLY_RATE, rate.clone(), rate_source.clone())
            .op(Operator::Times)
            .text("(1 + ")
            .input(MONTHLY_RATE, rate.clone(), rate_source.clone())
            .text(")^")
            .input(PAYMENT_COUNT, payments.clone(), payments_source.clone())
            .text(") ÷ (")
            .text("(1 + ")
            .input(MONTHLY_RATE, rate, rate_source)
            .text(")^")
            .input(PAYMENT_COUNT, payments, payments_source)
            .text(" − 1)")
    };
    builder = builder
        .text_if(row.is_summary(), ")")
        .text_if(inputs.is_interest_only(), " (interest only)");

    let payment = monthly_payment(inputs);
    if row.is_summary() {
        let builder = row.months_in_year(builder);
        currency(builder, payment * f64::from(row.month_count()))
    } else {
        currency(builder, payment)
    }
}

fn principal_paid(row: Row<'_>) -> Breakdown {
    let record = row.final_record();
    let qualifier = row.final_qualifier();
    let payment = Metric::MortgagePayments.value_in(record);
    let (start, _) = start_of_month_principal(record, row.inputs);
    let interest = start * row.inputs.monthly_interest_rate();
    let builder = ExpressionBuilder::new()
        .column_as(
            row.final_target(Metric::MortgagePayments),
            "Monthly Payment",
            money(payment),
            format!("Mortgage Payments column{qualifier}"),
        )
        .op(Operator::Minus)
        .column_as(
            row.final_target(Metric::InterestPaid),
            "Interest Paid",
            money(interest),
            format!("Interest Paid column{qualifier}"),
        );
    let scheduled = payment - interest;
    let (builder, amount) = if start <= 0.0 {
        (builder.text(" (loan paid off)"), 0.0)
    } else if scheduled > start {
        (builder.text(" (capped at remaining principal)"), start)
    } else {
        (builder, scheduled)
    };
    let breakdown = currency(builder, amount);
    illustrate(row, breakdown, Metric::PrincipalPaid, "principal paid")
}

fn interest_paid(row: Row<'_>) -> Breakdown {
    let record = row.final_record();
    let annual_rate = row.inputs.annual_interest_rate();
    let rate = row.inputs.monthly_interest_rate();
    let (start, fallback) = start_of_month_principal(record, row.inputs);
    let source = if fallback {
        "Initial Loan Amount".to_string()
    } else if row.is_summary() {
        "Principal Remaining column (final month, start of month)".to_string()
    } else {
        "Principal Remaining column (start of month)".to_string()
    };
    let builder = ExpressionBuilder::new()
        .derived("Principal Remaining", money(start), source)
        .op(Operator::Times)
        .input(
            "Monthly Interest Rate",
            format_percent(rate),
            format!("Interest Rate ({}) ÷ 12", format_percent(annual_rate)),
        );
    let breakdown = currency(builder, start * rate);
    illustrate(row, breakdown, Metric::InterestPaid, "interest paid")
}

fn principal_remaining(row: Row<'_>) -> Breakdown {
    let first = row.first_record();
    let (start, fallback) = start_of_month_principal(first, row.inputs);
    let paid = row.total(Metric::PrincipalPaid);
    let builder = match row.year_group() {
        Some(group) => ExpressionBuilder::new()
            .derived(
                "Principal at Start of Year",
                money(start),
                if fallback {
                    "Initial Loan Amount".to_string()
                } else {
                    format!("Principal Remaining column (start of Year {})", row.year())
                },
            )
            .op(Operator::Minus)
            .derived(
                "Total Principal Paid This Year",
                money(paid),
                format!("Principal Paid column (sum of {} months)", group.len()),
            ),
        None => ExpressionBuilder::new()
            .derived(
                "Principal at Start of Month",
                money(start),
                if fallback {
                    "Initial Loan Amount".to_string()
                } else {
                    format!("Start of Month {}", first.month)
                },
            )
            .op(Operator::Minus)
            .column(
                Metric::PrincipalPaid,
                "Principal Paid",
                money(paid),
                "Principal Paid column",
            ),
    };
    currency(builder, start - paid)
}

struct Growth {
    base_label: &'static str,
    base_source: &'static str,
    base: f64,
    increase: f64,
    increase_source: &'static str,
    annual_base: bool,
}

fn grown_expense(row: Row<'_>, growth: Growth) -> Breakdown {
    let increases = growth_increases(row.first_record());
    let per_month = grown(growth.base, growth.increase, increases)
        / if growth.annual_base { 12.0 } else { 1.0 };
    let wrap = growth.annual_base && increases > 0;

    let mut builder = ExpressionBuilder::new().text_if(wrap, "(").input(
        growth.base_label,
        money(growth.base),
        growth.base_source,
    );
    if increases > 0 {
        builder = builder
            .op(Operator::Times)
            .text("(1 + ")
            .input(
                "Yearly Increase Rate",
                format_percent(growth.increase),
                growth.increase_source,
            )
            .text(")^")
            .constant(
                "Number of Increases",
                format_count(increases),
                format!("Year {} (Year 1 has no increase)", increases + 1),
            );
    }
    builder = builder.text_if(wrap, ")");
    if growth.annual_base {
        builder = builder
            .op(Operator::Divide)
            .constant("12", "12".to_string(), "Months per Year");
    }

    if row.is_summary() {
        let builder = row.months_in_year(builder);
        currency(builder, per_month * f64::from(row.month_count()))
    } else {
        let builder = builder.text_if(increases == 0, " (Year 1, no increase)");
        currency(builder, per_month)
    }
}

fn annual_input(row: Row<'_>, label: &str, source: &str, annual: f64) -> Breakdown {
    let builder = ExpressionBuilder::new().input(label, money(annual), source);
    if row.is_summary() {
        return currency(builder, annual);
    }
    let builder = builder
        .op(Operator::Divide)
        .constant("12", "12".to_string(), "Months per Year");
    currency(builder, annual / 12.0)
}

fn utilities(row: Row<'_>) -> Breakdown {
    let monthly = row.inputs.monthly_utilities();
    let builder =
        ExpressionBuilder::new().input("Monthly Utilities", money(monthly), "Input: Monthly Utilities");
    if row.is_summary() {
        let builder = row.months_in_year(builder);
        currency(builder, monthly * f64::from(row.month_count()))
    } else {
        currency(builder, monthly)
    }
}

// Months with a loss contribute nothing to a summary.
fn taxes_due(row: Row<'_>) -> Breakdown {
    let rate = row.inputs.marginal_tax_rate();
    let (taxable, target, source) = match row.year_group() {
        Some(group) => {
            let monthly = || group.iter().map(|r| Metric::TaxableIncome.value_in(r));
            let taxed: f64 = monthly().map(|value| value.max(0.0)).sum();
            if monthly().any(|value| value < 0.0) {
                let source = format!(
                    "Taxable Income column (sum of {} months, months with a loss excluded)",
                    group.len()
                );
                (taxed, None, source)
            } else {
                (
                    taxed,
                    Some(Metric::TaxableIncome),
                    row.total_source(Metric::TaxableIncome),
                )
            }
        }
        None => (
            Metric::TaxableIncome.value_in(row.data),
            Some(Metric::TaxableIncome),
            row.total_source(Metric::TaxableIncome),
        ),
    };
    let builder = ExpressionBuilder::new()
        .column_as(target, "Taxable Income", money(taxable), source)
        .op(Operator::Times)
        .input(
            "Marginal Tax Rate",
            format_percent(rate),
            "Input: Marginal Tax Rate",
        )
        .text_if(taxable <= 0.0, " (no tax on a loss)");
    currency(builder, taxable.max(0.0) * rate)
}

fn cumulative_rental_gains(row: Row<'_>) -> Breakdown {
    let record = row.final_record();
    if record.month == 0 {
        return starting_value();
    }
    let current = Metric::CumulativeRentalGains.value_in(record);
    let gains = Metric::RentalGains.value_in(record);
    let previous = RunningTotal.previous(current, gains);
    let builder = ExpressionBuilder::new()
        .derived(
            "Previous Cumulative Rental Gains",
            money(previous),
            format!("Cumulative Rental Gains column (Month {})", record.month - 1),
        )
        .op(Operator::Plus)
        .column_as(
            row.final_target(Metric::RentalGains),
            "Current Rental Gains",
            money(gains),
            format!("Rental Gains column (Month {})", record.month),
        );
    currency(builder, RunningTotal.next(previous, gains))
}

// Losses add to the capital tied up; gains do not reduce it.
fn cumulative_investment(row: Row<'_>) -> Breakdown {
    let inputs = row.inputs;
    let record = row.final_record();
    let downpayment = inputs.downpayment();
    if record.month == 0 {
        let source = format!(
            "Purchase Price ({}) × Downpayment % ({})",
            money(inputs.purchase_price()),
            format_percent(inputs.downpayment_fraction())
        );
        return currency(
            ExpressionBuilder::new().input("Downpayment", money(downpayment), source),
            downpayment,
        );
    }
    let cumulative = Metric::CumulativeRentalGains.value_in(record);
    let losses = (-cumulative).max(0.0);
    let builder = if losses > 0.0 {
        ExpressionBuilder::new()
            .input("Downpayment", money(downpayment), "Initial Investment")
            .op(Operator::Plus)
            .derived(
                "Cumulative Losses",
                money(losses),
                format!(
                    "Cumulative Rental Gains column: {} (negative = losses)",
                    money(cumulative)
                ),
            )
    } else {
        ExpressionBuilder::new().input(
            "Downpayment",
            money(downpayment),
            "Initial Investment (no losses to add)",
        )
    };
    currency(builder, downpayment + losses)
}

fn expected_return(row: Row<'_>) -> Breakdown {
    let inputs = row.inputs;
    let record = row.final_record();
    let annual_rate = inputs.annual_expected_return_rate();
    let rate = inputs.monthly_expected_return_rate();
    let investment = Metric::CumulativeInvestment.value_in(record);
    let previous = previous_cumulative_expected_return(
        record.month,
        Metric::CumulativeExpectedReturn.value_in(record),
        Metric::RentalGains.value_in(record),
        rate,
        inputs.downpayment(),
    );

    let builder = ExpressionBuilder::new()
        .text("(")
        .column(
            Metric::CumulativeInvestment,
            "Cumulative Investment",
            money(investment),
            format!("Cumulative Investment column{}", row.final_qualifier()),
        )
        .op(Operator::Plus);
    let builder = match record.month {
        0 => builder.constant(
            PREVIOUS_CUMULATIVE_EXPECTED_RETURN,
            money(previous),
            "Month 0 (Initial State)",
        ),
        1 => builder.input(
            PREVIOUS_CUMULATIVE_EXPECTED_RETURN,
            money(previous),
            "Downpayment",
        ),
        month => builder.derived(
            PREVIOUS_CUMULATIVE_EXPECTED_RETURN,
            money(previous),
            format!("Cumulative Expected Return column (Month {})", month - 1),
        ),
    };
    let builder = builder.text(")").op(Operator::Times).input(
        "Monthly Expected Return Rate",
        format_percent(rate),
        format!("Annual Rate ({}) ÷ 12", format_percent(annual_rate)),
    );
    let breakdown = currency(builder, (investment + previous) * rate);
    illustrate(row, breakdown, Metric::ExpectedReturn, "expected return")
}

fn cumulative_expected_return(row: Row<'_>) -> Breakdown {
    match row.year_group() {
        Some(group) => {
            let first = row.first_record();
            let year = row.year();
            let previous_year = RunningTotal.previous(
                Metric::CumulativeExpectedReturn.value_in(first),
                Metric::ExpectedReturn.value_in(first),
            );
            let this_year = row.total(Metric::ExpectedReturn);
            let previous_source = if year > 1 {
                format!("Cumulative Expected Return column (Year {} Summary)", year - 1)
            } else {
                "Month 0 (Initial State)".to_string()
            };
            let builder = ExpressionBuilder::new()
                .derived(
                    "Previous Year Summary Cumulative Expected Return",
                    money(previous_year),
                    previous_source,
                )
                .op(Operator::Plus)
                .derived(
                    "Current Year Summary Expected Return",
                    money(this_year),
                    format!(
                        "Expected Return column (Year {year} Summary, sum of {} months)",
                        group.len()
                    ),
                );
            currency(builder, RunningTotal.next(previous_year, this_year))
        }
        None => {
            let record = row.data;
            if record.month == 0 {
                return starting_value();
            }
            let current = Metric::CumulativeExpectedReturn.value_in(record);
            let monthly = Metric::ExpectedReturn.value_in(record);
            let previous = RunningTotal.previous(current, monthly);
            let builder = ExpressionBuilder::new()
                .derived(
                    PREVIOUS_CUMULATIVE_EXPECTED_RETURN,
                    money(previous),
                    format!("Cumulative Expected Return column (Month {})", record.month - 1),
                )
                .op(Operator::Plus)
                .column(
                    Metric::ExpectedReturn,
                    "Expected Return",
                    money(monthly),
                    "Expected Return column",
                );
            currency(builder, RunningTotal.next(previous, monthly))
        }
    }
}

fn home_value(row: Row<'_>) -> Breakdown {
    let inputs = row.inputs;
    let months = row.final_record().month;
    let annual_rate = inputs.annual_market_rate();
    let builder = ExpressionBuilder::new()
        .input(
            "Purchase Price",
            money(inputs.purchase_price()),
            "Input: Purchase Price",
        )
        .op(Operator::Times)
        .text("(1 + ")
        .input(
            "Monthly Market Rate",
            format_percent(inputs.monthly_market_rate()),
            format!("Annual Rate ({}) ÷ 12", format_percent(annual_rate)),
        )
        .text(")^")
        .constant("Months", format_count(months), "Months since purchase");
    currency(builder, super::projection::home_value(inputs, months))
}

fn sales_fees(row: Row<'_>) -> Breakdown {
    let record = row.final_record();
    let home = Metric::HomeValue.value_in(record);
    let commission = row.inputs.commission_rate();
    let builder = ExpressionBuilder::new()
        .column(Metric::HomeValue, "Home Value", money(home), "Home Value column")
        .op(Operator::Times)
        .input(
            "Commission Rate",
            format_percent(commission),
            "Input: Commission Percentage",
        );
    currency(builder, home * commission)
}

fn capital_gains_tax(row: Row<'_>) -> Breakdown {
    let inputs = row.inputs;
    let record = row.final_record();
    let sale_price = Metric::HomeValue.value_in(record);
    let selling_costs = Metric::SalesFees.value_in(record);
    let rate = inputs.marginal_tax_rate();
    let gain = sale_price - inputs.purchase_price() - selling_costs;
    let builder = ExpressionBuilder::new()
        .text("(")
        .column(Metric::HomeValue, "Sale Price", money(sale_price), "Home Value column")
        .op(Operator::Minus)
        .input(
            "Purchase Price",
            money(inputs.purchase_price()),
            "Input: Purchase Price",
        )
        .op(Operator::Minus)
        .column(
            Metric::SalesFees,
            "Selling Costs",
            money(selling_costs),
            "Sales Fees column",
        )
        .text(")")
        .op(Operator::Times)
        .constant(
            "Taxable Portion",
            CAPITAL_GAINS_INCLUSION_RATE.to_string(),
            "Half of a capital gain is taxable",
        )
        .op(Operator::Times)
        .input("Marginal Tax Rate", format_percent(rate), "Input: Marginal Tax Rate")
        .text_if(gain <= 0.0, " (no tax without a gain)");
    currency(
        builder,
        gain.max(0.0) * CAPITAL_GAINS_INCLUSION_RATE * rate,
    )
}

fn net_return(row: Row<'_>) -> Breakdown {
    let record = row.final_record();
    let sale_net = Metric::SaleNet.value_in(record);
    let downpayment = row.inputs.downpayment();
    let cumulative = Metric::CumulativeRentalGains.value_in(record);
    let received = cumulative.max(0.0);
    let builder = ExpressionBuilder::new()
        .text("(")
        .column(Metric::SaleNet, "Sale Net", money(sale_net), "Sale Net column")
        .op(Operator::Minus)
        .input("Downpayment", money(downpayment), "Initial Investment")
        .text(")")
        .op(Operator::Plus);
    let builder = if cumulative > 0.0 {
        builder.column(
            Metric::CumulativeRentalGains,
            "Cumulative Rental Gains",
            money(received),
            format!(
                "Cumulative Rental Gains column: {} (positive = gains received)",
                money(cumulative)
            ),
        )
    } else {
        builder.derived(
            "Cumulative Rental Gains (if positive)",
            money(0.0),
            format!(
                "Cumulative Rental Gains column: {} (negative or zero, so 0 added)",
                money(cumulative)
            ),
        )
    };
    currency(builder, (sale_net - downpayment) + received)
}

fn return_percent(row: Row<'_>) -> Breakdown {
    let record = row.final_record();
    let net = Metric::NetReturn.value_in(record);
    let invested = Metric::CumulativeInvestment.value_in(record);
    let builder = ExpressionBuilder::new()
        .column(Metric::NetReturn, "Net Return", money(net), "Net Return column")
        .op(Operator::Divide)
        .column(
            Metric::CumulativeInvestment,
            "Cumulative Investment",
            money(invested),
            "Cumulative Investment column",
        )
        .op(Operator::Times)
        .constant("100", "100".to_string(), "Convert to %")
        .text_if(invested <= 0.0, " (nothing invested)");
    let fraction = if invested > 0.0 { net / invested } else { 0.0 };
    Breakdown::conclude(builder, fraction, ValueFormat::Percent)
}

fn return_comparison(row: Row<'_>) -> Breakdown {
    let record = row.final_record();
    let net = Metric::NetReturn.value_in(record);
    let expected = Metric::CumulativeExpectedReturn.value_in(record);
    let builder = ExpressionBuilder::new()
        .column(Metric::NetReturn, "Net Return", money(net), "Net Return column")
        .op(Operator::Divide)
        .column(
            Metric::CumulativeExpectedReturn,
            "Cumulative Expected Return",
            money(expected),
            "Cumulative Expected Return column",
        )
        .text_if(expected == 0.0, " (no expected return yet)");
    Breakdown::conclude(
        builder,
        apply(Operator::Divide, net, expected),
        ValueFormat::Ratio,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Node;
    use crate::core::fixtures::sample_inputs;
    use crate::core::projection::{group_by_year, run_projection};
    use crate::core::types::PaymentType;
    use proptest::prelude::{Just, Strategy, prop, prop_assert, prop_oneof, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn regular(metric: Metric, data: &MonthRecord, inputs: &InputParameters) -> Breakdown {
        derive(metric, Row::new(data, inputs, None))
    }

    fn summary(metric: Metric, group: &[MonthRecord], inputs: &InputParameters) -> Breakdown {
        let last = group.last().expect("non-empty group");
        derive(metric, Row::new(last, inputs, Some(group)))
    }

    fn labels(breakdown: &Breakdown) -> Vec<&str> {
        breakdown
            .expression
            .values()
            .map(|value| value.label.as_str())
            .collect()
    }

    fn has_literal(breakdown: &Breakdown, text: &str) -> bool {
        breakdown
            .expression
            .nodes()
            .iter()
            .any(|node| *node == Node::literal(text))
    }

    #[test]
    fn amortized_payment_matches_scenario() {
        // Hand calculation: P = 320,000, r = 0.055/12, n = 360
        // P·r(1+r)^n / ((1+r)^n − 1) ≈ 1,816.92
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        let breakdown = regular(Metric::MortgagePayments, &records[1], &inputs);

        assert_approx_tol(breakdown.amount, 1_816.924_8, 1e-3);
        assert_eq!(breakdown.result, "$1,816.92");
        assert_eq!(breakdown.expression.equals_count(), 1);
        assert!(has_literal(&breakdown, "(1 + "));
        assert!(labels(&breakdown).contains(&"Number of Payments (n)"));
    }

    #[test]
    fn zero_rate_payment_divides_principal() {
        let inputs = InputParameters {
            purchase_price: 300_000.0,
            downpayment_percentage: 0.0,
            interest_rate: 0.0,
            loan_years: 30.0,
            ..InputParameters::default()
        };
        let breakdown = regular(Metric::MortgagePayments, &MonthRecord::default(), &inputs);

        assert_eq!(breakdown.result, "$833.33");
        assert!(breakdown.expression.nodes().contains(&Node::Operator {
            symbol: Operator::Divide
        }));
        assert!(!has_literal(&breakdown, "(1 + "));
    }

    #[test]
    fn interest_only_payment_is_principal_times_rate() {
        let inputs = InputParameters {
            payment_type: PaymentType::InterestOnly,
            ..sample_inputs()
        };
        let breakdown = regular(Metric::MortgagePayments, &MonthRecord::default(), &inputs);

        assert_approx(breakdown.amount, 320_000.0 * 0.055 / 12.0);
        assert!(has_literal(&breakdown, " (interest only)"));
    }

    #[test]
    fn huge_loan_term_shows_capped_payment_count() {
        let inputs = InputParameters {
            loan_years: 1.0e9,
            ..sample_inputs()
        };
        let month_one = MonthRecord {
            month: 1,
            ..MonthRecord::default()
        };
        let breakdown = regular(Metric::MortgagePayments, &month_one, &inputs);

        assert!(breakdown.amount.is_finite());
        assert!(breakdown.amount > 0.0);
        assert!(breakdown.expression.plain_text().contains("1200"));
    }

    #[test]
    fn mortgage_summary_scales_by_months_in_year() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        let groups = group_by_year(&records);
        let breakdown = summary(Metric::MortgagePayments, &groups[0], &inputs);

        assert_approx(breakdown.amount, 12.0 * records[1].mortgage_payments);
        assert_eq!(breakdown.expression.equals_count(), 1);
        let months = breakdown
            .expression
            .find_value(|v| v.label == "Number of Months")
            .expect("months operand");
        assert_eq!(months.text, "12");
        assert_eq!(months.source, "Months in Year 1");
    }

    #[test]
    fn capital_gains_tax_matches_scenario() {
        // Hand calculation: (500,000 − 400,000 − 25,000) × 0.5 × 0.30 = 11,250
        let inputs = InputParameters {
            purchase_price: 400_000.0,
            marginal_tax_rate: 30.0,
            ..InputParameters::default()
        };
        let data = MonthRecord {
            month: 60,
            home_value: 500_000.0,
            sales_fees: 25_000.0,
            ..MonthRecord::default()
        };
        let breakdown = regular(Metric::CapitalGainsTax, &data, &inputs);

        assert_approx(breakdown.amount, 11_250.0);
        assert_eq!(breakdown.result, "$11,250.00");
    }

    #[test]
    fn capital_gains_tax_is_zero_without_gain() {
        let inputs = sample_inputs();
        let data = MonthRecord {
            month: 1,
            home_value: 400_000.0,
            sales_fees: 20_000.0,
            ..MonthRecord::default()
        };
        let breakdown = regular(Metric::CapitalGainsTax, &data, &inputs);
        assert_eq!(breakdown.result, "$0.00");
        assert!(has_literal(&breakdown, " (no tax without a gain)"));
    }

    #[test]
    fn growth_starts_in_second_year() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 2);

        for record in &records[..=12] {
            let breakdown = regular(Metric::MaintenanceFees, record, &inputs);
            assert_approx(breakdown.amount, 350.0);
            assert!(!labels(&breakdown).contains(&"Yearly Increase Rate"));
        }

        let breakdown = regular(Metric::MaintenanceFees, &records[13], &inputs);
        assert_approx(breakdown.amount, 350.0 * 1.03);
        let increases = breakdown
            .expression
            .find_value(|v| v.label == "Number of Increases")
            .expect("increase exponent");
        assert_eq!(increases.text, "1");
    }

    #[test]
    fn grown_columns_match_projection() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 3);
        for record in &records[1..] {
            for metric in [Metric::MaintenanceFees, Metric::PropertyTax, Metric::RentalIncome] {
                assert_approx(regular(metric, record, &inputs).amount, metric.value_in(record));
            }
        }
    }

    #[test]
    fn mortgage_columns_match_projection_through_payoff() {
        let inputs = InputParameters {
            loan_years: 1.0,
            ..sample_inputs()
        };
        let records = run_projection(&inputs, 2);
        for record in &records[1..] {
            for metric in [
                Metric::PrincipalPaid,
                Metric::InterestPaid,
                Metric::PrincipalRemaining,
            ] {
                assert_approx_tol(
                    regular(metric, record, &inputs).amount,
                    metric.value_in(record),
                    1e-4,
                );
            }
        }
        let paid_off = regular(Metric::PrincipalPaid, &records[20], &inputs);
        assert!(has_literal(&paid_off, " (loan paid off)"));
    }

    #[test]
    fn illustrative_summary_reports_year_total_with_note() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        let groups = group_by_year(&records);
        let breakdown = summary(Metric::InterestPaid, &groups[0], &inputs);

        let total: f64 = groups[0].iter().map(|r| r.interest_paid).sum();
        assert_approx(breakdown.amount, total);
        assert_eq!(breakdown.result, format_currency(total));
        let note = breakdown.note.as_deref().expect("note");
        assert!(note.contains("across all 12 months"));
        assert!(note.contains("interest paid"));

        let monthly = regular(Metric::InterestPaid, &records[12], &inputs);
        assert_eq!(
            breakdown.expression.truncate_before_equals().plain_text(),
            monthly.expression.truncate_before_equals().plain_text()
        );
    }

    #[test]
    fn regular_rows_carry_no_note() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        for metric in Metric::ALL {
            let breakdown = regular(metric, &records[6], &inputs);
            assert!(breakdown.note.is_none(), "{metric:?}");
            assert_eq!(
                breakdown.expression.last_text(),
                Some(breakdown.result.as_str()),
                "{metric:?}"
            );
        }
    }

    #[test]
    fn cumulative_columns_recover_previous_month() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        for record in &records {
            for metric in [Metric::CumulativeRentalGains, Metric::CumulativeExpectedReturn] {
                assert_approx(regular(metric, record, &inputs).amount, metric.value_in(record));
            }
        }

        let month_five = regular(Metric::CumulativeRentalGains, &records[5], &inputs);
        let previous = month_five
            .expression
            .find_value(|v| v.label == "Previous Cumulative Rental Gains")
            .expect("previous operand");
        assert_eq!(previous.text, format_currency(records[4].cumulative_rental_gains));
        assert!(!previous.expandable);
    }

    #[test]
    fn month_zero_cumulatives_start_at_zero() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        for metric in [Metric::CumulativeRentalGains, Metric::CumulativeExpectedReturn] {
            let breakdown = regular(metric, &records[0], &inputs);
            assert_eq!(breakdown.result, "$0.00");
            assert_eq!(labels(&breakdown), vec!["Starting Value"]);
        }
    }

    #[test]
    fn cumulative_expected_return_summary_chains_years() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 2);
        let groups = group_by_year(&records);
        let breakdown = summary(Metric::CumulativeExpectedReturn, &groups[1], &inputs);

        assert_approx_tol(breakdown.amount, records[24].cumulative_expected_return, 1e-4);
        let previous = breakdown
            .expression
            .find_value(|v| v.label == "Previous Year Summary Cumulative Expected Return")
            .expect("previous year operand");
        assert_eq!(previous.text, format_currency(records[12].cumulative_expected_return));
        assert!(breakdown.note.is_none());
    }

    #[test]
    fn expected_return_month_one_starts_from_downpayment() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        let breakdown = regular(Metric::ExpectedReturn, &records[1], &inputs);
        let previous = breakdown
            .expression
            .find_value(|v| v.label == PREVIOUS_CUMULATIVE_EXPECTED_RETURN)
            .expect("previous operand");
        assert_eq!(previous.text, "$80,000.00");
        let investment = records[1].cumulative_investment;
        assert_approx(breakdown.amount, (investment + 80_000.0) * 0.07 / 12.0);
    }

    #[test]
    fn taxes_on_a_loss_are_zero() {
        let inputs = sample_inputs();
        let data = MonthRecord {
            month: 3,
            taxable_income: -100.0,
            ..MonthRecord::default()
        };
        let breakdown = regular(Metric::TaxesDue, &data, &inputs);
        assert_eq!(breakdown.result, "$0.00");
        assert!(has_literal(&breakdown, " (no tax on a loss)"));
    }

    #[test]
    fn taxes_summary_excludes_loss_months() {
        let inputs = sample_inputs();
        let group: Vec<_> = [200.0, -50.0, 100.0]
            .into_iter()
            .enumerate()
            .map(|(i, taxable)| MonthRecord {
                month: i as u32 + 1,
                year: Some(1),
                taxable_income: taxable,
                ..MonthRecord::default()
            })
            .collect();
        let breakdown = summary(Metric::TaxesDue, &group, &inputs);

        assert_approx(breakdown.amount, 300.0 * 0.30);
        let taxable = breakdown
            .expression
            .find_value(|v| v.label == "Taxable Income")
            .expect("taxable operand");
        assert!(!taxable.expandable);
        assert!(taxable.source.contains("months with a loss excluded"));
    }

    #[test]
    fn ratio_metrics_guard_zero_denominators() {
        let inputs = sample_inputs();
        let data = MonthRecord {
            month: 1,
            net_return: 5_000.0,
            ..MonthRecord::default()
        };
        assert_eq!(regular(Metric::ReturnPercent, &data, &inputs).result, "0.00%");
        assert_eq!(regular(Metric::ReturnComparison, &data, &inputs).result, "0.0000");
    }

    #[test]
    fn return_percent_is_formatted_as_percent() {
        let inputs = sample_inputs();
        let data = MonthRecord {
            month: 12,
            net_return: 10_000.0,
            cumulative_investment: 80_000.0,
            ..MonthRecord::default()
        };
        let breakdown = regular(Metric::ReturnPercent, &data, &inputs);
        assert_approx(breakdown.amount, 0.125);
        assert_eq!(breakdown.result, "12.50%");
    }

    #[test]
    fn annual_inputs_show_raw_value_in_summary() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        let groups = group_by_year(&records);

        let monthly = regular(Metric::InsurancePaid, &records[3], &inputs);
        assert_eq!(monthly.result, "$100.00");
        let annual = summary(Metric::InsurancePaid, &groups[0], &inputs);
        assert_eq!(annual.result, "$1,200.00");
        assert_eq!(annual.expression.len(), 3);
    }

    #[test]
    fn summary_operands_expand_only_to_matching_figures() {
        let inputs = sample_inputs();
        let records = run_projection(&inputs, 1);
        let groups = group_by_year(&records);

        let expenses = summary(Metric::TotalExpenses, &groups[0], &inputs);
        let payments = expenses
            .expression
            .find_value(|v| v.label == "Mortgage Payments")
            .expect("payments operand");
        assert!(payments.expandable);
        assert_eq!(payments.metric, Some(Metric::MortgagePayments));

        let principal = summary(Metric::PrincipalPaid, &groups[0], &inputs);
        let payment = principal
            .expression
            .find_value(|v| v.label == "Monthly Payment")
            .expect("payment operand");
        assert!(!payment.expandable);
        assert!(payment.source.ends_with("(final month)"));

        let deductible = summary(Metric::DeductibleExpenses, &groups[0], &inputs);
        let interest = deductible
            .expression
            .find_value(|v| v.label == "Interest Paid")
            .expect("interest operand");
        assert!(!interest.expandable);
    }

    #[test]
    fn non_finite_record_is_shown_as_zero() {
        let inputs = sample_inputs();
        let mut data = MonthRecord {
            month: 7,
            ..MonthRecord::default()
        };
        for metric in Metric::ALL {
            metric.set_in(&mut data, f64::NAN);
        }
        for metric in Metric::ALL {
            let breakdown = regular(metric, &data, &inputs);
            assert!(breakdown.amount.is_finite(), "{metric:?}");
            assert!(!breakdown.result.contains("NaN"), "{metric:?}");
        }
    }

    fn any_amount() -> impl Strategy<Value = f64> {
        prop_oneof![
            -1.0e6f64..1.0e6,
            -1.0e12f64..1.0e12,
            Just(0.0),
            Just(150.0),
            Just(1.0e300),
            Just(-1.0e300),
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn every_rule_is_total(
            fields in prop::collection::vec(any_amount(), 17),
            values in prop::collection::vec(any_amount(), 27),
            interest_only in proptest::bool::ANY,
            month in prop_oneof![0u32..400, Just(u32::MAX)],
            year in prop::option::of(prop_oneof![0u32..40, Just(u32::MAX)]),
            summary_len in 0usize..13,
        ) {
            let inputs = InputParameters {
                purchase_price: fields[0],
                downpayment_percentage: fields[1],
                interest_rate: fields[2],
                loan_years: fields[3],
                payment_type: if interest_only {
                    PaymentType::InterestOnly
                } else {
                    PaymentType::PrincipalAndInterest
                },
                maintenance_base: fields[4],
                maintenance_increase: fields[5],
                property_tax_base: fields[6],
                property_tax_increase: fields[7],
                insurance: fields[8],
                utilities: fields[9],
                repairs: fields[10],
                rental_income_base: fields[11],
                rental_increase: fields[12],
                marginal_tax_rate: fields[13],
                expected_return_rate: fields[14],
                real_estate_market_increase: fields[15],
                commission_percentage: fields[16],
            };
            let mut data = MonthRecord { month, year, ..MonthRecord::default() };
            for (metric, value) in Metric::ALL.into_iter().zip(values) {
                metric.set_in(&mut data, value);
            }
            let group = vec![data.clone(); summary_len];
            let group = (summary_len > 0).then_some(group.as_slice());

            for metric in Metric::ALL {
                let breakdown = derive(metric, Row::new(&data, &inputs, group));
                prop_assert!(!breakdown.expression.is_empty());
                prop_assert!(!breakdown.result.is_empty());
                prop_assert!(breakdown.amount.is_finite());
                prop_assert!(!breakdown.result.contains("NaN"));
                prop_assert!(breakdown.expression.equals_count() == 1);
            }
        }

        #[test]
        fn summed_summaries_equal_sum_of_months(
            price in 100_000.0f64..1_500_000.0,
            downpayment in 5.0f64..100.0,
            rate in 0.0f64..12.0,
            rent in 0.0f64..10_000.0,
            increase in 0.0f64..10.0,
            interest_only in proptest::bool::ANY,
        ) {
            let inputs = InputParameters {
                purchase_price: price,
                downpayment_percentage: downpayment,
                interest_rate: rate,
                rental_income_base: rent,
                rental_increase: increase,
                maintenance_increase: increase,
                payment_type: if interest_only {
                    PaymentType::InterestOnly
                } else {
                    PaymentType::PrincipalAndInterest
                },
                ..sample_inputs()
            };
            let records = run_projection(&inputs, 3);
            for group in group_by_year(&records) {
                for metric in Metric::ALL {
                    if metric.summary_policy() != SummaryPolicy::Sum {
                        continue;
                    }
                    let expected: f64 = group.iter().map(|r| metric.value_in(r)).sum();
                    let actual = summary(metric, &group, &inputs).amount;
                    prop_assert!(
                        (actual - expected).abs() <= EPS.max(expected.abs() * 1e-12),
                        "{metric:?}: expected {expected}, got {actual}"
                    );
                }
            }
        }
    }
}
