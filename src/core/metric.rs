use serde::{Deserialize, Serialize};

use super::format::{format_currency, format_percent, format_ratio};
use super::types::MonthRecord;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    PrincipalRemaining,
    MortgagePayments,
    PrincipalPaid,
    InterestPaid,
    MaintenanceFees,
    PropertyTax,
    InsurancePaid,
    Utilities,
    Repairs,
    TotalExpenses,
    DeductibleExpenses,
    RentalIncome,
    TaxableIncome,
    TaxesDue,
    RentalGains,
    CumulativeRentalGains,
    CumulativeInvestment,
    ExpectedReturn,
    CumulativeExpectedReturn,
    HomeValue,
    CapitalGainsTax,
    SalesFees,
    SaleIncome,
    SaleNet,
    NetReturn,
    ReturnPercent,
    ReturnComparison,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryPolicy {
    Sum,
    FinalValue,
    Illustrative,
    AnnualInput,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    Currency,
    // Stored as a fraction, displayed x100 with a `%` suffix.
    Percent,
    Ratio,
}

impl ValueFormat {
    pub fn apply(self, value: f64) -> String {
        match self {
            ValueFormat::Currency => format_currency(value),
            ValueFormat::Percent => format_percent(value),
            ValueFormat::Ratio => format_ratio(value),
        }
    }
}

impl Metric {
    pub const ALL: [Metric; 27] = [
        Metric::PrincipalRemaining,
        Metric::MortgagePayments,
        Metric::PrincipalPaid,
        Metric::InterestPaid,
        Metric::MaintenanceFees,
        Metric::PropertyTax,
        Metric::InsurancePaid,
        Metric::Utilities,
        Metric::Repairs,
        Metric::TotalExpenses,
        Metric::DeductibleExpenses,
        Metric::RentalIncome,
        Metric::TaxableIncome,
        Metric::TaxesDue,
        Metric::RentalGains,
        Metric::CumulativeRentalGains,
        Metric::CumulativeInvestment,
        Metric::ExpectedReturn,
        Metric::CumulativeExpectedReturn,
        Metric::HomeValue,
        Metric::CapitalGainsTax,
        Metric::SalesFees,
        Metric::SaleIncome,
        Metric::SaleNet,
        Metric::NetReturn,
        Metric::ReturnPercent,
        Metric::ReturnComparison,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::PrincipalRemaining => "principal_remaining",
            Metric::MortgagePayments => "mortgage_payments",
            Metric::PrincipalPaid => "principal_paid",
            Metric::InterestPaid => "interest_paid",
            Metric::MaintenanceFees => "maintenance_fees",
            Metric::PropertyTax => "property_tax",
            Metric::InsurancePaid => "insurance_paid",
            Metric::Utilities => "utilities",
            Metric::Repairs => "repairs",
            Metric::TotalExpenses => "total_expenses",
            Metric::DeductibleExpenses => "deductible_expenses",
            Metric::RentalIncome => "rental_income",
            Metric::TaxableIncome => "taxable_income",
            Metric::TaxesDue => "taxes_due",
            Metric::RentalGains => "rental_gains",
            Metric::CumulativeRentalGains => "cumulative_rental_gains",
            Metric::CumulativeInvestment => "cumulative_investment",
            Metric::ExpectedReturn => "expected_return",
            Metric::CumulativeExpectedReturn => "cumulative_expected_return",
            Metric::HomeValue => "home_value",
            Metric::CapitalGainsTax => "capital_gains_tax",
            Metric::SalesFees => "sales_fees",
            Metric::SaleIncome => "sale_income",
            Metric::SaleNet => "sale_net",
            Metric::NetReturn => "net_return",
            Metric::ReturnPercent => "return_percent",
            Metric::ReturnComparison => "return_comparison",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Metric::PrincipalRemaining => "Principal Remaining",
            Metric::MortgagePayments => "Mortgage Payments",
            Metric::PrincipalPaid => "Principal Paid",
            Metric::InterestPaid => "Interest Paid",
            Metric::MaintenanceFees => "Maintenance Fees",
            Metric::PropertyTax => "Property Tax",
            Metric::InsurancePaid => "Insurance Paid",
            Metric::Utilities => "Utilities",
            Metric::Repairs => "Repairs",
            Metric::TotalExpenses => "Total Expenses",
            Metric::DeductibleExpenses => "Deductible Expenses",
            Metric::RentalIncome => "Rental Income",
            Metric::TaxableIncome => "Taxable Income",
            Metric::TaxesDue => "Taxes Due",
            Metric::RentalGains => "Rental Gains",
            Metric::CumulativeRentalGains => "Cumulative Rental Gains",
            Metric::CumulativeInvestment => "Cumulative Investment",
            Metric::ExpectedReturn => "Expected Return",
            Metric::CumulativeExpectedReturn => "Cumulative Expected Return",
            Metric::HomeValue => "Home Value",
            Metric::CapitalGainsTax => "Capital Gains Tax",
            Metric::SalesFees => "Sales Fees",
            Metric::SaleIncome => "Sale Income",
            Metric::SaleNet => "Sale Net",
            Metric::NetReturn => "Net Return",
            Metric::ReturnPercent => "Return %",
            Metric::ReturnComparison => "Return Comparison",
        }
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        if key == "return_%" {
            return Some(Metric::ReturnPercent);
        }
        Metric::ALL.into_iter().find(|metric| metric.key() == key)
    }

    pub fn from_display_name(name: &str) -> Option<Metric> {
        Metric::from_key(&normalize_name(name))
    }

    pub fn summary_policy(self) -> SummaryPolicy {
        match self {
            Metric::MortgagePayments
            | Metric::MaintenanceFees
            | Metric::PropertyTax
            | Metric::Utilities
            | Metric::TotalExpenses
            | Metric::DeductibleExpenses
            | Metric::RentalIncome
            | Metric::TaxableIncome
            | Metric::TaxesDue
            | Metric::RentalGains => SummaryPolicy::Sum,
            Metric::PrincipalPaid | Metric::InterestPaid | Metric::ExpectedReturn => {
                SummaryPolicy::Illustrative
            }
            Metric::InsurancePaid | Metric::Repairs => SummaryPolicy::AnnualInput,
            Metric::PrincipalRemaining
            | Metric::CumulativeRentalGains
            | Metric::CumulativeInvestment
            | Metric::CumulativeExpectedReturn
            | Metric::HomeValue
            | Metric::CapitalGainsTax
            | Metric::SalesFees
            | Metric::SaleIncome
            | Metric::SaleNet
            | Metric::NetReturn
            | Metric::ReturnPercent
            | Metric::ReturnComparison => SummaryPolicy::FinalValue,
        }
    }

    pub fn is_summed_in_summary(self) -> bool {
        matches!(
            self.summary_policy(),
            SummaryPolicy::Sum | SummaryPolicy::Illustrative | SummaryPolicy::AnnualInput
        )
    }

    pub fn value_format(self) -> ValueFormat {
        match self {
            Metric::ReturnPercent => ValueFormat::Percent,
            Metric::ReturnComparison => ValueFormat::Ratio,
            _ => ValueFormat::Currency,
        }
    }

    // `return_percent` is stored multiplied by 100; returned as a fraction.
    pub fn value_in(self, record: &MonthRecord) -> f64 {
        let raw = match self {
            Metric::PrincipalRemaining => record.principal_remaining,
            Metric::MortgagePayments => record.mortgage_payments,
            Metric::PrincipalPaid => record.principal_paid,
            Metric::InterestPaid => record.interest_paid,
            Metric::MaintenanceFees => record.maintenance_fees,
            Metric::PropertyTax => record.property_tax,
            Metric::InsurancePaid => record.insurance_paid,
            Metric::Utilities => record.utilities,
            Metric::Repairs => record.repairs,
            Metric::TotalExpenses => record.total_expenses,
            Metric::DeductibleExpenses => record.deductible_expenses,
            Metric::RentalIncome => record.rental_income,
            Metric::TaxableIncome => record.taxable_income,
            Metric::TaxesDue => record.taxes_due,
            Metric::RentalGains => record.rental_gains,
            Metric::CumulativeRentalGains => record.cumulative_rental_gains,
            Metric::CumulativeInvestment => record.cumulative_investment,
            Metric::ExpectedReturn => record.expected_return,
            Metric::CumulativeExpectedReturn => record.cumulative_expected_return,
            Metric::HomeValue => record.home_value,
            Metric::CapitalGainsTax => record.capital_gains_tax,
            Metric::SalesFees => record.sales_fees,
            Metric::SaleIncome => record.sale_income,
            Metric::SaleNet => record.sale_net,
            Metric::NetReturn => record.net_return,
            Metric::ReturnPercent => record.return_percent / 100.0,
            Metric::ReturnComparison => record.return_comparison,
        };
        super::types::finite_or_zero(raw)
    }

    pub fn set_in(self, record: &mut MonthRecord, value: f64) {
        let slot = match self {
            Metric::PrincipalRemaining => &mut record.principal_remaining,
            Metric::MortgagePayments => &mut record.mortgage_payments,
            Metric::PrincipalPaid => &mut record.principal_paid,
            Metric::InterestPaid => &mut record.interest_paid,
            Metric::MaintenanceFees => &mut record.maintenance_fees,
            Metric::PropertyTax => &mut record.property_tax,
            Metric::InsurancePaid => &mut record.insurance_paid,
            Metric::Utilities => &mut record.utilities,
            Metric::Repairs => &mut record.repairs,
            Metric::TotalExpenses => &mut record.total_expenses,
            Metric::DeductibleExpenses => &mut record.deductible_expenses,
            Metric::RentalIncome => &mut record.rental_income,
            Metric::TaxableIncome => &mut record.taxable_income,
            Metric::TaxesDue => &mut record.taxes_due,
            Metric::RentalGains => &mut record.rental_gains,
            Metric::CumulativeRentalGains => &mut record.cumulative_rental_gains,
            Metric::CumulativeInvestment => &mut record.cumulative_investment,
            Metric::ExpectedReturn => &mut record.expected_return,
            Metric::CumulativeExpectedReturn => &mut record.cumulative_expected_return,
            Metric::HomeValue => &mut record.home_value,
            Metric::CapitalGainsTax => &mut record.capital_gains_tax,
            Metric::SalesFees => &mut record.sales_fees,
            Metric::SaleIncome => &mut record.sale_income,
            Metric::SaleNet => &mut record.sale_net,
            Metric::NetReturn => &mut record.net_return,
            Metric::ReturnPercent => {
                record.return_percent = value * 100.0;
                return;
            }
            Metric::ReturnComparison => &mut record.return_comparison,
        };
        *slot = value;
    }
}

pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
