use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum PaymentType {
    #[default]
    #[serde(
        rename = "Principal and Interest",
        alias = "principal_and_interest",
        alias = "principal-and-interest"
    )]
    PrincipalAndInterest,
    #[serde(rename = "Interest Only", alias = "interest_only", alias = "interest-only")]
    InterestOnly,
}

// Rates are stored as entered (5.5 means 5.5%); accessors return sanitized fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputParameters {
    pub purchase_price: f64,
    pub downpayment_percentage: f64,
    pub interest_rate: f64,
    pub loan_years: f64,
    pub payment_type: PaymentType,
    pub maintenance_base: f64,
    pub maintenance_increase: f64,
    pub property_tax_base: f64,
    pub property_tax_increase: f64,
    pub insurance: f64,
    pub utilities: f64,
    pub repairs: f64,
    pub rental_income_base: f64,
    pub rental_increase: f64,
    pub marginal_tax_rate: f64,
    pub expected_return_rate: f64,
    pub real_estate_market_increase: f64,
    pub commission_percentage: f64,
}

pub const DEFAULT_LOAN_YEARS: u32 = 30;
pub const MAX_LOAN_YEARS: u32 = 100;

impl Default for InputParameters {
    fn default() -> Self {
        Self {
            purchase_price: 0.0,
            downpayment_percentage: 0.0,
            interest_rate: 0.0,
            loan_years: f64::from(DEFAULT_LOAN_YEARS),
            payment_type: PaymentType::PrincipalAndInterest,
            maintenance_base: 0.0,
            maintenance_increase: 0.0,
            property_tax_base: 0.0,
            property_tax_increase: 0.0,
            insurance: 0.0,
            utilities: 0.0,
            repairs: 0.0,
            rental_income_base: 0.0,
            rental_increase: 0.0,
            marginal_tax_rate: 0.0,
            expected_return_rate: 0.0,
            real_estate_market_increase: 0.0,
            commission_percentage: 0.0,
        }
    }
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn fraction(percent: f64) -> f64 {
    finite_or_zero(percent) / 100.0
}

impl InputParameters {
    pub fn purchase_price(&self) -> f64 {
        finite_or_zero(self.purchase_price)
    }

    pub fn downpayment_fraction(&self) -> f64 {
        fraction(self.downpayment_percentage)
    }

    pub fn downpayment(&self) -> f64 {
        self.purchase_price() * self.downpayment_fraction()
    }

    pub fn loan_principal(&self) -> f64 {
        self.purchase_price() * (1.0 - self.downpayment_fraction())
    }

    // Missing or zero terms fall back to 30 years; long terms are capped.
    pub fn loan_years(&self) -> u32 {
        let years = finite_or_zero(self.loan_years);
        if years >= 1.0 {
            years.round().min(f64::from(MAX_LOAN_YEARS)) as u32
        } else {
            DEFAULT_LOAN_YEARS
        }
    }

    pub fn payment_count(&self) -> u32 {
        self.loan_years() * 12
    }

    pub fn annual_interest_rate(&self) -> f64 {
        fraction(self.interest_rate)
    }

    pub fn monthly_interest_rate(&self) -> f64 {
        self.annual_interest_rate() / 12.0
    }

    pub fn is_interest_only(&self) -> bool {
        self.payment_type == PaymentType::InterestOnly
    }

    pub fn maintenance_base(&self) -> f64 {
        finite_or_zero(self.maintenance_base)
    }

    pub fn maintenance_increase(&self) -> f64 {
        fraction(self.maintenance_increase)
    }

    pub fn property_tax_base(&self) -> f64 {
        finite_or_zero(self.property_tax_base)
    }

    pub fn property_tax_increase(&self) -> f64 {
        fraction(self.property_tax_increase)
    }

    pub fn annual_insurance(&self) -> f64 {
        finite_or_zero(self.insurance)
    }

    pub fn monthly_utilities(&self) -> f64 {
        finite_or_zero(self.utilities)
    }

    pub fn annual_repairs(&self) -> f64 {
        finite_or_zero(self.repairs)
    }

    pub fn rental_income_base(&self) -> f64 {
        finite_or_zero(self.rental_income_base)
    }

    pub fn rental_increase(&self) -> f64 {
        fraction(self.rental_increase)
    }

    pub fn marginal_tax_rate(&self) -> f64 {
        fraction(self.marginal_tax_rate)
    }

    pub fn annual_expected_return_rate(&self) -> f64 {
        fraction(self.expected_return_rate)
    }

    pub fn monthly_expected_return_rate(&self) -> f64 {
        self.annual_expected_return_rate() / 12.0
    }

    pub fn annual_market_rate(&self) -> f64 {
        fraction(self.real_estate_market_increase)
    }

    pub fn monthly_market_rate(&self) -> f64 {
        self.annual_market_rate() / 12.0
    }

    pub fn commission_rate(&self) -> f64 {
        fraction(self.commission_percentage)
    }
}

// Month 0 is the purchase-day state and carries no year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthRecord {
    pub month: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    pub principal_remaining: f64,
    pub mortgage_payments: f64,
    pub principal_paid: f64,
    pub interest_paid: f64,
    pub maintenance_fees: f64,
    pub property_tax: f64,
    pub insurance_paid: f64,
    pub utilities: f64,
    pub repairs: f64,
    pub total_expenses: f64,
    pub deductible_expenses: f64,
    pub rental_income: f64,
    pub taxable_income: f64,
    pub taxes_due: f64,
    pub rental_gains: f64,
    pub cumulative_rental_gains: f64,
    pub cumulative_investment: f64,
    pub expected_return: f64,
    pub cumulative_expected_return: f64,
    pub home_value: f64,
    pub sales_fees: f64,
    pub capital_gains_tax: f64,
    pub sale_income: f64,
    pub sale_net: f64,
    pub net_return: f64,
    pub return_percent: f64,
    pub return_comparison: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MonthRecord {
    pub fn year_number(&self) -> Option<u32> {
        match self.year {
            Some(year) if year >= 1 => Some(year),
            _ if self.month >= 1 => Some((self.month - 1) / 12 + 1),
            _ => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        let value = match key {
            "month" => f64::from(self.month),
            "year" => f64::from(self.year_number()?),
            "principal_remaining" => self.principal_remaining,
            "mortgage_payments" => self.mortgage_payments,
            "principal_paid" => self.principal_paid,
            "interest_paid" => self.interest_paid,
            "maintenance_fees" => self.maintenance_fees,
            "property_tax" => self.property_tax,
            "insurance_paid" => self.insurance_paid,
            "utilities" => self.utilities,
            "repairs" => self.repairs,
            "total_expenses" => self.total_expenses,
            "deductible_expenses" => self.deductible_expenses,
            "rental_income" => self.rental_income,
            "taxable_income" => self.taxable_income,
            "taxes_due" => self.taxes_due,
            "rental_gains" => self.rental_gains,
            "cumulative_rental_gains" => self.cumulative_rental_gains,
            "cumulative_investment" => self.cumulative_investment,
            "expected_return" => self.expected_return,
            "cumulative_expected_return" => self.cumulative_expected_return,
            "home_value" => self.home_value,
            "sales_fees" => self.sales_fees,
            "capital_gains_tax" => self.capital_gains_tax,
            "sale_income" => self.sale_income,
            "sale_net" => self.sale_net,
            "net_return" => self.net_return,
            "return_percent" => self.return_percent,
            "return_comparison" => self.return_comparison,
            other => self.extra.get(other)?.as_f64()?,
        };
        Some(finite_or_zero(value))
    }
}

pub type YearGroup = Vec<MonthRecord>;
