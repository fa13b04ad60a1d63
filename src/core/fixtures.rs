use super::types::{InputParameters, PaymentType};

pub(crate) fn sample_inputs() -> InputParameters {
    InputParameters {
        purchase_price: 400_000.0,
        downpayment_percentage: 20.0,
        interest_rate: 5.5,
        loan_years: 30.0,
        payment_type: PaymentType::PrincipalAndInterest,
        maintenance_base: 350.0,
        maintenance_increase: 3.0,
        property_tax_base: 4_800.0,
        property_tax_increase: 2.0,
        insurance: 1_200.0,
        utilities: 150.0,
        repairs: 2_400.0,
        rental_income_base: 2_800.0,
        rental_increase: 2.5,
        marginal_tax_rate: 30.0,
        expected_return_rate: 7.0,
        real_estate_market_increase: 3.0,
        commission_percentage: 5.0,
    }
}
