use axum::{
    Router,
    extract::{Json, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::core::{
    DisplayState, InputParameters, MAX_LOAN_YEARS, MAX_PROJECTION_YEARS, Metric, MonthRecord,
    NavigationError, Navigator, PaymentType, RenderPart, RowContext, SummaryPolicy, ValueFormat,
    YearGroup, group_by_year, render_legend, render_parts, render_plain, run_projection,
    summarize_year,
};

const DEFAULT_NUM_YEARS: u32 = 30;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPaymentType {
    PrincipalAndInterest,
    InterestOnly,
}

impl From<CliPaymentType> for PaymentType {
    fn from(value: CliPaymentType) -> Self {
        match value {
            CliPaymentType::PrincipalAndInterest => PaymentType::PrincipalAndInterest,
            CliPaymentType::InterestOnly => PaymentType::InterestOnly,
        }
    }
}

impl From<PaymentType> for CliPaymentType {
    fn from(value: PaymentType) -> Self {
        match value {
            PaymentType::PrincipalAndInterest => CliPaymentType::PrincipalAndInterest,
            PaymentType::InterestOnly => CliPaymentType::InterestOnly,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "propcalc",
    about = "Rental property investment calculator with step-by-step formula breakdowns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Serve the JSON API")]
    Serve {
        #[arg(long, env = "PROPCALC_PORT", default_value_t = 8080)]
        port: u16,
    },
    #[command(about = "Print how one cell of the projection table is derived")]
    Explain(ExplainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExplainArgs {
    #[arg(long, help = "Column to explain, e.g. \"Interest Paid\" or interest_paid")]
    metric: String,
    #[arg(long, default_value_t = 1, help = "Month row to explain (0 is purchase day)")]
    month: u32,
    #[arg(long, help = "Explain the year-summary row of this year instead of a month")]
    summary_year: Option<u32>,
    #[arg(long = "expand", help = "Label to expand, in order; may be repeated")]
    expand: Vec<String>,
    #[command(flatten)]
    scenario: ScenarioArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
struct ScenarioArgs {
    #[arg(long)]
    purchase_price: f64,
    #[arg(long, default_value_t = 20.0, help = "Downpayment in percent of the price")]
    downpayment_percentage: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual mortgage rate in percent")]
    interest_rate: f64,
    #[arg(long, default_value_t = 30.0)]
    loan_years: f64,
    #[arg(long, value_enum, default_value_t = CliPaymentType::PrincipalAndInterest)]
    payment_type: CliPaymentType,
    #[arg(long, default_value_t = 0.0, help = "Monthly maintenance in the first year")]
    maintenance_base: f64,
    #[arg(long, default_value_t = 0.0, help = "Yearly maintenance increase in percent")]
    maintenance_increase: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual property tax in the first year")]
    property_tax_base: f64,
    #[arg(long, default_value_t = 0.0, help = "Yearly property tax increase in percent")]
    property_tax_increase: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual insurance")]
    insurance: f64,
    #[arg(long, default_value_t = 0.0, help = "Monthly utilities")]
    utilities: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual repairs")]
    repairs: f64,
    #[arg(long, default_value_t = 0.0, help = "Monthly rent in the first year")]
    rental_income_base: f64,
    #[arg(long, default_value_t = 0.0, help = "Yearly rent increase in percent")]
    rental_increase: f64,
    #[arg(long, default_value_t = 0.0, help = "Marginal income tax rate in percent")]
    marginal_tax_rate: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual return of the alternative investment in percent"
    )]
    expected_return_rate: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual home price growth in percent")]
    real_estate_market_increase: f64,
    #[arg(long, default_value_t = 5.0, help = "Selling commission in percent")]
    commission_percentage: f64,
    #[arg(long, default_value_t = DEFAULT_NUM_YEARS, help = "Projection horizon in years")]
    num_years: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("No data provided. Please fill in all required fields.")]
    Empty,
    #[error("Validation errors: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl InputError {
    fn violations(&self) -> Vec<String> {
        match self {
            InputError::Empty => Vec::new(),
            InputError::Invalid(violations) => violations.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("month {month} is outside the projection (0..={last})")]
    MonthOutOfRange { month: u32, last: u32 },
    #[error("year {year} is outside the projection (1..={last})")]
    YearOutOfRange { year: u32, last: u32 },
    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct CalculatePayload {
    #[serde(alias = "purchasePrice")]
    purchase_price: Option<f64>,
    #[serde(alias = "downpaymentPercentage")]
    downpayment_percentage: Option<f64>,
    #[serde(alias = "interestRate")]
    interest_rate: Option<f64>,
    #[serde(alias = "loanYears")]
    loan_years: Option<f64>,
    #[serde(alias = "paymentType")]
    payment_type: Option<PaymentType>,
    #[serde(alias = "maintenanceBase")]
    maintenance_base: Option<f64>,
    #[serde(alias = "maintenanceIncrease")]
    maintenance_increase: Option<f64>,
    #[serde(alias = "propertyTaxBase")]
    property_tax_base: Option<f64>,
    #[serde(alias = "propertyTaxIncrease")]
    property_tax_increase: Option<f64>,
    insurance: Option<f64>,
    utilities: Option<f64>,
    repairs: Option<f64>,
    #[serde(alias = "rentalIncomeBase")]
    rental_income_base: Option<f64>,
    #[serde(alias = "rentalIncrease")]
    rental_increase: Option<f64>,
    #[serde(alias = "marginalTaxRate")]
    marginal_tax_rate: Option<f64>,
    #[serde(alias = "expectedReturnRate")]
    expected_return_rate: Option<f64>,
    #[serde(alias = "realEstateMarketIncrease")]
    real_estate_market_increase: Option<f64>,
    #[serde(alias = "commissionPercentage")]
    commission_percentage: Option<f64>,
    #[serde(alias = "numYears")]
    num_years: Option<u32>,
}

// `{"expand": "Label"}`, `"back"` or `"reset"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Expand(String),
    Back,
    Reset,
}

#[derive(Debug, Deserialize)]
struct BreakdownPayload {
    metric: String,
    #[serde(default)]
    data: MonthRecord,
    #[serde(default)]
    inputs: InputParameters,
    #[serde(default, alias = "yearGroup")]
    year_group: Option<YearGroup>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct CalculateResponse {
    results: Vec<MonthRecord>,
    year_summaries: Vec<MonthRecord>,
}

#[derive(Debug, Serialize)]
struct BreakdownResponse {
    state: DisplayState,
    parts: Vec<RenderPart>,
    depth: usize,
    can_go_back: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ignored_steps: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MetricInfo {
    key: &'static str,
    name: &'static str,
    policy: SummaryPolicy,
    format: ValueFormat,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

fn build_inputs(scenario: &ScenarioArgs) -> Result<(InputParameters, u32), InputError> {
    let mut errors = Vec::new();

    if !scenario.purchase_price.is_finite() {
        errors.push("Purchase Price must be a valid number".to_string());
    } else if scenario.purchase_price <= 0.0 {
        errors.push("Purchase Price must be greater than 0".to_string());
    }

    if !(0.0..=100.0).contains(&scenario.downpayment_percentage) {
        errors.push("Downpayment Percentage must be between 0 and 100".to_string());
    }

    if !scenario.interest_rate.is_finite() {
        errors.push("Interest Rate must be a valid number".to_string());
    } else if scenario.interest_rate < 0.0 {
        errors.push("Interest Rate cannot be negative".to_string());
    }

    if !scenario.loan_years.is_finite() {
        errors.push("Loan Years must be a valid number".to_string());
    } else if scenario.loan_years.trunc() <= 0.0 {
        errors.push("Loan Years must be greater than 0".to_string());
    } else if scenario.loan_years.trunc() > f64::from(MAX_LOAN_YEARS) {
        errors.push(format!("Loan Years cannot exceed {MAX_LOAN_YEARS}"));
    }

    // (label, value, may be negative)
    let amounts = [
        ("Maintenance - Monthly Base", scenario.maintenance_base, false),
        ("Maintenance - Yearly Increase", scenario.maintenance_increase, true),
        ("Property Tax - Annual Base", scenario.property_tax_base, false),
        ("Property Tax - Yearly Increase", scenario.property_tax_increase, true),
        ("Annual Insurance", scenario.insurance, false),
        ("Monthly Utilities", scenario.utilities, false),
        ("Annual Repairs", scenario.repairs, false),
        ("Monthly Rental", scenario.rental_income_base, false),
        ("Rental - Yearly Increase", scenario.rental_increase, true),
        ("Marginal Tax Rate", scenario.marginal_tax_rate, false),
        ("Expected Return Rate", scenario.expected_return_rate, false),
        (
            "Real Estate Market Increase",
            scenario.real_estate_market_increase,
            true,
        ),
        ("Commission Percentage", scenario.commission_percentage, false),
    ];
    for (label, value, may_be_negative) in amounts {
        if !value.is_finite() {
            errors.push(format!("{label} must be a valid number"));
        } else if value < 0.0 && !may_be_negative {
            errors.push(format!("{label} cannot be negative"));
        }
    }

    if !(1..=MAX_PROJECTION_YEARS).contains(&scenario.num_years) {
        errors.push(format!(
            "Number of Years must be between 1 and {MAX_PROJECTION_YEARS}"
        ));
    }

    if !errors.is_empty() {
        return Err(InputError::Invalid(errors));
    }

    let inputs = InputParameters {
        purchase_price: scenario.purchase_price,
        downpayment_percentage: scenario.downpayment_percentage,
        interest_rate: scenario.interest_rate,
        loan_years: scenario.loan_years.trunc(),
        payment_type: scenario.payment_type.into(),
        maintenance_base: scenario.maintenance_base,
        maintenance_increase: scenario.maintenance_increase,
        property_tax_base: scenario.property_tax_base,
        property_tax_increase: scenario.property_tax_increase,
        insurance: scenario.insurance,
        utilities: scenario.utilities,
        repairs: scenario.repairs,
        rental_income_base: scenario.rental_income_base,
        rental_increase: scenario.rental_increase,
        marginal_tax_rate: scenario.marginal_tax_rate,
        expected_return_rate: scenario.expected_return_rate,
        real_estate_market_increase: scenario.real_estate_market_increase,
        commission_percentage: scenario.commission_percentage,
    };
    Ok((inputs, scenario.num_years))
}

pub fn explain(args: &ExplainArgs) -> Result<String, ExplainError> {
    let (inputs, num_years) = build_inputs(&args.scenario)?;
    let records = run_projection(&inputs, num_years);

    let context = match args.summary_year {
        Some(year) => {
            let mut groups = group_by_year(&records);
            let last = groups.len() as u32;
            if year == 0 || year > last {
                return Err(ExplainError::YearOutOfRange { year, last });
            }
            let group = groups.swap_remove(year as usize - 1);
            let data = summarize_year(&group).unwrap_or_default();
            RowContext::new(data, inputs, Some(group))
        }
        None => {
            let last = num_years * 12;
            let data = records
                .get(args.month as usize)
                .cloned()
                .ok_or(ExplainError::MonthOutOfRange {
                    month: args.month,
                    last,
                })?;
            RowContext::new(data, inputs, None)
        }
    };

    let mut navigator = Navigator::new().show(&args.metric, context);
    for label in &args.expand {
        navigator = navigator.try_expand(label)?;
    }
    let state = navigator.current().ok_or(NavigationError::NothingShown)?;
    Ok(format_report(state, args))
}

fn format_report(state: &DisplayState, args: &ExplainArgs) -> String {
    let row = match args.summary_year {
        Some(year) => format!("Year {year} summary"),
        None => format!("Month {}", args.month),
    };
    let expression = &state.breakdown.expression;
    let mut lines = vec![
        format!("{} ({row})", state.title),
        String::new(),
        render_plain(expression),
        String::new(),
    ];
    lines.extend(render_legend(expression));
    lines.push(String::new());
    lines.push(format!("Result: {}", state.breakdown.result));
    if let Some(note) = &state.breakdown.note {
        lines.push(note.clone());
    }
    lines.join("\n")
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/calculate", post(calculate_handler))
        .route("/api/breakdown", post(breakdown_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "propcalc API listening");
    info!("Local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, router()).await
}

async fn health_handler() -> impl IntoResponse {
    with_cache_control("ok")
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn metrics_handler() -> Response {
    json_response(StatusCode::OK, metric_catalogue())
}

async fn calculate_handler(payload: Result<Json<CalculatePayload>, JsonRejection>) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return invalid_json(&rejection),
    };
    match calculate_from_payload(payload) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => input_error_response(&err),
    }
}

async fn breakdown_handler(payload: Result<Json<BreakdownPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => match replay_breakdown(payload) {
            Ok(response) => json_response(StatusCode::OK, response),
            Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        },
        Err(rejection) => invalid_json(&rejection),
    }
}

fn metric_catalogue() -> Vec<MetricInfo> {
    Metric::ALL
        .into_iter()
        .map(|metric| MetricInfo {
            key: metric.key(),
            name: metric.display_name(),
            policy: metric.summary_policy(),
            format: metric.value_format(),
        })
        .collect()
}

fn calculate_from_payload(payload: CalculatePayload) -> Result<CalculateResponse, InputError> {
    let scenario = scenario_from_payload(payload)?;
    let (inputs, num_years) = build_inputs(&scenario)?;
    let results = run_projection(&inputs, num_years);
    let year_summaries = group_by_year(&results)
        .iter()
        .filter_map(|group| summarize_year(group))
        .collect();
    Ok(CalculateResponse {
        results,
        year_summaries,
    })
}

fn scenario_from_payload(payload: CalculatePayload) -> Result<ScenarioArgs, InputError> {
    if payload == CalculatePayload::default() {
        return Err(InputError::Empty);
    }
    let mut scenario = default_scenario_for_api();

    if let Some(v) = payload.purchase_price {
        scenario.purchase_price = v;
    }
    if let Some(v) = payload.downpayment_percentage {
        scenario.downpayment_percentage = v;
    }
    if let Some(v) = payload.interest_rate {
        scenario.interest_rate = v;
    }
    if let Some(v) = payload.loan_years {
        scenario.loan_years = v;
    }
    if let Some(v) = payload.payment_type {
        scenario.payment_type = v.into();
    }
    if let Some(v) = payload.maintenance_base {
        scenario.maintenance_base = v;
    }
    if let Some(v) = payload.maintenance_increase {
        scenario.maintenance_increase = v;
    }
    if let Some(v) = payload.property_tax_base {
        scenario.property_tax_base = v;
    }
    if let Some(v) = payload.property_tax_increase {
        scenario.property_tax_increase = v;
    }
    if let Some(v) = payload.insurance {
        scenario.insurance = v;
    }
    if let Some(v) = payload.utilities {
        scenario.utilities = v;
    }
    if let Some(v) = payload.repairs {
        scenario.repairs = v;
    }
    if let Some(v) = payload.rental_income_base {
        scenario.rental_income_base = v;
    }
    if let Some(v) = payload.rental_increase {
        scenario.rental_increase = v;
    }
    if let Some(v) = payload.marginal_tax_rate {
        scenario.marginal_tax_rate = v;
    }
    if let Some(v) = payload.expected_return_rate {
        scenario.expected_return_rate = v;
    }
    if let Some(v) = payload.real_estate_market_increase {
        scenario.real_estate_market_increase = v;
    }
    if let Some(v) = payload.commission_percentage {
        scenario.commission_percentage = v;
    }
    if let Some(v) = payload.num_years {
        scenario.num_years = v;
    }

    Ok(scenario)
}

fn default_scenario_for_api() -> ScenarioArgs {
    ScenarioArgs {
        purchase_price: 0.0,
        downpayment_percentage: 20.0,
        interest_rate: 0.0,
        loan_years: 30.0,
        payment_type: CliPaymentType::PrincipalAndInterest,
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
        commission_percentage: 5.0,
        num_years: DEFAULT_NUM_YEARS,
    }
}

fn replay_breakdown(payload: BreakdownPayload) -> Result<BreakdownResponse, NavigationError> {
    let context = RowContext::new(payload.data, payload.inputs, payload.year_group);
    let mut navigator = Navigator::new().show(&payload.metric, context);
    let mut ignored_steps = Vec::new();

    for step in &payload.steps {
        let next = match step {
            Step::Expand(label) => navigator.try_expand(label),
            Step::Back => navigator.try_go_back(),
            Step::Reset => navigator.try_reset(),
        };
        match next {
            Ok(next) => navigator = next,
            Err(err) => {
                debug!(?step, error = %err, "breakdown step ignored");
                ignored_steps.push(err.to_string());
            }
        }
    }

    let state = navigator
        .current()
        .cloned()
        .ok_or(NavigationError::NothingShown)?;
    Ok(BreakdownResponse {
        parts: render_parts(&state.breakdown.expression),
        depth: navigator.depth(),
        can_go_back: navigator.can_go_back(),
        state,
        ignored_steps,
    })
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            errors: Vec::new(),
        },
    )
}

fn input_error_response(err: &InputError) -> Response {
    let error = match err {
        InputError::Empty => err.to_string(),
        InputError::Invalid(_) => "Validation errors".to_string(),
    };
    json_response(
        StatusCode::BAD_REQUEST,
        ErrorResponse {
            error,
            errors: err.violations(),
        },
    )
}

fn invalid_json(rejection: &JsonRejection) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        &format!("Invalid JSON payload: {}", rejection.body_text()),
    )
}

#[cfg(test)]
fn calculate_from_json(json: &str) -> Result<CalculateResponse, InputError> {
    let payload = serde_json::from_str::<CalculatePayload>(json)
        .map_err(|e| InputError::Invalid(vec![format!("Invalid API JSON payload: {e}")]))?;
    calculate_from_payload(payload)
}
