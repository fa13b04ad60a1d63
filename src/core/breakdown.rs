use serde::{Deserialize, Serialize};
use tracing::debug;

use super::expression::{Expression, ExpressionBuilder, Node};
use super::format::format_currency;
use super::metric::{Metric, ValueFormat, normalize_name};
use super::registry::{self, Row};
use super::types::{InputParameters, MonthRecord, YearGroup, finite_or_zero};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub expression: Expression,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    // Unformatted; percent metrics carry a fraction.
    #[serde(default)]
    pub amount: f64,
}

impl Breakdown {
    pub fn conclude(builder: ExpressionBuilder, amount: f64, format: ValueFormat) -> Self {
        let amount = finite_or_zero(amount);
        let result = format.apply(amount);
        Self {
            expression: builder.equals(result.clone()),
            result,
            note: None,
            amount,
        }
    }

    pub fn raw(amount: f64) -> Self {
        let amount = finite_or_zero(amount);
        let result = format_currency(amount);
        Self {
            expression: Expression::new(vec![Node::literal(result.clone())]),
            result,
            note: None,
            amount,
        }
    }

    pub fn illustrating(self, amount: f64, note: String) -> Self {
        let amount = finite_or_zero(amount);
        Self {
            result: format_currency(amount),
            note: Some(note),
            amount,
            ..self
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowContext {
    pub data: MonthRecord,
    pub inputs: InputParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_group: Option<YearGroup>,
}

impl RowContext {
    pub fn new(data: MonthRecord, inputs: InputParameters, year_group: Option<YearGroup>) -> Self {
        Self {
            data,
            inputs,
            year_group,
        }
    }

    pub fn row(&self) -> Row<'_> {
        Row::new(&self.data, &self.inputs, self.year_group.as_deref())
    }

    pub fn is_summary(&self) -> bool {
        self.row().year_group().is_some()
    }
}

pub fn compute_breakdown(
    name: &str,
    data: &MonthRecord,
    inputs: &InputParameters,
    year_group: Option<&[MonthRecord]>,
) -> Breakdown {
    match Metric::from_display_name(name) {
        Some(metric) => compute_metric_breakdown(metric, data, inputs, year_group),
        None => {
            let key = normalize_name(name);
            debug!(metric = name, key = %key, "no derivation rule, showing raw value");
            Breakdown::raw(data.field(&key).unwrap_or(0.0))
        }
    }
}

pub fn compute_metric_breakdown(
    metric: Metric,
    data: &MonthRecord,
    inputs: &InputParameters,
    year_group: Option<&[MonthRecord]>,
) -> Breakdown {
    registry::derive(metric, Row::new(data, inputs, year_group))
}
