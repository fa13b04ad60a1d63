mod breakdown;
mod expression;
mod format;
mod metric;
mod navigator;
mod projection;
mod recurrence;
mod registry;
mod render;
mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use breakdown::{Breakdown, RowContext, compute_breakdown, compute_metric_breakdown};
pub use expression::{Expression, ExpressionBuilder, Node, Operator, Provenance, ValueNode};
pub use format::{format_count, format_currency, format_percent, format_ratio};
pub use metric::{Metric, SummaryPolicy, ValueFormat, normalize_name};
pub use navigator::{DisplayState, NavigationError, Navigator};
pub use projection::{
    MAX_PROJECTION_YEARS, group_by_year, monthly_payment, run_projection, summarize_year,
};
pub use recurrence::{CompoundedBalance, RunningTotal, previous_cumulative_expected_return};
pub use registry::{Row, derive};
pub use render::{CalloutSide, PALETTE_SIZE, PartKind, RenderPart, render_legend, render_parts, render_plain};
pub use types::{
    DEFAULT_LOAN_YEARS, InputParameters, MAX_LOAN_YEARS, MonthRecord, PaymentType, YearGroup,
    finite_or_zero,
};
