use std::collections::HashMap;

use serde::Serialize;

use super::expression::{Expression, Node};

pub const PALETTE_SIZE: usize = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Value,
    Operator,
    Equals,
    Literal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalloutSide {
    Above,
    Below,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderPart {
    pub text: String,
    pub kind: PartKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub expandable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_slot: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<CalloutSide>,
}

impl RenderPart {
    fn plain(text: &str, kind: PartKind) -> Self {
        Self {
            text: text.to_string(),
            kind,
            label: None,
            source: None,
            expandable: false,
            color_slot: None,
            side: None,
        }
    }
}

// Slots follow first appearance and wrap; unlabelled values use slot 0.
pub fn render_parts(expression: &Expression) -> Vec<RenderPart> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut value_index = 0usize;
    expression
        .nodes()
        .iter()
        .map(|node| match node {
            Node::Value(value) => {
                let color_slot = if value.label.is_empty() {
                    0
                } else {
                    let next = slots.len() % PALETTE_SIZE;
                    *slots.entry(value.label.as_str()).or_insert(next)
                };
                let side = if value_index % 2 == 0 {
                    CalloutSide::Above
                } else {
                    CalloutSide::Below
                };
                value_index += 1;
                RenderPart {
                    text: value.text.clone(),
                    kind: PartKind::Value,
                    label: Some(value.label.clone()),
                    source: Some(value.source.clone()),
                    expandable: value.expandable,
                    color_slot: Some(color_slot),
                    side: Some(side),
                }
            }
            Node::Operator { .. } => RenderPart::plain(node.text(), PartKind::Operator),
            Node::Equals => RenderPart::plain(node.text(), PartKind::Equals),
            Node::Literal { text } => RenderPart::plain(text, PartKind::Literal),
        })
        .collect()
}

pub fn render_plain(expression: &Expression) -> String {
    expression.plain_text()
}

pub fn render_legend(expression: &Expression) -> Vec<String> {
    expression
        .values()
        .map(|value| {
            format!(
                "{}{}: {} ({})",
                if value.expandable { "+ " } else { "  " },
                value.label,
                value.text,
                value.source
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::{ExpressionBuilder, Operator};
    use crate::core::metric::Metric;

    #[test]
    fn repeated_labels_share_a_slot() {
        let expression = ExpressionBuilder::new()
            .input("Monthly Rate (r)", "0.46%".into(), "Input")
            .op(Operator::Times)
            .input("Loan Principal", "$1.00".into(), "Input")
            .op(Operator::Times)
            .input("Monthly Rate (r)", "0.46%".into(), "Input")
            .equals("$2.00");
        let parts = render_parts(&expression);
        let slots: Vec<_> = parts.iter().filter_map(|p| p.color_slot).collect();
        assert_eq!(slots, vec![0, 1, 0]);
        assert_eq!(parts.len(), expression.len());
        assert_eq!(parts[1].kind, PartKind::Operator);
        assert_eq!(parts[5].kind, PartKind::Equals);
        assert_eq!(parts[6].kind, PartKind::Literal);
    }

    #[test]
    fn slots_wrap_around_the_palette() {
        let labels: Vec<String> = (0..12).map(|i| format!("Label {i}")).collect();
        let expression = labels
            .iter()
            .fold(ExpressionBuilder::new(), |builder, label| {
                builder.input(label, "$1.00".into(), "Input")
            })
            .build();
        let slots: Vec<_> = render_parts(&expression)
            .into_iter()
            .filter_map(|p| p.color_slot)
            .collect();
        assert_eq!(slots[9], 9);
        assert_eq!(slots[10], 0);
        assert_eq!(slots[11], 1);
    }

    #[test]
    fn unlabelled_values_use_first_slot() {
        let expression = ExpressionBuilder::new()
            .input("First", "$1.00".into(), "Input")
            .input("", "$2.00".into(), "Input")
            .input("Second", "$3.00".into(), "Input")
            .build();
        let slots: Vec<_> = render_parts(&expression)
            .into_iter()
            .filter_map(|p| p.color_slot)
            .collect();
        assert_eq!(slots, vec![0, 0, 1]);
    }

    #[test]
    fn callouts_alternate_sides() {
        let expression = ExpressionBuilder::new()
            .column(Metric::RentalIncome, "Rental Income", "$1.00".into(), "Rental Income column")
            .op(Operator::Minus)
            .column(Metric::TotalExpenses, "Total Expenses", "$1.00".into(), "Total Expenses column")
            .op(Operator::Minus)
            .column(Metric::TaxesDue, "Taxes Due", "$1.00".into(), "Taxes Due column")
            .equals("-$1.00");
        let sides: Vec<_> = render_parts(&expression)
            .into_iter()
            .filter_map(|p| p.side)
            .collect();
        assert_eq!(
            sides,
            vec![CalloutSide::Above, CalloutSide::Below, CalloutSide::Above]
        );
    }

    #[test]
    fn legend_marks_expandable_values() {
        let expression = ExpressionBuilder::new()
            .column(Metric::HomeValue, "Home Value", "$1.00".into(), "Home Value column")
            .op(Operator::Times)
            .input("Commission Rate", "5.00%".into(), "Input: Commission Percentage")
            .equals("$0.05");
        assert_eq!(
            render_legend(&expression),
            vec![
                "+ Home Value: $1.00 (Home Value column)".to_string(),
                "  Commission Rate: 5.00% (Input: Commission Percentage)".to_string(),
            ]
        );
        assert_eq!(render_plain(&expression), "$1.00 × 5.00% = $0.05");
    }
}
