use serde::{Deserialize, Serialize};

use super::metric::Metric;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Column,
    Input,
    Literal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "−")]
    Minus,
    #[serde(rename = "×")]
    Times,
    #[serde(rename = "÷")]
    Divide,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "−",
            Operator::Times => "×",
            Operator::Divide => "÷",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueNode {
    pub text: String,
    pub label: String,
    pub source: String,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    #[serde(default)]
    pub expandable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Value(ValueNode),
    Operator { symbol: Operator },
    Equals,
    Literal { text: String },
}

impl Node {
    pub fn literal(text: impl Into<String>) -> Self {
        Node::Literal { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Node::Value(value) => &value.text,
            Node::Operator { symbol } => symbol.symbol(),
            Node::Equals => "=",
            Node::Literal { text } => text,
        }
    }

    pub fn as_value(&self) -> Option<&ValueNode> {
        match self {
            Node::Value(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(Vec<Node>);

impl Expression {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self(nodes)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last_text(&self) -> Option<&str> {
        self.0.last().map(Node::text)
    }

    pub fn equals_count(&self) -> usize {
        self.0.iter().filter(|node| matches!(node, Node::Equals)).count()
    }

    pub fn values(&self) -> impl Iterator<Item = &ValueNode> {
        self.0.iter().filter_map(Node::as_value)
    }

    pub fn find_value(&self, predicate: impl Fn(&ValueNode) -> bool) -> Option<&ValueNode> {
        self.values().find(|value| predicate(value))
    }

    pub fn truncate_before_equals(&self) -> Expression {
        Expression(
            self.0
                .iter()
                .take_while(|node| !matches!(node, Node::Equals))
                .cloned()
                .collect(),
        )
    }

    // Later matches are left untouched.
    pub fn substitute_first_match(
        &self,
        predicate: impl Fn(&ValueNode) -> bool,
        replacement: &Expression,
    ) -> Expression {
        let mut nodes = Vec::with_capacity(self.0.len() + replacement.len() + 2);
        let mut replaced = false;
        for node in &self.0 {
            match node {
                Node::Value(value) if !replaced && predicate(value) => {
                    replaced = true;
                    nodes.push(Node::literal("("));
                    nodes.extend(replacement.0.iter().cloned());
                    nodes.push(Node::literal(")"));
                }
                other => nodes.push(other.clone()),
            }
        }
        Expression(nodes)
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for node in &self.0 {
            match node {
                Node::Operator { .. } | Node::Equals => {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    out.push_str(node.text());
                    out.push(' ');
                }
                _ => out.push_str(node.text()),
            }
        }
        out.trim_end().to_string()
    }
}

#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    nodes: Vec<Node>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn value(
        mut self,
        text: String,
        label: &str,
        source: String,
        provenance: Provenance,
        metric: Option<Metric>,
    ) -> Self {
        self.nodes.push(Node::Value(ValueNode {
            text,
            label: label.to_string(),
            source,
            provenance,
            metric,
            expandable: provenance == Provenance::Column && metric.is_some(),
        }));
        self
    }

    pub fn column(
        self,
        metric: Metric,
        label: &str,
        text: String,
        source: impl Into<String>,
    ) -> Self {
        self.value(text, label, source.into(), Provenance::Column, Some(metric))
    }

    pub fn derived(self, label: &str, text: String, source: impl Into<String>) -> Self {
        self.value(text, label, source.into(), Provenance::Column, None)
    }

    pub fn column_as(
        self,
        target: Option<Metric>,
        label: &str,
        text: String,
        source: impl Into<String>,
    ) -> Self {
        self.value(text, label, source.into(), Provenance::Column, target)
    }

    pub fn input(self, label: &str, text: String, source: impl Into<String>) -> Self {
        self.value(text, label, source.into(), Provenance::Input, None)
    }

    pub fn constant(self, label: &str, text: String, source: impl Into<String>) -> Self {
        self.value(text, label, source.into(), Provenance::Literal, None)
    }

    pub fn op(mut self, operator: Operator) -> Self {
        self.nodes.push(Node::Operator { symbol: operator });
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.nodes.push(Node::literal(text));
        self
    }

    pub fn text_if(self, condition: bool, text: impl Into<String>) -> Self {
        if condition { self.text(text) } else { self }
    }

    pub fn equals(mut self, result: impl Into<String>) -> Expression {
        self.nodes.push(Node::Equals);
        self.nodes.push(Node::literal(result));
        Expression(self.nodes)
    }

    pub fn build(self) -> Expression {
        Expression(self.nodes)
    }
}
