use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::breakdown::{Breakdown, RowContext, compute_breakdown};
use super::expression::ValueNode;
use super::metric::Metric;
use super::registry;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DisplayState {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    pub breakdown: Breakdown,
    #[serde(skip)]
    context: Arc<RowContext>,
}

impl DisplayState {
    pub fn context(&self) -> &RowContext {
        &self.context
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("nothing is being shown")]
    NothingShown,
    #[error("no value labelled '{0}' in the current formula")]
    LabelNotFound(String),
    #[error("'{0}' cannot be expanded")]
    NotExpandable(String),
    #[error("no earlier formula to go back to")]
    NoHistory,
}

#[derive(Debug)]
struct Frame {
    state: DisplayState,
    parent: History,
    depth: usize,
}

#[derive(Clone, Debug, Default)]
struct History(Option<Arc<Frame>>);

impl History {
    fn push(&self, state: DisplayState) -> History {
        History(Some(Arc::new(Frame {
            state,
            parent: self.clone(),
            depth: self.depth() + 1,
        })))
    }

    fn pop(&self) -> Option<(DisplayState, History)> {
        self.0
            .as_ref()
            .map(|frame| (frame.state.clone(), frame.parent.clone()))
    }

    fn depth(&self) -> usize {
        self.0.as_ref().map_or(0, |frame| frame.depth)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Navigator {
    current: Option<DisplayState>,
    original: Option<DisplayState>,
    history: History,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DisplayState> {
        self.current.as_ref()
    }

    pub fn original(&self) -> Option<&DisplayState> {
        self.original.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.history.depth()
    }

    pub fn can_go_back(&self) -> bool {
        self.depth() > 0
    }

    pub fn show(&self, name: &str, context: RowContext) -> Navigator {
        let breakdown = compute_breakdown(
            name,
            &context.data,
            &context.inputs,
            context.year_group.as_deref(),
        );
        let metric = Metric::from_display_name(name);
        let title = metric.map_or_else(|| name.trim().to_string(), |m| m.display_name().to_string());
        let state = DisplayState {
            title,
            metric,
            breakdown,
            context: Arc::new(context),
        };
        Navigator {
            current: Some(state.clone()),
            original: Some(state),
            history: History::default(),
        }
    }

    pub fn try_expand(&self, label: &str) -> Result<Navigator, NavigationError> {
        let current = self.current.as_ref().ok_or(NavigationError::NothingShown)?;
        let expression = &current.breakdown.expression;
        let matches = |value: &ValueNode| value.label == label && value.expandable;

        let target = match expression.find_value(matches) {
            Some(value) => value,
            None if expression.find_value(|value| value.label == label).is_some() => {
                return Err(NavigationError::NotExpandable(label.to_string()));
            }
            None => return Err(NavigationError::LabelNotFound(label.to_string())),
        };
        let metric = target
            .metric
            .ok_or_else(|| NavigationError::NotExpandable(label.to_string()))?;

        let nested = registry::derive(metric, current.context.row());
        let replacement = nested.expression.truncate_before_equals();
        let expanded = DisplayState {
            breakdown: Breakdown {
                expression: expression.substitute_first_match(matches, &replacement),
                ..current.breakdown.clone()
            },
            ..current.clone()
        };
        debug!(label, metric = metric.key(), depth = self.depth() + 1, "expanded value");

        Ok(Navigator {
            current: Some(expanded),
            original: self.original.clone(),
            history: self.history.push(current.clone()),
        })
    }

    pub fn try_go_back(&self) -> Result<Navigator, NavigationError> {
        let (state, parent) = self.history.pop().ok_or(NavigationError::NoHistory)?;
        Ok(Navigator {
            current: Some(state),
            original: self.original.clone(),
            history: parent,
        })
    }

    pub fn try_reset(&self) -> Result<Navigator, NavigationError> {
        let original = self.original.clone().ok_or(NavigationError::NothingShown)?;
        Ok(Navigator {
            current: Some(original.clone()),
            original: Some(original),
            history: History::default(),
        })
    }

    pub fn expand(&self, label: &str) -> Navigator {
        self.try_expand(label).unwrap_or_else(|err| self.unchanged("expand", err))
    }

    pub fn go_back(&self) -> Navigator {
        self.try_go_back().unwrap_or_else(|err| self.unchanged("go back", err))
    }

    pub fn reset(&self) -> Navigator {
        self.try_reset().unwrap_or_else(|err| self.unchanged("reset", err))
    }

    fn unchanged(&self, action: &str, err: NavigationError) -> Navigator {
        debug!(action, error = %err, "navigation ignored");
        self.clone()
    }
}
