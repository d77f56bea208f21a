use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Arithmetic relationship between a step and the running figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "×")]
    Multiply,
    #[serde(rename = "÷")]
    Divide,
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "max")]
    Max,
}

impl Operation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "×",
            Self::Divide => "÷",
            Self::Equals => "=",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// One line of the audit trail every calculator emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationStep {
    pub label: String,
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl CalculationStep {
    pub fn new(
        label: impl Into<String>,
        value: Decimal,
    ) -> Self {
        Self {
            label: label.into(),
            value,
            operation: None,
            explanation: None,
        }
    }

    pub fn with_operation(
        mut self,
        operation: Operation,
    ) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_explanation(
        mut self,
        explanation: impl Into<String>,
    ) -> Self {
        self.explanation = Some(explanation.into());
        self
    }
}
