//! Arithmetic on two numbers

use async_trait::async_trait;
use serde_json::Value;

use lmpipe_core::{Error, Result};

use super::{Tool, ToolParameter, number_arg, string_arg};

pub struct CalculatorTool;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Whole numbers keep one decimal place: `5.0`, not `5`
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

impl CalculatorTool {
    pub fn evaluate(var1: f64, var2: f64, operation: &str) -> Result<String> {
        let result = match operation {
            "addition" => round_to(var1 + var2, 4),
            "multiplication" => round_to(var1 * var2, 2),
            "division" => {
                if var2 == 0.0 {
                    return Ok("Variable 2 cannot be 0.".to_string());
                }
                round_to(var1 / var2, 2)
            }
            "exponent" => round_to(var1.powf(var2), 2),
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unknown operation '{}'. Use addition, multiplication, division or exponent",
                    other
                )));
            }
        };

        if !result.is_finite() {
            return Err(Error::Tool(format!("{} of {} and {} is not a finite number", operation, var1, var2)));
        }
        Ok(format_number(result))
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "CalculatorTool"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("var1", "float", "Variable 1."),
            ToolParameter::new("var2", "float", "Variable 2."),
            ToolParameter::new(
                "operation",
                "str",
                "Choose one of the following operations: addition, multiplication, division or exponent",
            ),
        ]
    }

    async fn call(&self, args: &Value) -> Result<String> {
        let var1 = number_arg(args, "var1")?;
        let var2 = number_arg(args, "var2")?;
        let operation = string_arg(args, "operation")?;
        Self::evaluate(var1, var2, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operations() {
        assert_eq!(CalculatorTool::evaluate(2.0, 3.0, "addition").unwrap(), "5.0");
        assert_eq!(CalculatorTool::evaluate(0.1, 0.2, "addition").unwrap(), "0.3");
        assert_eq!(CalculatorTool::evaluate(1.23456, 0.0, "addition").unwrap(), "1.2346");
        assert_eq!(CalculatorTool::evaluate(3.0, 4.5, "multiplication").unwrap(), "13.5");
        assert_eq!(CalculatorTool::evaluate(1.0, 3.0, "division").unwrap(), "0.33");
        assert_eq!(CalculatorTool::evaluate(2.0, 10.0, "exponent").unwrap(), "1024.0");
    }

    #[test]
    fn test_division_by_zero_is_an_answer() {
        assert_eq!(CalculatorTool::evaluate(1.0, 0.0, "division").unwrap(), "Variable 2 cannot be 0.");
    }

    #[test]
    fn test_unknown_operation() {
        assert!(matches!(CalculatorTool::evaluate(1.0, 2.0, "modulo"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(CalculatorTool::evaluate(10.0, 1000.0, "exponent"), Err(Error::Tool(_))));
    }

    #[tokio::test]
    async fn test_call_with_string_numbers() {
        let args = json!({"var1": "10", "var2": 4, "operation": "division"});
        assert_eq!(CalculatorTool.call(&args).await.unwrap(), "2.5");

        let missing = json!({"var1": 1, "operation": "addition"});
        assert!(matches!(CalculatorTool.call(&missing).await, Err(Error::InvalidInput(_))));
    }
}
