use crate::error::Result;
use crate::expression::validate_expression;

/// Execute the `validate` command: check syntax locally.
pub fn execute(expression: &str) -> Result<()> {
    validate_expression(expression)?;
    println!("'{expression}' is a valid cron expression");
    Ok(())
}
