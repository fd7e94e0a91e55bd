//! Structured output parsing for the Bitcoin prediction flow.

use crate::utils::serialization::{de_direction, de_opt_f64};
use serde::{Deserialize, Serialize};
use tarot_oracle::{parse_payload, Direction, OracleError, OracleResult, StructuredPayload};

/// The model's call on where Bitcoin goes next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinCall {
    /// Claimed direction over the prediction horizon
    #[serde(deserialize_with = "de_direction")]
    pub direction: Direction,
    /// The reading itself
    pub prediction: String,
    /// Optional price the model expects at the end of the horizon
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub target_price: Option<f64>,
}

impl BitcoinCall {
    /// Parse a call from an LLM response string.
    pub fn parse(response: &str) -> OracleResult<Self> {
        parse_payload(response)
    }
}

impl StructuredPayload for BitcoinCall {
    fn validate(&self) -> OracleResult<()> {
        if self.prediction.trim().is_empty() {
            return Err(OracleError::MalformedPayload(
                "prediction text is empty".to_string(),
            ));
        }
        if let Some(price) = self.target_price {
            if !price.is_finite() || price <= 0.0 {
                return Err(OracleError::MalformedPayload(format!(
                    "target price must be positive (got {price})"
                )));
            }
        }
        Ok(())
    }
}
