use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use tarot_oracle::Direction;

/// Accepts a number, a numeric string, an empty string or null.
pub(crate) fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            let cleaned = s.trim().trim_start_matches('$').replace(',', "");
            if cleaned.is_empty() {
                Ok(None)
            } else {
                cleaned.parse::<f64>().ok().map(Some).ok_or_else(|| {
                    de::Error::custom(format!("could not parse f64 from string: {s}"))
                })
            }
        }
        Some(other) => Err(de::Error::custom(format!(
            "expected number or string, got: {other}"
        ))),
    }
}

/// Case-insensitive `UP` / `DOWN`.
pub(crate) fn de_direction<'de, D>(deserializer: D) -> Result<Direction, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse::<Direction>()
        .map_err(|_| de::Error::custom(format!("expected UP or DOWN, got: {raw}")))
}

/// Twitter's `Wed Oct 10 20:19:24 +0000 2018` or RFC 3339.
pub(crate) fn de_tweet_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_str(&raw, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(&raw))
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| de::Error::custom(format!("unrecognized tweet timestamp: {raw}")))
}
