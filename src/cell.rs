use serde::{Deserialize, Serialize};
use std::fmt;

/// One grid cell. Serialized as JSON `null`, a number, or a string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellKind {
    Empty,
    Numeric,
    Text,
}

/// Canonical numeric coercion for user-entered text.
///
/// Surrounding whitespace is ignored; the remainder must parse as a finite
/// number. Blank strings are not numbers.
pub fn parse_number(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    /// `Text("")` collapses to `Empty`; everything else is returned as is.
    pub fn normalized(self) -> Self {
        match self {
            CellValue::Text(s) if s.is_empty() => CellValue::Empty,
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// The single coercion rule shared by statistics, banding and fill
    /// ratios. Numbers must be finite; text must parse via [`parse_number`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(n) => n.is_finite().then_some(*n),
            CellValue::Text(s) => parse_number(s),
        }
    }

    pub fn kind(&self) -> CellKind {
        if self.is_empty() {
            CellKind::Empty
        } else if self.as_number().is_some() {
            CellKind::Numeric
        } else {
            CellKind::Text
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == CellKind::Numeric
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::text(v)
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::text(v)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_accepts_padded_numbers_only() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("1e2"), Some(100.0));
        assert_eq!(parse_number("-3.5"), Some(-3.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("absent"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn kinds_follow_coercion() {
        assert_eq!(CellValue::Empty.kind(), CellKind::Empty);
        assert_eq!(CellValue::Text(String::new()).kind(), CellKind::Empty);
        assert_eq!(CellValue::Number(7.0).kind(), CellKind::Numeric);
        assert_eq!(CellValue::Number(f64::NAN).kind(), CellKind::Text);
        assert_eq!(CellValue::from("88").kind(), CellKind::Numeric);
        assert_eq!(CellValue::from("غائب").kind(), CellKind::Text);
        assert_eq!(CellValue::from("  ").kind(), CellKind::Text);
    }

    #[test]
    fn json_shape_is_null_number_or_string() {
        let cells = vec![
            CellValue::Empty,
            CellValue::Number(1.5),
            CellValue::from("x"),
        ];
        let raw = serde_json::to_value(&cells).expect("serialize");
        assert_eq!(raw, serde_json::json!([null, 1.5, "x"]));
        let back: Vec<CellValue> = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(back, cells);
    }

    #[test]
    fn display_drops_integer_fraction() {
        assert_eq!(CellValue::Number(95.0).to_string(), "95");
        assert_eq!(CellValue::Number(72.25).to_string(), "72.25");
        assert_eq!(CellValue::Empty.to_string(), "");
    }
}
