use serde::{Deserialize, Serialize};

/// Metrics tracked by the station.
///
/// The set is fixed: the fire-risk index computed on the gateway plus the
/// three sensor readings it derives from.
///
/// # Examples
///
/// ```
/// use vigia_common::types::Metric;
///
/// let m: Metric = "wind_speed".parse().unwrap();
/// assert_eq!(m, Metric::WindSpeed);
/// assert_eq!(m.to_string(), "wind_speed");
/// assert_eq!(m.unit(), "km/h");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FIndex,
    Temperature,
    Humidity,
    WindSpeed,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::FIndex,
        Metric::Temperature,
        Metric::Humidity,
        Metric::WindSpeed,
    ];

    /// Human-readable label used in alarm messages.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::FIndex => "F-index",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::WindSpeed => "wind speed",
        }
    }

    /// Display unit. The F-index is dimensionless.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::FIndex => "",
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::WindSpeed => "km/h",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::FIndex => write!(f, "f_index"),
            Metric::Temperature => write!(f, "temperature"),
            Metric::Humidity => write!(f, "humidity"),
            Metric::WindSpeed => write!(f, "wind_speed"),
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f_index" | "findex" | "f" => Ok(Metric::FIndex),
            "temperature" | "temp" | "t" => Ok(Metric::Temperature),
            "humidity" | "hum" | "h" => Ok(Metric::Humidity),
            "wind_speed" | "wind" | "u" => Ok(Metric::WindSpeed),
            _ => Err(format!("unknown metric: {s}")),
        }
    }
}

/// Comparison operator of a threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    GreaterEqual,
    LessEqual,
    Equal,
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_equal" | "gte" | ">=" => Ok(Self::GreaterEqual),
            "less_equal" | "lte" | "<=" => Ok(Self::LessEqual),
            "equal" | "eq" | "=" | "==" => Ok(Self::Equal),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterEqual => write!(f, "greater_equal"),
            Self::LessEqual => write!(f, "less_equal"),
            Self::Equal => write!(f, "equal"),
        }
    }
}

impl CompareOp {
    /// Phrase used in alarm messages.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::GreaterEqual => "at or above",
            Self::LessEqual => "at or below",
            Self::Equal => "equal to",
        }
    }

    /// Checks the condition on one-decimal fixed-point values, relaxed by
    /// `slack` tenths on the threshold side:
    ///
    /// - `GreaterEqual`: `value >= threshold - slack`
    /// - `LessEqual`: `value <= threshold + slack`
    /// - `Equal`: `|value - threshold| <= slack`
    pub fn holds(&self, value: Tenths, threshold: Tenths, slack: Tenths) -> bool {
        match self {
            Self::GreaterEqual => value >= threshold - slack,
            Self::LessEqual => value <= threshold + slack,
            Self::Equal => (value - threshold).abs() <= slack,
        }
    }
}

/// One-decimal fixed-point value (number of tenths).
///
/// All rule comparisons run on tenths so the hysteresis arithmetic is exact;
/// comparing raw floats would flap on sub-decimal noise.
pub type Tenths = i64;

/// Rounds to one decimal, half up.
pub fn to_tenths(value: f64) -> Tenths {
    (value * 10.0).round() as Tenths
}

/// The `f64` a tenths count stands for, for display.
pub fn tenths_to_f64(tenths: Tenths) -> f64 {
    tenths as f64 / 10.0
}

/// One alarm condition: fire a notification when `metric` compares against
/// `threshold` under `operator`.
///
/// Duplicate (metric, operator, threshold) rules are allowed; only `id` is
/// unique. Disabled rules are inert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub metric: Metric,
    pub operator: CompareOp,
    pub threshold: f64,
    pub enabled: bool,
}

impl Rule {
    /// Builds a new armed rule. The threshold is snapped to one decimal; the
    /// id is provisional until the mutation actor applies the create (ids are
    /// re-checked against the stored list there).
    pub fn new(metric: Metric, operator: CompareOp, threshold: f64) -> Self {
        Self {
            id: chrono::Utc::now().timestamp_millis(),
            metric,
            operator,
            threshold: tenths_to_f64(to_tenths(threshold)),
            enabled: true,
        }
    }

    pub fn threshold_tenths(&self) -> Tenths {
        to_tenths(self.threshold)
    }

    /// Short description for logs and the rule-list CLI.
    pub fn describe(&self) -> String {
        let unit = self.metric.unit();
        if unit.is_empty() {
            format!(
                "{} {} {:.1}",
                self.metric.label(),
                self.operator.phrase(),
                self.threshold
            )
        } else {
            format!(
                "{} {} {:.1} {}",
                self.metric.label(),
                self.operator.phrase(),
                self.threshold,
                unit
            )
        }
    }
}
