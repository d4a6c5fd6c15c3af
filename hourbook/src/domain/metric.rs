use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::hour::DisplayHour;

/// The three hourly analytics screens that share the editing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    CustomerFlow,
    Heatmap,
    Queue,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::CustomerFlow, Screen::Heatmap, Screen::Queue];

    /// Fields shown per hour, in column order.
    pub fn fields(self) -> &'static [MetricField] {
        match self {
            Screen::CustomerFlow => &[MetricField::Entered, MetricField::Exited],
            Screen::Heatmap => &[MetricField::TotalVisitors, MetricField::AvgDwellTime],
            Screen::Queue => &[
                MetricField::TotalCustomers,
                MetricField::AvgWaitTime,
                MetricField::MinWaitTime,
                MetricField::MaxWaitTime,
            ],
        }
    }

    pub fn editable_fields(self) -> impl Iterator<Item = MetricField> {
        self.fields().iter().copied().filter(|f| f.is_editable())
    }

    /// Fields whose per-hour values add up to a meaningful daily total.
    pub fn summed_fields(self) -> impl Iterator<Item = MetricField> {
        self.fields()
            .iter()
            .copied()
            .filter(|f| f.kind() == FieldKind::Count)
    }

    pub fn has_field(self, field: MetricField) -> bool {
        self.fields().contains(&field)
    }

    /// Business-hour window in display hours, inclusive.
    pub fn default_window(self) -> (DisplayHour, DisplayHour) {
        const OPEN: DisplayHour = DisplayHour::from_literal(10);
        const FLOW_CLOSE: DisplayHour = DisplayHour::from_literal(21);
        const CLOSE: DisplayHour = DisplayHour::from_literal(22);
        match self {
            Screen::CustomerFlow => (OPEN, FLOW_CLOSE),
            Screen::Heatmap | Screen::Queue => (OPEN, CLOSE),
        }
    }

    /// Word used for the scope entity in messages.
    pub fn entity_label(self) -> &'static str {
        match self {
            Screen::CustomerFlow => "camera",
            Screen::Heatmap => "zone",
            Screen::Queue => "cashier",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::CustomerFlow => "flow",
            Screen::Heatmap => "heatmap",
            Screen::Queue => "queue",
        };
        f.write_str(name)
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flow" | "customer-flow" | "customers" => Ok(Screen::CustomerFlow),
            "heatmap" | "heatmaps" => Ok(Screen::Heatmap),
            "queue" | "queues" => Ok(Screen::Queue),
            other => Err(format!("unknown screen: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Whole numbers; digits-only input.
    Count,
    /// Seconds; non-negative decimal input.
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricField {
    Entered,
    Exited,
    TotalVisitors,
    AvgDwellTime,
    TotalCustomers,
    AvgWaitTime,
    MinWaitTime,
    MaxWaitTime,
}

impl MetricField {
    pub fn kind(self) -> FieldKind {
        match self {
            MetricField::Entered
            | MetricField::Exited
            | MetricField::TotalVisitors
            | MetricField::TotalCustomers => FieldKind::Count,
            MetricField::AvgDwellTime
            | MetricField::AvgWaitTime
            | MetricField::MinWaitTime
            | MetricField::MaxWaitTime => FieldKind::Duration,
        }
    }

    pub fn is_editable(self) -> bool {
        !matches!(self, MetricField::MinWaitTime | MetricField::MaxWaitTime)
    }

    /// Field name as it appears in fetched hourly rows.
    pub fn wire_name(self) -> &'static str {
        match self {
            MetricField::Entered => "entered",
            MetricField::Exited => "exited",
            MetricField::TotalVisitors => "totalVisitors",
            MetricField::AvgDwellTime => "avgDwellTime",
            MetricField::TotalCustomers => "totalCustomers",
            MetricField::AvgWaitTime => "avgWaitTime",
            MetricField::MinWaitTime => "minWaitTime",
            MetricField::MaxWaitTime => "maxWaitTime",
        }
    }

    /// Key the record update endpoint expects for this field.
    pub fn payload_key(self) -> &'static str {
        match self {
            MetricField::Entered => "entering",
            MetricField::Exited => "exiting",
            other => other.wire_name(),
        }
    }

    /// Canonical text of a stored value, used to detect edits that revert to the original.
    pub fn render(self, value: f64) -> String {
        match self.kind() {
            FieldKind::Count => format!("{}", value.round() as i64),
            FieldKind::Duration => format!("{}", value),
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for MetricField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let field = match normalized.as_str() {
            "entered" | "entering" => MetricField::Entered,
            "exited" | "exiting" => MetricField::Exited,
            "totalvisitors" | "visitors" => MetricField::TotalVisitors,
            "avgdwelltime" | "dwell" => MetricField::AvgDwellTime,
            "totalcustomers" | "customers" => MetricField::TotalCustomers,
            "avgwaittime" | "wait" => MetricField::AvgWaitTime,
            "minwaittime" => MetricField::MinWaitTime,
            "maxwaittime" => MetricField::MaxWaitTime,
            _ => return Err(format!("unknown field: {s}")),
        };
        Ok(field)
    }
}
