use serde::{Deserialize, Serialize};

/// Coarse local time-of-day bucket used to diversify suggestions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    WeekdayMorning,
    WeekdayEvening,
    Weekend,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::WeekdayMorning,
        TimeWindow::WeekdayEvening,
        TimeWindow::Weekend,
    ];

    pub fn index(&self) -> usize {
        match self {
            TimeWindow::WeekdayMorning => 0,
            TimeWindow::WeekdayEvening => 1,
            TimeWindow::Weekend => 2,
        }
    }
}
