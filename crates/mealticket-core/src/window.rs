//! Daily eligibility window.
//!
//! Windows are minute-of-day ranges, inclusive at both ends, and never
//! wrap past midnight: a window whose start is after its end is never open.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minutes since midnight for any time-of-day value.
pub fn minute_of_day<T: Timelike>(t: &T) -> u16 {
    (t.hour() * 60 + t.minute()) as u16
}

/// Is `now` within `[start_minute, end_minute]`?
///
/// Seconds are ignored, so the whole end minute counts as inside.
pub fn is_within_window<T: Timelike>(now: &T, start_minute: u16, end_minute: u16) -> bool {
    if start_minute > end_minute {
        return false;
    }
    let now = minute_of_day(now);
    now >= start_minute && now <= end_minute
}

/// Parse `HH:MM` (24h) into a minute of day.
pub fn parse_hhmm(text: &str) -> Option<u16> {
    let (h, m) = text.trim().split_once(':')?;
    let h: u16 = h.parse().ok()?;
    let m: u16 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

fn format_hhmm(minute: u16) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// Where `now` sits relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WindowStatus {
    Open { minutes_until_close: u16 },
    /// Closed; opens in this many minutes (today, or tomorrow if today's
    /// window has already passed).
    Upcoming { minutes_until_open: u16 },
    NeverOpen,
}

/// A configured daily window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start_minute: u16,
    end_minute: u16,
}

impl TimeWindow {
    pub fn new(start_minute: u16, end_minute: u16) -> Self {
        Self {
            start_minute,
            end_minute,
        }
    }

    /// Build from `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        let start_minute = parse_hhmm(start).ok_or_else(|| ConfigError::InvalidValue {
            key: "window.start".into(),
            message: format!("expected HH:MM, got '{start}'"),
        })?;
        let end_minute = parse_hhmm(end).ok_or_else(|| ConfigError::InvalidValue {
            key: "window.end".into(),
            message: format!("expected HH:MM, got '{end}'"),
        })?;
        Ok(Self::new(start_minute, end_minute))
    }

    pub fn start_minute(&self) -> u16 {
        self.start_minute
    }

    pub fn end_minute(&self) -> u16 {
        self.end_minute
    }

    pub fn is_open<T: Timelike>(&self, now: &T) -> bool {
        is_within_window(now, self.start_minute, self.end_minute)
    }

    pub fn status<T: Timelike>(&self, now: &T) -> WindowStatus {
        if self.start_minute > self.end_minute {
            return WindowStatus::NeverOpen;
        }
        let now = minute_of_day(now);
        if now < self.start_minute {
            WindowStatus::Upcoming {
                minutes_until_open: self.start_minute - now,
            }
        } else if now <= self.end_minute {
            WindowStatus::Open {
                minutes_until_close: self.end_minute - now,
            }
        } else {
            WindowStatus::Upcoming {
                minutes_until_open: MINUTES_PER_DAY - now + self.start_minute,
            }
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            format_hhmm(self.start_minute),
            format_hhmm(self.end_minute)
        )
    }
}

/// A labelled window, e.g. the morning break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedWindow {
    pub name: String,
    pub window: TimeWindow,
}

/// The nearest window in a schedule relative to `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScheduleStatus {
    Open {
        name: String,
        minutes_until_close: u16,
    },
    Upcoming {
        name: String,
        minutes_until_open: u16,
    },
    /// No window in the schedule can ever open.
    NoWindows,
}

/// Status of the window that is open now, or else of the one that opens
/// soonest (possibly tomorrow). Ties go to the earlier entry.
pub fn schedule_status<T: Timelike>(windows: &[NamedWindow], now: &T) -> ScheduleStatus {
    let mut next: Option<(&str, u16)> = None;
    for entry in windows {
        match entry.window.status(now) {
            WindowStatus::Open {
                minutes_until_close,
            } => {
                return ScheduleStatus::Open {
                    name: entry.name.clone(),
                    minutes_until_close,
                };
            }
            WindowStatus::Upcoming { minutes_until_open } => {
                if next.map_or(true, |(_, best)| minutes_until_open < best) {
                    next = Some((entry.name.as_str(), minutes_until_open));
                }
            }
            WindowStatus::NeverOpen => {}
        }
    }
    match next {
        Some((name, minutes_until_open)) => ScheduleStatus::Upcoming {
            name: name.to_string(),
            minutes_until_open,
        },
        None => ScheduleStatus::NoWindows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn inclusive_at_both_boundaries() {
        assert!(is_within_window(&at(14, 55), 895, 905));
        assert!(is_within_window(&at(15, 5), 895, 905));
        assert!(!is_within_window(&at(14, 54), 895, 905));
        assert!(!is_within_window(&at(15, 6), 895, 905));
    }

    #[test]
    fn seconds_inside_end_minute_still_count() {
        let t = NaiveTime::from_hms_opt(15, 5, 59).unwrap();
        assert!(is_within_window(&t, 895, 905));
    }

    #[test]
    fn inverted_window_never_opens() {
        let w = TimeWindow::new(23 * 60, 60);
        assert!(!w.is_open(&at(23, 30)));
        assert!(!w.is_open(&at(0, 30)));
        assert_eq!(w.status(&at(23, 30)), WindowStatus::NeverOpen);
    }

    #[test]
    fn parse_hhmm_accepts_and_rejects() {
        assert_eq!(parse_hhmm("14:55"), Some(895));
        assert_eq!(parse_hhmm("00:00"), Some(0));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("12:60"), None);
        assert_eq!(parse_hhmm("noon"), None);
    }

    #[test]
    fn status_counts_down() {
        let w = TimeWindow::parse("14:55", "15:15").unwrap();
        assert_eq!(
            w.status(&at(14, 0)),
            WindowStatus::Upcoming {
                minutes_until_open: 55
            }
        );
        assert_eq!(
            w.status(&at(15, 0)),
            WindowStatus::Open {
                minutes_until_close: 15
            }
        );
        // Rolls over to tomorrow's 14:55.
        assert_eq!(
            w.status(&at(16, 0)),
            WindowStatus::Upcoming {
                minutes_until_open: 22 * 60 + 55
            }
        );
    }

    #[test]
    fn display_is_hhmm_range() {
        assert_eq!(TimeWindow::new(895, 915).to_string(), "14:55-15:15");
    }

    fn breaks() -> Vec<NamedWindow> {
        vec![
            NamedWindow {
                name: "morning".into(),
                window: TimeWindow::parse("09:25", "09:45").unwrap(),
            },
            NamedWindow {
                name: "afternoon".into(),
                window: TimeWindow::parse("15:25", "15:45").unwrap(),
            },
        ]
    }

    #[test]
    fn schedule_picks_open_window() {
        assert_eq!(
            schedule_status(&breaks(), &at(15, 30)),
            ScheduleStatus::Open {
                name: "afternoon".into(),
                minutes_until_close: 15
            }
        );
    }

    #[test]
    fn schedule_counts_down_to_nearest() {
        assert_eq!(
            schedule_status(&breaks(), &at(12, 0)),
            ScheduleStatus::Upcoming {
                name: "afternoon".into(),
                minutes_until_open: 205
            }
        );
        // After the last break the morning one is next, tomorrow.
        assert_eq!(
            schedule_status(&breaks(), &at(20, 0)),
            ScheduleStatus::Upcoming {
                name: "morning".into(),
                minutes_until_open: 4 * 60 + 9 * 60 + 25
            }
        );
    }

    #[test]
    fn empty_or_inverted_schedule_has_no_windows() {
        assert_eq!(schedule_status(&[], &at(12, 0)), ScheduleStatus::NoWindows);
        let inverted = vec![NamedWindow {
            name: "night".into(),
            window: TimeWindow::new(23 * 60, 60),
        }];
        assert_eq!(
            schedule_status(&inverted, &at(12, 0)),
            ScheduleStatus::NoWindows
        );
    }

    proptest! {
        #[test]
        fn open_iff_status_open(start in 0u16..1440, end in 0u16..1440, h in 0u32..24, m in 0u32..60) {
            let w = TimeWindow::new(start, end);
            let t = at(h, m);
            let open = matches!(w.status(&t), WindowStatus::Open { .. });
            prop_assert_eq!(w.is_open(&t), open);
        }
    }
}
