use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
    Weekday,
};
use serde::{Deserialize, Serialize};

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub fn to_chrono(self) -> Weekday {
        match self {
            Self::Mon => Weekday::Mon,
            Self::Tue => Weekday::Tue,
            Self::Wed => Weekday::Wed,
            Self::Thu => Weekday::Thu,
            Self::Fri => Weekday::Fri,
            Self::Sat => Weekday::Sat,
            Self::Sun => Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Week {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

/// One annual clock change: "the `week` `day` of `month` at `hour` o'clock,
/// switch to UTC + `offset_minutes`".
///
/// `hour` is read on the local clock that is in effect before the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeChangeRule {
    pub abbrev: String,
    pub week: Week,
    pub day: DayOfWeek,
    pub month: u32,
    pub hour: u32,
    #[serde(rename = "offsetMinutes")]
    pub offset_minutes: i32,
}

impl TimeChangeRule {
    fn transition_date(&self, year: i32) -> Option<NaiveDate> {
        let weekday = self.day.to_chrono();
        match self.week {
            Week::Last => {
                let (next_year, next_month) = if self.month == 12 {
                    (year + 1, 1)
                } else {
                    (year, self.month + 1)
                };
                let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
                let back = (7 + last.weekday().num_days_from_monday()
                    - weekday.num_days_from_monday())
                    % 7;
                Some(last - Duration::days(back as i64))
            }
            week => {
                let nth = match week {
                    Week::First => 1,
                    Week::Second => 2,
                    Week::Third => 3,
                    _ => 4,
                };
                NaiveDate::from_weekday_of_month_opt(year, self.month, weekday, nth)
            }
        }
    }

    /// UTC instant of this rule's transition in `year`, given the offset in
    /// effect just before it.
    fn transition_utc(&self, year: i32, offset_before_minutes: i32) -> Option<NaiveDateTime> {
        let local = self.transition_date(year)?.and_hms_opt(self.hour, 0, 0)?;
        Some(local - Duration::minutes(offset_before_minutes as i64))
    }

    fn sanitize(&mut self) {
        self.month = self.month.clamp(1, 12);
        self.hour = self.hour.min(23);
        self.offset_minutes = self
            .offset_minutes
            .clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES);
    }
}

/// Standard/daylight rule pair for one time zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeZoneRules {
    pub daylight: TimeChangeRule,
    pub standard: TimeChangeRule,
}

impl Default for TimeZoneRules {
    /// Central European Time (Amsterdam, Frankfurt, Paris).
    fn default() -> Self {
        Self {
            daylight: TimeChangeRule {
                abbrev: "CEST".to_string(),
                week: Week::Last,
                day: DayOfWeek::Sun,
                month: 3,
                hour: 2,
                offset_minutes: 120,
            },
            standard: TimeChangeRule {
                abbrev: "CET".to_string(),
                week: Week::Last,
                day: DayOfWeek::Sun,
                month: 10,
                hour: 3,
                offset_minutes: 60,
            },
        }
    }
}

impl TimeZoneRules {
    pub fn sanitize(&mut self) {
        self.daylight.sanitize();
        self.standard.sanitize();
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.standard.abbrev, self.daylight.abbrev)
    }

    /// Rule in effect at `utc`, decided against both transitions of that
    /// instant's year.
    pub fn active_rule(&self, utc: DateTime<Utc>) -> &TimeChangeRule {
        if self.daylight.offset_minutes == self.standard.offset_minutes {
            return &self.standard;
        }

        let year = utc.year();
        let (Some(daylight_start), Some(standard_start)) = (
            self.daylight
                .transition_utc(year, self.standard.offset_minutes),
            self.standard
                .transition_utc(year, self.daylight.offset_minutes),
        ) else {
            return &self.standard;
        };

        let now = utc.naive_utc();
        let in_daylight = if daylight_start < standard_start {
            now >= daylight_start && now < standard_start
        } else {
            // Southern hemisphere: daylight time spans the new year.
            !(now >= standard_start && now < daylight_start)
        };

        if in_daylight {
            &self.daylight
        } else {
            &self.standard
        }
    }

    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        let offset_secs = self.active_rule(utc).offset_minutes * 60;
        let offset = FixedOffset::east_opt(offset_secs).unwrap_or_else(|| Utc.fix());
        offset.from_utc_datetime(&utc.naive_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use pretty_assertions::assert_eq;

    fn utc(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn last_sunday_dates() {
        let rules = TimeZoneRules::default();

        // 2026: last Sunday of March is the 29th, of October the 25th.
        assert_eq!(
            rules.daylight.transition_date(2026),
            NaiveDate::from_ymd_opt(2026, 3, 29)
        );
        assert_eq!(
            rules.standard.transition_date(2026),
            NaiveDate::from_ymd_opt(2026, 10, 25)
        );
    }

    #[test]
    fn winter_is_utc_plus_one() {
        let local = TimeZoneRules::default().to_local(utc(1, 15, 12, 0));
        assert_eq!(local.hour(), 13);
    }

    #[test]
    fn spring_forward_at_one_utc() {
        let rules = TimeZoneRules::default();

        let before = rules.to_local(utc(3, 29, 0, 59));
        assert_eq!((before.hour(), before.minute()), (1, 59));
        assert_eq!(rules.active_rule(utc(3, 29, 0, 59)).abbrev, "CET");

        let after = rules.to_local(utc(3, 29, 1, 0));
        assert_eq!((after.hour(), after.minute()), (3, 0));
        assert_eq!(rules.active_rule(utc(3, 29, 1, 0)).abbrev, "CEST");
    }

    #[test]
    fn fall_back_at_one_utc() {
        let rules = TimeZoneRules::default();

        assert_eq!(rules.to_local(utc(10, 25, 0, 59)).hour(), 2);
        assert_eq!(rules.to_local(utc(10, 25, 1, 0)).hour(), 2);
        assert_eq!(rules.active_rule(utc(10, 25, 1, 0)).abbrev, "CET");
    }

    #[test]
    fn nth_week_rule() {
        let rule = TimeChangeRule {
            abbrev: "EDT".to_string(),
            week: Week::Second,
            day: DayOfWeek::Sun,
            month: 3,
            hour: 2,
            offset_minutes: -240,
        };

        assert_eq!(
            rule.transition_date(2026),
            NaiveDate::from_ymd_opt(2026, 3, 8)
        );
    }

    #[test]
    fn southern_hemisphere_daylight_spans_new_year() {
        let rules = TimeZoneRules {
            daylight: TimeChangeRule {
                abbrev: "AEDT".to_string(),
                week: Week::First,
                day: DayOfWeek::Sun,
                month: 10,
                hour: 2,
                offset_minutes: 660,
            },
            standard: TimeChangeRule {
                abbrev: "AEST".to_string(),
                week: Week::First,
                day: DayOfWeek::Sun,
                month: 4,
                hour: 3,
                offset_minutes: 600,
            },
        };

        assert_eq!(rules.active_rule(utc(1, 10, 0, 0)).abbrev, "AEDT");
        assert_eq!(rules.active_rule(utc(6, 10, 0, 0)).abbrev, "AEST");
        assert_eq!(rules.active_rule(utc(12, 10, 0, 0)).abbrev, "AEDT");
    }

    #[test]
    fn sanitize_clamps_rule_fields() {
        let mut rules = TimeZoneRules::default();
        rules.daylight.month = 0;
        rules.daylight.hour = 30;
        rules.standard.offset_minutes = 5_000;
        rules.sanitize();

        assert_eq!(rules.daylight.month, 1);
        assert_eq!(rules.daylight.hour, 23);
        assert_eq!(rules.standard.offset_minutes, MAX_OFFSET_MINUTES);
    }
}
