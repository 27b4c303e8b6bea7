//! Request handlers of the control surface, independent of the HTTP layer.
//!
//! Each handler takes the request text, reads or mutates the controller and
//! returns the plain-text reply.

use crate::{
    engine::LightingController,
    error::ControlError,
    schedule::Schedule,
    types::{Levels, MAX_INTENSITY},
};

pub const SET_ACCEPTED: &str = "SET command accepted";
pub const OVERRULE_ACCEPTED: &str = "Overrule command accepted";
pub const RESUME_ACCEPTED: &str = "Resume command accepted";

/// Extension of credential files, never served.
const SECRET_EXTENSION: &str = "pw";

pub fn get_schedule(controller: &LightingController) -> String {
    controller.schedule().to_csv()
}

/// First half of a set request. Nothing changes until the parsed schedule has
/// been persisted and passed to `install_schedule`.
pub fn parse_schedule(body: &str) -> Result<Schedule, ControlError> {
    Schedule::parse_csv(body)
}

/// Makes a persisted schedule live and drops any override.
pub fn install_schedule(controller: &mut LightingController, schedule: Schedule) {
    controller.replace_schedule(schedule);
}

pub fn set_override(controller: &mut LightingController, body: &str) -> Levels {
    let (a, b) = parse_override(body);
    controller.set_override(a, b)
}

pub fn resume_schedule(controller: &mut LightingController) -> bool {
    controller.clear_override()
}

/// `"<A>,<B>"`. Channel B is only given when a comma follows a non-empty
/// first value.
pub fn parse_override(body: &str) -> (u8, Option<u8>) {
    let a = lenient_intensity(body);
    let b = match body.find(',') {
        Some(comma) if comma > 0 => Some(lenient_intensity(&body[comma + 1..])),
        _ => None,
    };
    (a, b)
}

/// Reads the leading decimal integer of `text` and clamps it to 0..=100.
/// Leading whitespace and a sign are accepted; no digits reads as 0.
pub fn lenient_intensity(text: &str) -> u8 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, digit| {
            acc.saturating_mul(10).saturating_add((digit - b'0') as u32)
        });

    if negative {
        0
    } else {
        value.min(MAX_INTENSITY as u32) as u8
    }
}

/// Content type for a static asset path, or `NotFound` for secret files,
/// unknown extensions and paths leaving the web root.
pub fn asset_content_type(path: &str) -> Result<&'static str, ControlError> {
    let not_found = || ControlError::NotFound {
        path: path.to_string(),
    };

    if path.split('/').any(|segment| segment == "..") {
        return Err(not_found());
    }

    let file_name = path.rsplit('/').next().unwrap_or(path);
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return Err(not_found());
    };

    match extension.to_ascii_lowercase().as_str() {
        "html" => Ok("text/html"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "jpg" => Ok("image/jpeg"),
        "ico" => Ok("image/x-icon"),
        "css" => Ok("text/css"),
        "js" => Ok("application/javascript"),
        "txt" => Ok("text/plain"),
        "zip" => Ok("application/x-zip"),
        "gz" => Ok("application/x-gzip"),
        SECRET_EXTENSION => Err(not_found()),
        _ => Err(not_found()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::LocalClock, schedule::SLOT_COUNT, timezone::TimeZoneRules, types::Channel};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn controller_at_8pm() -> LightingController {
        let mut clock = LocalClock::new(TimeZoneRules::default(), 600_000);
        clock.sync(Utc.with_ymd_and_hms(2026, 1, 15, 19, 0, 0).unwrap(), 0);

        let mut values = [0u8; SLOT_COUNT];
        values[Schedule::slot_index(20, Channel::A)] = 80;
        values[Schedule::slot_index(20, Channel::B)] = 40;
        LightingController::new(Schedule::from_values(&values).unwrap(), clock)
    }

    #[test]
    fn get_schedule_lists_48_values_with_trailing_comma() {
        let controller = controller_at_8pm();
        let reply = get_schedule(&controller);

        assert!(reply.starts_with("0,0,"));
        assert!(reply.contains(",80,40,"));
        assert_eq!(reply.split(',').filter(|s| !s.is_empty()).count(), SLOT_COUNT);
    }

    #[test]
    fn incomplete_set_is_rejected() {
        let err = parse_schedule("1,2,3,4,5,6,7,8,9,10").unwrap_err();

        assert_eq!(err, ControlError::IncompleteSchedule { parsed: 10 });
    }

    #[test]
    fn accepted_set_replaces_and_clears_override() {
        let mut controller = controller_at_8pm();
        controller.set_override(5, Some(5));
        let body = vec!["12"; SLOT_COUNT].join(",");

        let schedule = parse_schedule(&body).unwrap();
        assert_eq!(schedule.values(), &[12; SLOT_COUNT]);
        assert_eq!(controller.override_levels(), Some(Levels::new(5, 5)));

        install_schedule(&mut controller, schedule);

        assert_eq!(controller.snapshot(), [12; SLOT_COUNT]);
        assert_eq!(controller.override_levels(), None);
    }

    #[test]
    fn override_parsing_is_permissive() {
        assert_eq!(parse_override("5,5"), (5, Some(5)));
        assert_eq!(parse_override(" 70 , 30"), (70, Some(30)));
        assert_eq!(parse_override("40"), (40, None));
        assert_eq!(parse_override("40,"), (40, Some(0)));
        assert_eq!(parse_override(",40"), (0, None));
        assert_eq!(parse_override("abc,-4"), (0, Some(0)));
        assert_eq!(parse_override("250,101"), (100, Some(100)));
    }

    #[test]
    fn override_keeps_previous_b_when_missing() {
        let mut controller = controller_at_8pm();
        set_override(&mut controller, "10,20");

        assert_eq!(set_override(&mut controller, "30"), Levels::new(30, 20));
        assert!(resume_schedule(&mut controller));
        assert_eq!(controller.target(), Some(Levels::new(80, 40)));
    }

    #[test]
    fn asset_types_and_refusals() {
        assert_eq!(asset_content_type("/index.html"), Ok("text/html"));
        assert_eq!(asset_content_type("/img/logo.PNG"), Ok("image/png"));
        assert_eq!(asset_content_type("/favicon.ico"), Ok("image/x-icon"));

        for path in ["/home.pw", "/readme", "/data.bin", "/../etc/passwd.txt", "/"] {
            assert_eq!(
                asset_content_type(path),
                Err(ControlError::NotFound {
                    path: path.to_string()
                }),
                "{path}"
            );
        }
    }
}
