use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use sluice_tools::Presentation;
use sluice_tools::tools::time::{
    CurrentTime, CurrentTimeError, CurrentTimeParams, CurrentTimeToolSpec,
    DEFAULT_UTC_OFFSET_HOURS, TIME_COMPONENT,
};

use crate::tools::tool::{Tool, ToolContext};

/// `get_current_time`, rendered inline as a time card.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTimeTool;

fn format_at(now: DateTime<Utc>, offset_hours: i32) -> Result<CurrentTime, CurrentTimeError> {
    let invalid = CurrentTimeError::InvalidOffset {
        hours: offset_hours,
    };
    if !(-12..=14).contains(&offset_hours) {
        return Err(invalid);
    }
    let offset = FixedOffset::east_opt(offset_hours * 3600).ok_or(invalid)?;
    let local = now.with_timezone(&offset);
    Ok(CurrentTime {
        timestamp: local.to_rfc3339(),
        formatted: local.format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

#[async_trait]
impl Tool for CurrentTimeTool {
    type Spec = CurrentTimeToolSpec;

    const DESCRIPTION: &'static str =
        "Get the current date and time. Optionally pass a UTC offset in hours (defaults to UTC+8).";

    fn presentation(&self) -> Presentation {
        Presentation::inline(TIME_COMPONENT)
    }

    async fn execute(
        &self,
        params: CurrentTimeParams,
        _ctx: &ToolContext,
    ) -> Result<CurrentTime, CurrentTimeError> {
        format_at(
            Utc::now(),
            params.utc_offset_hours.unwrap_or(DEFAULT_UTC_OFFSET_HOURS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(8, "2024-03-01 20:30:00", "2024-03-01T20:30:00+08:00")]
    #[case(0, "2024-03-01 12:30:00", "2024-03-01T12:30:00+00:00")]
    #[case(-5, "2024-03-01 07:30:00", "2024-03-01T07:30:00-05:00")]
    fn formats_in_offset(#[case] hours: i32, #[case] formatted: &str, #[case] timestamp: &str) {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let time = format_at(now, hours).unwrap();
        assert_eq!(time.formatted, formatted);
        assert_eq!(time.timestamp, timestamp);
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            format_at(now, 15),
            Err(CurrentTimeError::InvalidOffset { hours: 15 })
        );
    }

    #[tokio::test]
    async fn defaults_to_utc_plus_eight() {
        let ctx = ToolContext::new("call_1", tokio_util::sync::CancellationToken::new());
        let time = CurrentTimeTool
            .execute(CurrentTimeParams { utc_offset_hours: None }, &ctx)
            .await
            .unwrap();
        assert!(time.timestamp.ends_with("+08:00"));
    }
}
