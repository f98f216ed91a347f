mod execution;

use chrono::NaiveDate;

use super::CompileContext;

pub(super) fn fixed_context() -> CompileContext {
    CompileContext {
        kafka_group_id: "ueba".to_string(),
        compiled_at: NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 7))
            .expect("valid timestamp"),
    }
}
