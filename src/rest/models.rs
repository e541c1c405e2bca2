use serde::Serialize;

use crate::query::PaginationMeta;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub pagination: PaginationMeta,
}

#[derive(Serialize)]
pub struct ItemResponse<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    /// Absent on the acting user's own record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_followed: Option<bool>,
}

#[derive(Serialize)]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub followers_count: u64,
    pub followeds_count: u64,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
}

#[derive(Serialize)]
pub struct SleepRecordResponse {
    pub id: i64,
    pub user_id: i64,
    pub user: Option<UserSummary>,
    pub clock_in: Option<i64>,
    pub clock_out: Option<i64>,
    pub duration: String,
    pub detail_info: String,
}

/// `"8 hours, 30 minutes"`; zero components are left out.
pub fn humanize_seconds(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let parts = [
        (seconds / 3600, "hours"),
        ((seconds % 3600) / 60, "minutes"),
        (seconds % 60, "seconds"),
    ];
    parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_skips_zero_parts() {
        assert_eq!(humanize_seconds(8 * 3600 + 30 * 60), "8 hours, 30 minutes");
        assert_eq!(humanize_seconds(3601), "1 hours, 1 seconds");
        assert_eq!(humanize_seconds(59), "59 seconds");
        assert_eq!(humanize_seconds(0), "");
    }

    #[test]
    fn own_record_omits_is_followed() {
        let own = serde_json::to_value(UserResponse {
            id: 1,
            email: "nick@gmail.com".into(),
            is_followed: None,
        })
        .unwrap();
        assert_eq!(own, serde_json::json!({"id": 1, "email": "nick@gmail.com"}));
    }
}
