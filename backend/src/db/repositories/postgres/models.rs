use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{matches, rounds};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = matches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // created_at is only read by ad-hoc queries
pub struct MatchRow {
    pub match_id: i64,
    pub season: i32,
    pub sequence_number: i32,
    pub team_a: i64,
    pub team_b: i64,
    pub played_at: DateTime<Utc>,
    pub round_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatchRow {
    pub season: i32,
    pub sequence_number: i32,
    pub team_a: i64,
    pub team_b: i64,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = rounds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)]
pub struct RoundRow {
    pub round_id: i64,
    pub season: i32,
    pub round_number: i32,
    pub first_match: i32,
    pub last_match: i32,
    pub matches_in_round: i32,
    pub min_team_matches: i32,
    pub max_team_matches: i32,
    pub is_balanced: bool,
    pub team_matches_json: Value,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub days_in_round: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = rounds)]
pub struct NewRoundRow {
    pub season: i32,
    pub round_number: i32,
    pub first_match: i32,
    pub last_match: i32,
    pub matches_in_round: i32,
    pub min_team_matches: i32,
    pub max_team_matches: i32,
    pub is_balanced: bool,
    pub team_matches_json: Value,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub days_in_round: i64,
}
