//! Record fixtures shared by unit tests

use crate::PersistentRecord;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PersistentRecord)]
#[depot(table = "USERS")]
pub struct UserRecord {
    #[depot(id, generated(strategy = "identity"))]
    pub user_id: i32,
    pub name: String,
    pub age: i32,
}

#[derive(Debug, Clone, PersistentRecord)]
#[depot(
    table = "GAMES",
    index(name = "ix_owner", fields("owner_id")),
    full_text(name = "title", fields("title"))
)]
pub struct GameRecord {
    #[depot(id)]
    pub game_id: i32,
    pub owner_id: i32,
    #[depot(column(name = "TITLE", length = 64))]
    pub title: String,
    pub created: NaiveDateTime,
}

#[derive(Debug, Clone, PersistentRecord)]
pub struct MembershipRecord {
    #[depot(id)]
    pub group_id: i32,
    #[depot(id)]
    pub user_id: i32,
    #[depot(column(nullable))]
    pub rank: Option<i32>,
}

/// Per-user rollup read from the `USERS` table
#[derive(Debug, Clone, PersistentRecord)]
#[depot(computed(shadow_of = UserRecord))]
pub struct UserSummaryRecord {
    pub user_id: i32,
    pub name: String,
    #[depot(computed(definition = "count(*)"))]
    pub game_count: i64,
}

/// Needs a from override to be selected
#[derive(Debug, Clone, PersistentRecord)]
#[depot(computed)]
pub struct TagCountRecord {
    pub tag: String,
    pub count: i64,
}

/// Carries a computed field that projections skip
#[derive(Debug, Clone, PersistentRecord)]
#[depot(table = "SCORES")]
pub struct ScoreRecord {
    #[depot(id)]
    pub score_id: i32,
    pub points: i32,
    #[depot(computed(required = false))]
    pub rank: i32,
}
