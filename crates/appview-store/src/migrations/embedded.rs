//! Embedded SQL migrations, compiled in with include_str!

pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All migrations in application order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_preprints",
            sql: include_str!("../../migrations/001_preprints.sql"),
        },
        Migration {
            id: "002_reviews",
            sql: include_str!("../../migrations/002_reviews.sql"),
        },
    ]
}
