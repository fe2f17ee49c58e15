use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::auth::repo_types::{StoreResult, User};

const USER_COLUMNS: &str = "id, username, email, password, bio, created_at";

/// Upper bound on rows returned by [`User::search`].
pub const SEARCH_LIMIT: i64 = 50;

/// `%needle%` with LIKE wildcards in the needle taken literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl User {
    /// Create a new user with an already hashed password.
    ///
    /// A unique-constraint hit surfaces as [`StoreError::Conflict`], which covers
    /// two signups racing past the pre-insert lookup.
    ///
    /// [`StoreError::Conflict`]: crate::auth::repo_types::StoreError::Conflict
    pub async fn create(
        db: &SqlitePool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password, bio, created_at)
            VALUES (?, ?, ?, '', ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// First user whose username or email matches.
    pub async fn find_by_username_or_email(
        db: &SqlitePool,
        username: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = ? OR email = ?
            LIMIT 1
            "#
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Users whose username contains `needle`, or the newest users when there is none.
    pub async fn search(db: &SqlitePool, needle: Option<&str>) -> StoreResult<Vec<User>> {
        let users = match needle {
            Some(needle) => {
                sqlx::query_as::<_, User>(&format!(
                    r#"
                    SELECT {USER_COLUMNS}
                    FROM users
                    WHERE username LIKE ? ESCAPE '\'
                    ORDER BY id
                    LIMIT ?
                    "#
                ))
                .bind(like_pattern(needle))
                .bind(SEARCH_LIMIT)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, User>(&format!(
                    "SELECT {USER_COLUMNS} FROM users ORDER BY id DESC LIMIT ?"
                ))
                .bind(SEARCH_LIMIT)
                .fetch_all(db)
                .await?
            }
        };
        Ok(users)
    }

    pub async fn update_bio(&mut self, db: &SqlitePool, bio: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET bio = ? WHERE id = ?")
            .bind(bio)
            .bind(self.id)
            .execute(db)
            .await?;
        self.bio = bio.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo_types::StoreError, db::connect_in_memory};

    async fn count_users(db: &SqlitePool) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_find_by_every_key() {
        let db = connect_in_memory().await;
        let created = User::create(&db, "alice", "a@x.com", "$argon2id$fake").await.unwrap();
        assert_eq!(created.bio, "");

        let by_email = User::find_by_email(&db, "a@x.com").await.unwrap().unwrap();
        let by_id = User::find_by_id(&db, created.id).await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.username, "alice");

        assert!(User::find_by_username_or_email(&db, "alice", "other@x.com")
            .await
            .unwrap()
            .is_some());
        assert!(User::find_by_username_or_email(&db, "bob", "a@x.com")
            .await
            .unwrap()
            .is_some());
        assert!(User::find_by_username_or_email(&db, "bob", "b@x.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn missing_rows_resolve_to_none() {
        let db = connect_in_memory().await;
        assert!(User::find_by_id(&db, 42).await.unwrap().is_none());
        assert!(User::find_by_email(&db, "nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_hits_unique_constraint() {
        let db = connect_in_memory().await;
        User::create(&db, "first", "dup@x.com", "h1").await.unwrap();

        let err = User::create(&db, "second", "dup@x.com", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(count_users(&db).await, 1);

        let existing = User::find_by_email(&db, "dup@x.com").await.unwrap().unwrap();
        assert_eq!(existing.username, "first");
        assert_eq!(existing.password, "h1");
    }

    #[tokio::test]
    async fn duplicate_username_hits_unique_constraint() {
        let db = connect_in_memory().await;
        User::create(&db, "same", "one@x.com", "h1").await.unwrap();
        let err = User::create(&db, "same", "two@x.com", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(count_users(&db).await, 1);
    }

    #[tokio::test]
    async fn search_matches_substrings_and_caps_results() {
        let db = connect_in_memory().await;
        User::create(&db, "alice", "a@x.com", "h").await.unwrap();
        User::create(&db, "malice", "m@x.com", "h").await.unwrap();
        User::create(&db, "bob", "b@x.com", "h").await.unwrap();
        User::create(&db, "under_score", "u@x.com", "h").await.unwrap();

        let names = |users: Vec<User>| users.into_iter().map(|u| u.username).collect::<Vec<_>>();
        assert_eq!(names(User::search(&db, Some("lic")).await.unwrap()), ["alice", "malice"]);
        assert_eq!(names(User::search(&db, Some("_")).await.unwrap()), ["under_score"]);
        assert!(User::search(&db, Some("%")).await.unwrap().is_empty());

        let newest_first = names(User::search(&db, None).await.unwrap());
        assert_eq!(newest_first, ["under_score", "bob", "malice", "alice"]);

        for i in 0..SEARCH_LIMIT {
            User::create(&db, &format!("bulk{i}"), &format!("bulk{i}@x.com"), "h").await.unwrap();
        }
        let all = User::search(&db, None).await.unwrap();
        assert_eq!(all.len() as i64, SEARCH_LIMIT);
    }

    #[tokio::test]
    async fn update_bio_is_idempotent() {
        let db = connect_in_memory().await;
        let mut user = User::create(&db, "alice", "a@x.com", "h").await.unwrap();

        user.update_bio(&db, "x").await.unwrap();
        user.update_bio(&db, "x").await.unwrap();

        let stored = User::find_by_id(&db, user.id).await.unwrap().unwrap();
        assert_eq!(stored.bio, "x");
        assert_eq!(user.bio, "x");
        assert_eq!(count_users(&db).await, 1);
    }
}
