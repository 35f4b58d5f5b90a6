use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::AppError;
use crate::models::Todo;

const READ_LATEST: &str = r#"
    SELECT id, subject, COALESCE(description, '') AS description, created_at, updated_at
    FROM todos
    ORDER BY id DESC
    LIMIT ?1
"#;

const READ_BEFORE: &str = r#"
    SELECT id, subject, COALESCE(description, '') AS description, created_at, updated_at
    FROM todos
    WHERE id < ?1
    ORDER BY id DESC
    LIMIT ?2
"#;

const FIND_BY_ID: &str = r#"
    SELECT id, subject, COALESCE(description, '') AS description, created_at, updated_at
    FROM todos
    WHERE id = ?1
"#;

/// Owns every SQL statement issued against the `todos` table.
#[derive(Clone)]
pub struct TodoService {
    db: SqlitePool,
}

impl TodoService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    /// Inserts a row and re-reads it so the storage-generated timestamps are populated.
    pub async fn create_todo(&self, subject: &str, description: &str) -> Result<Todo, AppError> {
        let id = sqlx::query("INSERT INTO todos (subject, description) VALUES (?, ?)")
            .bind(subject)
            .bind(description)
            .execute(&self.db)
            .await?
            .last_insert_rowid();
        debug!("created todo {}", id);

        self.find_todo_by_id(id)
            .await?
            .ok_or(AppError::Database(sqlx::Error::RowNotFound))
    }

    /// Returns up to `size` todos, newest first. A non-zero `prev_id` is an
    /// exclusive upper bound on the returned ids.
    pub async fn read_todos(&self, prev_id: i64, size: i64) -> Result<Vec<Todo>, AppError> {
        if size == 0 {
            return Ok(Vec::new());
        }

        let todos = if prev_id == 0 {
            sqlx::query_as::<_, Todo>(READ_LATEST)
                .bind(size)
                .fetch_all(&self.db)
                .await?
        } else {
            sqlx::query_as::<_, Todo>(READ_BEFORE)
                .bind(prev_id)
                .bind(size)
                .fetch_all(&self.db)
                .await?
        };
        debug!("read {} todos (prev_id={}, size={})", todos.len(), prev_id, size);

        Ok(todos)
    }

    /// `updated_at` always moves forward, by at least one millisecond when
    /// the clock has not ticked since the previous write.
    pub async fn update_todo(
        &self,
        id: i64,
        subject: &str,
        description: &str,
    ) -> Result<Todo, AppError> {
        let affected = sqlx::query(
            r#"
            UPDATE todos
            SET subject = ?1,
                description = ?2,
                updated_at = MAX(
                    strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                    strftime('%Y-%m-%dT%H:%M:%fZ', updated_at, '+0.001 seconds')
                )
            WHERE id = ?3
            "#,
        )
        .bind(subject)
        .bind(description)
        .bind(id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AppError::NotFound);
        }
        debug!("updated todo {}", id);

        self.find_todo_by_id(id).await?.ok_or(AppError::NotFound)
    }

    /// Deletes every row whose id is in `ids` with one statement. Succeeds if
    /// at least one row went away; an empty `ids` is a no-op.
    pub async fn delete_todos(&self, ids: &[i64]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM todos WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let affected = query.build().execute(&self.db).await?.rows_affected();
        if affected == 0 {
            return Err(AppError::NotFound);
        }
        debug!("deleted {} of {} requested todos", affected, ids.len());

        Ok(())
    }

    pub async fn find_todo_by_id(&self, id: i64) -> Result<Option<Todo>, AppError> {
        let todo = sqlx::query_as::<_, Todo>(FIND_BY_ID)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(todo)
    }
}
