use quiz_core::model::{AnswerSheetId, OptionId, QuestionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    id_i64, id_u64, kind_from_str, kind_to_str, selected_from_json, selected_to_json, ser,
    u32_from_i64, usize_from_i64,
};
use crate::repository::{
    AttemptSnapshot, AttemptSnapshotRepository, OptionRecord, QuestionRecord, StorageError,
};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptSnapshot, StorageError> {
    let answer_sheet_id = id_u64(
        "answer_sheet_id",
        row.try_get::<i64, _>("answer_sheet_id").map_err(ser)?,
    )?;
    let title: String = row.try_get("title").map_err(ser)?;
    let total_points = u32_from_i64(
        "total_points",
        row.try_get::<i64, _>("total_points").map_err(ser)?,
    )?;
    let started_at = row.try_get("started_at").map_err(ser)?;
    let time_limit: String = row.try_get("time_limit").map_err(ser)?;
    let cursor = usize_from_i64("cursor", row.try_get::<i64, _>("cursor").map_err(ser)?)?;

    Ok(AttemptSnapshot {
        answer_sheet_id: AnswerSheetId::new(answer_sheet_id),
        title,
        total_points,
        started_at,
        time_limit,
        cursor,
        questions: Vec::new(),
    })
}

fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionRecord, StorageError> {
    let question_id = id_u64(
        "question_id",
        row.try_get::<i64, _>("question_id").map_err(ser)?,
    )?;
    let text: String = row.try_get("text").map_err(ser)?;
    let points = u32_from_i64("points", row.try_get::<i64, _>("points").map_err(ser)?)?;
    let kind = kind_from_str(row.try_get::<&str, _>("kind").map_err(ser)?)?;
    let selected = selected_from_json(row.try_get::<&str, _>("selected").map_err(ser)?)?;

    Ok(QuestionRecord {
        id: QuestionId::new(question_id),
        text,
        points,
        kind,
        options: Vec::new(),
        selected,
    })
}

fn map_option_row(row: &sqlx::sqlite::SqliteRow) -> Result<(QuestionId, OptionRecord), StorageError> {
    let question_id = id_u64(
        "question_id",
        row.try_get::<i64, _>("question_id").map_err(ser)?,
    )?;
    let option_id = id_u64(
        "option_id",
        row.try_get::<i64, _>("option_id").map_err(ser)?,
    )?;
    let label: String = row.try_get("label").map_err(ser)?;

    Ok((
        QuestionId::new(question_id),
        OptionRecord {
            id: OptionId::new(option_id),
            label,
        },
    ))
}

#[async_trait::async_trait]
impl AttemptSnapshotRepository for SqliteRepository {
    async fn save_snapshot(&self, snapshot: &AttemptSnapshot) -> Result<(), StorageError> {
        let sheet_id = id_i64("answer_sheet_id", snapshot.answer_sheet_id.value())?;

        let mut tx = self.pool().begin().await.map_err(conn)?;

        // Single-slot store: replace whatever attempt was persisted before.
        sqlx::query("DELETE FROM attempt_sessions")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO attempt_sessions (
                    answer_sheet_id, title, total_points, started_at, time_limit, cursor
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(sheet_id)
        .bind(&snapshot.title)
        .bind(i64::from(snapshot.total_points))
        .bind(snapshot.started_at)
        .bind(&snapshot.time_limit)
        .bind(id_i64("cursor", snapshot.cursor as u64)?)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for (position, question) in snapshot.questions.iter().enumerate() {
            let question_id = id_i64("question_id", question.id.value())?;

            sqlx::query(
                r"
                    INSERT INTO attempt_questions (
                        answer_sheet_id, question_id, position, text, points, kind, selected
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(sheet_id)
            .bind(question_id)
            .bind(id_i64("position", position as u64)?)
            .bind(&question.text)
            .bind(i64::from(question.points))
            .bind(kind_to_str(question.kind))
            .bind(selected_to_json(&question.selected)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (option_position, option) in question.options.iter().enumerate() {
                sqlx::query(
                    r"
                        INSERT INTO attempt_options (
                            answer_sheet_id, question_id, option_id, position, label
                        )
                        VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(sheet_id)
                .bind(question_id)
                .bind(id_i64("option_id", option.id.value())?)
                .bind(id_i64("position", option_position as u64)?)
                .bind(&option.label)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)
    }

    async fn load_snapshot(&self) -> Result<Option<AttemptSnapshot>, StorageError> {
        let Some(session_row) = sqlx::query(
            r"
                SELECT answer_sheet_id, title, total_points, started_at, time_limit, cursor
                FROM attempt_sessions
                LIMIT 1
            ",
        )
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let mut snapshot = map_session_row(&session_row)?;
        let sheet_id = id_i64("answer_sheet_id", snapshot.answer_sheet_id.value())?;

        let question_rows = sqlx::query(
            r"
                SELECT question_id, text, points, kind, selected
                FROM attempt_questions
                WHERE answer_sheet_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(sheet_id)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        for row in &question_rows {
            snapshot.questions.push(map_question_row(row)?);
        }

        let option_rows = sqlx::query(
            r"
                SELECT question_id, option_id, position, label
                FROM attempt_options
                WHERE answer_sheet_id = ?1
                ORDER BY question_id ASC, position ASC
            ",
        )
        .bind(sheet_id)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        for row in &option_rows {
            let (question_id, option) = map_option_row(row)?;
            let question = snapshot
                .questions
                .iter_mut()
                .find(|q| q.id == question_id)
                .ok_or_else(|| {
                    StorageError::Serialization(format!(
                        "option row for unknown question {question_id}"
                    ))
                })?;
            question.options.push(option);
        }

        Ok(Some(snapshot))
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_sessions")
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }
}
