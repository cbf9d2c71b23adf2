// src/services/roster.rs

//! Student profiles and course access through group registration.

use sqlx::SqlitePool;

use crate::{error::AppError, models::roster::Student, utils::jwt::Claims};

pub async fn find_student_by_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<Student>, AppError> {
    let student = sqlx::query_as::<_, Student>(
        "SELECT id, name, email, user_id, group_id FROM students WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(student)
}

/// Student profile of the caller; 403 when the login has none.
pub async fn require_student(pool: &SqlitePool, claims: &Claims) -> Result<Student, AppError> {
    if !claims.is_student() {
        return Err(AppError::Forbidden("Available to students only".to_string()));
    }

    find_student_by_user(pool, claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::Forbidden("No student profile is linked to this account".to_string()))
}

/// Courses the student's group is registered to. Empty when the student has no group.
pub async fn course_ids(pool: &SqlitePool, student: &Student) -> Result<Vec<i64>, AppError> {
    let Some(group_id) = student.group_id else {
        return Ok(Vec::new());
    };

    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT course_id FROM group_courses WHERE group_id = ? ORDER BY course_id",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

pub async fn has_course_access(
    pool: &SqlitePool,
    student: &Student,
    course_id: i64,
) -> Result<bool, AppError> {
    let Some(group_id) = student.group_id else {
        return Ok(false);
    };

    let registered = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_courses WHERE group_id = ? AND course_id = ?",
    )
    .bind(group_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    Ok(registered > 0)
}

/// Fails with 403 unless the student's group is registered to `course_id`.
pub async fn ensure_course_access(
    pool: &SqlitePool,
    student: &Student,
    course_id: i64,
) -> Result<(), AppError> {
    if has_course_access(pool, student, course_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("No access to this course".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn seed(pool: &SqlitePool) -> Student {
        sqlx::query("INSERT INTO courses (id, title) VALUES (1, 'Algebra'), (2, 'History')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO student_groups (id, name) VALUES (1, '10A')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO group_courses (group_id, course_id) VALUES (1, 1)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO students (id, name, email, group_id) VALUES (1, 'Aruzhan', 'a@school.kz', 1)",
        )
        .execute(pool)
        .await
        .unwrap();

        Student {
            id: 1,
            name: "Aruzhan".into(),
            email: "a@school.kz".into(),
            user_id: None,
            group_id: Some(1),
        }
    }

    #[tokio::test]
    async fn access_follows_group_registration() {
        let pool = db::test_pool().await;
        let student = seed(&pool).await;

        assert!(has_course_access(&pool, &student, 1).await.unwrap());
        assert!(!has_course_access(&pool, &student, 2).await.unwrap());
        assert_eq!(course_ids(&pool, &student).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn student_without_group_sees_nothing() {
        let pool = db::test_pool().await;
        let mut student = seed(&pool).await;
        student.group_id = None;

        assert!(!has_course_access(&pool, &student, 1).await.unwrap());
        assert!(course_ids(&pool, &student).await.unwrap().is_empty());
        assert!(matches!(
            ensure_course_access(&pool, &student, 1).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
