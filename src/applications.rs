//! Instructor applications, kept in SQLite.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::utils::local_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ApplicationStatus::Pending),
            "Approved" => Ok(ApplicationStatus::Approved),
            "Rejected" => Ok(ApplicationStatus::Rejected),
            _ => anyhow::bail!("unknown application status {s:?}"),
        }
    }
}

/// Current user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub expertise: String,
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorApplication {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub expertise: String,
    pub bio: String,
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: i64,
    user_id: String,
    name: String,
    email: String,
    expertise: String,
    bio: String,
    status: String,
    rejection_reason: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ApplicationRow> for InstructorApplication {
    type Error = Error;
    fn try_from(row: ApplicationRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            expertise: row.expertise,
            bio: row.bio,
            status: row.status.parse()?,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SCHEMA: &str = r#"
create table if not exists instructor_application (
    id integer primary key autoincrement,
    user_id text not null,
    name text not null,
    email text not null,
    expertise text not null,
    bio text not null,
    status text not null default 'Pending',
    rejection_reason text,
    created_at text not null,
    updated_at text not null
)"#;

// at most one pending or approved application per user
const OPEN_APPLICATION_INDEX: &str = "create unique index if not exists instructor_application_open_user on instructor_application (user_id) where status != 'Rejected'";

const SELECT: &str = "select id, user_id, name, email, expertise, bio, status, rejection_reason, created_at, updated_at from instructor_application";

#[derive(Debug, Clone)]
pub struct ApplicationRepository {
    database: SqlitePool,
}

impl ApplicationRepository {
    pub async fn connect(url: &str) -> Result<Self> {
        let database = SqlitePool::connect(url).await?;
        Self::new(database).await
    }

    /// Wraps an existing pool, creating the table when missing.
    pub async fn new(database: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&database).await?;
        sqlx::query(OPEN_APPLICATION_INDEX)
            .execute(&database)
            .await?;
        Ok(Self { database })
    }

    /// A user may hold one pending or approved application at a time;
    /// after a rejection they can apply again. The unique index settles
    /// concurrent submits that both pass the lookup.
    pub async fn submit(
        &self,
        applicant: &Applicant,
        form: ApplicationForm,
    ) -> Result<InstructorApplication> {
        if let Some(existing) = self.get_by_user(&applicant.id).await? {
            if existing.status != ApplicationStatus::Rejected {
                return Err(Error::ApplicationExists {
                    user_id: applicant.id.clone(),
                    status: existing.status.to_string(),
                });
            }
        }
        if !applicant.email_verified {
            warn!("applicant {} has not verified {}", applicant.id, applicant.email);
        }
        let now = local_now();
        let id = sqlx::query(
            "insert into instructor_application (user_id, name, email, expertise, bio, status, created_at, updated_at) values (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&applicant.id)
        .bind(&applicant.display_name)
        .bind(&applicant.email)
        .bind(&form.expertise)
        .bind(&form.bio)
        .bind(ApplicationStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.database)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::ApplicationExists {
                    user_id: applicant.id.clone(),
                    status: ApplicationStatus::Pending.to_string(),
                }
            } else {
                Error::Database(e)
            }
        })?
        .last_insert_rowid();
        info!("instructor application {id} submitted by {}", applicant.id);
        self.get(id).await?.ok_or(Error::ApplicationNotFound(id))
    }

    pub async fn get(&self, id: i64) -> Result<Option<InstructorApplication>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!("{SELECT} where id = ?"))
            .bind(id)
            .fetch_optional(&self.database)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Most recent application of a user
    pub async fn get_by_user(&self, user_id: &str) -> Result<Option<InstructorApplication>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "{SELECT} where user_id = ? order by id desc limit 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.database)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<InstructorApplication>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, ApplicationRow>(&format!("{SELECT} where status = ? order by id"))
                    .bind(status.as_str())
                    .fetch_all(&self.database)
                    .await?
            }
            None => {
                sqlx::query_as::<_, ApplicationRow>(&format!("{SELECT} order by id"))
                    .fetch_all(&self.database)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn approve(&self, id: i64) -> Result<InstructorApplication> {
        self.set_status(id, ApplicationStatus::Approved, None).await
    }

    pub async fn reject(&self, id: i64, reason: &str) -> Result<InstructorApplication> {
        self.set_status(id, ApplicationStatus::Rejected, Some(reason))
            .await
    }

    async fn set_status(
        &self,
        id: i64,
        status: ApplicationStatus,
        rejection_reason: Option<&str>,
    ) -> Result<InstructorApplication> {
        let updated = sqlx::query(
            "update instructor_application set status = ?, rejection_reason = ?, updated_at = ? where id = ?",
        )
        .bind(status.as_str())
        .bind(rejection_reason)
        .bind(local_now())
        .bind(id)
        .execute(&self.database)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(Error::ApplicationNotFound(id));
        }
        info!("instructor application {id} is now {status}");
        self.get(id).await?.ok_or(Error::ApplicationNotFound(id))
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
