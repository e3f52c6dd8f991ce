//! PostgreSQL store. One `StoreTx` wraps one `sqlx::Transaction`; dropping it
//! without `commit` rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

use super::models::{ElementAnswer, Folder, Form, FormElement, Response, Team, User};
use super::store::{FormPage, Store, StoreError, StoreTx};
use crate::filter::form_query::like_pattern;
use crate::filter::{FilterOrder, FormQuery, FormScope};
use crate::permissions::{Capability, CapabilitySet, PermissionMap, ResourceRef};

const USER_COLUMNS: &str = "id, email, username, password_hash, avatar_url, created_at, updated_at";
const TEAM_COLUMNS: &str = "id, name, logo_url, creator_id, created_at, updated_at";
const FOLDER_COLUMNS: &str = "id, name, color, creator_id, team_id, created_at, updated_at";
const FORM_COLUMNS: &str = "f.id, f.title, f.logo_url, f.settings, f.elements, f.creator_id, f.folder_id, \
     f.team_id, f.deleted_at, f.disabled, f.disabled_on_specific_date, f.disabled_on_date, \
     f.disabled_notification, f.total_submissions, f.created_at, f.updated_at";
const RESPONSE_COLUMNS: &str = "id, form_id, \"index\", form_answers, created_at";

#[derive(FromRow)]
struct FormRow {
    id: Uuid,
    title: String,
    logo_url: Option<String>,
    settings: Json<Value>,
    elements: Json<Vec<FormElement>>,
    creator_id: Uuid,
    folder_id: Option<Uuid>,
    team_id: Option<Uuid>,
    deleted_at: Option<DateTime<Utc>>,
    disabled: bool,
    disabled_on_specific_date: bool,
    disabled_on_date: Option<DateTime<Utc>>,
    disabled_notification: bool,
    total_submissions: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FormRow> for Form {
    fn from(row: FormRow) -> Self {
        Form {
            id: row.id,
            title: row.title,
            logo_url: row.logo_url,
            settings: row.settings.0,
            elements: row.elements.0,
            creator_id: row.creator_id,
            folder_id: row.folder_id,
            team_id: row.team_id,
            deleted_at: row.deleted_at,
            disabled: row.disabled,
            disabled_on_specific_date: row.disabled_on_specific_date,
            disabled_on_date: row.disabled_on_date,
            disabled_notification: row.disabled_notification,
            total_submissions: row.total_submissions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ResponseRow {
    id: Uuid,
    form_id: Uuid,
    index: i32,
    form_answers: Json<Vec<ElementAnswer>>,
    created_at: DateTime<Utc>,
}

impl From<ResponseRow> for Response {
    fn from(row: ResponseRow) -> Self {
        Response {
            id: row.id,
            form_id: row.form_id,
            index: row.index,
            form_answers: row.form_answers.0,
            created_at: row.created_at,
        }
    }
}

/// Maps unique-constraint violations to `Conflict`.
fn unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    let is_unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false);
    if is_unique {
        StoreError::Conflict(format!("{} already exists", what))
    } else {
        StoreError::Sqlx(err)
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    fn push_form_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &FormQuery) {
        builder.push(" WHERE ");
        match &query.scope {
            FormScope::Owned { folder_id, team_id, deleted, favourite } => {
                builder
                    .push(
                        "(SELECT COUNT(DISTINCT p.capability) FROM resource_permissions p \
                         WHERE p.resource_kind = 'form' AND p.resource_id = f.id AND p.user_id = ",
                    )
                    .push_bind(query.user_id)
                    .push(") = 3");
                match team_id {
                    Some(team_id) => {
                        builder.push(" AND f.team_id = ").push_bind(*team_id);
                    }
                    None => {
                        builder.push(" AND f.team_id IS NULL");
                    }
                }
                if let Some(folder_id) = folder_id {
                    builder.push(" AND f.folder_id = ").push_bind(*folder_id);
                }
                if *deleted {
                    builder.push(" AND f.deleted_at IS NOT NULL");
                } else {
                    builder.push(" AND f.deleted_at IS NULL");
                }
                if *favourite {
                    builder
                        .push(" AND EXISTS (SELECT 1 FROM form_favourites fav WHERE fav.form_id = f.id AND fav.user_id = ")
                        .push_bind(query.user_id)
                        .push(")");
                }
            }
            FormScope::Shared => {
                builder
                    .push(
                        "EXISTS (SELECT 1 FROM resource_permissions p WHERE p.resource_kind = 'form' \
                         AND p.resource_id = f.id AND p.capability = 'VIEW' AND p.user_id = ",
                    )
                    .push_bind(query.user_id)
                    .push(
                        ") AND NOT EXISTS (SELECT 1 FROM resource_permissions p WHERE p.resource_kind = 'form' \
                         AND p.resource_id = f.id AND p.capability = 'DELETE' AND p.user_id = ",
                    )
                    .push_bind(query.user_id)
                    .push(") AND f.deleted_at IS NULL");
            }
        }

        let patterns: Vec<String> = query.title_variants().iter().map(|v| like_pattern(v)).collect();
        if !patterns.is_empty() {
            builder.push(" AND f.title LIKE ANY(").push_bind(patterns).push(")");
        }
    }
}

#[async_trait]
impl StoreTx for PgTx {
    // ───────────────────────────── Users ─────────────────────────────

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, avatar_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.avatar_url)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_violation(e, "user with this email"))?;
        Ok(())
    }

    async fn user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn users_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = ANY($1) ORDER BY created_at", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET username = $2, avatar_url = $3, password_hash = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.avatar_url)
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&mut self, id: Uuid) -> Result<(), StoreError> {
        // Memberships, favourites and permission rows go with the user row.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ───────────────────────────── Teams ─────────────────────────────

    async fn insert_team(&mut self, team: &Team) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO teams (id, name, logo_url, creator_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.logo_url)
        .bind(team.creator_id)
        .bind(team.created_at)
        .bind(team.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn team(&mut self, id: Uuid) -> Result<Option<Team>, StoreError> {
        let sql = format!("SELECT {} FROM teams WHERE id = $1", TEAM_COLUMNS);
        Ok(sqlx::query_as::<_, Team>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn update_team(&mut self, team: &Team) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE teams SET name = $2, logo_url = $3, updated_at = $4 WHERE id = $1")
            .bind(team.id)
            .bind(&team.name)
            .bind(&team.logo_url)
            .bind(team.updated_at)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_team(&mut self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM resource_permissions WHERE resource_kind = 'team' AND resource_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn teams_of_user(&mut self, user_id: Uuid) -> Result<Vec<Team>, StoreError> {
        let sql = format!(
            "SELECT {} FROM teams WHERE id IN (SELECT team_id FROM team_members WHERE user_id = $1) ORDER BY created_at",
            TEAM_COLUMNS
        );
        Ok(sqlx::query_as::<_, Team>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn team_member_ids(&mut self, team_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM team_members WHERE team_id = $1")
            .bind(team_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn add_team_member(&mut self, team_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO team_members (team_id, user_id) VALUES ($1, $2)")
            .bind(team_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| unique_violation(e, "team membership"))?;
        Ok(())
    }

    async fn remove_team_members(&mut self, team_id: Uuid, user_ids: &[Uuid]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = ANY($2)")
            .bind(team_id)
            .bind(user_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    // ──────────────────────────── Folders ────────────────────────────

    async fn insert_folder(&mut self, folder: &Folder) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO folders (id, name, color, creator_id, team_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(folder.id)
        .bind(&folder.name)
        .bind(&folder.color)
        .bind(folder.creator_id)
        .bind(folder.team_id)
        .bind(folder.created_at)
        .bind(folder.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn folder(&mut self, id: Uuid) -> Result<Option<Folder>, StoreError> {
        let sql = format!("SELECT {} FROM folders WHERE id = $1", FOLDER_COLUMNS);
        Ok(sqlx::query_as::<_, Folder>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn update_folder(&mut self, folder: &Folder) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE folders SET name = $2, color = $3, updated_at = $4 WHERE id = $1")
            .bind(folder.id)
            .bind(&folder.name)
            .bind(&folder.color)
            .bind(folder.updated_at)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_folders(&mut self, ids: &[Uuid]) -> Result<u64, StoreError> {
        sqlx::query("DELETE FROM resource_permissions WHERE resource_kind = 'folder' AND resource_id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        let result = sqlx::query("DELETE FROM folders WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn folders_of_team(&mut self, team_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let sql = format!("SELECT {} FROM folders WHERE team_id = $1 ORDER BY created_at", FOLDER_COLUMNS);
        Ok(sqlx::query_as::<_, Folder>(&sql)
            .bind(team_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn personal_folders(&mut self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let sql = format!(
            "SELECT {} FROM folders WHERE team_id IS NULL AND creator_id = $1 ORDER BY created_at",
            FOLDER_COLUMNS
        );
        Ok(sqlx::query_as::<_, Folder>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn folders_created_by(&mut self, user_id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let sql = format!("SELECT {} FROM folders WHERE creator_id = $1", FOLDER_COLUMNS);
        Ok(sqlx::query_as::<_, Folder>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    // ───────────────────────────── Forms ─────────────────────────────

    async fn insert_form(&mut self, form: &Form) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO forms (id, title, logo_url, settings, elements, creator_id, folder_id, team_id, \
             deleted_at, disabled, disabled_on_specific_date, disabled_on_date, disabled_notification, \
             total_submissions, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(form.id)
        .bind(&form.title)
        .bind(&form.logo_url)
        .bind(Json(&form.settings))
        .bind(Json(&form.elements))
        .bind(form.creator_id)
        .bind(form.folder_id)
        .bind(form.team_id)
        .bind(form.deleted_at)
        .bind(form.disabled)
        .bind(form.disabled_on_specific_date)
        .bind(form.disabled_on_date)
        .bind(form.disabled_notification)
        .bind(form.total_submissions)
        .bind(form.created_at)
        .bind(form.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn form(&mut self, id: Uuid) -> Result<Option<Form>, StoreError> {
        let sql = format!("SELECT {} FROM forms f WHERE f.id = $1", FORM_COLUMNS);
        Ok(sqlx::query_as::<_, FormRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Form::from))
    }

    async fn update_form(&mut self, form: &Form) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE forms SET title = $2, logo_url = $3, settings = $4, elements = $5, folder_id = $6, \
             team_id = $7, deleted_at = $8, disabled = $9, disabled_on_specific_date = $10, \
             disabled_on_date = $11, disabled_notification = $12, updated_at = $13 \
             WHERE id = $1",
        )
        .bind(form.id)
        .bind(&form.title)
        .bind(&form.logo_url)
        .bind(Json(&form.settings))
        .bind(Json(&form.elements))
        .bind(form.folder_id)
        .bind(form.team_id)
        .bind(form.deleted_at)
        .bind(form.disabled)
        .bind(form.disabled_on_specific_date)
        .bind(form.disabled_on_date)
        .bind(form.disabled_notification)
        .bind(form.updated_at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_forms(&mut self, ids: &[Uuid]) -> Result<u64, StoreError> {
        sqlx::query("DELETE FROM resource_permissions WHERE resource_kind = 'form' AND resource_id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        let result = sqlx::query("DELETE FROM forms WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn forms_of_team(&mut self, team_id: Uuid) -> Result<Vec<Form>, StoreError> {
        let sql = format!("SELECT {} FROM forms f WHERE f.team_id = $1", FORM_COLUMNS);
        let rows = sqlx::query_as::<_, FormRow>(&sql)
            .bind(team_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Form::from).collect())
    }

    async fn forms_in_folder(&mut self, folder_id: Uuid) -> Result<Vec<Form>, StoreError> {
        let sql = format!("SELECT {} FROM forms f WHERE f.folder_id = $1", FORM_COLUMNS);
        let rows = sqlx::query_as::<_, FormRow>(&sql)
            .bind(folder_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Form::from).collect())
    }

    async fn forms_created_by(&mut self, user_id: Uuid) -> Result<Vec<Form>, StoreError> {
        let sql = format!("SELECT {} FROM forms f WHERE f.creator_id = $1", FORM_COLUMNS);
        let rows = sqlx::query_as::<_, FormRow>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Form::from).collect())
    }

    async fn list_forms(&mut self, query: &FormQuery) -> Result<FormPage, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM forms f");
        Self::push_form_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *self.tx).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM forms f", FORM_COLUMNS));
        Self::push_form_filters(&mut select, query);
        select
            .push(" ")
            .push(FilterOrder::generate(&query.order))
            .push(" LIMIT ")
            .push_bind(query.page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.page.offset() as i64);
        let rows: Vec<FormRow> = select.build_query_as::<FormRow>().fetch_all(&mut *self.tx).await?;

        Ok(FormPage {
            forms: rows.into_iter().map(Form::from).collect(),
            total: total.max(0) as u64,
        })
    }

    async fn adjust_submissions(&mut self, form_id: Uuid, delta: i32) -> Result<i32, StoreError> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE forms SET total_submissions = GREATEST(total_submissions + $2, 0) WHERE id = $1 \
             RETURNING total_submissions",
        )
        .bind(form_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StoreError::NotFound)
    }

    // ─────────────────────────── Favourites ──────────────────────────

    async fn is_favourite(&mut self, form_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM form_favourites WHERE form_id = $1 AND user_id = $2)",
        )
        .bind(form_id)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?)
    }

    async fn set_favourite(&mut self, form_id: Uuid, user_id: Uuid, favourite: bool) -> Result<(), StoreError> {
        let sql = if favourite {
            "INSERT INTO form_favourites (form_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        } else {
            "DELETE FROM form_favourites WHERE form_id = $1 AND user_id = $2"
        };
        sqlx::query(sql)
            .bind(form_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn favourite_form_ids(&mut self, user_id: Uuid, form_ids: &[Uuid]) -> Result<HashSet<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT form_id FROM form_favourites WHERE user_id = $1 AND form_id = ANY($2)",
        )
        .bind(user_id)
        .bind(form_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids.into_iter().collect())
    }

    // ────────────────────────── Permissions ──────────────────────────

    async fn permissions(&mut self, resource: ResourceRef) -> Result<PermissionMap, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT user_id, capability FROM resource_permissions WHERE resource_kind = $1 AND resource_id = $2",
        )
        .bind(resource.kind.as_str())
        .bind(resource.id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut parsed = Vec::with_capacity(rows.len());
        for (user_id, capability) in rows {
            let capability: Capability = capability.parse().map_err(StoreError::Serialization)?;
            parsed.push((user_id, capability));
        }
        Ok(PermissionMap::from_rows(parsed))
    }

    async fn replace_permissions(&mut self, resource: ResourceRef, map: &PermissionMap) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM resource_permissions WHERE resource_kind = $1 AND resource_id = $2")
            .bind(resource.kind.as_str())
            .bind(resource.id)
            .execute(&mut *self.tx)
            .await?;

        let (users, capabilities): (Vec<Uuid>, Vec<String>) = map
            .rows()
            .into_iter()
            .map(|(user, cap)| (user, cap.as_str().to_string()))
            .unzip();
        if users.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO resource_permissions (resource_kind, resource_id, user_id, capability) \
             SELECT $1, $2, u, c FROM UNNEST($3::uuid[], $4::text[]) AS t(u, c)",
        )
        .bind(resource.kind.as_str())
        .bind(resource.id)
        .bind(users)
        .bind(capabilities)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn grant(&mut self, resource: ResourceRef, user_id: Uuid, capabilities: &CapabilitySet) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM resource_permissions WHERE resource_kind = $1 AND resource_id = $2 AND user_id = $3",
        )
        .bind(resource.kind.as_str())
        .bind(resource.id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        let tokens: Vec<String> = capabilities.iter().map(|c| c.as_str().to_string()).collect();
        sqlx::query(
            "INSERT INTO resource_permissions (resource_kind, resource_id, user_id, capability) \
             SELECT $1, $2, $3, c FROM UNNEST($4::text[]) AS t(c)",
        )
        .bind(resource.kind.as_str())
        .bind(resource.id)
        .bind(user_id)
        .bind(tokens)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn revoke(&mut self, resource: ResourceRef, user_ids: &[Uuid]) -> Result<u64, StoreError> {
        let removed = sqlx::query_scalar::<_, i64>(
            "WITH gone AS (DELETE FROM resource_permissions \
             WHERE resource_kind = $1 AND resource_id = $2 AND user_id = ANY($3) RETURNING user_id) \
             SELECT COUNT(DISTINCT user_id) FROM gone",
        )
        .bind(resource.kind.as_str())
        .bind(resource.id)
        .bind(user_ids)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(removed.max(0) as u64)
    }

    // ─────────────────────────── Responses ───────────────────────────

    async fn insert_response(&mut self, response: &Response) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO responses (id, form_id, \"index\", form_answers, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(response.id)
        .bind(response.form_id)
        .bind(response.index)
        .bind(Json(&response.form_answers))
        .bind(response.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn response(&mut self, id: Uuid) -> Result<Option<Response>, StoreError> {
        let sql = format!("SELECT {} FROM responses WHERE id = $1", RESPONSE_COLUMNS);
        Ok(sqlx::query_as::<_, ResponseRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Response::from))
    }

    async fn responses_of_form(&mut self, form_id: Uuid) -> Result<Vec<Response>, StoreError> {
        let sql = format!("SELECT {} FROM responses WHERE form_id = $1 ORDER BY \"index\"", RESPONSE_COLUMNS);
        let rows = sqlx::query_as::<_, ResponseRow>(&sql)
            .bind(form_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Response::from).collect())
    }

    async fn delete_responses(&mut self, form_id: Uuid, ids: &[Uuid]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM responses WHERE form_id = $1 AND id = ANY($2)")
            .bind(form_id)
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_responses_of_forms(&mut self, form_ids: &[Uuid]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM responses WHERE form_id = ANY($1)")
            .bind(form_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
