use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::cascade::{DeletePlan, DeleteReport};
use super::error::{ServiceError, ServiceResult};
use super::{require_name, ServiceContext};
use crate::auth::{self, password, Claims, ResetClaims};
use crate::database::models::{normalize_email, User, UserChanges};
use crate::notify::{mailer, Notification};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// A user together with a fresh session token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

const MIN_PASSWORD_LEN: usize = 8;

pub struct UsersService {
    ctx: ServiceContext,
}

impl UsersService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a new account and sign it in
    pub async fn signup(&self, request: SignupRequest) -> ServiceResult<Session> {
        let user = self.create_user(&request.email, &request.username, &request.password).await?;
        let token = self.issue_token(&user)?;
        Ok(Session { user, token })
    }

    /// Insert a user with a hashed password. Used by signup and the admin CLI.
    pub async fn create_user(&self, email: &str, username: &str, plain_password: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(ServiceError::validation("email is not valid"));
        }
        require_name(username, "username")?;
        check_password_len(plain_password)?;

        let user = User::new(&email, username, password::hash(plain_password)?);

        let mut tx = self.ctx.store.begin().await?;
        if tx.user_by_email(&user.email).await?.is_some() {
            return Err(ServiceError::conflict("a user with this email already exists"));
        }
        tx.insert_user(&user).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn login(&self, request: LoginRequest) -> ServiceResult<Session> {
        let invalid = || ServiceError::Unauthenticated("Invalid email or password".to_string());

        let mut tx = self.ctx.store.begin().await?;
        let user = tx
            .user_by_email(&normalize_email(&request.email))
            .await?
            .ok_or_else(invalid)?;
        drop(tx);

        if !password::verify(&request.password, &user.password_hash)? {
            return Err(invalid());
        }

        let token = self.issue_token(&user)?;
        Ok(Session { user, token })
    }

    pub async fn me(&self, user_id: Uuid) -> ServiceResult<User> {
        let mut tx = self.ctx.store.begin().await?;
        tx.user(user_id).await?.ok_or_else(|| ServiceError::not_found("User"))
    }

    pub async fn update(&self, user_id: Uuid, changes: UserChanges) -> ServiceResult<User> {
        let mut tx = self.ctx.store.begin().await?;
        let mut user = tx.user(user_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;

        if let Some(username) = changes.username {
            require_name(&username, "username")?;
            user.username = username.trim().to_string();
        }
        if let Some(avatar_url) = changes.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        user.updated_at = chrono::Utc::now();

        tx.update_user(&user).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Mail a reset link when the address belongs to an account. Unknown
    /// addresses succeed silently so the endpoint does not reveal accounts.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> ServiceResult<()> {
        let mut tx = self.ctx.store.begin().await?;
        let user = tx.user_by_email(&normalize_email(&request.email)).await?;
        drop(tx);

        let Some(user) = user else {
            info!("password reset requested for an unknown address");
            return Ok(());
        };

        let security = &self.ctx.config.security;
        let claims = ResetClaims::new(
            user.id,
            user.email.clone(),
            user.updated_at.timestamp_millis(),
            security.reset_expiry_hours,
        );
        let token = auth::generate_reset_token(security, &claims)?;
        let link = format!("{}/reset-password?token={}", self.ctx.config.server.front_end_url, token);
        self.ctx.notifier.notify(Notification::Mail(mailer::password_reset(
            &user.email,
            &link,
            security.reset_expiry_hours,
        )));

        info!(user_id = %user.id, "password reset link sent");
        Ok(())
    }

    /// Set a new password from a mailed reset link. A link works once.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> ServiceResult<()> {
        let claims = auth::validate_reset_token(&self.ctx.config.security, &request.token)?;
        check_password_len(&request.password)?;

        let mut tx = self.ctx.store.begin().await?;
        let mut user = tx.user(claims.user_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;
        if user.email != normalize_email(&claims.email) || user.updated_at.timestamp_millis() != claims.stamp {
            return Err(ServiceError::Unauthenticated("reset link has already been used".to_string()));
        }

        user.password_hash = password::hash(&request.password)?;
        touch(&mut user);
        tx.update_user(&user).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> ServiceResult<()> {
        let mut tx = self.ctx.store.begin().await?;
        let mut user = tx.user(user_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;
        if !password::verify(&request.current_password, &user.password_hash)? {
            return Err(ServiceError::validation("current password is incorrect"));
        }
        check_password_len(&request.new_password)?;

        user.password_hash = password::hash(&request.new_password)?;
        touch(&mut user);
        tx.update_user(&user).await?;
        tx.commit().await?;

        info!(%user_id, "password changed");
        Ok(())
    }

    /// Remove the caller's own account with its personal forms and folders.
    /// Teams and team content the user created must be deleted first. Other
    /// users' forms filed in the user's folders stay and become unfiled.
    pub async fn delete_account(&self, user_id: Uuid, target_id: Uuid) -> ServiceResult<DeleteReport> {
        if user_id != target_id {
            return Err(ServiceError::access_denied("you can only delete your own account"));
        }

        let mut tx = self.ctx.store.begin().await?;
        tx.user(target_id).await?.ok_or_else(|| ServiceError::not_found("User"))?;

        if tx.teams_of_user(target_id).await?.iter().any(|team| team.creator_id == target_id) {
            return Err(ServiceError::conflict("delete the teams you created before deleting your account"));
        }
        let forms = tx.forms_created_by(target_id).await?;
        let folders = tx.folders_created_by(target_id).await?;
        if forms.iter().any(|form| form.team_id.is_some()) || folders.iter().any(|folder| folder.team_id.is_some()) {
            return Err(ServiceError::conflict(
                "delete the team forms and folders you created before deleting your account",
            ));
        }

        let form_ids: Vec<Uuid> = forms.iter().map(|form| form.id).collect();
        let folder_ids: Vec<Uuid> = folders.iter().map(|folder| folder.id).collect();
        for folder_id in &folder_ids {
            for mut form in tx.forms_in_folder(*folder_id).await? {
                if form_ids.contains(&form.id) {
                    continue;
                }
                form.folder_id = None;
                form.updated_at = Utc::now();
                tx.update_form(&form).await?;
            }
        }

        let report = DeletePlan::account(target_id, form_ids, folder_ids).execute(tx.as_mut()).await?;
        tx.commit().await?;

        info!(%user_id, forms = report.forms, folders = report.folders, "account deleted");
        Ok(report)
    }

    fn issue_token(&self, user: &User) -> ServiceResult<String> {
        let security = &self.ctx.config.security;
        let claims = Claims::new(user.id, user.email.clone(), security.jwt_expiry_hours);
        Ok(auth::generate_jwt(security, &claims)?)
    }
}

fn check_password_len(plain_password: &str) -> ServiceResult<()> {
    if plain_password.len() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Advances `updated_at` by at least a millisecond, which retires reset
/// links issued against the previous value.
fn touch(user: &mut User) {
    user.updated_at = Utc::now().max(user.updated_at + Duration::milliseconds(1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestContext, TEST_PASSWORD};

    /// The token from the last reset link mailed by `forgot_password`
    fn mailed_reset_token(ctx: &TestContext) -> Option<String> {
        ctx.notifications().into_iter().rev().find_map(|notification| match notification {
            Notification::Mail(email) => email
                .body
                .split("token=")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .map(str::to_string),
            _ => None,
        })
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest { email: email.into(), password: password.into() }
    }

    fn signup(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            username: "ada".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn signup_then_login() {
        let ctx = TestContext::new();
        let users = ctx.state.users();

        let session = users.signup(signup("Ada@Example.com")).await.unwrap();
        assert_eq!(session.user.email, "ada@example.com");

        let claims = auth::validate_jwt(&ctx.state.config.security, &session.token).unwrap();
        assert_eq!(claims.sub, session.user.id);

        let login = users
            .login(LoginRequest { email: "ADA@example.com".into(), password: "correct horse".into() })
            .await
            .unwrap();
        assert_eq!(login.user.id, session.user.id);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let ctx = TestContext::new();
        let users = ctx.state.users();
        users.signup(signup("bo@example.com")).await.unwrap();
        let err = users.signup(signup("BO@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthenticated() {
        let ctx = TestContext::new();
        let users = ctx.state.users();
        users.signup(signup("cy@example.com")).await.unwrap();

        let err = users
            .login(LoginRequest { email: "cy@example.com".into(), password: "nope nope".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn short_password_rejected() {
        let ctx = TestContext::new();
        let mut request = signup("dee@example.com");
        request.password = "short".into();
        let err = ctx.state.users().signup(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn update_changes_username() {
        let ctx = TestContext::new();
        let user = ctx.user("eve@example.com").await;
        let updated = ctx
            .state
            .users()
            .update(user.id, UserChanges { username: Some("  Eve  ".into()), avatar_url: None })
            .await
            .unwrap();
        assert_eq!(updated.username, "Eve");
        assert_eq!(ctx.state.users().me(user.id).await.unwrap().username, "Eve");
    }

    #[tokio::test]
    async fn reset_link_sets_a_new_password_once() {
        let ctx = TestContext::new();
        let users = ctx.state.users();
        ctx.user("fay@example.com").await;

        users.forgot_password(ForgotPasswordRequest { email: "FAY@example.com".into() }).await.unwrap();
        let token = mailed_reset_token(&ctx).unwrap();

        users
            .reset_password(ResetPasswordRequest { token: token.clone(), password: "brand new secret".into() })
            .await
            .unwrap();
        assert!(users.login(login("fay@example.com", "brand new secret")).await.is_ok());
        assert!(users.login(login("fay@example.com", TEST_PASSWORD)).await.is_err());

        let err = users
            .reset_password(ResetPasswordRequest { token, password: "another secret".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn forgot_password_is_silent_for_unknown_addresses() {
        let ctx = TestContext::new();
        ctx.state
            .users()
            .forgot_password(ForgotPasswordRequest { email: "nobody@example.com".into() })
            .await
            .unwrap();
        assert!(ctx.notifications().is_empty());
    }

    #[tokio::test]
    async fn session_token_cannot_reset_a_password() {
        let ctx = TestContext::new();
        let user = ctx.user("gus@example.com").await;
        let err = ctx
            .state
            .users()
            .reset_password(ResetPasswordRequest { token: ctx.token(&user), password: "brand new secret".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn change_password_checks_the_current_one() {
        let ctx = TestContext::new();
        let users = ctx.state.users();
        let user = ctx.user("hal@example.com").await;

        let err = users
            .change_password(
                user.id,
                ChangePasswordRequest { current_password: "wrong guess".into(), new_password: "brand new secret".into() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        users
            .change_password(
                user.id,
                ChangePasswordRequest { current_password: TEST_PASSWORD.into(), new_password: "brand new secret".into() },
            )
            .await
            .unwrap();
        assert!(users.login(login("hal@example.com", "brand new secret")).await.is_ok());
    }

    #[tokio::test]
    async fn delete_account_removes_personal_content() {
        let ctx = TestContext::new();
        let owner = ctx.user("ivy@example.com").await;
        let other = ctx.user("jon@example.com").await;
        let folder = ctx.state.folders().create_personal(owner.id, "Mine", None).await.unwrap();
        let form = ctx.folder_form(owner.id, folder.id, "Survey").await;
        ctx.submit(form.id, 2).await;

        let foreign = ctx.personal_form(other.id, "Shared").await;
        ctx.state.forms().invite_member(other.id, foreign.id, "ivy@example.com").await.unwrap();
        ctx.state.forms().add_to_folder(owner.id, foreign.id, folder.id).await.unwrap();

        let err = ctx.state.users().delete_account(other.id, owner.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));

        let report = ctx.state.users().delete_account(owner.id, owner.id).await.unwrap();
        assert_eq!(report, DeleteReport { responses: 2, forms: 1, folders: 1, teams: 0, users: 1 });

        assert!(matches!(ctx.state.users().me(owner.id).await, Err(ServiceError::NotFound(_))));
        let kept = ctx.state.forms().details(other.id, foreign.id).await.unwrap();
        assert_eq!(kept.form.folder_id, None);
        assert!(!kept.permissions.contains_user(&owner.id));
    }

    #[tokio::test]
    async fn delete_account_refuses_team_creators() {
        let ctx = TestContext::new();
        let owner = ctx.user("kim@example.com").await;
        ctx.team(owner.id, "Ops").await;

        let err = ctx.state.users().delete_account(owner.id, owner.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(ctx.state.users().me(owner.id).await.is_ok());
    }
}
