//! Composition root: wires config, store and outbox into the services and
//! mounts them on the HTTP router.

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::Store;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::notify::{EventHub, Notifier};
use crate::services::{FoldersService, FormsService, ResponsesService, ServiceContext, TeamsService, UsersService};

struct Services {
    users: UsersService,
    teams: TeamsService,
    folders: FoldersService,
    forms: FormsService,
    responses: ResponsesService,
}

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub hub: EventHub,
    services: Arc<Services>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn Store>, notifier: Notifier, hub: EventHub) -> Self {
        let ctx = ServiceContext {
            store: store.clone(),
            notifier,
            config: config.clone(),
        };
        let services = Services {
            users: UsersService::new(ctx.clone()),
            teams: TeamsService::new(ctx.clone()),
            folders: FoldersService::new(ctx.clone()),
            forms: FormsService::new(ctx.clone()),
            responses: ResponsesService::new(ctx),
        };
        Self {
            config,
            store,
            hub,
            services: Arc::new(services),
        }
    }

    pub fn users(&self) -> &UsersService {
        &self.services.users
    }

    pub fn teams(&self) -> &TeamsService {
        &self.services.teams
    }

    pub fn folders(&self) -> &FoldersService {
        &self.services.folders
    }

    pub fn forms(&self) -> &FormsService {
        &self.services.forms
    }

    pub fn responses(&self) -> &ResponsesService {
        &self.services.responses
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let protected = Router::new()
        .merge(user_routes())
        .merge(team_routes())
        .merge(folder_routes())
        .merge(form_routes())
        .merge(response_routes())
        .route("/api/events/:room", get(protected::events::stream))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .merge(public_routes())
        // Protected API
        .merge(protected)
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() || config.security.cors_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

fn public_routes() -> Router<AppState> {
    use public::{auth, forms, responses};

    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/public/forms/:form_id", get(forms::show))
        .route("/responses/:form_id", post(responses::submit))
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/api/users/me", get(users::me).patch(users::update))
        .route("/api/users/change-password", patch(users::change_password))
        .route("/api/users/:user_id", delete(users::remove))
}

fn team_routes() -> Router<AppState> {
    use protected::teams;

    Router::new()
        .route("/api/teams", get(teams::list).post(teams::create))
        .route("/api/teams/invitations/accept", post(teams::accept_invitation))
        .route(
            "/api/teams/:team_id",
            get(teams::show).patch(teams::update).delete(teams::remove),
        )
        .route("/api/teams/:team_id/add-member", post(teams::add_member))
        .route("/api/teams/:team_id/invite-member", post(teams::invite_member))
        .route("/api/teams/:team_id/remove-member", post(teams::remove_members))
}

fn folder_routes() -> Router<AppState> {
    use protected::folders;

    Router::new()
        .route("/api/folders", post(folders::create))
        .route("/api/folders/independent", get(folders::independent))
        .route("/api/folders/team/:team_id", get(folders::of_team))
        .route(
            "/api/folders/:folder_id",
            get(folders::show).patch(folders::update).delete(folders::remove),
        )
}

fn form_routes() -> Router<AppState> {
    use protected::forms;

    Router::new()
        .route("/api/forms", get(forms::list).post(forms::create))
        .route("/api/forms/team/:team_id", post(forms::create_in_team))
        .route("/api/forms/folder/:folder_id", post(forms::create_in_folder))
        .route("/api/forms/folder/:folder_id/team/:team_id", post(forms::create_in_team_folder))
        .route(
            "/api/forms/:form_id",
            get(forms::show).patch(forms::update).delete(forms::remove),
        )
        .route("/api/forms/:form_id/restore", post(forms::restore))
        .route("/api/forms/:form_id/favourites", post(forms::toggle_favourite))
        .route("/api/forms/:form_id/members", get(forms::members))
        .route("/api/forms/:form_id/invite-member", post(forms::invite_member))
        .route("/api/forms/:form_id/remove-member", post(forms::remove_member))
        .route("/api/forms/:form_id/disabled/:disabled", patch(forms::set_disabled))
        .route("/api/forms/:form_id/disabled-on-date", patch(forms::set_disabled_on_date))
        .route("/api/forms/:form_id/disabled-notification/:flag", patch(forms::set_disabled_notification))
        .route("/api/forms/:form_id/folder/:folder_id/add", patch(forms::add_to_folder))
        .route("/api/forms/:form_id/folder/:folder_id/remove", patch(forms::remove_from_folder))
        .route("/api/forms/:form_id/team/:team_id/add", patch(forms::move_to_team))
        .route("/api/forms/:form_id/team/:team_id/remove", patch(forms::move_back_to_personal))
}

fn response_routes() -> Router<AppState> {
    use protected::responses;

    Router::new()
        .route(
            "/api/responses/:form_id",
            get(responses::list).delete(responses::remove_many),
        )
        .route("/api/responses/:form_id/:response_id", delete(responses::remove))
}
