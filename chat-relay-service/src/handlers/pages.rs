use crate::startup::AppState;
use askama::Template;
use axum::{extract::State, response::IntoResponse};

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub service_name: String,
    pub bot_configured: bool,
}

#[derive(Template)]
#[template(path = "db_view.html")]
pub struct DbViewTemplate {
    pub service_name: String,
}

pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    IndexTemplate {
        service_name: state.service_name.clone(),
        bot_configured: state.relay.bot_configured(),
    }
}

pub async fn db_view(State(state): State<AppState>) -> impl IntoResponse {
    DbViewTemplate {
        service_name: state.service_name.clone(),
    }
}
