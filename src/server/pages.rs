//! Page routes. They return small JSON view descriptors; the gate in front of
//! them has already decided who may see what.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::identity::RequestContext;

fn view(page: &str, ctx: &RequestContext) -> Value {
    json!({ "page": page, "authenticated": ctx.is_authenticated(), "user": ctx.identity })
}

pub(super) async fn home(ctx: RequestContext) -> Json<Value> { Json(view("home", &ctx)) }

pub(super) async fn login(ctx: RequestContext) -> Json<Value> { Json(view("login", &ctx)) }

pub(super) async fn register(ctx: RequestContext) -> Json<Value> { Json(view("register", &ctx)) }

pub(super) async fn dashboard(State(state): State<AppState>, ctx: RequestContext) -> Json<Value> {
    let mut v = view("dashboard", &ctx);
    if let Some(me) = &ctx.identity {
        v["documentCount"] = json!(state.documents.list(&me.account_id).len());
    }
    Json(v)
}

pub(super) async fn documents(State(state): State<AppState>, ctx: RequestContext) -> Json<Value> {
    let mut v = view("documents", &ctx);
    if let Some(me) = &ctx.identity {
        v["documents"] = json!(state.documents.list(&me.account_id));
    }
    Json(v)
}

pub(super) async fn profile(ctx: RequestContext) -> Json<Value> { Json(view("profile", &ctx)) }

pub(super) async fn settings(ctx: RequestContext) -> Json<Value> { Json(view("settings", &ctx)) }
