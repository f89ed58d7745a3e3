use spin_sdk::http::{Request, Response};

use crate::auth::{
    clear_cookie_header, current_admin, issue_token, session_cookie_header, ADMIN_COOKIE,
};
use crate::config::{admin_password, admin_username, ADMIN_LIST_LIMIT, ADMIN_TOP_POSTS};
use crate::core::db::Db;
use crate::core::errors::ApiError;
use crate::core::forms::parse_form_data;
use crate::core::helpers::redirect;
use crate::models::models::SessionRole;
use crate::templates;

pub fn login_page(_req: Request) -> anyhow::Result<Response> {
    Ok(templates::render_admin_login(None))
}

pub fn login(req: Request) -> anyhow::Result<Response> {
    let content_type = req.header("Content-Type").and_then(|h| h.as_str());
    let form = match parse_form_data(content_type, req.body()) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let username = form.field("username").unwrap_or_default();
    let password = form.field("password").unwrap_or_default();

    let expected_password = admin_password();
    let valid = username == admin_username()
        && expected_password
            .as_deref()
            .map(|p| p == password)
            .unwrap_or(false);
    if !valid {
        return Ok(templates::render_admin_login(Some(
            "Invalid admin credentials",
        )));
    }

    let token = issue_token(username, SessionRole::Admin);
    Ok(Response::builder()
        .status(303)
        .header("Location", "/admin/dashboard")
        .header("Set-Cookie", session_cookie_header(ADMIN_COOKIE, &token))
        .body(Vec::new())
        .build())
}

pub fn logout(_req: Request) -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(303)
        .header("Location", "/")
        .header("Set-Cookie", clear_cookie_header(ADMIN_COOKIE))
        .body(Vec::new())
        .build())
}

pub fn dashboard(req: Request) -> anyhow::Result<Response> {
    let Some(admin) = current_admin(&req) else {
        return Ok(redirect("/admin/login"));
    };

    let db = Db::open();
    let total_users = db.users().count()?;
    let total_posts = db.posts().count()?;

    let mut top_posts = db.posts().recent(usize::MAX)?;
    top_posts.sort_by(|a, b| b.like_count().cmp(&a.like_count()));
    top_posts.truncate(ADMIN_TOP_POSTS);

    let users = db.users().all(ADMIN_LIST_LIMIT)?;
    let posts = db.posts().recent(ADMIN_LIST_LIMIT)?;

    Ok(templates::render_admin_dashboard(
        &admin,
        total_users,
        total_posts,
        &top_posts,
        &users,
        &posts,
    ))
}

/// Delete a user and cascade to their posts.
pub fn delete_user(req: Request, path: &str) -> anyhow::Result<Response> {
    if current_admin(&req).is_none() {
        return Ok(ApiError::Unauthorized.into());
    }

    let username = path
        .trim_start_matches("/admin/users/")
        .trim_end_matches("/delete");

    let db = Db::open();
    if db.users().delete(username)?.is_none() {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    }
    db.posts().delete_by_author(username)?;

    Ok(redirect("/admin/dashboard"))
}

pub fn delete_post(req: Request, path: &str) -> anyhow::Result<Response> {
    if current_admin(&req).is_none() {
        return Ok(ApiError::Unauthorized.into());
    }

    let post_id = path
        .trim_start_matches("/admin/posts/")
        .trim_end_matches("/delete");

    let db = Db::open();
    if db.posts().get(post_id)?.is_none() {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    }
    db.posts().delete(post_id)?;

    Ok(redirect("/admin/dashboard"))
}
