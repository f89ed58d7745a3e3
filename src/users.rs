use regex::Regex;
use spin_sdk::http::{Request, Response};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::{current_user, issue_token, session_cookie_header, SESSION_COOKIE};
use crate::config::*;
use crate::core::db::Db;
use crate::core::errors::ApiError;
use crate::core::forms::{parse_form_data, FormData};
use crate::core::helpers::{hash_password, now_iso, redirect, redirect_to_login};
use crate::images;
use crate::models::models::{SessionRole, User};
use crate::posts::post_views;
use crate::templates;

fn username_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("Regex should compile"))
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Regex should compile"))
}

fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "Username must be {}-{} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        ));
    }
    if !username_regex().is_match(username) {
        return Err("Username may only contain letters, digits, '.', '-' and '_'".to_string());
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), String> {
    if !email_regex().is_match(email) {
        return Err("Please enter a valid email address".to_string());
    }
    Ok(())
}

fn form_from(req: &Request) -> Result<FormData, ApiError> {
    let content_type = req.header("Content-Type").and_then(|h| h.as_str());
    parse_form_data(content_type, req.body())
}

// === Registration ===

pub fn register_page(_req: Request) -> anyhow::Result<Response> {
    Ok(templates::render_register(None, "", ""))
}

pub fn register(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let form = match form_from(&req) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let username = form.field("username").unwrap_or_default().trim().to_string();
    let email = form.field("email").unwrap_or_default().trim().to_string();
    let password = form.field("password").unwrap_or_default();

    let rerender = |error: &str| templates::render_register(Some(error), &username, &email);

    if let Err(msg) = validate_username(&username) {
        return Ok(rerender(&msg));
    }
    if let Err(msg) = validate_email(&email) {
        return Ok(rerender(&msg));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Ok(rerender(&format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let users = db.users();
    if users.get(&username)?.is_some() {
        return Ok(rerender(
            "Username already taken. Please choose a different username.",
        ));
    }
    if users.email_owner(&email)?.is_some() {
        return Ok(rerender(
            "Email already registered. Please use a different email or login.",
        ));
    }

    let user = User {
        username,
        email,
        password: hash_password(password)?,
        profile_pic: None,
        followers: Vec::new(),
        following: Vec::new(),
        created_at: now_iso(),
    };
    users.insert(&user)?;

    Ok(redirect("/login?registered=true"))
}

// === Profile pages ===

pub fn profile_page(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(redirect_to_login());
    };

    let username = path.trim_start_matches("/profile/");
    let users = db.users();
    let Some(user) = users.get(username)? else {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    };

    let posts = db.posts().by_author(&user.username, PROFILE_POSTS_LIMIT)?;
    let views = post_views(&db, &current.username, posts)?;

    let mut followers = Vec::new();
    for name in &user.followers {
        if let Some(u) = users.get(name)? {
            followers.push(u);
        }
    }
    let mut following = Vec::new();
    for name in &user.following {
        if let Some(u) = users.get(name)? {
            following.push(u);
        }
    }

    let is_following = user.followers.iter().any(|f| f == &current.username);

    Ok(templates::render_profile(
        &current.username,
        &user,
        &views,
        is_following,
        &followers,
        &following,
    ))
}

pub fn edit_profile_page(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(user) = current_user(&req, &db)? else {
        return Ok(redirect_to_login());
    };

    Ok(templates::render_edit_profile(
        &user.username,
        &user.email,
        user.profile_pic.as_deref(),
        None,
    ))
}

pub fn edit_profile(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(mut user) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };
    let current_username = user.username.clone();

    let form = match form_from(&req) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let new_username = form
        .field("new_username")
        .unwrap_or(&current_username)
        .trim()
        .to_string();
    let new_email = form.field("email").unwrap_or_default().trim().to_string();
    let new_password = form.field("password").unwrap_or_default();

    let rerender = |error: &str, user: &User| {
        templates::render_edit_profile(
            &user.username,
            &user.email,
            user.profile_pic.as_deref(),
            Some(error),
        )
    };

    let users = db.users();
    let renaming = !new_username.is_empty() && new_username != current_username;
    if renaming {
        if let Err(msg) = validate_username(&new_username) {
            return Ok(rerender(&msg, &user));
        }
        if users.get(&new_username)?.is_some() {
            return Ok(rerender("Username already taken. Please choose another.", &user));
        }
    }

    if !new_email.is_empty() && new_email != user.email {
        if let Err(msg) = validate_email(&new_email) {
            return Ok(rerender(&msg, &user));
        }
        if let Some(owner) = users.email_owner(&new_email)? {
            if owner != current_username {
                return Ok(rerender("Email already registered to another account.", &user));
            }
        }
        let old_email = std::mem::replace(&mut user.email, new_email);
        users.update(&user)?;
        users.change_email(&old_email, &user)?;
    }

    if !new_password.is_empty() {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Ok(rerender(
                &format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
                &user,
            ));
        }
        user.password = hash_password(new_password)?;
        users.update(&user)?;
    }

    if renaming {
        // Sweeps author/likes/comments/follower references document by
        // document; not atomic across them.
        db.rename_user(&current_username, &new_username)?;

        let token = issue_token(&new_username, SessionRole::User);
        return Ok(Response::builder()
            .status(303)
            .header("Location", format!("/profile/{}", new_username))
            .header("Set-Cookie", session_cookie_header(SESSION_COOKIE, &token))
            .body(Vec::new())
            .build());
    }

    Ok(redirect(&format!("/profile/{}", current_username)))
}

// === Profile picture upload ===

pub fn upload_profile_picture(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(mut user) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    if req.body().len() > MAX_UPLOAD_BYTES {
        return Ok(ApiError::BadRequest("Image too large".to_string()).into());
    }

    let form = match form_from(&req) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let Some(file) = form.file("profile_pic") else {
        return Ok(ApiError::BadRequest("No image uploaded".to_string()).into());
    };
    if !images::is_allowed_image_type(file.content_type.as_deref().unwrap_or("")) {
        return Ok(ApiError::BadRequest("Invalid file type. Only images allowed.".to_string()).into());
    }

    let decoded = match images::decode(&file.data) {
        Ok(img) => img,
        Err(err) => return Ok(err.into()),
    };
    let optimized = match images::optimize(&decoded) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(err.into()),
    };
    let thumb = match images::thumbnail(&decoded) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(err.into()),
    };

    let name = format!("{}.jpg", Uuid::new_v4());
    let uploads = db.uploads();
    uploads.put(&name, &optimized)?;
    uploads.put(&format!("thumb_{}", name), &thumb)?;

    user.profile_pic = Some(format!("/uploads/thumb_{}", name));
    db.users().update(&user)?;

    Ok(redirect(&format!("/profile/{}", user.username)))
}
