use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use spin_sdk::http::{Request, Response};

use crate::config::{session_expiration_hours, session_secret};
use crate::core::db::Db;
use crate::core::forms::parse_form_data;
use crate::core::helpers::{redirect, verify_password};
use crate::core::query_params::{get_bool_flag, get_string, parse_query_params};
use crate::models::models::{SessionClaims, SessionRole, User};
use crate::templates;

pub const SESSION_COOKIE: &str = "session";
pub const ADMIN_COOKIE: &str = "admin_session";

// === Signed session tokens ===
//
// Cookie value is `payload.signature`: the payload is a base64url-encoded
// `username\nrole\nexpiry` triple, the signature a base64url SHA-256 digest
// over the server secret and the payload.

fn sign(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_secret().as_bytes());
    hasher.update(b".");
    hasher.update(payload.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Byte-wise comparison that does not short-circuit on the first mismatch.
fn signatures_match(expected: &str, given: &str) -> bool {
    let (expected, given) = (expected.as_bytes(), given.as_bytes());
    if expected.len() != given.len() {
        return false;
    }
    expected
        .iter()
        .zip(given)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn role_str(role: SessionRole) -> &'static str {
    match role {
        SessionRole::User => "user",
        SessionRole::Admin => "admin",
    }
}

pub fn issue_token(username: &str, role: SessionRole) -> String {
    let expires = chrono::Utc::now().timestamp() + session_expiration_hours() * 3600;
    issue_token_at(username, role, expires)
}

fn issue_token_at(username: &str, role: SessionRole, expires: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!("{}\n{}\n{}", username, role_str(role), expires));
    let sig = sign(&payload);
    format!("{}.{}", payload, sig)
}

pub fn verify_token(token: &str) -> Option<SessionClaims> {
    verify_token_at(token, chrono::Utc::now().timestamp())
}

fn verify_token_at(token: &str, now: i64) -> Option<SessionClaims> {
    let (payload, sig) = token.split_once('.')?;
    if !signatures_match(&sign(payload), sig) {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let mut parts = decoded.splitn(3, '\n');
    let username = parts.next()?.to_string();
    let role = match parts.next()? {
        "user" => SessionRole::User,
        "admin" => SessionRole::Admin,
        _ => return None,
    };
    let expires: i64 = parts.next()?.parse().ok()?;
    if now > expires {
        return None;
    }

    Some(SessionClaims { username, role })
}

// === Cookies ===

pub fn get_cookie(req: &Request, name: &str) -> Option<String> {
    let header = req.header("Cookie")?.as_str()?;
    for pair in header.split(';') {
        if let Some((key, value)) = pair.trim().split_once('=') {
            if key == name {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub fn session_cookie_header(name: &str, token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly", name, token)
}

pub fn clear_cookie_header(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; Max-Age=0", name)
}

/// Resolve the logged-in user from the session cookie: verified signature,
/// unexpired, and the user record still exists.
pub fn current_user(req: &Request, db: &Db) -> anyhow::Result<Option<User>> {
    let Some(token) = get_cookie(req, SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some(claims) = verify_token(&token) else {
        return Ok(None);
    };
    if claims.role != SessionRole::User {
        return Ok(None);
    }
    db.users().get(&claims.username)
}

/// Admin username from the admin cookie, if the claim carries the admin role.
pub fn current_admin(req: &Request) -> Option<String> {
    let token = get_cookie(req, ADMIN_COOKIE)?;
    let claims = verify_token(&token)?;
    if claims.role != SessionRole::Admin {
        return None;
    }
    Some(claims.username)
}

// === Handlers ===

pub fn login_page(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    if current_user(&req, &db)?.is_some() {
        return Ok(redirect("/feed"));
    }

    let params = parse_query_params(req.uri());
    let success = if get_bool_flag(&params, "registered") {
        Some("Registration successful! Please login.")
    } else {
        None
    };
    let error = get_string(&params, "error");
    Ok(templates::render_login(error.as_deref(), success, ""))
}

pub fn login(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let content_type = req.header("Content-Type").and_then(|h| h.as_str());
    let form = match parse_form_data(content_type, req.body()) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let username = form.field("username").unwrap_or_default();
    let password = form.field("password").unwrap_or_default();

    let Some(user) = db.users().get(username)? else {
        return Ok(templates::render_login(
            Some("Username not found. Please check your username or register."),
            None,
            username,
        ));
    };

    if !verify_password(password, &user.password) {
        return Ok(templates::render_login(
            Some("Incorrect password. Please try again."),
            None,
            username,
        ));
    }

    let token = issue_token(&user.username, SessionRole::User);
    Ok(Response::builder()
        .status(303)
        .header("Location", "/feed")
        .header("Set-Cookie", session_cookie_header(SESSION_COOKIE, &token))
        .body(Vec::new())
        .build())
}

pub fn logout(_req: Request) -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(303)
        .header("Location", "/")
        .header("Set-Cookie", clear_cookie_header(SESSION_COOKIE))
        .body(Vec::new())
        .build())
}
