use spin_sdk::http::{Request, Response};

use crate::auth::current_user;
use crate::core::db::Db;
use crate::core::errors::ApiError;
use crate::core::helpers::redirect;

/// Add `target` to the current user's following list and the current user
/// to `target`'s followers. Both sides keep set semantics; the two writes
/// are independent documents.
pub fn follow_user(db: &Db, follower: &str, target: &str) -> anyhow::Result<()> {
    let users = db.users();
    if let Some(mut me) = users.get(follower)? {
        if !me.following.iter().any(|u| u == target) {
            me.following.push(target.to_string());
            users.update(&me)?;
        }
    }
    if let Some(mut them) = users.get(target)? {
        if !them.followers.iter().any(|u| u == follower) {
            them.followers.push(follower.to_string());
            users.update(&them)?;
        }
    }
    Ok(())
}

pub fn unfollow_user(db: &Db, follower: &str, target: &str) -> anyhow::Result<()> {
    let users = db.users();
    if let Some(mut me) = users.get(follower)? {
        me.following.retain(|u| u != target);
        users.update(&me)?;
    }
    if let Some(mut them) = users.get(target)? {
        them.followers.retain(|u| u != follower);
        users.update(&them)?;
    }
    Ok(())
}

// === HTTP Handlers ===

pub fn handle_follow(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let target = path.trim_start_matches("/follow/");
    if target.is_empty() || target == current.username {
        return Ok(ApiError::BadRequest("Cannot follow yourself".to_string()).into());
    }
    if db.users().get(target)?.is_none() {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    }

    follow_user(&db, &current.username, target)?;
    Ok(redirect(&format!("/profile/{}", target)))
}

pub fn handle_unfollow(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let target = path.trim_start_matches("/unfollow/");
    if target.is_empty() {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    }

    unfollow_user(&db, &current.username, target)?;
    Ok(redirect(&format!("/profile/{}", target)))
}
