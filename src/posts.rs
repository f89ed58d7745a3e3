use html_escape::encode_double_quoted_attribute;
use regex::Regex;
use spin_sdk::http::{Request, Response};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::current_user;
use crate::config::*;
use crate::core::db::Db;
use crate::core::errors::ApiError;
use crate::core::forms::parse_form_data;
use crate::core::helpers::{now_iso, redirect, redirect_to_login, sanitize_text};
use crate::core::query_params::{get_string, parse_query_params};
use crate::images;
use crate::models::models::{Comment, Post, User};
use crate::templates::{self, PostView};

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("Regex should compile"))
}

/// Sanitize post content and turn bare URLs into links.
fn filter_post_content(content: &str) -> String {
    let clean = ammonia::Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(content)
        .to_string();

    url_regex()
        .replace_all(&clean, |caps: &regex::Captures| {
            let url = &caps[0];
            let escaped_url = encode_double_quoted_attribute(url);
            format!(r#"<a href="{}" target="_blank">{}</a>"#, escaped_url, url)
        })
        .to_string()
}

fn post_id_from(path: &str) -> &str {
    path.trim_start_matches("/posts/")
        .split('/')
        .next()
        .unwrap_or("")
}

/// Decorate posts with the author's profile picture and whether the
/// current user liked them.
pub fn post_views(db: &Db, current_username: &str, posts: Vec<Post>) -> anyhow::Result<Vec<PostView>> {
    let users = db.users();
    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let author_pfp = users.get(&post.author)?.and_then(|u| u.profile_pic);
        let liked = post.liked_by(current_username);
        views.push(PostView {
            post,
            author_pfp,
            liked,
        });
    }
    Ok(views)
}

fn within_last_day(created_at: &str) -> bool {
    match chrono::DateTime::parse_from_rfc3339(created_at) {
        Ok(ts) => {
            chrono::Utc::now() - ts.with_timezone(&chrono::Utc) <= chrono::Duration::days(1)
        }
        Err(_) => false,
    }
}

// === Feed ===

pub fn feed(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(redirect_to_login());
    };

    let params = parse_query_params(req.uri());
    let filter = get_string(&params, "filter");
    let posts = db.posts();

    let selected = match filter.as_deref() {
        Some("following") => {
            let following = current.following.clone();
            let me = current.username.clone();
            posts.filtered(FEED_LIMIT, move |p| {
                p.author == me || following.iter().any(|f| f == &p.author)
            })?
        }
        Some("popular") => {
            // Like-count ordering needs the whole collection, then a sort.
            let mut all = posts.recent(usize::MAX)?;
            all.sort_by(|a, b| {
                b.like_count()
                    .cmp(&a.like_count())
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            all.truncate(FEED_LIMIT);
            all
        }
        Some("recent") => posts.filtered(FEED_LIMIT, |p| within_last_day(&p.created_at))?,
        _ => posts.recent(FEED_LIMIT)?,
    };

    let views = post_views(&db, &current.username, selected)?;
    Ok(templates::render_feed(
        &current.username,
        &views,
        filter.as_deref(),
    ))
}

// === Post CRUD ===

pub fn create_post(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    if req.body().len() > MAX_UPLOAD_BYTES {
        return Ok(ApiError::BadRequest("Upload too large".to_string()).into());
    }

    let content_type = req.header("Content-Type").and_then(|h| h.as_str());
    let form = match parse_form_data(content_type, req.body()) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let content = form.field("content").unwrap_or_default();

    if content.is_empty() || content.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest(format!(
            "Post must be 1-{} characters",
            MAX_POST_LENGTH
        ))
        .into());
    }

    let mut image = None;
    if let Some(file) = form.file("image") {
        if !images::is_allowed_image_type(file.content_type.as_deref().unwrap_or("")) {
            return Ok(
                ApiError::BadRequest("Invalid file type. Only images allowed.".to_string()).into(),
            );
        }
        let decoded = match images::decode(&file.data) {
            Ok(img) => img,
            Err(err) => return Ok(err.into()),
        };
        let optimized = match images::optimize(&decoded) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(err.into()),
        };
        let name = format!("{}.jpg", Uuid::new_v4());
        db.uploads().put(&name, &optimized)?;
        image = Some(format!("/uploads/{}", name));
    }

    let post = Post {
        id: Uuid::new_v4().to_string(),
        author: current.username,
        content: filter_post_content(content),
        image,
        created_at: now_iso(),
        likes: Vec::new(),
        comments: Vec::new(),
    };
    db.posts().insert(&post)?;

    Ok(redirect("/feed"))
}

pub fn view_post(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(redirect_to_login());
    };

    let post_id = post_id_from(path);
    let Some(post) = db.posts().get(post_id)? else {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    };

    let users = db.users();
    let mut comments_html = String::new();
    for comment in &post.comments {
        let pfp = users.get(&comment.username)?.and_then(|u| u.profile_pic);
        comments_html.push_str(&templates::comment_item(
            &comment.username,
            pfp.as_deref(),
            &comment.text,
            &comment.created_at,
        ));
        comments_html.push('\n');
    }

    let author_pfp = users.get(&post.author)?.and_then(|u| u.profile_pic);
    let view = PostView {
        liked: post.liked_by(&current.username),
        author_pfp,
        post,
    };

    Ok(templates::render_post_detail(
        &current.username,
        &view,
        comments_html,
    ))
}

pub fn edit_post_page(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(redirect_to_login());
    };

    let post_id = post_id_from(path);
    let Some(post) = db.posts().get(post_id)? else {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    };
    if post.author != current.username {
        return Ok(ApiError::Forbidden.into());
    }

    Ok(templates::render_edit_post(&current.username, &post))
}

pub fn edit_post(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let post_id = post_id_from(path);
    let Some(mut post) = db.posts().get(post_id)? else {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    };
    if post.author != current.username {
        return Ok(ApiError::Forbidden.into());
    }

    let content_type = req.header("Content-Type").and_then(|h| h.as_str());
    let form = match parse_form_data(content_type, req.body()) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let content = form.field("content").unwrap_or_default();
    if content.is_empty() || content.len() > MAX_POST_LENGTH {
        return Ok(ApiError::BadRequest(format!(
            "Post must be 1-{} characters",
            MAX_POST_LENGTH
        ))
        .into());
    }

    post.content = filter_post_content(content);
    db.posts().update(&post)?;

    Ok(redirect(&format!("/posts/{}", post.id)))
}

pub fn delete_post(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let post_id = post_id_from(path);
    let Some(post) = db.posts().get(post_id)? else {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    };
    if post.author != current.username {
        return Ok(ApiError::Forbidden.into());
    }

    db.posts().delete(post_id)?;
    Ok(redirect("/feed"))
}

// === Likes and comments ===

pub fn like_post(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let post_id = post_id_from(path);
    let Some(mut post) = db.posts().get(post_id)? else {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    };

    // Set-membership toggle: second like by the same user unlikes.
    if post.liked_by(&current.username) {
        post.likes.retain(|u| u != &current.username);
    } else {
        post.likes.push(current.username.clone());
    }
    db.posts().update(&post)?;

    let referer = req
        .header("Referer")
        .and_then(|h| h.as_str())
        .unwrap_or_default();
    if referer.contains("/feed") {
        Ok(redirect("/feed"))
    } else {
        Ok(redirect(&format!("/posts/{}", post.id)))
    }
}

pub fn add_comment(req: Request, path: &str) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let post_id = post_id_from(path);
    let Some(mut post) = db.posts().get(post_id)? else {
        return Ok(ApiError::NotFound("Post not found".to_string()).into());
    };

    let content_type = req.header("Content-Type").and_then(|h| h.as_str());
    let form = match parse_form_data(content_type, req.body()) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let text = form.field("text").unwrap_or_default();
    if text.is_empty() || text.len() > MAX_COMMENT_LENGTH {
        return Ok(ApiError::BadRequest(format!(
            "Comment must be 1-{} characters",
            MAX_COMMENT_LENGTH
        ))
        .into());
    }

    post.comments.push(Comment {
        username: current.username,
        text: sanitize_text(text),
        created_at: now_iso(),
    });
    db.posts().update(&post)?;

    Ok(redirect(&format!("/posts/{}", post.id)))
}

// === Search ===

pub fn search(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    let Some(current) = current_user(&req, &db)? else {
        return Ok(redirect_to_login());
    };

    let params = parse_query_params(req.uri());
    let query = get_string(&params, "q").unwrap_or_default();
    let query = query.trim().to_string();

    let mut users: Vec<User> = Vec::new();
    let mut views = Vec::new();
    if !query.is_empty() {
        let needle = query.to_lowercase();
        for name in db.users().usernames()? {
            if users.len() >= SEARCH_LIMIT {
                break;
            }
            if let Some(user) = db.users().get(&name)? {
                if user.username.to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle)
                {
                    users.push(user);
                }
            }
        }

        let matches = db
            .posts()
            .filtered(SEARCH_LIMIT, |p| p.content.to_lowercase().contains(&needle))?;
        views = post_views(&db, &current.username, matches)?;
    }

    Ok(templates::render_search(
        &current.username,
        &query,
        &users,
        &views,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_filter_strips_scripts() {
        let filtered = filter_post_content("hi <script>alert(1)</script>there");
        assert!(!filtered.contains("<script>"));
        assert!(filtered.contains("hi "));
    }

    #[test]
    fn content_filter_links_urls() {
        let filtered = filter_post_content("see https://example.com/page for more");
        assert!(filtered.contains(r#"<a href="https://example.com/page" target="_blank">"#));
    }

    #[test]
    fn post_id_extraction() {
        assert_eq!(post_id_from("/posts/abc-123/like"), "abc-123");
        assert_eq!(post_id_from("/posts/abc-123"), "abc-123");
        assert_eq!(post_id_from("/posts/"), "");
    }

    #[test]
    fn recent_window() {
        let now = chrono::Utc::now().to_rfc3339();
        assert!(within_last_day(&now));
        let old = (chrono::Utc::now() - chrono::Duration::days(2)).to_rfc3339();
        assert!(!within_last_day(&old));
        assert!(!within_last_day("not a timestamp"));
    }
}
