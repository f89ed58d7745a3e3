use html_escape::{encode_double_quoted_attribute, encode_text};
use rust_embed::RustEmbed;
use spin_sdk::http::Response;

use crate::core::errors::ApiError;
use crate::models::models::{Post, User};

#[derive(RustEmbed)]
#[folder = "static"]
struct Assets;

/// A post decorated with what the page needs beyond the stored document.
pub struct PostView {
    pub post: Post,
    pub author_pfp: Option<String>,
    pub liked: bool,
}

fn html_response(html: String) -> Response {
    Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.into_bytes())
        .build()
}

/// Load an embedded template and substitute placeholders.
fn page(name: &str, replacements: &[(&str, String)]) -> Response {
    let Some(file) = Assets::get(name) else {
        return ApiError::InternalError(format!("Template not found: {}", name)).into();
    };
    let html = String::from_utf8_lossy(&file.data);
    html_response(substitute(&html, replacements))
}

/// Single-pass placeholder substitution. Only the template text is
/// scanned; substituted values are never rescanned, so user content that
/// happens to spell a placeholder stays inert.
fn substitute(template: &str, replacements: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = replacements
            .iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|idx| (idx, placeholder.len(), value))
            })
            .min_by_key(|(idx, _, _)| *idx);
        let Some((idx, len, value)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..idx]);
        out.push_str(value);
        rest = &rest[idx + len..];
    }
}

// === Fragment builders ===

fn attr(value: &str) -> String {
    encode_double_quoted_attribute(value).to_string()
}

fn text(value: &str) -> String {
    encode_text(value).to_string()
}

fn avatar(pfp: Option<&str>, username: &str) -> String {
    match pfp {
        Some(path) => format!(
            r#"<img class="avatar" src="{}" alt="{}">"#,
            attr(path),
            attr(username)
        ),
        None => format!(
            r#"<span class="avatar avatar-placeholder">{}</span>"#,
            text(&username.chars().take(1).collect::<String>().to_uppercase())
        ),
    }
}

fn inline_error(message: Option<&str>) -> String {
    message
        .map(|m| format!(r#"<p class="form-error">{}</p>"#, text(m)))
        .unwrap_or_default()
}

fn inline_success(message: Option<&str>) -> String {
    message
        .map(|m| format!(r#"<p class="form-success">{}</p>"#, text(m)))
        .unwrap_or_default()
}

/// One feed/profile post card. Post content is stored sanitized (ammonia
/// plus URL auto-linking), so it is inserted as-is; everything else is
/// escaped here.
pub fn post_card(view: &PostView, current_user: &str) -> String {
    let post = &view.post;
    let image = post
        .image
        .as_deref()
        .map(|path| format!(r#"<img class="post-image" src="{}" alt="">"#, attr(path)))
        .unwrap_or_default();
    let like_label = if view.liked { "Unlike" } else { "Like" };
    let owner_actions = if post.author == current_user {
        format!(
            r#"<a class="post-action" href="/posts/{id}/edit">Edit</a>
            <form class="inline" method="post" action="/posts/{id}/delete"><button type="submit">Delete</button></form>"#,
            id = attr(&post.id)
        )
    } else {
        String::new()
    };

    format!(
        r#"<article class="post-card">
  <header>
    <a class="author" href="/profile/{author_attr}">{avatar}{author}</a>
    <time>{created}</time>
  </header>
  <div class="post-content">{content}</div>
  {image}
  <footer>
    <form class="inline" method="post" action="/posts/{id}/like"><button type="submit">{like_label} ({likes})</button></form>
    <a class="post-action" href="/posts/{id}">Comments ({comments})</a>
    {owner_actions}
  </footer>
</article>"#,
        author_attr = attr(&post.author),
        avatar = avatar(view.author_pfp.as_deref(), &post.author),
        author = text(&post.author),
        created = text(&post.created_at),
        content = post.content,
        image = image,
        id = attr(&post.id),
        like_label = like_label,
        likes = post.like_count(),
        comments = post.comment_count(),
        owner_actions = owner_actions,
    )
}

pub fn post_list(views: &[PostView], current_user: &str) -> String {
    if views.is_empty() {
        return r#"<p class="empty">No posts yet.</p>"#.to_string();
    }
    views
        .iter()
        .map(|v| post_card(v, current_user))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn comment_item(username: &str, pfp: Option<&str>, comment_text: &str, created: &str) -> String {
    format!(
        r#"<li class="comment">
  <a class="author" href="/profile/{author_attr}">{avatar}{author}</a>
  <span class="comment-text">{text}</span>
  <time>{created}</time>
</li>"#,
        author_attr = attr(username),
        avatar = avatar(pfp, username),
        author = text(username),
        text = text(comment_text),
        created = text(created),
    )
}

pub fn user_row(user: &User) -> String {
    format!(
        r#"<li class="user-row">
  <a class="author" href="/profile/{name_attr}">{avatar}{name}</a>
  <span class="user-meta">{email} &middot; {followers} followers &middot; {following} following</span>
</li>"#,
        name_attr = attr(&user.username),
        avatar = avatar(user.profile_pic.as_deref(), &user.username),
        name = text(&user.username),
        email = text(&user.email),
        followers = user.followers.len(),
        following = user.following.len(),
    )
}

// === Pages ===

pub fn render_landing() -> Response {
    page("index.html", &[])
}

pub fn render_login(error: Option<&str>, success: Option<&str>, username: &str) -> Response {
    page(
        "login.html",
        &[
            (
                "LOGIN_MESSAGES",
                format!("{}{}", inline_error(error), inline_success(success)),
            ),
            ("LOGIN_USERNAME", attr(username)),
        ],
    )
}

pub fn render_register(error: Option<&str>, username: &str, email: &str) -> Response {
    page(
        "register.html",
        &[
            ("REGISTER_ERROR", inline_error(error)),
            ("REGISTER_USERNAME", attr(username)),
            ("REGISTER_EMAIL", attr(email)),
        ],
    )
}

pub fn render_feed(nav_username: &str, views: &[PostView], filter: Option<&str>) -> Response {
    let filter = filter.unwrap_or("all");
    let links = ["all", "following", "popular", "recent"]
        .iter()
        .map(|f| {
            let class = if *f == filter { "filter active" } else { "filter" };
            let href = if *f == "all" {
                "/feed".to_string()
            } else {
                format!("/feed?filter={}", f)
            };
            format!(r#"<a class="{}" href="{}">{}</a>"#, class, href, f)
        })
        .collect::<Vec<_>>()
        .join("\n");

    page(
        "feed.html",
        &[
            ("NAV_USERNAME", text(nav_username)),
            ("FEED_FILTERS", links),
            ("POST_LIST", post_list(views, nav_username)),
        ],
    )
}

pub fn render_post_detail(nav_username: &str, view: &PostView, comments_html: String) -> Response {
    page(
        "post_detail.html",
        &[
            ("NAV_USERNAME", text(nav_username)),
            ("POST_CARD", post_card(view, nav_username)),
            ("COMMENT_LIST", comments_html),
            ("POST_ID", attr(&view.post.id)),
        ],
    )
}

pub fn render_edit_post(nav_username: &str, post: &Post) -> Response {
    page(
        "edit_post.html",
        &[
            ("NAV_USERNAME", text(nav_username)),
            ("POST_ID", attr(&post.id)),
            // Stored content may carry auto-linked markup; strip it back to
            // text for the edit box.
            ("POST_CONTENT", text(&crate::core::helpers::sanitize_text(&post.content))),
        ],
    )
}

pub fn render_profile(
    nav_username: &str,
    user: &User,
    views: &[PostView],
    is_following: bool,
    followers: &[User],
    following: &[User],
) -> Response {
    let is_own = nav_username == user.username;
    let actions = if is_own {
        r#"<a class="button" href="/profile/edit">Edit profile</a>"#.to_string()
    } else if is_following {
        format!(
            r#"<form class="inline" method="post" action="/unfollow/{}"><button type="submit">Unfollow</button></form>"#,
            attr(&user.username)
        )
    } else {
        format!(
            r#"<form class="inline" method="post" action="/follow/{}"><button type="submit">Follow</button></form>"#,
            attr(&user.username)
        )
    };

    let followers_html = followers.iter().map(user_row).collect::<Vec<_>>().join("\n");
    let following_html = following.iter().map(user_row).collect::<Vec<_>>().join("\n");

    page(
        "profile.html",
        &[
            ("NAV_USERNAME", text(nav_username)),
            ("PROFILE_USERNAME", text(&user.username)),
            ("PROFILE_AVATAR", avatar(user.profile_pic.as_deref(), &user.username)),
            ("FOLLOWERS_COUNT", user.followers.len().to_string()),
            ("FOLLOWING_COUNT", user.following.len().to_string()),
            ("PROFILE_ACTIONS", actions),
            ("FOLLOWERS_LIST", followers_html),
            ("FOLLOWING_LIST", following_html),
            ("POST_LIST", post_list(views, nav_username)),
        ],
    )
}

pub fn render_edit_profile(
    username: &str,
    email: &str,
    profile_pic: Option<&str>,
    error: Option<&str>,
) -> Response {
    page(
        "edit_profile.html",
        &[
            ("NAV_USERNAME", text(username)),
            ("EDIT_ERROR", inline_error(error)),
            ("EDIT_USERNAME", attr(username)),
            ("EDIT_EMAIL", attr(email)),
            ("PROFILE_AVATAR", avatar(profile_pic, username)),
        ],
    )
}

pub fn render_search(
    nav_username: &str,
    query: &str,
    users: &[User],
    views: &[PostView],
) -> Response {
    let user_results = if users.is_empty() {
        r#"<p class="empty">No matching people.</p>"#.to_string()
    } else {
        format!(
            "<ul class=\"user-list\">{}</ul>",
            users.iter().map(user_row).collect::<Vec<_>>().join("\n")
        )
    };

    page(
        "search_results.html",
        &[
            ("NAV_USERNAME", text(nav_username)),
            ("SEARCH_QUERY", attr(query)),
            ("USER_RESULTS", user_results),
            ("POST_RESULTS", post_list(views, nav_username)),
        ],
    )
}

pub fn render_admin_login(error: Option<&str>) -> Response {
    page("admin_login.html", &[("ADMIN_ERROR", inline_error(error))])
}

pub fn render_admin_dashboard(
    admin_username: &str,
    total_users: usize,
    total_posts: usize,
    top_posts: &[Post],
    users: &[User],
    posts: &[Post],
) -> Response {
    let top_html = top_posts
        .iter()
        .map(|p| {
            format!(
                r#"<li>{author}: "{content}" &mdash; {likes} likes</li>"#,
                author = text(&p.author),
                content = text(&crate::core::helpers::sanitize_text(&p.content)),
                likes = p.like_count(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let user_rows = users
        .iter()
        .map(|u| {
            format!(
                r#"<tr><td>{name}</td><td>{email}</td><td>{created}</td>
<td><form class="inline" method="post" action="/admin/users/{name_attr}/delete"><button type="submit">Delete</button></form></td></tr>"#,
                name = text(&u.username),
                email = text(&u.email),
                created = text(&u.created_at),
                name_attr = attr(&u.username),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let post_rows = posts
        .iter()
        .map(|p| {
            format!(
                r#"<tr><td>{author}</td><td>{content}</td><td>{likes}</td><td>{comments}</td>
<td><form class="inline" method="post" action="/admin/posts/{id}/delete"><button type="submit">Delete</button></form></td></tr>"#,
                author = text(&p.author),
                content = text(&crate::core::helpers::sanitize_text(&p.content)),
                likes = p.like_count(),
                comments = p.comment_count(),
                id = attr(&p.id),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    page(
        "admin_dashboard.html",
        &[
            ("NAV_USERNAME", text(admin_username)),
            ("TOTAL_USERS", total_users.to_string()),
            ("TOTAL_POSTS", total_posts.to_string()),
            ("TOP_POSTS", top_html),
            ("USER_ROWS", user_rows),
            ("POST_ROWS", post_rows),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::models::Comment;

    fn sample_post() -> Post {
        Post {
            id: "p1".to_string(),
            author: "alice".to_string(),
            content: "hello world".to_string(),
            image: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            likes: vec!["bob".to_string()],
            comments: vec![Comment {
                username: "bob".to_string(),
                text: "first!".to_string(),
                created_at: "2026-01-01T01:00:00Z".to_string(),
            }],
        }
    }

    #[test]
    fn post_card_shows_owner_actions_only_to_author() {
        let view = PostView {
            post: sample_post(),
            author_pfp: None,
            liked: false,
        };
        let own = post_card(&view, "alice");
        assert!(own.contains("/posts/p1/delete"));
        let other = post_card(&view, "bob");
        assert!(!other.contains("/posts/p1/delete"));
    }

    #[test]
    fn post_card_reflects_like_state() {
        let mut view = PostView {
            post: sample_post(),
            author_pfp: None,
            liked: true,
        };
        assert!(post_card(&view, "bob").contains("Unlike (1)"));
        view.liked = false;
        assert!(post_card(&view, "bob").contains("Like (1)"));
    }

    #[test]
    fn comment_item_escapes_text() {
        let html = comment_item("bob", None, "<script>alert(1)</script>", "now");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn user_row_escapes_email() {
        let user = User {
            username: "eve".to_string(),
            email: "<b>eve</b>@example.com".to_string(),
            password: String::new(),
            profile_pic: None,
            followers: Vec::new(),
            following: Vec::new(),
            created_at: String::new(),
        };
        let html = user_row(&user);
        assert!(!html.contains("<b>eve</b>"));
    }

    #[test]
    fn empty_feed_renders_placeholder() {
        assert!(post_list(&[], "alice").contains("No posts yet"));
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let out = substitute(
            "<nav>NAV_USERNAME</nav><main>POST_LIST</main>",
            &[
                ("NAV_USERNAME", "POST_LIST".to_string()),
                ("POST_LIST", "<article>hi</article>".to_string()),
            ],
        );
        assert_eq!(
            out,
            "<nav>POST_LIST</nav><main><article>hi</article></main>"
        );
    }

    #[test]
    fn placeholder_shaped_username_renders_literally() {
        // POST_LIST is a legal username under the allowed charset.
        let resp = render_feed("POST_LIST", &[], None);
        let body = String::from_utf8_lossy(resp.body());
        assert!(body.contains("POST_LIST"));
        assert!(body.contains("No posts yet"));
    }
}
