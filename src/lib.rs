#[cfg(target_arch = "wasm32")]
use spin_sdk::http::IntoResponse;
use spin_sdk::http::{Request, Response};
#[cfg(target_arch = "wasm32")]
use spin_sdk::http_component;

pub mod admin;
pub mod auth;
pub mod config;
pub mod follow;
pub mod images;
pub mod posts;
pub mod templates;
pub mod users;

pub mod core {
    pub mod db;
    pub mod errors;
    pub mod forms;
    pub mod helpers;
    pub mod query_params;
    pub mod static_server;
}

pub mod models {
    pub mod models;
}

use crate::core::db::{init_demo_data, Db};
use crate::core::helpers::redirect;

fn home(req: Request) -> anyhow::Result<Response> {
    let db = Db::open();
    if auth::current_user(&req, &db)?.is_some() {
        return Ok(redirect("/feed"));
    }
    Ok(templates::render_landing())
}

/// Dispatch a request to its handler. Shared by the Spin component entry
/// point and the native adapter binary.
pub fn route(req: Request) -> anyhow::Result<Response> {
    if config::seed_demo_data() {
        let _ = init_demo_data(&Db::open());
    }

    let path = req.path().to_string();
    let method = req.method().to_string();

    match (method.as_str(), path.as_str()) {
        ("GET", "/") => home(req),

        // Auth
        ("GET", "/register") => users::register_page(req),
        ("POST", "/register") => users::register(req),
        ("GET", "/login") => auth::login_page(req),
        ("POST", "/login") => auth::login(req),
        ("GET", "/logout") => auth::logout(req),

        // Feed and search
        ("GET", "/feed") => posts::feed(req),
        ("GET", "/search") => posts::search(req),

        // Posts
        ("POST", "/posts") => posts::create_post(req),
        ("GET", p) if p.starts_with("/posts/") && p.ends_with("/edit") => {
            posts::edit_post_page(req, &path)
        }
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/edit") => {
            posts::edit_post(req, &path)
        }
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/delete") => {
            posts::delete_post(req, &path)
        }
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/like") => {
            posts::like_post(req, &path)
        }
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/comment") => {
            posts::add_comment(req, &path)
        }
        ("GET", p) if p.starts_with("/posts/") => posts::view_post(req, &path),

        // Profiles
        ("GET", "/profile/edit") => users::edit_profile_page(req),
        ("POST", "/profile/edit") => users::edit_profile(req),
        ("POST", "/profile/picture") => users::upload_profile_picture(req),
        ("GET", p) if p.starts_with("/profile/") => users::profile_page(req, &path),

        // Follow graph
        ("POST", p) if p.starts_with("/follow/") => follow::handle_follow(req, &path),
        ("POST", p) if p.starts_with("/unfollow/") => follow::handle_unfollow(req, &path),

        // Admin
        ("GET", "/admin/login") => admin::login_page(req),
        ("POST", "/admin/login") => admin::login(req),
        ("GET", "/admin/dashboard") => admin::dashboard(req),
        ("GET", "/admin/logout") => admin::logout(req),
        ("POST", p) if p.starts_with("/admin/users/") && p.ends_with("/delete") => {
            admin::delete_user(req, &path)
        }
        ("POST", p) if p.starts_with("/admin/posts/") && p.ends_with("/delete") => {
            admin::delete_post(req, &path)
        }

        // Assets
        ("GET", p) if p.starts_with("/uploads/") => core::static_server::serve_upload(p),
        ("GET", "/favicon.ico") => core::static_server::serve_static("/static/favicon.ico"),
        ("GET", p) if p.starts_with("/static/") => core::static_server::serve_static(p),

        _ => Ok(Response::builder()
            .status(404)
            .body("Not found")
            .build()),
    }
}

#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    route(req)
}
