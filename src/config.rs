// Storage keys
pub const USERS_LIST_KEY: &str = "users_list";
pub const FEED_KEY: &str = "feed";

pub fn user_key(username: &str) -> String {
    format!("user:{}", username)
}

pub fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn post_key(post_id: &str) -> String {
    format!("post:{}", post_id)
}

pub fn upload_key(name: &str) -> String {
    format!("upload:{}", name)
}

// Validation limits
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 3;
pub const MAX_POST_LENGTH: usize = 500;
pub const MAX_COMMENT_LENGTH: usize = 200;
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

// Page caps
pub const FEED_LIMIT: usize = 100;
pub const PROFILE_POSTS_LIMIT: usize = 20;
pub const SEARCH_LIMIT: usize = 20;
pub const ADMIN_LIST_LIMIT: usize = 50;
pub const ADMIN_TOP_POSTS: usize = 5;

// Image pipeline
pub const IMAGE_MAX_WIDTH: u32 = 1200;
pub const IMAGE_MAX_HEIGHT: u32 = 1200;
pub const IMAGE_JPEG_QUALITY: u8 = 85;
pub const THUMBNAIL_SIZE: u32 = 300;

pub fn session_expiration_hours() -> i64 {
    std::env::var("PEOPLECONNECT_SESSION_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

pub fn session_secret() -> String {
    std::env::var("PEOPLECONNECT_SESSION_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-me".to_string())
}

pub fn admin_username() -> String {
    std::env::var("PEOPLECONNECT_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string())
}

pub fn admin_password() -> Option<String> {
    std::env::var("PEOPLECONNECT_ADMIN_PASSWORD").ok()
}

pub fn seed_demo_data() -> bool {
    std::env::var("PEOPLECONNECT_SEED_DEMO")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}
