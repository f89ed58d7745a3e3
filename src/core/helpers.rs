use ammonia::Builder;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use spin_sdk::http::Response;
use spin_sdk::key_value::Store;

pub fn store() -> Store {
    Store::open_default().expect("KV store must exist")
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// See-other redirect, the response every successful form post ends with.
pub fn redirect(location: &str) -> Response {
    Response::builder()
        .status(303)
        .header("Location", location)
        .body(Vec::new())
        .build()
}

pub fn redirect_to_login() -> Response {
    redirect("/login")
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::PasswordHash;

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Strip all HTML from user text. Stored text is plain; escaping for
/// display still happens at render time.
pub fn sanitize_text(text: &str) -> String {
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn sanitize_strips_tags() {
        assert_eq!(
            sanitize_text("hello <script>alert(1)</script>world"),
            "hello world"
        );
        assert_eq!(sanitize_text("<b>bold</b> move"), "bold move");
    }

    #[test]
    fn redirect_sets_location() {
        let resp = redirect("/feed");
        assert_eq!(*resp.status(), 303);
    }
}
