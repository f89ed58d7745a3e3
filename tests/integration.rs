//! End-to-end flows against a running server (`cargo run`, port 3000).
//! Ignored by default since they need the server and a writable store.

use std::sync::Mutex;

const BASE_URL: &str = "http://127.0.0.1:3000";
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock_test() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap()
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client should build")
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

async fn register(client: &reqwest::Client, username: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/register", BASE_URL))
        .form(&[
            ("username", username),
            ("email", &format!("{}@example.com", username)),
            ("password", password),
        ])
        .send()
        .await
        .expect("register request failed")
}

async fn login(client: &reqwest::Client, username: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/login", BASE_URL))
        .form(&[("username", username), ("password", password)])
        .send()
        .await
        .expect("login request failed")
}

async fn register_and_login(client: &reqwest::Client, prefix: &str) -> String {
    let username = unique_name(prefix);
    let resp = register(client, &username, "password").await;
    assert_eq!(resp.status(), 303);

    let resp = login(client, &username, "password").await;
    assert_eq!(resp.status(), 303);
    assert_eq!(
        resp.headers().get("Location").and_then(|v| v.to_str().ok()),
        Some("/feed")
    );
    username
}

/// Pull a post's id out of rendered feed HTML: the first post link after
/// the card's content.
fn first_post_id(html: &str, marker: &str) -> String {
    let card_start = html.find(marker).expect("post content should be in page");
    let tail = &html[card_start..];
    let href_start = tail.find("/posts/").expect("post link after content");
    tail[href_start + "/posts/".len()..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

#[ignore]
#[tokio::test]
async fn full_user_flow() {
    let _lock = lock_test();
    let client = client();

    let username = register_and_login(&client, "flow").await;

    // Create a post
    let marker = format!("hello from {}", username);
    let resp = client
        .post(format!("{}/posts", BASE_URL))
        .form(&[("content", marker.as_str())])
        .send()
        .await
        .expect("create post failed");
    assert_eq!(resp.status(), 303);

    // It shows up in the feed
    let feed = client
        .get(format!("{}/feed", BASE_URL))
        .send()
        .await
        .expect("feed failed")
        .text()
        .await
        .unwrap();
    assert!(feed.contains(&marker));
    let post_id = first_post_id(&feed, &marker);

    // Like, then check the detail page reflects it
    let resp = client
        .post(format!("{}/posts/{}/like", BASE_URL, post_id))
        .send()
        .await
        .expect("like failed");
    assert_eq!(resp.status(), 303);

    let detail = client
        .get(format!("{}/posts/{}", BASE_URL, post_id))
        .send()
        .await
        .expect("detail failed")
        .text()
        .await
        .unwrap();
    assert!(detail.contains("Unlike (1)"));

    // Second like toggles it off
    client
        .post(format!("{}/posts/{}/like", BASE_URL, post_id))
        .send()
        .await
        .expect("unlike failed");
    let detail = client
        .get(format!("{}/posts/{}", BASE_URL, post_id))
        .send()
        .await
        .expect("detail failed")
        .text()
        .await
        .unwrap();
    assert!(detail.contains("Like (0)"));

    // Comment
    let resp = client
        .post(format!("{}/posts/{}/comment", BASE_URL, post_id))
        .form(&[("text", "nice post")])
        .send()
        .await
        .expect("comment failed");
    assert_eq!(resp.status(), 303);
    let detail = client
        .get(format!("{}/posts/{}", BASE_URL, post_id))
        .send()
        .await
        .expect("detail failed")
        .text()
        .await
        .unwrap();
    assert!(detail.contains("nice post"));
}

#[ignore]
#[tokio::test]
async fn duplicate_registration_preserves_form() {
    let _lock = lock_test();
    let client = client();

    let username = unique_name("dup");
    assert_eq!(register(&client, &username, "password").await.status(), 303);

    // Same username again: re-rendered form, not a redirect
    let resp = register(&client, &username, "password").await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Username already taken"));
    assert!(body.contains(&username));
}

#[ignore]
#[tokio::test]
async fn duplicate_email_preserves_form() {
    let _lock = lock_test();
    let client = client();

    let first = unique_name("mail");
    assert_eq!(register(&client, &first, "password").await.status(), 303);

    // New username, same email address
    let second = unique_name("mail");
    let email = format!("{}@example.com", first);
    let resp = client
        .post(format!("{}/register", BASE_URL))
        .form(&[
            ("username", second.as_str()),
            ("email", email.as_str()),
            ("password", "password"),
        ])
        .send()
        .await
        .expect("register request failed");
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Email already registered"));
    assert!(body.contains(&second));
    assert!(body.contains(&email));
}

/// Needs PEOPLECONNECT_ADMIN_PASSWORD set both on the server and in the
/// test environment.
#[ignore]
#[tokio::test]
async fn admin_delete_cascades_to_posts() {
    let _lock = lock_test();

    let doomed = client();
    let doomed_name = register_and_login(&doomed, "doomed").await;
    let marker = format!("soon gone {}", doomed_name);
    doomed
        .post(format!("{}/posts", BASE_URL))
        .form(&[("content", marker.as_str())])
        .send()
        .await
        .expect("create post failed");

    let admin = client();
    let admin_name = std::env::var("PEOPLECONNECT_ADMIN_USERNAME")
        .unwrap_or_else(|_| "admin".to_string());
    let admin_password = std::env::var("PEOPLECONNECT_ADMIN_PASSWORD")
        .expect("PEOPLECONNECT_ADMIN_PASSWORD must be set for admin tests");
    let resp = admin
        .post(format!("{}/admin/login", BASE_URL))
        .form(&[
            ("username", admin_name.as_str()),
            ("password", admin_password.as_str()),
        ])
        .send()
        .await
        .expect("admin login failed");
    assert_eq!(resp.status(), 303);

    let resp = admin
        .post(format!("{}/admin/users/{}/delete", BASE_URL, doomed_name))
        .send()
        .await
        .expect("admin delete failed");
    assert_eq!(resp.status(), 303);

    // The user and their posts are gone, as seen by another account
    let reader = client();
    register_and_login(&reader, "witness").await;
    let feed = reader
        .get(format!("{}/feed", BASE_URL))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!feed.contains(&marker));

    let resp = reader
        .get(format!("{}/profile/{}", BASE_URL, doomed_name))
        .send()
        .await
        .expect("profile request failed");
    assert_eq!(resp.status(), 404);
}

#[ignore]
#[tokio::test]
async fn feed_requires_session() {
    let _lock = lock_test();
    let client = client();

    let resp = client
        .get(format!("{}/feed", BASE_URL))
        .send()
        .await
        .expect("feed request failed");
    assert_eq!(resp.status(), 303);
    assert_eq!(
        resp.headers().get("Location").and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[ignore]
#[tokio::test]
async fn cannot_edit_foreign_post() {
    let _lock = lock_test();

    let author = client();
    let author_name = register_and_login(&author, "owner").await;
    let marker = format!("owned by {}", author_name);
    author
        .post(format!("{}/posts", BASE_URL))
        .form(&[("content", marker.as_str())])
        .send()
        .await
        .expect("create post failed");
    let feed = author
        .get(format!("{}/feed", BASE_URL))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let post_id = first_post_id(&feed, &marker);

    let intruder = client();
    register_and_login(&intruder, "intruder").await;
    let resp = intruder
        .post(format!("{}/posts/{}/edit", BASE_URL, post_id))
        .form(&[("content", "hijacked")])
        .send()
        .await
        .expect("edit request failed");
    assert_eq!(resp.status(), 403);

    let resp = intruder
        .post(format!("{}/posts/{}/delete", BASE_URL, post_id))
        .send()
        .await
        .expect("delete request failed");
    assert_eq!(resp.status(), 403);
}

#[ignore]
#[tokio::test]
async fn non_image_profile_upload_is_rejected() {
    let _lock = lock_test();
    let client = client();
    register_and_login(&client, "pfp").await;

    let part = reqwest::multipart::Part::bytes(b"just some text".to_vec())
        .file_name("notes.txt")
        .mime_str("text/plain")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("profile_pic", part);

    let resp = client
        .post(format!("{}/profile/picture", BASE_URL))
        .multipart(form)
        .send()
        .await
        .expect("upload request failed");
    assert_eq!(resp.status(), 400);
}

#[ignore]
#[tokio::test]
async fn follow_and_following_filter() {
    let _lock = lock_test();

    let poster = client();
    let poster_name = register_and_login(&poster, "poster").await;
    let marker = format!("followable {}", poster_name);
    poster
        .post(format!("{}/posts", BASE_URL))
        .form(&[("content", marker.as_str())])
        .send()
        .await
        .expect("create post failed");

    let reader = client();
    register_and_login(&reader, "reader").await;

    // Before following, the following filter hides the post
    let feed = reader
        .get(format!("{}/feed?filter=following", BASE_URL))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!feed.contains(&marker));

    let resp = reader
        .post(format!("{}/follow/{}", BASE_URL, poster_name))
        .send()
        .await
        .expect("follow failed");
    assert_eq!(resp.status(), 303);

    let feed = reader
        .get(format!("{}/feed?filter=following", BASE_URL))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(feed.contains(&marker));
}

#[ignore]
#[tokio::test]
async fn rename_propagates_to_posts() {
    let _lock = lock_test();
    let client = client();

    let username = register_and_login(&client, "rename").await;
    let marker = format!("renameable {}", username);
    client
        .post(format!("{}/posts", BASE_URL))
        .form(&[("content", marker.as_str())])
        .send()
        .await
        .expect("create post failed");

    let new_name = unique_name("renamed");
    let resp = client
        .post(format!("{}/profile/edit", BASE_URL))
        .form(&[("new_username", new_name.as_str()), ("email", ""), ("password", "")])
        .send()
        .await
        .expect("rename failed");
    assert_eq!(resp.status(), 303);

    // Session cookie was re-issued for the new name; the feed shows the
    // post under it.
    let feed = client
        .get(format!("{}/feed", BASE_URL))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let card_start = feed.find(&marker).expect("post should still be there");
    let card = &feed[card_start.saturating_sub(600)..card_start];
    assert!(card.contains(&new_name));
}
