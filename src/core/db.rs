use spin_sdk::key_value::Store;

use crate::config::*;
use crate::core::helpers::{hash_password, now_iso, store};
use crate::models::models::{Comment, Post, User};

/// Thin accessor over the key-value store, exposing the two collections
/// the app uses. Documents live under `user:{username}` / `post:{id}`
/// keys; `users_list` and `feed` are index lists, `email:{email}` maps an
/// email to its owner for the unique-email check.
pub struct Db {
    store: Store,
}

impl Db {
    pub fn open() -> Self {
        Db { store: store() }
    }

    pub fn users(&self) -> Users<'_> {
        Users { store: &self.store }
    }

    pub fn posts(&self) -> Posts<'_> {
        Posts { store: &self.store }
    }

    pub fn uploads(&self) -> Uploads<'_> {
        Uploads { store: &self.store }
    }

    /// Propagate a username change through every document that embeds the
    /// old name: the user record itself, the email index, post authors,
    /// likes, comments, and other users' follower/following arrays.
    ///
    /// These are independent sequential writes. A failure partway leaves
    /// mixed usernames behind (see DESIGN.md).
    pub fn rename_user(&self, old: &str, new: &str) -> anyhow::Result<()> {
        let users = self.users();
        let mut user = users
            .get(old)?
            .ok_or_else(|| anyhow::anyhow!("User not found: {}", old))?;

        user.username = new.to_string();
        self.store.set_json(&user_key(new), &user)?;
        self.store.delete(&user_key(old))?;
        self.store.set_json(&email_key(&user.email), &new.to_string())?;

        let mut names: Vec<String> = self
            .store
            .get_json(USERS_LIST_KEY)?
            .unwrap_or_default();
        for name in names.iter_mut() {
            if name == old {
                *name = new.to_string();
            }
        }
        self.store.set_json(USERS_LIST_KEY, &names)?;

        // Posts: author, likes, comment authors
        let posts = self.posts();
        for id in posts.ids()? {
            if let Some(mut post) = posts.get(&id)? {
                let mut touched = false;
                if post.author == old {
                    post.author = new.to_string();
                    touched = true;
                }
                for like in post.likes.iter_mut() {
                    if like == old {
                        *like = new.to_string();
                        touched = true;
                    }
                }
                for comment in post.comments.iter_mut() {
                    if comment.username == old {
                        comment.username = new.to_string();
                        touched = true;
                    }
                }
                if touched {
                    posts.update(&post)?;
                }
            }
        }

        // Other users' follower/following arrays
        for name in names {
            if name == new {
                continue;
            }
            if let Some(mut other) = users.get(&name)? {
                let mut touched = false;
                for entry in other.followers.iter_mut().chain(other.following.iter_mut()) {
                    if entry == old {
                        *entry = new.to_string();
                        touched = true;
                    }
                }
                if touched {
                    users.update(&other)?;
                }
            }
        }

        Ok(())
    }
}

pub struct Users<'a> {
    store: &'a Store,
}

impl Users<'_> {
    pub fn get(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.store.get_json(&user_key(username))?)
    }

    /// Username owning the given email, if any.
    pub fn email_owner(&self, email: &str) -> anyhow::Result<Option<String>> {
        Ok(self.store.get_json(&email_key(email))?)
    }

    pub fn insert(&self, user: &User) -> anyhow::Result<()> {
        self.store.set_json(&user_key(&user.username), user)?;
        self.store
            .set_json(&email_key(&user.email), &user.username)?;

        let mut names: Vec<String> = self
            .store
            .get_json(USERS_LIST_KEY)?
            .unwrap_or_default();
        names.push(user.username.clone());
        self.store.set_json(USERS_LIST_KEY, &names)?;
        Ok(())
    }

    pub fn update(&self, user: &User) -> anyhow::Result<()> {
        Ok(self.store.set_json(&user_key(&user.username), user)?)
    }

    /// Re-point the email index after an address change.
    pub fn change_email(&self, old_email: &str, user: &User) -> anyhow::Result<()> {
        self.store.delete(&email_key(old_email))?;
        self.store
            .set_json(&email_key(&user.email), &user.username)?;
        Ok(())
    }

    pub fn delete(&self, username: &str) -> anyhow::Result<Option<User>> {
        let Some(user) = self.get(username)? else {
            return Ok(None);
        };
        self.store.delete(&user_key(username))?;
        self.store.delete(&email_key(&user.email))?;

        let mut names: Vec<String> = self
            .store
            .get_json(USERS_LIST_KEY)?
            .unwrap_or_default();
        names.retain(|n| n != username);
        self.store.set_json(USERS_LIST_KEY, &names)?;
        Ok(Some(user))
    }

    pub fn usernames(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .store
            .get_json(USERS_LIST_KEY)?
            .unwrap_or_default())
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        Ok(self.usernames()?.len())
    }

    pub fn all(&self, limit: usize) -> anyhow::Result<Vec<User>> {
        let mut users = Vec::new();
        for name in self.usernames()? {
            if users.len() >= limit {
                break;
            }
            if let Some(user) = self.get(&name)? {
                users.push(user);
            }
        }
        Ok(users)
    }
}

pub struct Posts<'a> {
    store: &'a Store,
}

impl Posts<'_> {
    pub fn get(&self, post_id: &str) -> anyhow::Result<Option<Post>> {
        Ok(self.store.get_json(&post_key(post_id))?)
    }

    /// Post ids, newest first (insert prepends).
    pub fn ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.store.get_json(FEED_KEY)?.unwrap_or_default())
    }

    pub fn insert(&self, post: &Post) -> anyhow::Result<()> {
        self.store.set_json(&post_key(&post.id), post)?;

        let mut feed: Vec<String> = self.store.get_json(FEED_KEY)?.unwrap_or_default();
        feed.insert(0, post.id.clone());
        self.store.set_json(FEED_KEY, &feed)?;
        Ok(())
    }

    pub fn update(&self, post: &Post) -> anyhow::Result<()> {
        Ok(self.store.set_json(&post_key(&post.id), post)?)
    }

    pub fn delete(&self, post_id: &str) -> anyhow::Result<()> {
        self.store.delete(&post_key(post_id))?;

        let mut feed: Vec<String> = self.store.get_json(FEED_KEY)?.unwrap_or_default();
        feed.retain(|id| id != post_id);
        self.store.set_json(FEED_KEY, &feed)?;
        Ok(())
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        Ok(self.ids()?.len())
    }

    /// Newest posts, up to `limit`.
    pub fn recent(&self, limit: usize) -> anyhow::Result<Vec<Post>> {
        self.filtered(limit, |_| true)
    }

    pub fn by_author(&self, author: &str, limit: usize) -> anyhow::Result<Vec<Post>> {
        self.filtered(limit, |p| p.author == author)
    }

    /// Walk the feed newest-first, keeping posts that match.
    pub fn filtered(
        &self,
        limit: usize,
        mut keep: impl FnMut(&Post) -> bool,
    ) -> anyhow::Result<Vec<Post>> {
        let mut posts = Vec::new();
        for id in self.ids()? {
            if posts.len() >= limit {
                break;
            }
            if let Some(post) = self.get(&id)? {
                if keep(&post) {
                    posts.push(post);
                }
            }
        }
        Ok(posts)
    }

    pub fn delete_by_author(&self, author: &str) -> anyhow::Result<usize> {
        let mut deleted = 0;
        for id in self.ids()? {
            if let Some(post) = self.get(&id)? {
                if post.author == author {
                    self.delete(&id)?;
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }
}

pub struct Uploads<'a> {
    store: &'a Store,
}

impl Uploads<'_> {
    pub fn put(&self, name: &str, data: &[u8]) -> anyhow::Result<()> {
        Ok(self.store.set(&upload_key(name), data)?)
    }

    pub fn get(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.store.get(&upload_key(name))?)
    }
}

/// Seed a handful of demo users and posts so a fresh store renders a
/// non-empty feed. Gated behind PEOPLECONNECT_SEED_DEMO.
pub fn init_demo_data(db: &Db) -> anyhow::Result<()> {
    let users = db.users();
    if users.get("alice")?.is_some() {
        return Ok(()); // Already initialized
    }

    let alice = User {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: hash_password("alice")?,
        profile_pic: None,
        followers: vec!["bob".to_string()],
        following: Vec::new(),
        created_at: now_iso(),
    };
    let bob = User {
        username: "bob".to_string(),
        email: "bob@example.com".to_string(),
        password: hash_password("bob")?,
        profile_pic: None,
        followers: Vec::new(),
        following: vec!["alice".to_string()],
        created_at: now_iso(),
    };

    let posts = db.posts();
    let first = Post {
        id: uuid::Uuid::new_v4().to_string(),
        author: "alice".to_string(),
        content: "Welcome to PeopleConnect! Excited to share thoughts here.".to_string(),
        image: None,
        created_at: now_iso(),
        likes: vec!["bob".to_string()],
        comments: vec![Comment {
            username: "bob".to_string(),
            text: "Glad to be here!".to_string(),
            created_at: now_iso(),
        }],
    };
    let second = Post {
        id: uuid::Uuid::new_v4().to_string(),
        author: "bob".to_string(),
        content: "Hey everyone! Just joined, looking forward to connecting with you all."
            .to_string(),
        image: None,
        created_at: now_iso(),
        likes: Vec::new(),
        comments: Vec::new(),
    };

    users.insert(&alice)?;
    users.insert(&bob)?;
    posts.insert(&first)?;
    posts.insert(&second)?;

    Ok(())
}
