use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone)]
pub struct User {
    pub username: String,
    pub email: String,
    pub password: String,
    pub profile_pic: Option<String>,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Comment {
    pub username: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: String,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn liked_by(&self, username: &str) -> bool {
        self.likes.iter().any(|u| u == username)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionRole {
    User,
    Admin,
}

/// Claims carried by a verified session cookie.
#[derive(Clone, Debug)]
pub struct SessionClaims {
    pub username: String,
    pub role: SessionRole,
}
