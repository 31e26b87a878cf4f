// src/user_management.rs

use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::store::{Store, StoreResult};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Links {
    pub github: String,
    pub linkedin: String,
    pub portfolio: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    pub categories: Vec<String>,
    pub roles: Vec<String>,
}

/// Stored user document. Never serialized to clients; see [`UserView`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(with = "crate::store::bson_time")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A freshly signed-up user: empty profile, zero xp.
    pub fn new(
        id: String,
        name: String,
        email: String,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        User {
            id,
            name,
            email,
            password_hash,
            avatar_url: String::new(),
            location: String::new(),
            gender: String::new(),
            skills: Vec::new(),
            links: Links::default(),
            xp: 0,
            badges: Vec::new(),
            preferences: Preferences::default(),
            created_at: now,
        }
    }

    pub fn apply_profile(&mut self, update: ProfileUpdate) -> Result<(), ApiError> {
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::validation("Name cannot be empty"));
            }
            self.name = name.to_string();
        }
        if let Some(skills) = update.skills {
            self.skills = skills
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(links) = update.links {
            self.links = links;
        }
        if let Some(preferences) = update.preferences {
            self.preferences = preferences;
        }
        Ok(())
    }
}

/// The only shape in which a user crosses the HTTP boundary.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
            location: user.location.clone(),
            gender: user.gender.clone(),
            skills: user.skills.clone(),
            links: user.links.clone(),
            xp: user.xp,
            badges: user.badges.clone(),
            preferences: user.preferences.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub skills: Option<Vec<String>>,
    pub links: Option<Links>,
    pub preferences: Option<Preferences>,
}

/// Resolves user references embedded in other documents.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: HashMap<String, UserView>,
}

impl UserDirectory {
    pub fn from_users<'a>(users: impl IntoIterator<Item = &'a User>) -> Self {
        UserDirectory {
            users: users
                .into_iter()
                .map(|u| (u.id.clone(), UserView::from(u)))
                .collect(),
        }
    }

    /// Fetches every referenced user in one query. Unknown ids are simply absent.
    pub async fn load(store: &dyn Store, ids: &[String]) -> StoreResult<Self> {
        let mut wanted: Vec<String> = ids.to_vec();
        wanted.sort();
        wanted.dedup();
        let users = store.find_users(&wanted).await?;
        Ok(Self::from_users(&users))
    }

    pub fn view(&self, id: &str) -> Option<UserView> {
        self.users.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }
}

/// GET /api/users/me
pub async fn get_me(user: AuthUser, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let found = data
        .store
        .find_user(&user.0)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(UserView::from(&found)))
}

/// PUT /api/users/me
pub async fn update_me(
    user: AuthUser,
    data: web::Data<AppState>,
    update: web::Json<ProfileUpdate>,
) -> ApiResult<HttpResponse> {
    debug!("Profile update for {}: {:?}", user.0, update);
    let mut found = data
        .store
        .find_user(&user.0)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    found.apply_profile(update.into_inner())?;
    if !data.store.save_user(&found).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!("Updated profile of user {}", found.id);
    Ok(HttpResponse::Ok().json(UserView::from(&found)))
}

/// GET /api/users/{id}
pub async fn get_user(
    _user: AuthUser,
    data: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let found = data
        .store
        .find_user(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(HttpResponse::Ok().json(UserView::from(&found)))
}

/// GET /api/users
pub async fn list_users(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let users = data.store.list_users().await?;
    let views: Vec<UserView> = users.iter().map(UserView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}
