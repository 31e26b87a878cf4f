// src/client.rs

//! Typed HTTP client for the API, as used by front ends and scripts.

use std::collections::HashMap;

use log::warn;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::assets::CoverUpload;
use crate::auth::AuthResponse;
use crate::chat::MessageView;
use crate::project::{NewProject, ProjectView, COVER_FIELD};
use crate::user_management::UserView;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Last-known session state. Lives exactly as long as the login.
#[derive(Debug, Default, Clone)]
pub struct SessionCache {
    pub token: Option<String>,
    pub user: Option<UserView>,
    chats: HashMap<String, Vec<MessageView>>,
}

impl SessionCache {
    pub fn chat(&self, project_id: &str) -> Option<&[MessageView]> {
        self.chats.get(project_id).map(Vec::as_slice)
    }

    pub fn remember_chat(&mut self, project_id: &str, messages: Vec<MessageView>) {
        self.chats.insert(project_id.to_string(), messages);
    }

    pub fn push_message(&mut self, message: MessageView) {
        self.chats
            .entry(message.project_id.clone())
            .or_default()
            .push(message);
    }

    pub fn clear(&mut self) {
        *self = SessionCache::default();
    }
}

/// Project creation body: JSON, or a multipart form when a cover image is attached.
#[derive(Debug, Clone)]
pub enum ProjectBody {
    Json(NewProject),
    Multipart {
        project: NewProject,
        cover: Option<CoverUpload>,
    },
}

impl ProjectBody {
    pub fn new(project: NewProject, cover: Option<CoverUpload>) -> Self {
        match cover {
            Some(cover) => ProjectBody::Multipart {
                project,
                cover: Some(cover),
            },
            None => ProjectBody::Json(project),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cache: SessionCache,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:4000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: SessionCache::default(),
        }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.cache.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let text = response.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn start_session(&mut self, auth: AuthResponse) -> UserView {
        self.cache.clear();
        self.cache.token = Some(auth.token);
        self.cache.user = Some(auth.user.clone());
        auth.user
    }

    pub async fn signup(&mut self, name: &str, email: &str, password: &str) -> Result<UserView, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/signup"))
            .json(&serde_json::json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;
        let auth = Self::decode::<AuthResponse>(response).await?;
        Ok(self.start_session(auth))
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserView, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let auth = Self::decode::<AuthResponse>(response).await?;
        Ok(self.start_session(auth))
    }

    /// Drops the local session even if the server call fails.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let result = match self.authorized(self.http.post(self.url("/auth/logout"))).send().await {
            Ok(response) => Self::decode::<serde_json::Value>(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        self.cache.clear();
        result
    }

    /// Falls back to the cached profile when the server is unreachable.
    pub async fn me(&mut self) -> Result<UserView, ClientError> {
        match self.authorized(self.http.get(self.url("/users/me"))).send().await {
            Ok(response) => {
                let user = Self::decode::<UserView>(response).await?;
                self.cache.user = Some(user.clone());
                Ok(user)
            }
            Err(e) => match &self.cache.user {
                Some(user) => {
                    warn!("Using cached profile: {}", e);
                    Ok(user.clone())
                }
                None => Err(e.into()),
            },
        }
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectView>, ClientError> {
        let response = self.http.get(self.url("/projects")).send().await?;
        Self::decode(response).await
    }

    pub async fn create_project(&self, body: ProjectBody) -> Result<ProjectView, ClientError> {
        let request = self.authorized(self.http.post(self.url("/projects")));
        let request = match body {
            ProjectBody::Json(project) => request.json(&project),
            ProjectBody::Multipart { project, cover } => {
                let mut form = Form::new();
                for (name, value) in project.to_form_fields()? {
                    form = form.text(name, value);
                }
                if let Some(cover) = cover {
                    let mut part = Part::bytes(cover.bytes).file_name(cover.file_name);
                    if let Some(content_type) = &cover.content_type {
                        part = part.mime_str(content_type)?;
                    }
                    form = form.part(COVER_FIELD, part);
                }
                request.multipart(form)
            }
        };
        Self::decode(request.send().await?).await
    }

    pub async fn request_join(&self, project_id: &str, message: &str) -> Result<ProjectView, ClientError> {
        let response = self
            .authorized(self.http.post(self.url(&format!("/projects/{project_id}/join"))))
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Serves the last-known history when the server is unreachable.
    pub async fn chat_messages(&mut self, project_id: &str) -> Result<Vec<MessageView>, ClientError> {
        let url = self.url(&format!("/projects/{project_id}/chat"));
        match self.authorized(self.http.get(url)).send().await {
            Ok(response) => {
                let messages = Self::decode::<Vec<MessageView>>(response).await?;
                self.cache.remember_chat(project_id, messages.clone());
                Ok(messages)
            }
            Err(e) => match self.cache.chat(project_id) {
                Some(cached) => {
                    warn!("Using cached chat for {}: {}", project_id, e);
                    Ok(cached.to_vec())
                }
                None => Err(e.into()),
            },
        }
    }

    pub async fn send_message(&mut self, project_id: &str, text: &str) -> Result<MessageView, ClientError> {
        let response = self
            .authorized(self.http.post(self.url(&format!("/projects/{project_id}/chat"))))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        let message = Self::decode::<MessageView>(response).await?;
        self.cache.push_message(message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(project_id: &str, text: &str) -> MessageView {
        MessageView {
            id: text.to_string(),
            project_id: project_id.to_string(),
            user: None,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = SessionCache {
            token: Some("t".into()),
            ..SessionCache::default()
        };
        cache.remember_chat("p1", vec![message("p1", "hi")]);
        cache.clear();

        assert!(cache.token.is_none());
        assert!(cache.chat("p1").is_none());
    }

    #[test]
    fn pushed_messages_land_in_their_project() {
        let mut cache = SessionCache::default();
        cache.push_message(message("p1", "a"));
        cache.push_message(message("p2", "b"));
        cache.push_message(message("p1", "c"));

        let texts: Vec<&str> = cache.chat("p1").unwrap().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn cover_selects_multipart() {
        let cover = CoverUpload {
            file_name: "c.png".into(),
            content_type: None,
            bytes: vec![1],
        };
        assert!(matches!(
            ProjectBody::new(NewProject::default(), Some(cover)),
            ProjectBody::Multipart { .. }
        ));
        assert!(matches!(ProjectBody::new(NewProject::default(), None), ProjectBody::Json(_)));
    }

    #[tokio::test]
    async fn unreachable_server_serves_cached_chat() {
        // nothing listens on port 9 locally
        let mut client = ApiClient::new("http://127.0.0.1:9");
        client.cache.remember_chat("p1", vec![message("p1", "hello")]);

        let messages = client.chat_messages("p1").await.unwrap();
        assert_eq!(messages.len(), 1);

        let err = client.chat_messages("p2").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
