//! Authentication gates.
//!
//! `auth` admits only identified callers; `guest` admits only anonymous
//! ones (login and signup pages).

use axum::http::StatusCode;
use futures_util::future::BoxFuture;

use super::pipeline::{Flow, Middleware, Next};
use crate::config::schema::AuthConfig;
use crate::http::request::RequestContext;
use crate::http::response::Response;

/// Requires an authenticated caller.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    login_path: Option<String>,
}

impl RequireAuth {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            login_path: Some(config.login_path.clone()).filter(|p| !p.is_empty()),
        }
    }
}

impl Middleware for RequireAuth {
    fn handle<'a>(&'a self, req: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Flow> {
        if req.is_authenticated() {
            return next.run(req);
        }

        tracing::debug!(request_id = %req.request_id, path = %req.path, "Anonymous caller rejected");
        let response = match &self.login_path {
            Some(login) => Response::redirect(login),
            None => Response::from_status(StatusCode::UNAUTHORIZED),
        };
        Box::pin(async move { Flow::Halt(response) })
    }
}

/// Requires an anonymous caller.
#[derive(Debug, Clone)]
pub struct GuestOnly {
    home_path: String,
}

impl GuestOnly {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            home_path: config.home_path.clone(),
        }
    }
}

impl Middleware for GuestOnly {
    fn handle<'a>(&'a self, req: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Flow> {
        if !req.is_authenticated() {
            return next.run(req);
        }
        let response = Response::redirect(&self.home_path);
        Box::pin(async move { Flow::Halt(response) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::pipeline::Pipeline;
    use std::sync::Arc;

    async fn run(middleware: impl Middleware + 'static, req: &mut RequestContext) -> Flow {
        Pipeline::default().with(Arc::new(middleware)).run(req).await
    }

    #[tokio::test]
    async fn test_auth_redirects_anonymous_to_login() {
        let mut req = RequestContext::get("/predictions/create");
        match run(RequireAuth::new(&AuthConfig::default()), &mut req).await {
            Flow::Halt(res) => {
                assert_eq!(res.status, StatusCode::FOUND);
                assert_eq!(res.header("location"), Some("/login"));
            }
            Flow::Continue => panic!("anonymous caller passed auth"),
        }
    }

    #[tokio::test]
    async fn test_auth_without_login_path_is_401() {
        let config = AuthConfig {
            login_path: String::new(),
            ..AuthConfig::default()
        };
        let mut req = RequestContext::get("/api/votes");
        match run(RequireAuth::new(&config), &mut req).await {
            Flow::Halt(res) => assert_eq!(res.status, StatusCode::UNAUTHORIZED),
            Flow::Continue => panic!("anonymous caller passed auth"),
        }
    }

    #[tokio::test]
    async fn test_auth_admits_caller() {
        let mut req = RequestContext::get("/predictions/create").with_caller("7");
        assert!(run(RequireAuth::new(&AuthConfig::default()), &mut req).await.is_continue());
    }

    #[tokio::test]
    async fn test_guest_only() {
        let mut anonymous = RequestContext::get("/login");
        assert!(run(GuestOnly::new(&AuthConfig::default()), &mut anonymous).await.is_continue());

        let mut known = RequestContext::get("/login").with_caller("7");
        match run(GuestOnly::new(&AuthConfig::default()), &mut known).await {
            Flow::Halt(res) => assert_eq!(res.header("location"), Some("/")),
            Flow::Continue => panic!("authenticated caller reached guest page"),
        }
    }
}
