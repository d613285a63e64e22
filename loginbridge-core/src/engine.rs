//! Engine-side login callbacks.
//!
//! The browser engine calls into a [`LoginDelegate`] when a login is used,
//! requested, or submitted. Engines that expect a future for the lookup go
//! through [`EngineLoginBinding`], which runs each call on the blocking pool.

use crate::{
    login::{Hint, Login},
    BridgeError, Result,
};
use std::sync::Arc;
use tracing::error;

/// Callbacks the engine invokes for login autofill
pub trait LoginDelegate: Send + Sync {
    /// The given login has been used to log in
    fn on_login_used(&self, login: &Login) -> Result<()>;

    /// Logins stored for the given domain
    fn on_fetch_logins(&self, domain: &str) -> Result<Vec<Login>>;

    /// Request to save or update the given login
    fn on_login_save(&self, login: &Login, hint: Hint) -> Result<()>;
}

/// Async wrapper the engine runtime holds on to
#[derive(Clone)]
pub struct EngineLoginBinding {
    delegate: Arc<dyn LoginDelegate>,
}

impl EngineLoginBinding {
    pub fn new(delegate: Arc<dyn LoginDelegate>) -> Self {
        Self { delegate }
    }

    pub fn delegate(&self) -> &Arc<dyn LoginDelegate> {
        &self.delegate
    }

    pub async fn login_used(&self, login: Login) -> Result<()> {
        let delegate = Arc::clone(&self.delegate);
        run_blocking(move || delegate.on_login_used(&login)).await
    }

    pub async fn fetch_logins(&self, domain: impl Into<String>) -> Result<Vec<Login>> {
        let delegate = Arc::clone(&self.delegate);
        let domain = domain.into();
        run_blocking(move || delegate.on_fetch_logins(&domain)).await
    }

    pub async fn login_save(&self, login: Login, hint: Hint) -> Result<()> {
        let delegate = Arc::clone(&self.delegate);
        run_blocking(move || delegate.on_login_save(&login, hint)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("Login delegate task failed: {}", e);
        BridgeError::Task(e.to_string())
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDelegate {
        events: Mutex<Vec<String>>,
    }

    impl LoginDelegate for RecordingDelegate {
        fn on_login_used(&self, login: &Login) -> Result<()> {
            self.events.lock().unwrap().push(format!("used:{:?}", login.guid));
            Ok(())
        }

        fn on_fetch_logins(&self, domain: &str) -> Result<Vec<Login>> {
            self.events.lock().unwrap().push(format!("fetch:{domain}"));
            Ok(vec![Login::new(domain, "u", "p")])
        }

        fn on_login_save(&self, _login: &Login, hint: Hint) -> Result<()> {
            self.events.lock().unwrap().push(format!("save:{}", hint.bits()));
            Ok(())
        }
    }

    struct PanickingDelegate;

    impl LoginDelegate for PanickingDelegate {
        fn on_login_used(&self, _login: &Login) -> Result<()> {
            panic!("boom");
        }

        fn on_fetch_logins(&self, _domain: &str) -> Result<Vec<Login>> {
            panic!("boom");
        }

        fn on_login_save(&self, _login: &Login, _hint: Hint) -> Result<()> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn test_binding_forwards_calls() {
        let delegate = Arc::new(RecordingDelegate::default());
        let binding = EngineLoginBinding::new(delegate.clone());

        let logins = binding.fetch_logins("https://example.com").await.unwrap();
        assert_eq!(logins.len(), 1);
        binding.login_used(Login::default().with_guid("g1")).await.unwrap();
        binding.login_save(Login::default(), Hint::GENERATED).await.unwrap();

        let events = delegate.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "fetch:https://example.com".to_string(),
                "used:Some(\"g1\")".to_string(),
                "save:1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_delegate_becomes_error() {
        let binding = EngineLoginBinding::new(Arc::new(PanickingDelegate));
        let result = binding.fetch_logins("https://example.com").await;
        assert!(matches!(result, Err(BridgeError::Task(_))));
    }
}
