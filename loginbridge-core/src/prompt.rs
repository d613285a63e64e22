//! Save-login prompt shown after a form submission.
//!
//! [`LoginDialog`] holds the prompt's arguments and the user's edits;
//! confirming or cancelling is forwarded to the attached [`PromptFeature`].

use crate::login::{Hint, Login};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Receives the user's decision for a session's prompt
pub trait PromptFeature: Send + Sync {
    fn on_confirm(&self, session_id: &str, login: Login);

    fn on_cancel(&self, session_id: &str);
}

/// Lets the prompt ask whether a login is already stored
pub trait LoginsDelegate {
    fn login_exists(&self, login: &Login) -> bool;
}

/// Delegate that treats every login as new
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoginsDelegate;

impl LoginsDelegate for DefaultLoginsDelegate {
    fn login_exists(&self, _login: &Login) -> bool {
        false
    }
}

/// Arguments the prompt is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginDialogArgs {
    pub session_id: String,
    pub hint: Hint,
    pub login: Login,
}

/// The bottom-sheet style save-login prompt
pub struct LoginDialog {
    args: LoginDialogArgs,
    username: Option<String>,
    password: Option<String>,
    feature: Option<Arc<dyn PromptFeature>>,
}

impl LoginDialog {
    pub fn new_instance(session_id: impl Into<String>, hint: Hint, login: Login) -> Self {
        Self::from_args(LoginDialogArgs {
            session_id: session_id.into(),
            hint,
            login,
        })
    }

    /// Rebuild a dialog from saved arguments; edits start from the login
    pub fn from_args(args: LoginDialogArgs) -> Self {
        Self {
            username: args.login.username.clone(),
            password: args.login.password.clone(),
            args,
            feature: None,
        }
    }

    pub fn with_feature(mut self, feature: Arc<dyn PromptFeature>) -> Self {
        self.feature = Some(feature);
        self
    }

    pub fn set_feature(&mut self, feature: Option<Arc<dyn PromptFeature>>) {
        self.feature = feature;
    }

    pub fn args(&self) -> &LoginDialogArgs {
        &self.args
    }

    pub fn session_id(&self) -> &str {
        &self.args.session_id
    }

    pub fn hint(&self) -> Hint {
        self.args.hint
    }

    pub fn host_name(&self) -> Option<&str> {
        self.args.login.origin.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    /// Message shown above the fields
    pub fn save_message(&self, app_name: &str) -> String {
        format!("Save this login in {app_name}?")
    }

    /// Message variant that knows whether the login is already stored
    pub fn prompt_message(&self, app_name: &str, logins: &dyn LoginsDelegate) -> String {
        if logins.login_exists(&self.edited_login()) {
            format!("Update this login in {app_name}?")
        } else {
            self.save_message(app_name)
        }
    }

    /// The original login with the user's edits applied
    pub fn edited_login(&self) -> Login {
        Login {
            username: self.username.clone(),
            password: self.password.clone(),
            ..self.args.login.clone()
        }
    }

    /// Positive button
    pub fn confirm(&self) {
        match &self.feature {
            Some(feature) => feature.on_confirm(&self.args.session_id, self.edited_login()),
            None => debug!("Login prompt confirmed with no feature attached"),
        }
    }

    /// Cancel button or the dialog being dismissed
    pub fn cancel(&self) {
        if let Some(feature) = &self.feature {
            feature.on_cancel(&self.args.session_id);
        }
    }
}
