//! Autofill of login forms through a virtual view structure.
//!
//! When the engine reports that autofill started, the session's form is
//! captured as a tree of [`ViewNode`]s. Editable nodes are matched to values
//! by input type and the values are handed back to the session.

use crate::engine::LoginDelegate;
use crate::login::Login;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Node id for views that cannot be autofilled
pub const NO_ID: i32 = -1;

/// Class name of an editable text field
pub const EDIT_TEXT_CLASS: &str = "android.widget.EditText";

/// Input type bits, matching the platform's `InputType` constants
pub mod input_type {
    pub const TYPE_CLASS_TEXT: u32 = 0x0000_0001;
    pub const TYPE_CLASS_NUMBER: u32 = 0x0000_0002;
    pub const TYPE_CLASS_PHONE: u32 = 0x0000_0003;
    pub const TYPE_TEXT_VARIATION_EMAIL_ADDRESS: u32 = 0x0000_0020;
    pub const TYPE_TEXT_VARIATION_PASSWORD: u32 = 0x0000_0080;
    pub const TYPE_TEXT_VARIATION_WEB_EMAIL_ADDRESS: u32 = 0x0000_00d0;
    pub const TYPE_TEXT_VARIATION_WEB_PASSWORD: u32 = 0x0000_00e0;
}

/// HTML element a node was built from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlInfo {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

impl HtmlInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// One node of the virtual view structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewNode {
    pub id: i32,
    pub class_name: Option<String>,
    pub input_type: Option<u32>,
    pub web_domain: Option<String>,
    pub autofill_hints: Vec<String>,
    pub html_info: Option<HtmlInfo>,
    pub enabled: bool,
    pub focused: bool,
    pub width: i32,
    pub height: i32,
    pub children: Vec<ViewNode>,
}

impl Default for ViewNode {
    fn default() -> Self {
        Self {
            id: NO_ID,
            class_name: None,
            input_type: None,
            web_domain: None,
            autofill_hints: Vec::new(),
            html_info: None,
            enabled: true,
            focused: false,
            width: 0,
            height: 0,
            children: Vec::new(),
        }
    }
}

impl ViewNode {
    /// A container node for a page on `domain`
    pub fn root(domain: impl Into<String>) -> Self {
        Self {
            web_domain: Some(domain.into()),
            ..Self::default()
        }
    }

    /// An editable text field
    pub fn edit_text(id: i32, input_type: u32) -> Self {
        Self {
            id,
            class_name: Some(EDIT_TEXT_CLASS.to_string()),
            input_type: Some(input_type),
            ..Self::default()
        }
    }

    pub fn with_child(mut self, child: ViewNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_html_info(mut self, html_info: HtmlInfo) -> Self {
        self.html_info = Some(html_info);
        self
    }

    fn is_edit_text(&self) -> bool {
        self.class_name.as_deref() == Some(EDIT_TEXT_CLASS)
    }

    /// First web domain found in this subtree
    pub fn find_web_domain(&self) -> Option<&str> {
        self.web_domain
            .as_deref()
            .or_else(|| self.children.iter().find_map(ViewNode::find_web_domain))
    }

    /// What kind of field this node is
    pub fn field_kind(&self) -> FieldKind {
        use input_type::*;

        if let Some(html) = &self.html_info {
            match html.attribute("type") {
                Some("password") => return FieldKind::Password,
                Some("email") => return FieldKind::Email,
                _ => {}
            }
        }

        let Some(input) = self.input_type else {
            return FieldKind::Text;
        };
        let class = input & 0x0f;
        let variation = input & 0xff0;

        match class {
            TYPE_CLASS_TEXT => match variation {
                TYPE_TEXT_VARIATION_PASSWORD | TYPE_TEXT_VARIATION_WEB_PASSWORD => {
                    FieldKind::Password
                }
                TYPE_TEXT_VARIATION_EMAIL_ADDRESS | TYPE_TEXT_VARIATION_WEB_EMAIL_ADDRESS => {
                    FieldKind::Email
                }
                _ => FieldKind::Text,
            },
            TYPE_CLASS_NUMBER => FieldKind::Number,
            TYPE_CLASS_PHONE => FieldKind::Phone,
            _ => FieldKind::Text,
        }
    }
}

impl ViewNode {
    /// Classification that only knows the exact combined input types
    ///
    /// Masked variations, flags and the html `type` attribute are ignored,
    /// so anything unrecognized is plain text.
    pub fn exact_field_kind(&self) -> FieldKind {
        use input_type::*;

        const WEB_PASSWORD: u32 = TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_WEB_PASSWORD;
        const WEB_EMAIL: u32 = TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_WEB_EMAIL_ADDRESS;

        match self.input_type {
            Some(WEB_PASSWORD) => FieldKind::Password,
            Some(WEB_EMAIL) => FieldKind::Email,
            Some(TYPE_CLASS_NUMBER) => FieldKind::Number,
            Some(TYPE_CLASS_PHONE) => FieldKind::Phone,
            _ => FieldKind::Text,
        }
    }
}

/// Field classification used to pick a fill value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Password,
    Email,
    Number,
    Phone,
    Text,
}

/// Supplies a value for a field
pub trait FillSource {
    fn value_for(&self, kind: FieldKind) -> Option<String>;

    /// How a node is classified before asking for its value
    fn classify(&self, node: &ViewNode) -> FieldKind {
        node.field_kind()
    }
}

/// Fixed stand-in values used when no login is available
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderFill;

impl FillSource for PlaceholderFill {
    fn value_for(&self, kind: FieldKind) -> Option<String> {
        let value = match kind {
            FieldKind::Password => "baz",
            FieldKind::Email => "a@b.c",
            FieldKind::Number => "24",
            FieldKind::Phone => "42",
            FieldKind::Text => "bar",
        };
        Some(value.to_string())
    }

    fn classify(&self, node: &ViewNode) -> FieldKind {
        node.exact_field_kind()
    }
}

/// Fills username-like fields with the username and password fields with the password
pub struct LoginFill<'a>(pub &'a Login);

impl FillSource for LoginFill<'_> {
    fn value_for(&self, kind: FieldKind) -> Option<String> {
        match kind {
            FieldKind::Password => self.0.password.clone(),
            FieldKind::Email | FieldKind::Text => self.0.username.clone(),
            FieldKind::Number | FieldKind::Phone => None,
        }
    }
}

/// Values keyed by virtual node id
pub type AutofillValues = BTreeMap<i32, String>;

/// Collect fill values for every editable node, children before parents
pub fn fill_values(root: &ViewNode, source: &dyn FillSource) -> AutofillValues {
    let mut values = AutofillValues::new();
    collect(root, source, &mut values);
    values
}

fn collect(node: &ViewNode, source: &dyn FillSource, values: &mut AutofillValues) {
    for child in &node.children {
        collect(child, source, values);
    }

    if node.id == NO_ID || !node.is_edit_text() {
        return;
    }

    if let Some(value) = source.value_for(source.classify(node)) {
        values.insert(node.id, value);
    }
}

/// Autofill notifications sent by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillNotification {
    Started,
    Committed,
    Canceled,
    ViewAdded,
    ViewRemoved,
    ViewUpdated,
    ViewEntered,
    ViewExited,
}

/// Engine session that exposes its form to autofill
pub trait TextInputSession {
    /// Virtual structure of the current form, `None` if there is no view
    fn provide_virtual_structure(&self) -> Option<ViewNode>;

    fn autofill(&self, values: &AutofillValues);
}

/// Fills login forms from the logins stored for the page's domain
pub struct AutofillTextInputDelegate<'a> {
    logins: &'a dyn LoginDelegate,
}

impl<'a> AutofillTextInputDelegate<'a> {
    pub fn new(logins: &'a dyn LoginDelegate) -> Self {
        Self { logins }
    }

    /// Handle an autofill notification for a session
    ///
    /// Returns the values passed to the session, if any.
    pub fn notify_autofill(
        &self,
        session: &dyn TextInputSession,
        notification: AutofillNotification,
    ) -> Option<AutofillValues> {
        if notification != AutofillNotification::Started {
            return None;
        }

        let structure = session.provide_virtual_structure()?;
        let login = structure
            .find_web_domain()
            .and_then(|domain| self.first_login(domain));

        let values = match &login {
            Some(login) => fill_values(&structure, &LoginFill(login)),
            None => fill_values(&structure, &PlaceholderFill),
        };

        debug!("Autofilling {} fields", values.len());
        session.autofill(&values);
        Some(values)
    }

    fn first_login(&self, domain: &str) -> Option<Login> {
        match self.logins.on_fetch_logins(domain) {
            Ok(logins) => logins.into_iter().next(),
            Err(e) => {
                warn!("Could not fetch logins for {}: {}", domain, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::input_type::*;
    use super::*;
    use crate::login::Hint;
    use crate::{BridgeError, Result};
    use std::cell::RefCell;

    fn login_form() -> ViewNode {
        ViewNode::root("https://example.com")
            .with_child(ViewNode::edit_text(
                1,
                TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_WEB_EMAIL_ADDRESS,
            ))
            .with_child(ViewNode::edit_text(2, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_WEB_PASSWORD))
    }

    struct FakeSession {
        structure: Option<ViewNode>,
        filled: RefCell<Option<AutofillValues>>,
    }

    impl FakeSession {
        fn new(structure: Option<ViewNode>) -> Self {
            Self {
                structure,
                filled: RefCell::new(None),
            }
        }
    }

    impl TextInputSession for FakeSession {
        fn provide_virtual_structure(&self) -> Option<ViewNode> {
            self.structure.clone()
        }

        fn autofill(&self, values: &AutofillValues) {
            *self.filled.borrow_mut() = Some(values.clone());
        }
    }

    struct StaticLogins(Vec<Login>);

    impl LoginDelegate for StaticLogins {
        fn on_login_used(&self, _login: &Login) -> Result<()> {
            Ok(())
        }

        fn on_fetch_logins(&self, domain: &str) -> Result<Vec<Login>> {
            Ok(self
                .0
                .iter()
                .filter(|l| l.origin.as_deref() == Some(domain))
                .cloned()
                .collect())
        }

        fn on_login_save(&self, _login: &Login, _hint: Hint) -> Result<()> {
            Ok(())
        }
    }

    struct FailingLogins;

    impl LoginDelegate for FailingLogins {
        fn on_login_used(&self, _login: &Login) -> Result<()> {
            Ok(())
        }

        fn on_fetch_logins(&self, _domain: &str) -> Result<Vec<Login>> {
            Err(BridgeError::Task("lookup cancelled".to_string()))
        }

        fn on_login_save(&self, _login: &Login, _hint: Hint) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_field_kind_from_input_type() {
        assert_eq!(
            ViewNode::edit_text(1, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_WEB_PASSWORD).field_kind(),
            FieldKind::Password
        );
        assert_eq!(
            ViewNode::edit_text(1, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_PASSWORD).field_kind(),
            FieldKind::Password
        );
        assert_eq!(
            ViewNode::edit_text(1, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_WEB_EMAIL_ADDRESS)
                .field_kind(),
            FieldKind::Email
        );
        assert_eq!(ViewNode::edit_text(1, TYPE_CLASS_NUMBER).field_kind(), FieldKind::Number);
        assert_eq!(ViewNode::edit_text(1, TYPE_CLASS_PHONE).field_kind(), FieldKind::Phone);
        assert_eq!(ViewNode::edit_text(1, TYPE_CLASS_TEXT).field_kind(), FieldKind::Text);
    }

    #[test]
    fn test_html_type_overrides_input_type() {
        let node = ViewNode::edit_text(1, TYPE_CLASS_TEXT)
            .with_html_info(HtmlInfo::new("input").with_attribute("type", "password"));
        assert_eq!(node.field_kind(), FieldKind::Password);
    }

    #[test]
    fn test_placeholder_values() {
        let form = login_form()
            .with_child(ViewNode::edit_text(3, TYPE_CLASS_NUMBER))
            .with_child(ViewNode::edit_text(4, TYPE_CLASS_PHONE))
            .with_child(ViewNode::edit_text(5, TYPE_CLASS_TEXT));

        let values = fill_values(&form, &PlaceholderFill);

        assert_eq!(values.get(&1).map(String::as_str), Some("a@b.c"));
        assert_eq!(values.get(&2).map(String::as_str), Some("baz"));
        assert_eq!(values.get(&3).map(String::as_str), Some("24"));
        assert_eq!(values.get(&4).map(String::as_str), Some("42"));
        assert_eq!(values.get(&5).map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_placeholders_match_exact_input_types_only() {
        let form = ViewNode::root("https://example.com")
            .with_child(ViewNode::edit_text(1, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_PASSWORD))
            .with_child(ViewNode::edit_text(2, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_EMAIL_ADDRESS))
            .with_child(
                ViewNode::edit_text(3, TYPE_CLASS_TEXT)
                    .with_html_info(HtmlInfo::new("input").with_attribute("type", "password")),
            )
            .with_child(ViewNode::edit_text(
                4,
                TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_WEB_PASSWORD | 0x1000,
            ));

        let values = fill_values(&form, &PlaceholderFill);

        assert!(values.values().all(|value| value == "bar"));
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_login_fill_uses_broad_classification() {
        let login = Login::new("https://example.com", "alice", "hunter2");
        let form = ViewNode::root("https://example.com")
            .with_child(ViewNode::edit_text(1, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_EMAIL_ADDRESS))
            .with_child(ViewNode::edit_text(2, TYPE_CLASS_TEXT | TYPE_TEXT_VARIATION_PASSWORD));

        let values = fill_values(&form, &LoginFill(&login));

        assert_eq!(values.get(&1).map(String::as_str), Some("alice"));
        assert_eq!(values.get(&2).map(String::as_str), Some("hunter2"));
    }

    #[test]
    fn test_skips_nodes_without_id_or_not_editable() {
        let mut label = ViewNode::edit_text(7, TYPE_CLASS_TEXT);
        label.class_name = Some("android.widget.TextView".to_string());
        let form = ViewNode::root("https://example.com")
            .with_child(ViewNode::edit_text(NO_ID, TYPE_CLASS_TEXT))
            .with_child(label)
            .with_child(ViewNode::default().with_child(ViewNode::edit_text(9, TYPE_CLASS_TEXT)));

        let values = fill_values(&form, &PlaceholderFill);

        assert_eq!(values.keys().copied().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_started_fills_from_stored_login() {
        let logins = StaticLogins(vec![Login::new("https://example.com", "alice", "hunter2")]);
        let delegate = AutofillTextInputDelegate::new(&logins);
        let session = FakeSession::new(Some(login_form()));

        let values = delegate
            .notify_autofill(&session, AutofillNotification::Started)
            .unwrap();

        assert_eq!(values.get(&1).map(String::as_str), Some("alice"));
        assert_eq!(values.get(&2).map(String::as_str), Some("hunter2"));
        assert_eq!(session.filled.borrow().as_ref(), Some(&values));
    }

    #[test]
    fn test_started_without_login_uses_placeholders() {
        let logins = StaticLogins(vec![Login::new("https://other.com", "alice", "hunter2")]);
        let delegate = AutofillTextInputDelegate::new(&logins);
        let session = FakeSession::new(Some(login_form()));

        let values = delegate
            .notify_autofill(&session, AutofillNotification::Started)
            .unwrap();

        assert_eq!(values.get(&2).map(String::as_str), Some("baz"));
    }

    #[test]
    fn test_fetch_error_falls_back_to_placeholders() {
        let delegate = AutofillTextInputDelegate::new(&FailingLogins);
        let session = FakeSession::new(Some(login_form()));

        let values = delegate
            .notify_autofill(&session, AutofillNotification::Started)
            .unwrap();

        assert_eq!(values.get(&1).map(String::as_str), Some("a@b.c"));
    }

    #[test]
    fn test_other_notifications_and_missing_view_are_ignored() {
        let logins = StaticLogins(Vec::new());
        let delegate = AutofillTextInputDelegate::new(&logins);

        let session = FakeSession::new(Some(login_form()));
        assert!(delegate
            .notify_autofill(&session, AutofillNotification::ViewEntered)
            .is_none());
        assert!(session.filled.borrow().is_none());

        let no_view = FakeSession::new(None);
        assert!(delegate
            .notify_autofill(&no_view, AutofillNotification::Started)
            .is_none());
        assert!(no_view.filled.borrow().is_none());
    }
}
