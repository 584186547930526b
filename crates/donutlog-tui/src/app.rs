//! Application state management.

use donutlog_core::{Entry, Error, FeedScope, Group, Services, SignUp};

use crate::config::{Config, Theme};
use crate::form::EntryForm;

/// Which screen is shown.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Login,
    Signup,
    Feed,
    /// Add (no id) or edit an entry.
    EntryForm { editing: Option<String> },
    Family,
    /// Application should quit.
    Quit,
}

impl Screen {
    /// Screens that need a signed-in user.
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Feed | Self::EntryForm { .. } | Self::Family)
    }

    /// Screens only for signed-out users.
    pub fn is_guest_only(&self) -> bool {
        matches!(self, Self::Login | Self::Signup)
    }
}

/// Input mode for the application.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    /// Normal navigation mode.
    Normal,
    /// Typing into a text field.
    Editing,
    /// Fuzzy search over the feed.
    Search,
    /// Waiting for y/n.
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedTab {
    Family,
    Mine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Email,
    Password,
}

/// Text input on the family screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyInput {
    CreateName,
    JoinCode,
}

/// A destructive action awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirm {
    DeleteEntry(String),
    LeaveGroup(String),
}

/// Work that talks to the backend. Queued by key handlers so the busy
/// state is drawn before the request blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SignIn,
    SignUp,
    SignOut,
    ResetPassword,
    LoadFeed,
    SaveEntry,
    DeleteEntry(String),
    CreateGroup,
    JoinGroup,
    LeaveGroup(String),
}

/// Loading, error and success state of the last operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStatus {
    pub busy: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl OperationStatus {
    /// Mark the start of an operation.
    pub fn begin(&mut self) {
        self.clear();
        self.busy = true;
    }

    /// Run `operation`, recording a user-facing error if it fails.
    pub fn execute<T>(
        &mut self,
        context: &str,
        operation: impl FnOnce() -> donutlog_core::Result<T>,
    ) -> Option<T> {
        self.begin();
        let result = operation();
        self.busy = false;
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.error = Some(e.handle(context));
                None
            }
        }
    }

    pub fn set_success(&mut self, message: impl Into<String>) {
        self.success = Some(message.into());
        self.error = None;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.success = None;
    }

    pub fn clear(&mut self) {
        self.error = None;
        self.success = None;
    }
}

/// A search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Index into `App::entries`.
    pub index: usize,
    /// Match score for sorting.
    pub score: i64,
}

/// Main application model.
pub struct App {
    pub services: Services,
    pub config: Config,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub status: OperationStatus,
    pending: Option<Action>,

    // Login / signup
    pub email_input: String,
    pub password_input: String,
    pub auth_field: AuthField,

    // Feed
    pub tab: FeedTab,
    pub entries: Vec<Entry>,
    pub selected_index: usize,
    pub groups: Vec<Group>,
    pub active_group: Option<String>,
    pub confirm: Option<Confirm>,

    // Entry form
    pub form: EntryForm,

    // Family screen
    pub family_selected: usize,
    pub family_input: FamilyInput,
    pub group_name_input: String,
    pub join_code_input: String,

    // Search state
    pub search_query: String,
    pub search_results: Vec<SearchResult>,
    pub search_selected_index: usize,
}

impl App {
    pub fn new(services: Services, config: Config) -> Self {
        Self {
            services,
            config,
            screen: Screen::Login,
            input_mode: InputMode::Editing,
            status: OperationStatus::default(),
            pending: None,
            email_input: String::new(),
            password_input: String::new(),
            auth_field: AuthField::Email,
            tab: FeedTab::Family,
            entries: Vec::new(),
            selected_index: 0,
            groups: Vec::new(),
            active_group: None,
            confirm: None,
            form: EntryForm::default(),
            family_selected: 0,
            family_input: FamilyInput::CreateName,
            group_name_input: String::new(),
            join_code_input: String::new(),
            search_query: String::new(),
            search_results: Vec::new(),
            search_selected_index: 0,
        }
    }

    /// Restore a saved session and open the first screen.
    pub fn start(&mut self) {
        if let Err(e) = self.services.auth.restore() {
            self.status.set_error(e.handle("restore session"));
        }
        self.navigate(Screen::Feed);
    }

    pub fn is_signed_in(&self) -> bool {
        self.services.auth.is_signed_in()
    }

    /// Switch screens, redirecting around the auth guards.
    pub fn navigate(&mut self, screen: Screen) {
        let screen = if screen.is_protected() && !self.is_signed_in() {
            Screen::Login
        } else if screen.is_guest_only() && self.is_signed_in() {
            Screen::Feed
        } else {
            screen
        };

        self.confirm = None;
        self.input_mode = match screen {
            Screen::Login | Screen::Signup | Screen::EntryForm { .. } => InputMode::Editing,
            _ => InputMode::Normal,
        };
        if matches!(screen, Screen::Login | Screen::Signup) {
            self.password_input.clear();
            self.auth_field = AuthField::Email;
        }
        if screen == Screen::Feed && self.screen != Screen::Feed {
            self.dispatch(Action::LoadFeed);
        }
        self.screen = screen;
    }

    pub fn quit(&mut self) {
        self.screen = Screen::Quit;
    }

    /// Queue an action; it runs after the next draw.
    pub fn dispatch(&mut self, action: Action) {
        self.status.begin();
        self.pending = Some(action);
    }

    pub fn take_pending(&mut self) -> Option<Action> {
        self.pending.take()
    }

    /// Run the queued action, if any.
    pub fn perform_pending(&mut self) {
        if let Some(action) = self.take_pending() {
            self.perform(action);
        }
    }

    pub fn perform(&mut self, action: Action) {
        tracing::debug!(?action, "Performing action");
        if action != Action::SignOut {
            if let Err(e) = self.services.auth.ensure_fresh() {
                let session_gone = e.is_rejection();
                self.fail(e, "refresh session");
                if session_gone {
                    self.sign_out_locally();
                }
                return;
            }
        }

        match action {
            Action::SignIn => self.sign_in(),
            Action::SignUp => self.sign_up(),
            Action::SignOut => self.sign_out(),
            Action::ResetPassword => self.reset_password(),
            Action::LoadFeed => self.load_feed(),
            Action::SaveEntry => self.save_entry(),
            Action::DeleteEntry(id) => self.delete_entry(&id),
            Action::CreateGroup => self.create_group(),
            Action::JoinGroup => self.join_group(),
            Action::LeaveGroup(id) => self.leave_group(&id),
        }
        // A follow-up (usually a reload) may already be queued.
        self.status.busy = self.pending.is_some();
    }

    fn fail(&mut self, error: Error, context: &str) {
        self.status.busy = false;
        self.status.set_error(error.handle(context));
    }

    fn sign_out_locally(&mut self) {
        if let Err(e) = self.services.auth.sign_out() {
            tracing::warn!("Failed to revoke session: {}", e);
        }
        self.reset_user_state();
        self.navigate(Screen::Login);
    }

    fn reset_user_state(&mut self) {
        self.entries.clear();
        self.groups.clear();
        self.active_group = None;
        self.selected_index = 0;
        self.tab = FeedTab::Family;
    }

    fn sign_in(&mut self) {
        let email = self.email_input.clone();
        let password = self.password_input.clone();
        let auth = &self.services.auth;
        if self
            .status
            .execute("sign in", || auth.sign_in(&email, &password))
            .is_some()
        {
            self.password_input.clear();
            self.navigate(Screen::Feed);
        }
    }

    fn sign_up(&mut self) {
        let email = self.email_input.clone();
        let password = self.password_input.clone();
        let auth = &self.services.auth;
        match self
            .status
            .execute("sign up", || auth.sign_up(&email, &password))
        {
            Some(SignUp::Session(_)) => {
                self.password_input.clear();
                self.navigate(Screen::Feed);
            }
            Some(SignUp::PendingConfirmation(_)) => {
                self.navigate(Screen::Login);
                self.status
                    .set_success("נשלח אליך מייל לאימות החשבון. אחרי האימות אפשר להתחבר");
            }
            None => {}
        }
    }

    fn reset_password(&mut self) {
        let email = self.email_input.clone();
        let auth = &self.services.auth;
        if self
            .status
            .execute("reset password", || auth.reset_password(&email))
            .is_some()
        {
            self.status
                .set_success("אם הכתובת רשומה, נשלח אליה מייל לאיפוס הסיסמה");
        }
    }

    fn sign_out(&mut self) {
        let auth = &self.services.auth;
        self.status.execute("sign out", || auth.sign_out());
        self.reset_user_state();
        self.navigate(Screen::Login);
    }

    /// Reload groups, then the entries of the current tab.
    fn load_feed(&mut self) {
        let Some(user_id) = self.services.auth.user_id() else {
            self.navigate(Screen::Login);
            return;
        };

        // Without groups the family tab stays empty; own entries still load.
        match self.services.groups.user_groups(&user_id) {
            Ok(groups) => self.set_groups(groups),
            Err(e) => {
                e.handle("load groups");
            }
        }
        self.load_entries(&user_id);
    }

    fn load_entries(&mut self, user_id: &str) {
        let scope = self.feed_scope();
        let limit = self.config.feed_limit;
        let entries = &self.services.entries;
        if let Some(entries) = self
            .status
            .execute("load entries", || entries.list(user_id, &scope, limit))
        {
            self.entries = entries;
            self.selected_index = self.selected_index.min(self.entries.len().saturating_sub(1));
        }
    }

    /// Keep the active group if it is still ours, else pick the first.
    fn set_groups(&mut self, groups: Vec<Group>) {
        let still_member = self
            .active_group
            .as_ref()
            .is_some_and(|id| groups.iter().any(|g| &g.id == id));
        if !still_member {
            self.active_group = groups.first().map(|g| g.id.clone());
        }
        self.groups = groups;
        self.family_selected = self.family_selected.min(self.groups.len().saturating_sub(1));
    }

    pub fn feed_scope(&self) -> FeedScope {
        match self.tab {
            FeedTab::Family => FeedScope::Family(self.active_group.clone()),
            FeedTab::Mine => FeedScope::Mine,
        }
    }

    pub fn active_group(&self) -> Option<&Group> {
        let id = self.active_group.as_ref()?;
        self.groups.iter().find(|g| &g.id == id)
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        self.entries.get(self.selected_index)
    }

    pub fn toggle_tab(&mut self) {
        self.tab = match self.tab {
            FeedTab::Family => FeedTab::Mine,
            FeedTab::Mine => FeedTab::Family,
        };
        self.selected_index = 0;
        self.dispatch(Action::LoadFeed);
    }

    /// Make the next family active.
    pub fn cycle_active_group(&mut self) {
        if self.groups.is_empty() {
            return;
        }
        let current = self
            .active_group
            .as_ref()
            .and_then(|id| self.groups.iter().position(|g| &g.id == id));
        let next = current.map_or(0, |i| (i + 1) % self.groups.len());
        self.select_group(next);
    }

    pub fn select_group(&mut self, index: usize) {
        if let Some(group) = self.groups.get(index) {
            self.active_group = Some(group.id.clone());
            self.family_selected = index;
            if self.tab == FeedTab::Family {
                self.selected_index = 0;
                self.dispatch(Action::LoadFeed);
            }
        }
    }

    pub fn move_up(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected_index + 1 < self.entries.len() {
            self.selected_index += 1;
        }
    }

    pub fn open_new_entry(&mut self) {
        self.form = EntryForm::default();
        self.status.clear();
        self.navigate(Screen::EntryForm { editing: None });
    }

    /// Only the owner can edit an entry.
    pub fn open_edit_entry(&mut self) {
        let Some(entry) = self.selected_entry().cloned() else {
            return;
        };
        if !self.owns(&entry) {
            self.status.set_error("אפשר לערוך רק טעימות שלך");
            return;
        }
        self.form = EntryForm::from_entry(&entry);
        self.status.clear();
        self.navigate(Screen::EntryForm {
            editing: Some(entry.id),
        });
    }

    pub fn request_delete(&mut self) {
        let Some(entry) = self.selected_entry().cloned() else {
            return;
        };
        if !self.owns(&entry) {
            self.status.set_error("אפשר למחוק רק טעימות שלך");
            return;
        }
        self.confirm = Some(Confirm::DeleteEntry(entry.id));
        self.input_mode = InputMode::Confirm;
    }

    pub fn request_leave(&mut self) {
        if let Some(group) = self.groups.get(self.family_selected) {
            self.confirm = Some(Confirm::LeaveGroup(group.id.clone()));
            self.input_mode = InputMode::Confirm;
        }
    }

    pub fn answer_confirm(&mut self, yes: bool) {
        let confirm = self.confirm.take();
        self.input_mode = InputMode::Normal;
        match (yes, confirm) {
            (true, Some(Confirm::DeleteEntry(id))) => self.dispatch(Action::DeleteEntry(id)),
            (true, Some(Confirm::LeaveGroup(id))) => self.dispatch(Action::LeaveGroup(id)),
            _ => {}
        }
    }

    pub fn owns(&self, entry: &Entry) -> bool {
        self.services.auth.user_id().as_deref() == Some(entry.created_by.as_str())
    }

    /// Validate the form locally; only a valid form is sent.
    pub fn submit_entry_form(&mut self) {
        let active_group = self.active_group.clone();
        match self.form.to_draft(active_group.as_deref()) {
            Ok(_) => self.dispatch(Action::SaveEntry),
            Err(errors) => {
                self.form.errors = errors;
                self.status.set_error("נא לתקן את השדות המסומנים");
            }
        }
    }

    fn save_entry(&mut self) {
        let Some(user_id) = self.services.auth.user_id() else {
            self.navigate(Screen::Login);
            return;
        };
        let draft = match self.form.to_draft(self.active_group.as_deref()) {
            Ok(draft) => draft,
            Err(errors) => {
                self.form.errors = errors;
                return;
            }
        };
        let editing = match &self.screen {
            Screen::EntryForm { editing } => editing.clone(),
            _ => None,
        };

        let entries = &self.services.entries;
        let saved = self.status.execute("save entry", || match &editing {
            Some(id) => entries.update(id, draft),
            None => entries.create(draft, &user_id),
        });
        if saved.is_some() {
            self.navigate(Screen::Feed);
            self.perform_pending();
            if self.status.error.is_none() {
                self.status.set_success(if editing.is_some() {
                    "הטעימה עודכנה"
                } else {
                    "הטעימה נשמרה 🍩"
                });
            }
        }
    }

    fn delete_entry(&mut self, id: &str) {
        let entries = &self.services.entries;
        if self
            .status
            .execute("delete entry", || entries.delete(id))
            .is_some()
        {
            self.entries.retain(|e| e.id != id);
            self.selected_index = self.selected_index.min(self.entries.len().saturating_sub(1));
            self.status.set_success("הטעימה נמחקה");
        }
    }

    fn create_group(&mut self) {
        let Some(user_id) = self.services.auth.user_id() else {
            return;
        };
        let name = self.group_name_input.clone();
        let groups = &self.services.groups;
        if let Some(group) = self
            .status
            .execute("create group", || groups.create_group(&name, &user_id))
        {
            self.group_name_input.clear();
            self.input_mode = InputMode::Normal;
            self.after_membership_change(group.id.clone());
            self.status
                .set_success(format!("המשפחה נוצרה! קוד הצטרפות: {}", group.join_code));
        }
    }

    fn join_group(&mut self) {
        let Some(user_id) = self.services.auth.user_id() else {
            return;
        };
        let code = self.join_code_input.clone();
        let groups = &self.services.groups;
        if let Some(group) = self
            .status
            .execute("join group", || groups.join_group(&code, &user_id))
        {
            self.join_code_input.clear();
            self.input_mode = InputMode::Normal;
            self.after_membership_change(group.id.clone());
            self.status
                .set_success(format!("הצטרפת למשפחה {}", group.name));
        }
    }

    fn leave_group(&mut self, group_id: &str) {
        let Some(user_id) = self.services.auth.user_id() else {
            return;
        };
        let groups = &self.services.groups;
        if self
            .status
            .execute("leave group", || groups.leave_group(group_id, &user_id))
            .is_some()
        {
            if self.active_group.as_deref() == Some(group_id) {
                self.active_group = None;
            }
            self.load_feed();
            if self.status.error.is_none() {
                self.status.set_success("עזבת את המשפחה");
            }
        }
    }

    /// Make `group_id` active and reload.
    fn after_membership_change(&mut self, group_id: String) {
        self.active_group = Some(group_id);
        self.load_feed();
        if let Some(index) = self
            .groups
            .iter()
            .position(|g| Some(&g.id) == self.active_group.as_ref())
        {
            self.family_selected = index;
        }
    }

    /// Switch to the next theme and remember it.
    pub fn cycle_theme(&mut self) {
        self.config.theme = self.config.theme.next();
        if let Err(e) = self.config.save() {
            tracing::warn!("Failed to save theme: {:#}", e);
        }
    }

    pub fn theme(&self) -> Theme {
        self.config.theme
    }

    /// Start search mode.
    pub fn start_search(&mut self) {
        self.input_mode = InputMode::Search;
        self.search_query.clear();
        self.search_results.clear();
        self.search_selected_index = 0;
    }

    /// Exit search mode.
    pub fn exit_search(&mut self) {
        self.input_mode = InputMode::Normal;
        self.search_query.clear();
        self.search_results.clear();
    }

    /// Fuzzy search over the loaded entries.
    pub fn perform_search(&mut self) {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        self.search_results.clear();
        self.search_selected_index = 0;

        if self.search_query.trim().is_empty() {
            return;
        }

        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<_> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let search_text = format!(
                    "{} {} {} {}",
                    entry.place_name,
                    entry.donut_name,
                    entry.filling.as_deref().unwrap_or_default(),
                    entry.notes.as_deref().unwrap_or_default()
                );
                matcher
                    .fuzzy_match(&search_text, &self.search_query)
                    .map(|score| SearchResult { index, score })
            })
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score));
        self.search_results = scored.into_iter().take(10).collect();
    }

    /// Jump to the selected search result.
    pub fn select_search_result(&mut self) {
        if let Some(result) = self.search_results.get(self.search_selected_index) {
            self.selected_index = result.index;
        }
        self.exit_search();
    }
}
