// SPDX-License-Identifier: GPL-3.0-only

//! Account details asked from the user while an upload is running

/// A field of the credential prompt, listed in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    User,
    Password,
    Title,
    Comment,
}

impl FieldKind {
    pub const ORDER: [FieldKind; 4] = [Self::User, Self::Password, Self::Title, Self::Comment];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Password => "Password",
            Self::Title => "Title",
            Self::Comment => "Comment",
        }
    }

    #[must_use]
    pub fn is_secret(self) -> bool {
        self == Self::Password
    }
}

/// Ordered (field, value) table. Every kind is always present, in [`FieldKind::ORDER`].
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialFieldSet {
    entries: Vec<(FieldKind, String)>,
}

impl Default for CredentialFieldSet {
    fn default() -> Self {
        Self {
            entries: FieldKind::ORDER.iter().map(|kind| (*kind, String::new())).collect(),
        }
    }
}

impl std::fmt::Debug for CredentialFieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, value) in self.iter() {
            if kind.is_secret() && !value.is_empty() {
                map.entry(&kind, &"********");
            } else {
                map.entry(&kind, &value);
            }
        }
        map.finish()
    }
}

impl CredentialFieldSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty fields with a known user name
    #[must_use]
    pub fn with_user(user: Option<&str>) -> Self {
        let mut fields = Self::default();
        if let Some(user) = user {
            fields.set(FieldKind::User, user);
        }
        fields
    }

    #[must_use]
    pub fn get(&self, kind: FieldKind) -> &str {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or("", |(_, value)| value.as_str())
    }

    pub fn set(&mut self, kind: FieldKind, value: impl Into<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = value.into();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKind, &str)> {
        self.entries.iter().map(|(kind, value)| (*kind, value.as_str()))
    }

    /// Copies every value of `other` into this set.
    pub fn merge(&mut self, other: &CredentialFieldSet) {
        for (kind, value) in other.iter() {
            self.set(kind, value);
        }
    }

    /// True when the account part (user and password) is filled in
    #[must_use]
    pub fn has_account(&self) -> bool {
        !self.get(FieldKind::User).is_empty() && !self.get(FieldKind::Password).is_empty()
    }
}

/// What a credential dialog returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    Confirmed(CredentialFieldSet),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Confirmed,
    Cancelled,
}

/// A modal dialog collecting the credential fields. It blocks its caller
/// until the user accepts or declines.
pub trait CredentialPrompt: Send + Sync {
    fn ask_for_information(&self, fields: &CredentialFieldSet, message: &str) -> PromptResponse;
}

/// Runs the prompt on a copy of `fields`; only a confirmation writes back.
pub fn run_prompt<P: CredentialPrompt + ?Sized>(
    prompt: &P,
    fields: &mut CredentialFieldSet,
    message: &str,
) -> PromptOutcome {
    log::debug!("Asking for upload details: {message}");

    match prompt.ask_for_information(fields, message) {
        PromptResponse::Confirmed(answers) => {
            fields.merge(&answers);
            PromptOutcome::Confirmed
        }
        PromptResponse::Cancelled => PromptOutcome::Cancelled,
    }
}
