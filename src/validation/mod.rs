// ==================== REQUEST VALIDATION ====================
// Per-field rule chains: presence -> format/pattern -> length -> sanitization.
// The first failing rule across all fields (in declaration order) becomes the
// request's 400 message. Sanitized values replace the raw input before any
// downstream use.

use crate::services::auth_service::SignupRequest;
use crate::services::user_service::{CreateUserRequest, UpdateUserRequest};
use crate::utils::error::ServiceError;
use regex::Regex;

lazy_static::lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();
    static ref FIRST_NAME_RE: Regex = Regex::new(r"^[A-Za-z. ]+$").unwrap();
    static ref LAST_NAME_RE: Regex = Regex::new(r"^[a-zA-Z ]+$").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// One field's rule chain. Rules and sanitizers run in the order they are
/// chained; the first failing rule sticks and short-circuits the rest.
/// An absent optional field passes through untouched.
pub struct FieldCheck {
    value: Option<String>,
    error: Option<String>,
}

impl FieldCheck {
    pub fn new(value: Option<&str>) -> Self {
        FieldCheck {
            value: value.map(str::to_owned),
            error: None,
        }
    }

    // Whitespace-only counts as missing, so " " reports the required
    // message rather than falling through to a pattern rule.
    pub fn required(mut self, msg: &str) -> Self {
        if self.error.is_none() && self.value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            self.error = Some(msg.to_string());
        }
        self
    }

    pub fn email(mut self, msg: &str) -> Self {
        if self.error.is_none() {
            if let Some(v) = &self.value {
                if !EMAIL_RE.is_match(v) {
                    self.error = Some(msg.to_string());
                }
            }
        }
        self
    }

    pub fn max_len(mut self, limit: usize, msg: &str) -> Self {
        if self.error.is_none() {
            if let Some(v) = &self.value {
                if v.chars().count() > limit {
                    self.error = Some(msg.to_string());
                }
            }
        }
        self
    }

    pub fn min_len(mut self, limit: usize, msg: &str) -> Self {
        if self.error.is_none() {
            if let Some(v) = &self.value {
                if v.chars().count() < limit {
                    self.error = Some(msg.to_string());
                }
            }
        }
        self
    }

    pub fn matches(mut self, pattern: &Regex, msg: &str) -> Self {
        if self.error.is_none() {
            if let Some(v) = &self.value {
                if !pattern.is_match(v) {
                    self.error = Some(msg.to_string());
                }
            }
        }
        self
    }

    fn sanitize(mut self, f: impl Fn(&str) -> String) -> Self {
        if self.error.is_none() {
            if let Some(v) = &self.value {
                self.value = Some(f(v));
            }
        }
        self
    }

    pub fn trim(self) -> Self {
        self.sanitize(|v| v.trim().to_string())
    }

    pub fn escape(self) -> Self {
        self.sanitize(escape_html)
    }

    pub fn capitalize_words(self) -> Self {
        self.sanitize(capitalize_words)
    }

    pub fn strip_markup(self) -> Self {
        self.sanitize(|v| TAG_RE.replace_all(v, "").into_owned())
    }

    pub fn finish(self) -> Result<Option<String>, ServiceError> {
        match self.error {
            Some(msg) => Err(ServiceError::Validation(msg)),
            None => Ok(self.value),
        }
    }
}

/// HTML-entity-encode the characters `& < > " ' /`.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Upper-case the first letter of each space-separated token, leaving the
/// rest of the token as typed.
fn capitalize_words(input: &str) -> String {
    input
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_first_name(value: Option<&str>, required: Option<&str>) -> FieldCheck {
    let mut check = FieldCheck::new(value);
    if let Some(msg) = required {
        check = check.required(msg);
    }
    check
        .trim()
        .escape()
        .max_len(127, "First name must be at most 127 characters long")
        .matches(
            &FIRST_NAME_RE,
            "First name can contain only letters, periods, and spaces",
        )
        .capitalize_words()
        .strip_markup()
}

fn check_last_name(value: Option<&str>) -> FieldCheck {
    FieldCheck::new(value)
        .trim()
        .escape()
        .max_len(127, "Last name must be at most 127 characters long")
        .matches(
            &LAST_NAME_RE,
            "Last name must contain only alphabetic characters",
        )
        .capitalize_words()
        .strip_markup()
}

fn check_passphrase(value: Option<&str>, required: Option<&str>) -> FieldCheck {
    let mut check = FieldCheck::new(value);
    if let Some(msg) = required {
        check = check.required(msg);
    }
    check.min_len(6, "Password must be at least 6 characters long")
}

/// Sanitized account-creation fields for `POST /auth`.
#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub email: String,
    pub passphrase: String,
}

pub fn validate_signup(request: &SignupRequest) -> Result<ValidSignup, ServiceError> {
    let email = FieldCheck::new(request.email.as_deref())
        .required("Email is required")
        .trim()
        .email("Invalid email address")
        .finish()?;
    let passphrase = check_passphrase(request.passphrase.as_deref(), Some("Password is required"))
        .finish()?;

    // required() guarantees both are present
    Ok(ValidSignup {
        email: email.unwrap_or_default(),
        passphrase: passphrase.unwrap_or_default(),
    })
}

/// Sanitized profile-creation fields for `POST /users`.
#[derive(Debug, Clone)]
pub struct ValidNewUser {
    pub email: String,
    pub firstname: String,
    pub lastname: Option<String>,
    pub passphrase: String,
}

pub fn validate_new_user(request: &CreateUserRequest) -> Result<ValidNewUser, ServiceError> {
    let email = FieldCheck::new(request.email.as_deref())
        .required("Email is required")
        .trim()
        .email("Invalid email address")
        .finish()?;
    let firstname =
        check_first_name(request.firstname.as_deref(), Some("First name is required")).finish()?;
    let lastname = check_last_name(request.lastname.as_deref()).finish()?;
    let passphrase = check_passphrase(request.passphrase.as_deref(), Some("Password is required"))
        .finish()?;

    Ok(ValidNewUser {
        email: email.unwrap_or_default(),
        firstname: firstname.unwrap_or_default(),
        lastname,
        passphrase: passphrase.unwrap_or_default(),
    })
}

/// Sanitized partial update for `PUT /users/:id`. Every field is optional;
/// an empty patch is valid and only bumps the update timestamp.
#[derive(Debug, Clone, Default)]
pub struct ValidUserPatch {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub passphrase: Option<String>,
}

pub fn validate_user_patch(request: &UpdateUserRequest) -> Result<ValidUserPatch, ServiceError> {
    let email = FieldCheck::new(request.email.as_deref())
        .trim()
        .email("Invalid email address")
        .finish()?;
    let firstname = check_first_name(request.firstname.as_deref(), None).finish()?;
    let lastname = check_last_name(request.lastname.as_deref()).finish()?;
    let passphrase = check_passphrase(request.passphrase.as_deref(), None).finish()?;

    Ok(ValidUserPatch {
        email,
        firstname,
        lastname,
        passphrase,
    })
}

/// Path-parameter identifier: sanitized and bounded before any store lookup.
pub fn validate_record_id(raw: &str) -> Result<String, ServiceError> {
    let id = FieldCheck::new(Some(raw))
        .trim()
        .escape()
        .max_len(20, "ID must be at most 20 characters long")
        .strip_markup()
        .finish()?;
    Ok(id.unwrap_or_default())
}
