use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::models::{CreateAccountRequest, LoginRequest, RegisterRequest, Role};

// Field limits shared by the public registration path and the admin-side
// creation paths. Profile limits apply to the subtype tables.
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PHONE_LEN: usize = 20;
pub const MAX_PROFILE_NAME_LEN: usize = 30;
pub const MAX_PROFILE_CONTACT_LEN: usize = 50;

/// FieldErrors
///
/// Accumulates every field-level validation failure for one request so the
/// whole report is returned in a single response. Serializes as a map of
/// field name to message list, in stable (sorted) field order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    /// Single-field report, used when the storage layer rejects a write
    /// (e.g. the email uniqueness constraint on a trusted admin path).
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.push(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    /// Number of fields with at least one error.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Validated field set shared by every account-creation path. By the time
/// this struct exists, the plaintext password still needs hashing but every
/// shape rule has passed.
#[derive(Debug, Clone)]
pub struct ValidAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

/// Shape check for an email address: exactly one `@`, both sides non-empty,
/// no whitespace. Deliverability is not this layer's concern.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

fn require<'a>(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&'a String>,
) -> Option<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Some(v.as_str()),
        _ => {
            errors.push(field, format!("The {field} field is required."));
            None
        }
    }
}

fn check_account_fields(errors: &mut FieldErrors, req_name: Option<&String>, req_email: Option<&String>, req_password: Option<&String>, req_phone: Option<&String>) -> Option<ValidAccount> {
    let name = require(errors, "name", req_name);
    if let Some(name) = name {
        if name.len() > MAX_NAME_LEN {
            errors.push(
                "name",
                format!("The name may not be greater than {MAX_NAME_LEN} characters."),
            );
        }
    }

    let email = require(errors, "email", req_email);
    if let Some(email) = email {
        if !is_valid_email(email) {
            errors.push("email", "The email must be a valid email address.");
        }
        if email.len() > MAX_EMAIL_LEN {
            errors.push(
                "email",
                format!("The email may not be greater than {MAX_EMAIL_LEN} characters."),
            );
        }
    }

    let password = require(errors, "password", req_password);
    if let Some(password) = password {
        if password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(
                "password",
                format!("The password must be at least {MIN_PASSWORD_LEN} characters."),
            );
        }
    }

    let phone = require(errors, "phone", req_phone);
    if let Some(phone) = phone {
        if phone.len() > MAX_PHONE_LEN {
            errors.push(
                "phone",
                format!("The phone may not be greater than {MAX_PHONE_LEN} characters."),
            );
        }
    }

    match (name, email, password, phone) {
        (Some(name), Some(email), Some(password), Some(phone)) if errors.is_empty() => {
            Some(ValidAccount {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                phone: phone.to_string(),
            })
        }
        _ => None,
    }
}

fn check_len(errors: &mut FieldErrors, field: &'static str, value: Option<&String>, max: usize) {
    if let Some(v) = value {
        if v.len() > max {
            errors.push(
                field,
                format!("The {field} may not be greater than {max} characters."),
            );
        }
    }
}

/// Validation pass for the public registration endpoint. The whole request is
/// checked before anything is persisted; on failure every field error is
/// reported together. `role` must be exactly "farmer" or "investor" here;
/// admin accounts are created through the admin path, which has no role field.
pub fn validate_registration(
    req: &RegisterRequest,
) -> Result<(ValidAccount, Role), FieldErrors> {
    let mut errors = FieldErrors::default();

    let account = check_account_fields(
        &mut errors,
        req.name.as_ref(),
        req.email.as_ref(),
        req.password.as_ref(),
        req.phone.as_ref(),
    );

    // Optional profile fields still have to fit their columns.
    check_len(&mut errors, "contact", req.contact.as_ref(), MAX_PROFILE_CONTACT_LEN);
    check_len(&mut errors, "budget_range", req.budget_range.as_ref(), MAX_PROFILE_CONTACT_LEN);
    check_len(&mut errors, "investor_type", req.investor_type.as_ref(), MAX_PROFILE_NAME_LEN);

    let role = match require(&mut errors, "role", req.role.as_ref()) {
        Some(raw) => match Role::from_str(raw) {
            Ok(role @ (Role::Farmer | Role::Investor)) => Some(role),
            _ => {
                errors.push("role", "The selected role is invalid.");
                None
            }
        },
        None => None,
    };

    match (account, role) {
        (Some(account), Some(role)) if errors.is_empty() => Ok((account, role)),
        _ => Err(errors),
    }
}

/// Validation pass for the admin-side creation endpoints. The role is fixed
/// by the route; only the profile fields matching that role are checked.
pub fn validate_create_account(
    req: &CreateAccountRequest,
    role: Role,
) -> Result<ValidAccount, FieldErrors> {
    let mut errors = FieldErrors::default();

    let account = check_account_fields(
        &mut errors,
        req.name.as_ref(),
        req.email.as_ref(),
        req.password.as_ref(),
        req.phone.as_ref(),
    );

    match role {
        Role::Farmer => {
            check_len(&mut errors, "farmer_fname", req.farmer_fname.as_ref(), MAX_PROFILE_NAME_LEN);
            check_len(&mut errors, "farmer_lname", req.farmer_lname.as_ref(), MAX_PROFILE_NAME_LEN);
            check_len(&mut errors, "farmer_contact", req.farmer_contact.as_ref(), MAX_PROFILE_CONTACT_LEN);
        }
        Role::Investor => {
            check_len(&mut errors, "investor_name", req.investor_name.as_ref(), MAX_PROFILE_NAME_LEN);
            check_len(&mut errors, "investor_contact_no", req.investor_contact_no.as_ref(), MAX_PROFILE_CONTACT_LEN);
            check_len(&mut errors, "investor_budget_range", req.investor_budget_range.as_ref(), MAX_PROFILE_CONTACT_LEN);
            check_len(&mut errors, "investor_type", req.investor_type.as_ref(), MAX_PROFILE_NAME_LEN);
        }
        Role::Admin => {}
    }

    match account {
        Some(account) if errors.is_empty() => Ok(account),
        _ => Err(errors),
    }
}

/// Shape check for login. Credential correctness is the authenticate step's
/// concern, not this one's.
pub fn validate_login(req: &LoginRequest) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::default();

    let email = require(&mut errors, "email", req.email.as_ref());
    if let Some(email) = email {
        if !is_valid_email(email) {
            errors.push("email", "The email must be a valid email address.");
        }
    }
    let password = require(&mut errors, "password", req.password.as_ref());

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => {
            Ok((email.to_string(), password.to_string()))
        }
        _ => Err(errors),
    }
}

/// Length checks for a farmer profile update; only provided fields are
/// validated (partial update semantics).
pub fn validate_farmer_update(
    fname: Option<&String>,
    lname: Option<&String>,
    contact: Option<&String>,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    check_len(&mut errors, "farmer_fname", fname, MAX_PROFILE_NAME_LEN);
    check_len(&mut errors, "farmer_lname", lname, MAX_PROFILE_NAME_LEN);
    check_len(&mut errors, "farmer_contact", contact, MAX_PROFILE_CONTACT_LEN);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Length checks for an investor profile update.
pub fn validate_investor_update(
    name: Option<&String>,
    contact_no: Option<&String>,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    check_len(&mut errors, "investor_name", name, MAX_PROFILE_NAME_LEN);
    check_len(&mut errors, "investor_contact_no", contact_no, MAX_PROFILE_CONTACT_LEN);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
