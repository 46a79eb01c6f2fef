//! Terminal prompts and form validation for the login and register commands.

use std::io::{self, Write};

use anyhow::{bail, Result};

/// Maximum length for username input
const MAX_USERNAME_LENGTH: usize = 50;

/// Minimum length for a new account password
const MIN_PASSWORD_LENGTH: usize = 6;

pub fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn prompt_password(label: &str) -> Result<String> {
    Ok(rpassword::prompt_password(format!("{}: ", label))?)
}

/// Use the given username, else prompt with the last one as default
pub fn resolve_username(given: Option<String>, last: Option<&str>) -> Result<String> {
    let username = match given {
        Some(u) => u,
        None => {
            let label = match last {
                Some(last) => format!("Username [{}]", last),
                None => "Username".to_string(),
            };
            let typed = prompt_line(&label)?;
            if typed.is_empty() {
                last.unwrap_or_default().to_string()
            } else {
                typed
            }
        }
    };
    validate_username(&username)?;
    Ok(username)
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        bail!("Username is required");
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        bail!("Username must be at most {} characters", MAX_USERNAME_LENGTH);
    }
    if username.chars().any(char::is_control) {
        bail!("Username contains control characters");
    }
    Ok(())
}

/// Checks the register form applies before anything is sent
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<()> {
    if password != confirmation {
        bail!("Passwords do not match");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        );
    }
    Ok(())
}
