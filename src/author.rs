//! Commit author resolution for `SetProject`.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(Error, Debug)]
pub enum AuthorError {
    #[error("GITHUB_ACTOR is set but GITHUB_ACTOR_EMAIL is not")]
    MissingActorEmail,
    #[error("could not read git config user.name/user.email: {0}")]
    GitConfig(#[from] git2::Error),
}

/// `GITHUB_ACTOR` + `GITHUB_ACTOR_EMAIL` if both set; otherwise the host's
/// git config `user.name`/`user.email`. A `GITHUB_ACTOR` without a matching
/// email is a configuration error, not a silent fallback.
pub fn resolve() -> Result<Author, AuthorError> {
    if let Ok(actor) = std::env::var("GITHUB_ACTOR") {
        let email = std::env::var("GITHUB_ACTOR_EMAIL").map_err(|_| AuthorError::MissingActorEmail)?;
        return Ok(Author { name: actor, email });
    }
    let config = git2::Config::open_default()?;
    let name = config.get_string("user.name")?;
    let email = config.get_string("user.email")?;
    Ok(Author { name, email })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn github_actor_without_email_is_fatal() {
        env::set_var("GITHUB_ACTOR", "bot");
        env::remove_var("GITHUB_ACTOR_EMAIL");
        let result = resolve();
        assert!(matches!(result, Err(AuthorError::MissingActorEmail)));
        env::remove_var("GITHUB_ACTOR");
    }

    #[test]
    fn github_actor_with_email_is_used() {
        env::set_var("GITHUB_ACTOR", "bot");
        env::set_var("GITHUB_ACTOR_EMAIL", "bot@example.com");
        let author = resolve().unwrap();
        assert_eq!(author.name, "bot");
        assert_eq!(author.email, "bot@example.com");
        env::remove_var("GITHUB_ACTOR");
        env::remove_var("GITHUB_ACTOR_EMAIL");
    }
}
