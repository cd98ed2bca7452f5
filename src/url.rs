//! Registry URL normalization: SSH shorthand is rewritten to HTTPS so
//! `protato.root.yaml`'s `git.url` and cache directory hashing are stable
//! regardless of which transport fetched a given project.

/// `git@host:org/repo.git` → `https://host/org/repo`; a trailing `.git` is
/// stripped from any other input too.
pub fn normalize(url: &str) -> String {
    let stripped = url.strip_suffix(".git").unwrap_or(url);

    if let Some(rest) = stripped.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            return format!("https://{host}/{path}");
        }
    }

    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_ssh_shorthand() {
        assert_eq!(normalize("git@github.com:acme/schemas.git"), "https://github.com/acme/schemas");
    }

    #[test]
    fn strips_trailing_dot_git_from_https() {
        assert_eq!(
            normalize("https://github.com/acme/schemas.git"),
            "https://github.com/acme/schemas"
        );
    }

    #[test]
    fn leaves_already_normalized_url_untouched() {
        let url = "https://github.com/acme/schemas";
        assert_eq!(normalize(url), url);
    }
}
