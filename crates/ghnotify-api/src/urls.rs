// Repository name and URL helpers
use std::sync::OnceLock;

use regex::Regex;

/// Split "owner/name" into its parts. Anything else is rejected.
pub fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    let (owner, name) = full_name.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}

fn rewrite_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (
                r"^https://api\.github\.com/repos/([^/]+)/([^/]+)/issues/(\d+)$",
                "https://github.com/$1/$2/issues/$3",
            ),
            (
                r"^https://api\.github\.com/repos/([^/]+)/([^/]+)/pulls/(\d+)$",
                "https://github.com/$1/$2/pull/$3",
            ),
            // Release ids aren't tags, so the best we can do is the list
            (
                r"^https://api\.github\.com/repos/([^/]+)/([^/]+)/releases/(\d+)$",
                "https://github.com/$1/$2/releases",
            ),
            (
                r"^https://api\.github\.com/repos/([^/]+)/([^/]+)/issues/comments/(\d+)$",
                "https://github.com/$1/$2/issues",
            ),
            (
                r"^https://api\.github\.com/repos/([^/]+)/([^/]+)/.*$",
                "https://github.com/$1/$2",
            ),
        ]
        .into_iter()
        .map(|(pattern, replacement)| {
            (Regex::new(pattern).expect("rewrite pattern is valid"), replacement)
        })
        .collect()
    })
}

/// Turn an API URL into the page a human would open.
///
/// Known shapes map to their page, other repository URLs fall back to the
/// repository root, and anything unrecognised comes back unchanged.
pub fn api_url_to_web(api_url: &str) -> String {
    if api_url.is_empty() {
        return String::new();
    }

    rewrite_rules()
        .iter()
        .find(|(regex, _)| regex.is_match(api_url))
        .map(|(regex, replacement)| regex.replace(api_url, *replacement).into_owned())
        .unwrap_or_else(|| api_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("octo/widgets"), Some(("octo", "widgets")));
        assert_eq!(split_full_name("octo"), None);
        assert_eq!(split_full_name("/widgets"), None);
        assert_eq!(split_full_name("a/b/c"), None);
    }

    #[test]
    fn test_api_url_to_web() {
        let cases = [
            (
                "https://api.github.com/repos/octo/widgets/issues/12",
                "https://github.com/octo/widgets/issues/12",
            ),
            (
                "https://api.github.com/repos/octo/widgets/pulls/7",
                "https://github.com/octo/widgets/pull/7",
            ),
            (
                "https://api.github.com/repos/octo/widgets/releases/991",
                "https://github.com/octo/widgets/releases",
            ),
            (
                "https://api.github.com/repos/octo/widgets/issues/comments/5",
                "https://github.com/octo/widgets/issues",
            ),
            (
                "https://api.github.com/repos/octo/widgets/commits/abc123",
                "https://github.com/octo/widgets",
            ),
            ("https://example.com/elsewhere", "https://example.com/elsewhere"),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(api_url_to_web(input), expected, "input: {}", input);
        }
    }
}
