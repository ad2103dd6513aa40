use std::collections::HashSet;

/// Accepted API tokens, fixed at startup.
#[derive(Debug, Clone)]
pub struct AuthValidator {
    accepted: HashSet<String>,
}

impl AuthValidator {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accepted = tokens
            .into_iter()
            .map(Into::into)
            .filter(|token: &String| !token.is_empty())
            .collect();

        Self { accepted }
    }

    /// Build from a comma separated list, e.g. the `API_KEYS` setting.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim))
    }

    pub fn is_valid(&self, token: &str) -> bool {
        !token.is_empty() && self.accepted.contains(token)
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}
