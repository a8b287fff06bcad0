use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hashbrown::HashMap;

use crate::error::ServerError;

/// Process-wide, read-only username -> password table (spec §3).
#[derive(Debug, Clone)]
pub struct Credentials {
    entries: HashMap<String, String>,
}

impl Credentials {
    /// The protocol author's own fixture accounts, used whenever no
    /// credentials file is configured so the literal scenarios in
    /// spec.md run without any setup.
    pub fn built_in() -> Credentials {
        let mut entries = HashMap::new();
        entries.insert("foo".to_string(), "bar".to_string());
        entries.insert("sph77".to_string(), "admin".to_string());
        entries.insert("kain".to_string(), "itdepends".to_string());
        Credentials { entries }
    }

    pub fn from_file(path: &Path) -> Result<Credentials, ServerError> {
        let file = File::open(path).map_err(|source| ServerError::CredentialsLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: HashMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| ServerError::CredentialsParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Credentials { entries })
    }

    pub fn check(&self, username: &str, password: &str) -> bool {
        self.entries
            .get(username)
            .map(|expected| expected == password)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_credentials_match_literal_scenario() {
        let creds = Credentials::built_in();
        assert!(creds.check("foo", "bar"));
        assert!(!creds.check("foo", "wrong"));
        assert!(!creds.check("nobody", "bar"));
    }
}
