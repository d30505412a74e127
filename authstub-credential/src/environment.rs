//! Deployment environment and the claim values it implies.
//!
//! ```text
//! production   https://signin.account.gov.uk/
//! named "X"    https://signin.X.account.gov.uk/
//! ```
//!
//! The same templating applies to every issuer and audience.

use std::fmt;
use std::str::FromStr;

const PRODUCTION: &str = "production";

/// The environment a stub is deployed into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Unprefixed production-style hostnames
    #[default]
    Production,
    /// A non-production environment such as `local`, `build` or `staging`
    Named(String),
}

impl Environment {
    /// Environment name as configured (`production` for the default)
    pub fn name(&self) -> &str {
        match self {
            Self::Production => PRODUCTION,
            Self::Named(name) => name,
        }
    }

    /// `""` for production, `"X."` for a named environment
    fn subdomain(&self) -> String {
        match self {
            Self::Production => String::new(),
            Self::Named(name) => format!("{name}."),
        }
    }

    /// Issuer of client assertions and access tokens
    pub fn auth_issuer(&self) -> String {
        format!("https://signin.{}account.gov.uk/", self.subdomain())
    }

    /// Audience of the client assertion (the account management API)
    pub fn amc_audience(&self) -> String {
        format!("https://api.manage.{}account.gov.uk", self.subdomain())
    }

    /// Audience of the embedded access token
    pub fn auth_audience(&self) -> String {
        format!("https://manage.{}account.gov.uk", self.subdomain())
    }

    /// Issuer of storage access tokens
    pub fn storage_issuer(&self) -> String {
        format!("https://oidc.{}account.gov.uk/", self.subdomain())
    }

    /// Audience a storage access token must name
    pub fn storage_audience(&self) -> String {
        format!("https://credential-store.{}account.gov.uk", self.subdomain())
    }

    /// Secondary audience carried by storage access tokens
    pub fn identity_audience(&self) -> String {
        format!("https://identity.{}account.gov.uk", self.subdomain())
    }
}

impl FromStr for Environment {
    type Err = String;

    /// Empty and `production` select [`Environment::Production`]. Other names
    /// must be a single DNS label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if name.is_empty() || name == PRODUCTION {
            return Ok(Self::Production);
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !name.starts_with('-')
            && !name.ends_with('-');
        if !valid {
            return Err(format!(
                "environment name '{s}' must contain only letters, digits and inner hyphens"
            ));
        }
        Ok(Self::Named(name))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
