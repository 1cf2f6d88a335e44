/*
 * Responsibility
 * - Scope string helpers (split / join / membership / validity)
 * - Scope and Permission names
 */
use std::fmt;
use std::str::FromStr;

/// Split a space-joined claim into its parts, skipping empty segments.
pub fn split_claim(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Join a list claim for the wire. `None` when nothing non-empty remains.
pub(crate) fn join_claim(values: &[String]) -> Option<String> {
    let parts: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Exact membership of `scope` in a space-joined scope string.
pub fn has_scope(scopes: &str, scope: &str) -> bool {
    scopes.split_whitespace().any(|s| s == scope)
}

/// A scope string is valid when it holds at least one word, words are
/// separated by single spaces, and every word is a known [`Scope`].
pub fn is_valid_scope(scopes: &str) -> bool {
    !scopes.is_empty() && scopes.split(' ').all(|word| word.parse::<Scope>().is_ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Default,
    Edit,
    Address,
    BirthDate,
    FamilyName,
    Gender,
    GivenName,
    Locale,
    MiddleName,
    Nickname,
    PhoneNumber,
    Picture,
    PreferredUsername,
    Profile,
    Website,
    ZoneInfo,
}

impl Scope {
    pub const ALL: [Scope; 16] = [
        Self::Default,
        Self::Edit,
        Self::Address,
        Self::BirthDate,
        Self::FamilyName,
        Self::Gender,
        Self::GivenName,
        Self::Locale,
        Self::MiddleName,
        Self::Nickname,
        Self::PhoneNumber,
        Self::Picture,
        Self::PreferredUsername,
        Self::Profile,
        Self::Website,
        Self::ZoneInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Edit => "edit",
            Self::Address => "address",
            Self::BirthDate => "birth_date",
            Self::FamilyName => "family_name",
            Self::Gender => "gender",
            Self::GivenName => "given_name",
            Self::Locale => "locale",
            Self::MiddleName => "middle_name",
            Self::Nickname => "nickname",
            Self::PhoneNumber => "phone_number",
            Self::Picture => "picture",
            Self::PreferredUsername => "preferred_username",
            Self::Profile => "profile",
            Self::Website => "website",
            Self::ZoneInfo => "zone_info",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownScope(pub String);

impl fmt::Display for UnknownScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown scope: {}", self.0)
    }
}

impl std::error::Error for UnknownScope {}

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| UnknownScope(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Admin,
    User,
    Locked,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Locked => "locked",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPermission(pub String);

impl fmt::Display for UnknownPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown permission: {}", self.0)
    }
}

impl std::error::Error for UnknownPermission {}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "locked" => Ok(Self::Locked),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_joins() {
        assert_eq!(split_claim("openid  profile "), vec!["openid", "profile"]);
        assert!(split_claim("").is_empty());
        assert_eq!(
            join_claim(&["openid".into(), " ".into(), "edit".into()]).as_deref(),
            Some("openid edit")
        );
        assert_eq!(join_claim(&[]), None);
        assert_eq!(join_claim(&["".into()]), None);
    }

    #[test]
    fn scope_membership_is_exact() {
        assert!(has_scope("default edit", "edit"));
        assert!(!has_scope("default edit", "birth_date"));
        assert!(!has_scope("defaultedit", "default"));
    }

    #[test]
    fn scope_validity() {
        assert!(is_valid_scope("default edit birth_date"));
        assert!(!is_valid_scope("defaultedit"));
        assert!(!is_valid_scope(""));
        assert!(!is_valid_scope("default  edit"));
        assert!(!is_valid_scope("Default"));
        assert!(!is_valid_scope("default openid"));
    }

    #[test]
    fn scope_names_round_trip() {
        for scope in Scope::ALL {
            assert_eq!(scope.as_str().parse::<Scope>(), Ok(scope));
        }
        assert_eq!("zone_info".parse::<Scope>(), Ok(Scope::ZoneInfo));
        assert_eq!(Scope::BirthDate.to_string(), "birth_date");
        assert_eq!(
            "zoneinfo".parse::<Scope>(),
            Err(UnknownScope("zoneinfo".to_string()))
        );
    }

    #[test]
    fn permission_parses() {
        assert_eq!("admin".parse::<Permission>(), Ok(Permission::Admin));
        assert_eq!(Permission::Locked.to_string(), "locked");
        assert!("wrong".parse::<Permission>().is_err());
    }
}
