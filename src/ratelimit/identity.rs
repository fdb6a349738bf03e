//! Actor identifier resolution and counter key generation.

use std::fmt;
use std::net::IpAddr;

/// The actor an operation is counted against.
///
/// Callers resolve this in priority order: an authenticated user id first,
/// then the client IP address, then an opaque client-supplied token, and
/// finally the `Anonymous` sentinel when none apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// An authenticated user id
    User(String),
    /// The remote client address
    Ip(IpAddr),
    /// An opaque client-supplied token
    Token(String),
    /// Fallback when no identity could be resolved
    Anonymous,
}

impl Identifier {
    /// Resolve an identifier from the available actor facts, in priority
    /// order: user id, then IP, then token, then `Anonymous`.
    pub fn resolve(user: Option<&str>, ip: Option<IpAddr>, token: Option<&str>) -> Self {
        if let Some(user) = user {
            if !user.is_empty() {
                return Identifier::User(user.to_string());
            }
        }
        if let Some(ip) = ip {
            return Identifier::Ip(ip);
        }
        if let Some(token) = token {
            if !token.is_empty() {
                return Identifier::Token(token.to_string());
            }
        }
        Identifier::Anonymous
    }

    /// The IP address, if this identifier is IP-based.
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Identifier::Ip(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Whether the identifier carries an empty payload.
    ///
    /// An empty user id or token is a caller bug, not a real actor.
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Identifier::User(id) | Identifier::Token(id) => id.is_empty(),
            Identifier::Ip(_) | Identifier::Anonymous => false,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::User(id) => write!(f, "user:{}", id),
            Identifier::Ip(addr) => write!(f, "ip:{}", addr),
            Identifier::Token(token) => write!(f, "token:{}", token),
            Identifier::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// A key that uniquely identifies a counter: the actor scope plus the
/// operation being counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// The actor scope, e.g. `user:42` or `ip:10.0.0.1`
    pub scope: String,
    /// The operation key, e.g. `auth:login`
    pub operation: String,
}

impl CounterKey {
    /// Create a new counter key from an identifier and operation.
    pub fn new(identifier: &Identifier, operation: &str) -> Self {
        Self {
            scope: identifier.to_string(),
            operation: operation.to_string(),
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_priority() {
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        let id = Identifier::resolve(Some("42"), Some(ip), Some("tok"));
        assert_eq!(id, Identifier::User("42".to_string()));

        let id = Identifier::resolve(None, Some(ip), Some("tok"));
        assert_eq!(id, Identifier::Ip(ip));

        let id = Identifier::resolve(None, None, Some("tok"));
        assert_eq!(id, Identifier::Token("tok".to_string()));

        let id = Identifier::resolve(None, None, None);
        assert_eq!(id, Identifier::Anonymous);
    }

    #[test]
    fn test_empty_user_falls_through() {
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let id = Identifier::resolve(Some(""), Some(ip), None);
        assert_eq!(id, Identifier::Ip(ip));
    }

    #[test]
    fn test_counter_key_display() {
        let id = Identifier::User("42".to_string());
        let key = CounterKey::new(&id, "auth:login");
        assert_eq!(key.to_string(), "user:42/auth:login");
    }

    #[test]
    fn test_counter_key_equality() {
        let id = Identifier::Token("abc".to_string());
        let key1 = CounterKey::new(&id, "search:general");
        let key2 = CounterKey::new(&id, "search:general");
        assert_eq!(key1, key2);
    }
}
