use std::fmt;

/// Identifies one live session: datasource instance, processing location and project.
///
/// Components are compared exactly as given (no trimming, case-sensitive).
/// The key is hashed structurally, so a `:` or `/` inside a component can
/// never make two different triples collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub instance_id: i64,
    pub location: String,
    pub project: String,
}

impl ConnectionKey {
    pub fn new(instance_id: i64, location: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            instance_id,
            location: location.into(),
            project: project.into(),
        }
    }
}

/// Renders as `<instanceID>/<location>:<project>`
impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.instance_id, self.location, self.project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(ConnectionKey::new(3, "US", "my-proj").to_string(), "3/US:my-proj");
        assert_eq!(ConnectionKey::new(3, "", "").to_string(), "3/:");
    }

    #[test]
    fn test_key_equality_is_exact() {
        assert_eq!(ConnectionKey::new(1, "EU", "p"), ConnectionKey::new(1, "EU", "p"));
        assert_ne!(ConnectionKey::new(1, "EU", "p"), ConnectionKey::new(1, "eu", "p"));
        assert_ne!(ConnectionKey::new(1, "EU", "p"), ConnectionKey::new(1, "EU ", "p"));
        assert_ne!(ConnectionKey::new(1, "", "p"), ConnectionKey::new(1, "EU", "p"));
        assert_ne!(ConnectionKey::new(1, "EU", "p"), ConnectionKey::new(2, "EU", "p"));
    }

    #[test]
    fn test_separator_inside_component_does_not_collide() {
        let a = ConnectionKey::new(1, "x:y", "z");
        let b = ConnectionKey::new(1, "x", "y:z");
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a, b);
    }
}
