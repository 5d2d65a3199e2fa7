//! Mapping between LDAP attribute names and directory fields.

use std::collections::HashMap;

use tracing::debug;

use crate::config::AttributeConfig;
use crate::errors::ConfigError;

/// A semantic directory field an LDAP attribute can be projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    Title,
    Phone,
    Manager,
    Reports,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Title => "title",
            Field::Phone => "phone",
            Field::Manager => "manager",
            Field::Reports => "reports",
        }
    }
}

/// Validated LDAP attribute name -> [`Field`] map.
#[derive(Debug, Clone)]
pub struct AttributeMap {
    /// Attributes in configuration order; this is the list requested from the server.
    ordered: Vec<(String, Field)>,
    lookup: HashMap<String, Field>,
}

impl AttributeMap {
    /// Build the map from configuration.
    ///
    /// Every required key (name, email, title, phone) must be set to a
    /// non-empty attribute name. Optional keys (manager, reports) are
    /// omitted when unset.
    pub fn from_config(config: &AttributeConfig) -> Result<Self, ConfigError> {
        let required = [
            ("name_attr", config.name_attr.as_str(), Field::Name),
            ("email_attr", config.email_attr.as_str(), Field::Email),
            ("title_attr", config.title_attr.as_str(), Field::Title),
            ("phone_attr", config.phone_attr.as_str(), Field::Phone),
        ];
        let optional = [
            (config.manager_attr.as_deref(), Field::Manager),
            (config.reports_attr.as_deref(), Field::Reports),
        ];

        let mut map = Self {
            ordered: Vec::new(),
            lookup: HashMap::new(),
        };

        for (key, attr, field) in required {
            let attr = attr.trim();
            if attr.is_empty() {
                return Err(ConfigError::MissingAttribute(key.to_string()));
            }
            map.insert(attr, field);
        }

        for (attr, field) in optional {
            match attr.map(str::trim) {
                Some(attr) if !attr.is_empty() => map.insert(attr, field),
                _ => debug!(field = field.as_str(), "optional attribute not configured"),
            }
        }

        Ok(map)
    }

    fn insert(&mut self, attr: &str, field: Field) {
        if self.lookup.insert(attr.to_string(), field).is_none() {
            self.ordered.push((attr.to_string(), field));
        } else if let Some(slot) = self.ordered.iter_mut().find(|(name, _)| name == attr) {
            // Same attribute configured twice: the later key wins.
            slot.1 = field;
        }
    }

    /// The field an LDAP attribute maps to, if it is mapped at all.
    pub fn field_for(&self, attr: &str) -> Option<Field> {
        self.lookup.get(attr).copied()
    }

    /// The configured attribute for a field.
    pub fn attr_for(&self, field: Field) -> Option<&str> {
        self.ordered
            .iter()
            .find(|(_, f)| *f == field)
            .map(|(name, _)| name.as_str())
    }

    /// Attribute names to request from the directory.
    pub fn ldap_attributes(&self) -> Vec<String> {
        self.ordered.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Whether manager/report ranking is enabled.
    pub fn ranks_entries(&self) -> bool {
        self.attr_for(Field::Manager).is_some() || self.attr_for(Field::Reports).is_some()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AttributeConfig {
        AttributeConfig {
            name_attr: "displayName".into(),
            email_attr: "mail".into(),
            title_attr: "title".into(),
            phone_attr: "telephoneNumber".into(),
            manager_attr: None,
            reports_attr: None,
        }
    }

    #[test]
    fn test_required_attributes_mapped() {
        let map = AttributeMap::from_config(&base_config()).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.field_for("mail"), Some(Field::Email));
        assert_eq!(map.field_for("manager"), None);
        assert!(!map.ranks_entries());
        assert_eq!(
            map.ldap_attributes(),
            ["displayName", "mail", "title", "telephoneNumber"]
        );
    }

    #[test]
    fn test_missing_required_attribute() {
        let mut config = base_config();
        config.phone_attr = "  ".into();
        let err = AttributeMap::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAttribute(ref key) if key == "phone_attr"));
    }

    #[test]
    fn test_optional_attributes() {
        let mut config = base_config();
        config.manager_attr = Some("manager".into());
        config.reports_attr = Some(String::new());
        let map = AttributeMap::from_config(&config).unwrap();
        assert_eq!(map.field_for("manager"), Some(Field::Manager));
        assert_eq!(map.attr_for(Field::Reports), None);
        assert!(map.ranks_entries());
    }
}
