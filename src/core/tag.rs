use std::fmt;
use std::str::FromStr;

use super::ParseError;

/// The two user-extendable registries share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Category,
    PaymentMethod,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Category => "category",
            TagKind::PaymentMethod => "payment_method",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(TagKind::Category),
            "payment_method" => Ok(TagKind::PaymentMethod),
            _ => Err(ParseError::TagKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
}

impl Tag {
    pub fn new(name: &str, icon: &str, color: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.trim().to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn find<'a>(tags: &'a [Tag], name: &str) -> Option<&'a Tag> {
        let name = name.trim().to_lowercase();
        tags.iter().find(|t| t.name.to_lowercase() == name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
