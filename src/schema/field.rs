use serde::{Deserialize, Serialize};

use crate::core::Value;

/// Semantic type of a field; drives storage type, binding and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Identifier,
    Text,
    LongText,
    Integer,
    Real,
    Boolean,
    Enum,
    Date,
    CreatedTimestamp,
    UpdatedTimestamp,
    DerivedToken,
    Binary,
}

impl FieldKind {
    /// Timestamps maintained by the store rather than by callers.
    pub fn is_auto_timestamp(self) -> bool {
        matches!(self, Self::CreatedTimestamp | Self::UpdatedTimestamp)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::CreatedTimestamp | Self::UpdatedTimestamp)
    }
}

/// How the edit flow treats a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Parsed from edit input; absent input keeps the current value.
    #[default]
    Standard,
    /// Never touched by the edit flow; the caller sets it by hand.
    Custom,
    /// Absent input clears the value instead of keeping it.
    MustBeExplicit,
}

/// Declarative description of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_domain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_entity: Option<String>,
    #[serde(default)]
    pub edit_mode: EditMode,
    /// Column width for VARCHAR/INT columns on dialects that take one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: false,
            default: None,
            enum_domain: Vec::new(),
            derived_from: None,
            foreign_entity: None,
            edit_mode: EditMode::Standard,
            length: None,
        }
    }

    pub fn identifier() -> Self {
        Self::new(FieldKind::Identifier)
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn long_text() -> Self {
        Self::new(FieldKind::LongText)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn real() -> Self {
        Self::new(FieldKind::Real)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn enumeration<I, S>(domain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enum_domain: domain.into_iter().map(Into::into).collect(),
            ..Self::new(FieldKind::Enum)
        }
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    pub fn created_timestamp() -> Self {
        Self::new(FieldKind::CreatedTimestamp)
    }

    pub fn updated_timestamp() -> Self {
        Self::new(FieldKind::UpdatedTimestamp)
    }

    pub fn derived_token(from_field: &str) -> Self {
        Self {
            derived_from: Some(from_field.to_string()),
            ..Self::new(FieldKind::DerivedToken)
        }
    }

    pub fn binary() -> Self {
        Self::new(FieldKind::Binary)
    }

    /// Integer field holding the identifier of another entity.
    pub fn foreign(entity_type: &str) -> Self {
        Self {
            foreign_entity: Some(entity_type.to_string()),
            ..Self::new(FieldKind::Integer)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn edit_mode(mut self, mode: EditMode) -> Self {
        self.edit_mode = mode;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn is_linked(&self) -> bool {
        self.foreign_entity.is_some()
    }

    pub fn allows_enum_value(&self, value: &str) -> bool {
        self.enum_domain.iter().any(|allowed| allowed == value)
    }
}
