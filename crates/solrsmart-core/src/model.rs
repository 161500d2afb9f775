use crate::guess::guess_fields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Collection = String;
pub type FieldName = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldDescriptor {
    pub name: FieldName,
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub stored: bool,
    #[serde(default, rename = "multiValued")]
    pub multi_valued: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
            indexed: true,
            stored: true,
            multi_valued: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldMetadata {
    #[serde(default)]
    pub description: String,
}

/// Coarse classification of a declared field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Numeric,
    Date,
    Boolean,
}

impl FieldKind {
    /// Substring match on the lower-cased type name. Text wins over numeric,
    /// numeric over date, date over boolean.
    pub fn classify(declared_type: &str) -> Option<Self> {
        let t = declared_type.to_lowercase();
        if t.contains("string") || t.contains("text") {
            Some(Self::Text)
        } else if ["int", "long", "float", "double"].iter().any(|k| t.contains(k)) {
            Some(Self::Numeric)
        } else if t.contains("date") {
            Some(Self::Date)
        } else if t.contains("bool") {
            Some(Self::Boolean)
        } else {
            None
        }
    }
}

/// Role guesses for a catalog. An absent role is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GuessedFields {
    pub price: FieldName,
    pub date: FieldName,
    pub brand: FieldName,
    pub category: FieldName,
    #[serde(rename = "inStock")]
    pub in_stock: FieldName,
    #[serde(rename = "defaultDF")]
    pub default_df: FieldName,
    #[serde(rename = "textTopN")]
    pub text_top_n: Vec<FieldName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldCatalog {
    #[serde(rename = "uniqueKey")]
    pub unique_key: FieldName,
    pub all: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<FieldName, FieldMetadata>>,
    pub texts: Vec<FieldName>,
    pub numbers: Vec<FieldName>,
    pub dates: Vec<FieldName>,
    pub bools: Vec<FieldName>,
    pub guessed: GuessedFields,
}

impl FieldCatalog {
    /// Builds a catalog and derives the classification arrays and role guesses.
    /// Fields whose type matches no rule stay in `all` only.
    pub fn new(
        unique_key: impl Into<String>,
        all: Vec<FieldDescriptor>,
        metadata: Option<BTreeMap<FieldName, FieldMetadata>>,
    ) -> Self {
        let mut fc = Self {
            unique_key: unique_key.into(),
            all,
            metadata,
            ..Default::default()
        };
        for f in fc.all.iter() {
            match FieldKind::classify(&f.r#type) {
                Some(FieldKind::Text) => fc.texts.push(f.name.clone()),
                Some(FieldKind::Numeric) => fc.numbers.push(f.name.clone()),
                Some(FieldKind::Date) => fc.dates.push(f.name.clone()),
                Some(FieldKind::Boolean) => fc.bools.push(f.name.clone()),
                None => {}
            }
        }
        fc.guessed = guess_fields(&fc);
        fc
    }

    pub fn names(&self, kind: FieldKind) -> &[FieldName] {
        match kind {
            FieldKind::Text => &self.texts,
            FieldKind::Numeric => &self.numbers,
            FieldKind::Date => &self.dates,
            FieldKind::Boolean => &self.bools,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.all.iter().find(|f| f.name == name)
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get(name)
            .map(|m| m.description.as_str())
            .filter(|d| !d.is_empty())
    }
}
