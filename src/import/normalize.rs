//! Row normalization.
//!
//! Turns one loosely-shaped input row (spreadsheet line or JSON object) into a
//! canonical [`ImportRow`]. Field names are resolved through a static ordered
//! alias table; enumerated fields map through fixed fuzzy tables and fall back
//! to a default instead of rejecting the row.

use strum_macros::{AsRefStr, Display, EnumIter};

use crate::error_handling::RowRejection;
use crate::import::outcome::RowError;

/// Chip availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ChipStatus {
    Active,
    #[default]
    Inactive,
}

/// Mobile carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Operator {
    #[default]
    Vivo,
    Claro,
}

/// Chip category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    ForDelivery,
    Banned,
    UnavailableAccess,
}

/// Logical fields an input row can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Number,
    Status,
    Operator,
    Category,
    ExternalId,
}

/// Accepted column names per field, in lookup order.
///
/// Matching is case-insensitive on trimmed names; the first alias with a
/// non-empty value wins.
pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Number, &["numero", "número", "number", "telefone", "phone"]),
    (Field::Status, &["status", "estado"]),
    (Field::Operator, &["operadora", "operator", "carrier"]),
    (Field::Category, &["categoria", "category", "tipo", "type"]),
    (Field::ExternalId, &["cid", "iccid", "sim"]),
];

/// One input row: column names and their text values, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cells.push((name.into(), value.into()));
    }

    /// Value under `name`, compared case-insensitively on trimmed names.
    fn cell(&self, name: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(key, _)| key.trim().to_lowercase() == name)
            .map(|(_, value)| value.as_str())
    }

    /// First non-empty value among the aliases of `field`.
    pub fn field(&self, field: Field) -> Option<&str> {
        let (_, aliases) = FIELD_ALIASES.iter().find(|(f, _)| *f == field)?;
        aliases
            .iter()
            .filter_map(|alias| self.cell(alias))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A validated row ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    /// Origin row reported back on errors.
    pub raw_index: usize,
    pub number: String,
    pub status: ChipStatus,
    pub operator: Operator,
    pub category: Category,
    /// Digits only; empty when absent.
    pub external_id: String,
}

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

pub fn map_status(value: Option<&str>) -> ChipStatus {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("ativo" | "active" | "available") => ChipStatus::Active,
        _ => ChipStatus::Inactive,
    }
}

pub fn map_operator(value: Option<&str>) -> Operator {
    let upper = value.unwrap_or_default().to_uppercase();
    if upper.contains("VIVO") {
        Operator::Vivo
    } else if upper.contains("CLARO") {
        Operator::Claro
    } else {
        Operator::default()
    }
}

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::ForDelivery, &["entrega", "delivery"]),
    (Category::Banned, &["banido", "banned"]),
    (
        Category::UnavailableAccess,
        &["indisponível", "indisponivel", "unavailable"],
    ),
];

pub fn map_category(value: Option<&str>) -> Category {
    let lower = value.unwrap_or_default().trim().to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or_default()
}

/// Normalizes `raw`, reporting failures against `origin`.
pub fn normalize(raw: &RawRow, origin: usize) -> Result<ImportRow, RowError> {
    let number = raw
        .field(Field::Number)
        .ok_or_else(|| RowError::new(origin, RowRejection::MissingNumber))?;
    let number = digits(number);
    if !(10..=11).contains(&number.len()) {
        return Err(RowError::new(
            origin,
            RowRejection::InvalidNumber {
                digits: number.len(),
            },
        ));
    }

    Ok(ImportRow {
        raw_index: origin,
        number,
        status: map_status(raw.field(Field::Status)),
        operator: map_operator(raw.field(Field::Operator)),
        category: map_category(raw.field(Field::Category)),
        external_id: raw.field(Field::ExternalId).map(digits).unwrap_or_default(),
    })
}
