//! Attribute properties derived from well-known traits.

use std::fmt;

use crate::traits::{ParameterValue, ResolvedTraitSet};

/// Physical data format implied by the `is.dataFormat.*` traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Decimal,
    Guid,
    Char,
    String,
    Byte,
    Binary,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Boolean,
    Json,
    Unknown,
}

impl DataFormat {
    pub fn name(self) -> &'static str {
        match self {
            DataFormat::Int16 => "Int16",
            DataFormat::Int32 => "Int32",
            DataFormat::Int64 => "Int64",
            DataFormat::Float => "Float",
            DataFormat::Double => "Double",
            DataFormat::Decimal => "Decimal",
            DataFormat::Guid => "Guid",
            DataFormat::Char => "Char",
            DataFormat::String => "String",
            DataFormat::Byte => "Byte",
            DataFormat::Binary => "Binary",
            DataFormat::Date => "Date",
            DataFormat::Time => "Time",
            DataFormat::DateTime => "DateTime",
            DataFormat::DateTimeOffset => "DateTimeOffset",
            DataFormat::Boolean => "Boolean",
            DataFormat::Json => "Json",
            DataFormat::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAttributeProperties {
    pub is_primary_key: bool,
    pub data_format: Option<DataFormat>,
    pub default_value: Option<ParameterValue>,
    pub is_nullable: bool,
    pub is_read_only: bool,
    pub maximum_length: Option<String>,
    pub maximum_value: Option<String>,
    pub minimum_value: Option<String>,
    pub value_constrained_to_list: bool,
    pub source_name: Option<String>,
    pub source_ordering: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

impl ResolvedAttributeProperties {
    pub fn from_traits(traits: &ResolvedTraitSet) -> Self {
        let text = |trait_name: &str, param: &str| {
            traits
                .find_derived(trait_name)
                .and_then(|t| t.text(param))
                .map(str::to_string)
        };
        let localized = |trait_name: &str| {
            traits
                .find_derived(trait_name)
                .and_then(|t| t.value("localizedDisplayText").or_else(|| t.value("localizedDescription")))
                .and_then(ParameterValue::as_table)
                .and_then(|table| table.lookup(0, "en", 1))
                .map(str::to_string)
        };

        Self {
            is_primary_key: traits.find_derived("is.identifiedBy").is_some(),
            data_format: data_format(traits),
            default_value: traits
                .find_derived("does.haveDefault")
                .and_then(|t| t.value("default"))
                .cloned(),
            is_nullable: traits.find_derived("is.nullable").is_some(),
            is_read_only: traits.find_derived("is.readOnly").is_some(),
            maximum_length: text("is.constrained", "maximumLength"),
            maximum_value: text("is.constrained", "maximumValue"),
            minimum_value: text("is.constrained", "minimumValue"),
            value_constrained_to_list: traits.find_derived("is.constrainedList").is_some(),
            source_name: text("is.CDS.sourceNamed", "name"),
            source_ordering: text("is.CDS.ordered", "ordinal"),
            display_name: localized("is.localized.displayedAs"),
            description: localized("is.localized.describedAs"),
        }
    }
}

/// Combine the data format flag traits into one format.
fn data_format(traits: &ResolvedTraitSet) -> Option<DataFormat> {
    let mut base: Option<DataFormat> = None;
    let mut array = false;
    let mut big = false;
    let mut small = false;
    let mut integer = false;
    let mut json = false;

    for t in traits.iter() {
        for name in &t.signature.ancestry {
            match name.as_str() {
                "is.dataFormat.array" => array = true,
                "is.dataFormat.big" => big = true,
                "is.dataFormat.small" => small = true,
                "is.dataFormat.integer" => integer = true,
                "is.dataFormat.floatingPoint" => base = Some(DataFormat::Float),
                "is.dataFormat.characters" => base = Some(DataFormat::Char),
                "is.dataFormat.bytes" => base = Some(DataFormat::Byte),
                "is.dataFormat.date" => {
                    base = Some(match base {
                        Some(DataFormat::Time) => DataFormat::DateTime,
                        _ => DataFormat::Date,
                    })
                }
                "is.dataFormat.time" => {
                    base = Some(match base {
                        Some(DataFormat::Date) => DataFormat::DateTime,
                        _ => DataFormat::Time,
                    })
                }
                "is.dataFormat.timeOffset" => {
                    if base == Some(DataFormat::DateTime) {
                        base = Some(DataFormat::DateTimeOffset);
                    }
                }
                "is.dataFormat.boolean" => base = Some(DataFormat::Boolean),
                "is.dataFormat.numeric.shaped" => base = Some(DataFormat::Decimal),
                "is.dataFormat.guid" => base = Some(DataFormat::Guid),
                "means.content.text.JSON" => json = true,
                _ => {}
            }
        }
    }

    if array {
        base = if json {
            Some(DataFormat::Json)
        } else {
            match base {
                Some(DataFormat::Char) => Some(DataFormat::String),
                Some(DataFormat::Byte) => Some(DataFormat::Binary),
                Some(DataFormat::Guid) => Some(DataFormat::Guid),
                Some(_) => Some(DataFormat::Unknown),
                None => None,
            }
        };
    }
    if base == Some(DataFormat::Float) && big {
        base = Some(DataFormat::Double);
    }
    if integer && base.is_none() {
        base = Some(if big {
            DataFormat::Int64
        } else if small {
            DataFormat::Int16
        } else {
            DataFormat::Int32
        });
    }
    base
}
