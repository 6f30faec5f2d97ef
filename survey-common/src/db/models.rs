//! Entity records and the closed field vocabularies of the two score sheets

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Defines a closed score-field vocabulary plus its fixed-size score sheet.
///
/// Each variant has a spreadsheet/API code (the variant name) and a SQL
/// column name. The score sheet holds one nullable value per variant and
/// serializes as a map keyed by code, in vocabulary order.
macro_rules! score_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $scores:ident, $label:literal {
            $($variant:ident => $column:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member in canonical order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Spreadsheet header / API name
            pub fn code(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Column name in the database table
            pub fn column(self) -> &'static str {
                match self {
                    $($name::$variant => $column),+
                }
            }

            /// Comma-separated list of valid codes, for error messages
            pub fn valid_codes() -> String {
                Self::ALL.iter().map(|f| f.code()).collect::<Vec<_>>().join(", ")
            }

            fn index(self) -> usize {
                self as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|f| f.code() == s)
                    .ok_or_else(|| format!("Unknown {}: {}", $label, s))
            }
        }

        #[doc = concat!("One nullable score per [`", stringify!($name), "`]")]
        #[derive(Debug, Clone, Copy, PartialEq, Default)]
        pub struct $scores {
            values: [Option<f64>; $name::ALL.len()],
        }

        impl $scores {
            pub fn get(&self, field: $name) -> Option<f64> {
                self.values[field.index()]
            }

            pub fn set(&mut self, field: $name, value: Option<f64>) {
                self.values[field.index()] = value;
            }

            /// Builder-style `set`
            pub fn with(mut self, field: $name, value: f64) -> Self {
                self.set(field, Some(value));
                self
            }

            /// `(field, value)` pairs in vocabulary order
            pub fn iter(&self) -> impl Iterator<Item = ($name, Option<f64>)> + '_ {
                $name::ALL.iter().map(move |f| (*f, self.get(*f)))
            }
        }

        impl Serialize for $scores {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some($name::ALL.len()))?;
                for (field, value) in self.iter() {
                    map.serialize_entry(field.code(), &value)?;
                }
                map.end()
            }
        }
    };
}

score_vocabulary! {
    /// 16PF personality factor (note: there is no `D` factor)
    PersonalityFactor, PersonalityScores, "personality factor" {
        A => "factor_a",
        B => "factor_b",
        C => "factor_c",
        E => "factor_e",
        F => "factor_f",
        G => "factor_g",
        H => "factor_h",
        I => "factor_i",
        L => "factor_l",
        M => "factor_m",
        N => "factor_n",
        O => "factor_o",
        Q1 => "factor_q1",
        Q2 => "factor_q2",
        Q3 => "factor_q3",
        Q4 => "factor_q4",
    }
}

score_vocabulary! {
    /// Derived behavioral category
    Category, CategoryScores, "category" {
        An => "category_an",
        Ex => "category_ex",
        So => "category_so",
        In => "category_in",
        Ob => "category_ob",
        Cr => "category_cr",
        Ne => "category_ne",
        Ps => "category_ps",
        Li => "category_li",
        Ac => "category_ac",
    }
}

/// Stored respondent
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct Respondent {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub gender: String,
}

/// Respondent attributes for a write (import or direct create)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewRespondent {
    pub name: String,
    pub age: i64,
    pub gender: String,
}

/// Stored personality factor sheet
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PersonalityFactors {
    pub id: i64,
    pub respondent_id: i64,
    /// Respondent name, for display
    pub respondent: String,
    #[serde(flatten)]
    pub scores: PersonalityScores,
}

/// Stored categorization sheet
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Categorization {
    pub id: i64,
    pub respondent_id: i64,
    /// Respondent name, for display
    pub respondent: String,
    #[serde(flatten)]
    pub scores: CategoryScores,
}

/// Two selected score fields of one sheet row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldPair {
    pub respondent_id: i64,
    pub first: Option<f64>,
    pub second: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_sizes() {
        assert_eq!(PersonalityFactor::ALL.len(), 16);
        assert_eq!(Category::ALL.len(), 10);
    }

    #[test]
    fn test_codes_parse_exactly() {
        assert_eq!("Q3".parse::<PersonalityFactor>(), Ok(PersonalityFactor::Q3));
        assert_eq!("In".parse::<Category>(), Ok(Category::In));
        assert!("D".parse::<PersonalityFactor>().is_err());
        assert!("q1".parse::<PersonalityFactor>().is_err());
        assert!("an".parse::<Category>().is_err());
    }

    #[test]
    fn test_columns_are_distinct_from_sql_keywords() {
        assert_eq!(Category::In.column(), "category_in");
        assert_eq!(PersonalityFactor::Q4.column(), "factor_q4");
    }

    #[test]
    fn test_valid_codes_listing() {
        assert_eq!(
            Category::valid_codes(),
            "An, Ex, So, In, Ob, Cr, Ne, Ps, Li, Ac"
        );
        assert!(PersonalityFactor::valid_codes().starts_with("A, B, C, E"));
    }

    #[test]
    fn test_scores_serialize_by_code() {
        let scores = CategoryScores::default()
            .with(Category::An, 1.5)
            .with(Category::Ac, 27.0);
        let value = serde_json::to_value(scores).unwrap();

        assert_eq!(value["An"], 1.5);
        assert_eq!(value["Ac"], 27.0);
        assert!(value["Ex"].is_null());
        assert_eq!(value.as_object().unwrap().len(), 10);
    }

    #[test]
    fn test_flattened_record_json() {
        let record = PersonalityFactors {
            id: 3,
            respondent_id: 7,
            respondent: "Estudiante 1".to_string(),
            scores: PersonalityScores::default().with(PersonalityFactor::Q1, 14.0),
        };
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["respondent_id"], 7);
        assert_eq!(value["respondent"], "Estudiante 1");
        assert_eq!(value["Q1"], 14.0);
        assert!(value["A"].is_null());
    }
}
