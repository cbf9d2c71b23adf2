// src/catalog.rs

//! Reference data for the recommendation questionnaire.
//!
//! A [`Combination`] is a pairing of national exam subjects. The set is closed:
//! weights and scores are keyed by the enum, and the declaration order below is
//! the order used to break ties when ranking.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const BUILTIN_CATALOG: &str = include_str!("../data/combinations.json");

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Combination {
    MathInf,
    MathPhys,
    MathGeo,
    BioChem,
    BioGeo,
    ChemPhys,
    GeoForeign,
    GeoHist,
    HistLaw,
    ForeignHist,
    KazLit,
    RusLit,
    Creative,
}

impl Combination {
    pub const COUNT: usize = 13;

    /// All combinations in declaration order.
    pub const ALL: [Combination; Combination::COUNT] = [
        Combination::MathInf,
        Combination::MathPhys,
        Combination::MathGeo,
        Combination::BioChem,
        Combination::BioGeo,
        Combination::ChemPhys,
        Combination::GeoForeign,
        Combination::GeoHist,
        Combination::HistLaw,
        Combination::ForeignHist,
        Combination::KazLit,
        Combination::RusLit,
        Combination::Creative,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Combination::MathInf => "math_inf",
            Combination::MathPhys => "math_phys",
            Combination::MathGeo => "math_geo",
            Combination::BioChem => "bio_chem",
            Combination::BioGeo => "bio_geo",
            Combination::ChemPhys => "chem_phys",
            Combination::GeoForeign => "geo_foreign",
            Combination::GeoHist => "geo_hist",
            Combination::HistLaw => "hist_law",
            Combination::ForeignHist => "foreign_hist",
            Combination::KazLit => "kaz_lit",
            Combination::RusLit => "rus_lit",
            Combination::Creative => "creative",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Combination {
    type Err = UnknownCombination;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Combination::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| UnknownCombination(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCombination(pub String);

impl fmt::Display for UnknownCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown combination '{}'", self.0)
    }
}

impl std::error::Error for UnknownCombination {}

/// Total mapping from every combination to an integer, absent entries being 0.
///
/// Used for answer weights and for accumulated questionnaire scores. On the wire
/// and in storage it is a JSON object keyed by the combination key; keys that are
/// not part of the catalog are dropped when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeightTable([i64; Combination::COUNT]);

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, combination: Combination) -> i64 {
        self.0[combination.index()]
    }

    pub fn set(&mut self, combination: Combination, value: i64) {
        self.0[combination.index()] = value;
    }

    pub fn add(&mut self, combination: Combination, value: i64) {
        self.0[combination.index()] += value;
    }

    /// Adds every weight of `other` into this table.
    pub fn accumulate(&mut self, other: &WeightTable) {
        for (slot, value) in self.0.iter_mut().zip(other.0.iter()) {
            *slot += value;
        }
    }

    pub fn total(&self) -> i64 {
        self.0.iter().sum()
    }

    /// Entries in catalog declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Combination, i64)> + '_ {
        Combination::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    /// Builds a table from a loosely keyed map, returning the keys it had to drop.
    pub fn from_loose<'a, I>(entries: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let mut table = WeightTable::new();
        let mut unknown = Vec::new();
        for (key, value) in entries {
            match key.parse::<Combination>() {
                Ok(combination) => table.add(combination, value),
                Err(_) => unknown.push(key.to_string()),
            }
        }
        (table, unknown)
    }
}

impl FromIterator<(Combination, i64)> for WeightTable {
    fn from_iter<T: IntoIterator<Item = (Combination, i64)>>(iter: T) -> Self {
        let mut table = WeightTable::new();
        for (combination, value) in iter {
            table.add(combination, value);
        }
        table
    }
}

impl Serialize for WeightTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Combination::COUNT))?;
        for (combination, value) in self.iter() {
            map.serialize_entry(combination.key(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WeightTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, i64>::deserialize(deserializer)?;
        let (table, unknown) = WeightTable::from_loose(raw.iter().map(|(k, v)| (k.as_str(), *v)));
        if !unknown.is_empty() {
            tracing::warn!("Ignoring weights for unknown combinations: {:?}", unknown);
        }
        Ok(table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Specialty {
    pub code: String,
    pub title: String,
}

/// Guidance attached to a combination.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CombinationMeta {
    pub key: Combination,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub careers: Vec<String>,
    #[serde(default)]
    pub faculties: Vec<String>,
    #[serde(default)]
    pub specialties: Vec<Specialty>,
    #[serde(default, rename = "best_specialty")]
    pub declared_best_specialty: Option<Specialty>,
}

impl CombinationMeta {
    /// The declared best specialty, falling back to the first listed one.
    pub fn best_specialty(&self) -> Option<&Specialty> {
        self.declared_best_specialty
            .as_ref()
            .or_else(|| self.specialties.first())
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Parse(serde_json::Error),
    Duplicate(Combination),
    Missing(Combination),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Parse(err) => write!(f, "invalid catalog data: {}", err),
            CatalogError::Duplicate(c) => write!(f, "combination '{}' is listed twice", c),
            CatalogError::Missing(c) => write!(f, "combination '{}' has no catalog entry", c),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Immutable lookup table of combination metadata, one entry per [`Combination`].
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CombinationMeta>,
}

impl Catalog {
    /// Loads the catalog bundled with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let parsed: Vec<CombinationMeta> = serde_json::from_str(raw).map_err(CatalogError::Parse)?;

        let mut by_key = BTreeMap::new();
        for meta in parsed {
            let key = meta.key;
            if by_key.insert(key, meta).is_some() {
                return Err(CatalogError::Duplicate(key));
            }
        }

        let mut entries = Vec::with_capacity(Combination::COUNT);
        for combination in Combination::ALL {
            let meta = by_key
                .remove(&combination)
                .ok_or(CatalogError::Missing(combination))?;
            entries.push(meta);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, combination: Combination) -> &CombinationMeta {
        &self.entries[combination.index()]
    }

    pub fn all_keys(&self) -> impl Iterator<Item = Combination> {
        Combination::ALL.into_iter()
    }

    pub fn entries(&self) -> &[CombinationMeta] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_covers_every_combination() {
        let catalog = Catalog::builtin().expect("bundled catalog must parse");
        assert_eq!(catalog.entries().len(), Combination::COUNT);
        for combination in catalog.all_keys() {
            assert_eq!(catalog.get(combination).key, combination);
        }
        assert_eq!(catalog.get(Combination::MathInf).title, "Математика – Информатика");
    }

    #[test]
    fn loose_keys_resolve_through_parsing() {
        let catalog = Catalog::builtin().unwrap();
        let geo_hist: Combination = "geo_hist".parse().unwrap();
        assert_eq!(catalog.get(geo_hist).key, Combination::GeoHist);
        assert!("astrology".parse::<Combination>().is_err());
    }

    #[test]
    fn best_specialty_falls_back_to_first() {
        let meta = CombinationMeta {
            key: Combination::HistLaw,
            title: "t".into(),
            description: "d".into(),
            careers: vec![],
            faculties: vec![],
            specialties: vec![Specialty { code: "B049".into(), title: "Law".into() }],
            declared_best_specialty: None,
        };
        assert_eq!(meta.best_specialty().map(|s| s.code.as_str()), Some("B049"));
    }

    #[test]
    fn missing_entry_is_reported() {
        let raw = r#"[{"key": "math_inf", "title": "x", "description": "y"}]"#;
        match Catalog::from_json(raw) {
            Err(CatalogError::Missing(Combination::MathPhys)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn weight_table_drops_unknown_keys() {
        let table: WeightTable =
            serde_json::from_str(r#"{"math_inf": 3, "geo_hist": 2, "astrology": 9}"#).unwrap();
        assert_eq!(table.get(Combination::MathInf), 3);
        assert_eq!(table.get(Combination::GeoHist), 2);
        assert_eq!(table.total(), 5);
    }

    #[test]
    fn weight_table_serializes_every_key() {
        let table: WeightTable = [(Combination::Creative, 4)].into_iter().collect();
        let value = serde_json::to_value(table).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), Combination::COUNT);
        assert_eq!(object["creative"], 4);
        assert_eq!(object["math_inf"], 0);
    }

    #[test]
    fn enum_keys_round_trip_through_from_str() {
        for combination in Combination::ALL {
            assert_eq!(combination.key().parse::<Combination>(), Ok(combination));
        }
    }
}
