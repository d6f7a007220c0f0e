//! Creature records and the explicit partial-update type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::normalization::{canonical_name, FlatPaths};

/// Placeholder stored in `image` until an asset is attached.
pub const UNKNOWN_IMAGE: &str = "unknown.png";
/// Type assigned to records created without one.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Localized names. `french` is the canonical lookup key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureName {
    pub french: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub japanese: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chinese: Option<String>,
}

/// One of the six base stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stat {
    Hp,
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
}

impl Stat {
    pub const ALL: [Stat; 6] = [
        Stat::Hp,
        Stat::Attack,
        Stat::Defense,
        Stat::SpecialAttack,
        Stat::SpecialDefense,
        Stat::Speed,
    ];

    /// Key used on the wire, under `base`.
    pub fn key(self) -> &'static str {
        match self {
            Stat::Hp => "HP",
            Stat::Attack => "Attack",
            Stat::Defense => "Defense",
            Stat::SpecialAttack => "SpecialAttack",
            Stat::SpecialDefense => "SpecialDefense",
            Stat::Speed => "Speed",
        }
    }

    /// Storage column.
    pub fn column(self) -> &'static str {
        match self {
            Stat::Hp => "hp",
            Stat::Attack => "attack",
            Stat::Defense => "defense",
            Stat::SpecialAttack => "special_attack",
            Stat::SpecialDefense => "special_defense",
            Stat::Speed => "speed",
        }
    }

    /// Resolve a wire key, accepting the pokedex-style `"Sp. Attack"` spellings.
    pub fn from_key(key: &str) -> Option<Stat> {
        match key {
            "HP" => Some(Stat::Hp),
            "Attack" => Some(Stat::Attack),
            "Defense" => Some(Stat::Defense),
            "SpecialAttack" | "Sp. Attack" => Some(Stat::SpecialAttack),
            "SpecialDefense" | "Sp. Defense" => Some(Stat::SpecialDefense),
            "Speed" => Some(Stat::Speed),
            _ => None,
        }
    }
}

/// Base stats; every key is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    #[serde(rename = "HP", default)]
    pub hp: i64,
    #[serde(rename = "Attack", default)]
    pub attack: i64,
    #[serde(rename = "Defense", default)]
    pub defense: i64,
    #[serde(rename = "SpecialAttack", alias = "Sp. Attack", default)]
    pub special_attack: i64,
    #[serde(rename = "SpecialDefense", alias = "Sp. Defense", default)]
    pub special_defense: i64,
    #[serde(rename = "Speed", default)]
    pub speed: i64,
}

impl BaseStats {
    pub fn set(&mut self, stat: Stat, value: i64) {
        match stat {
            Stat::Hp => self.hp = value,
            Stat::Attack => self.attack = value,
            Stat::Defense => self.defense = value,
            Stat::SpecialAttack => self.special_attack = value,
            Stat::SpecialDefense => self.special_defense = value,
            Stat::Speed => self.speed = value,
        }
    }

    /// Build stats from an arbitrary JSON value; missing or unusable entries are 0.
    pub fn from_loose(value: &Value) -> Self {
        let mut stats = BaseStats::default();
        if let Value::Object(map) = value {
            for (key, raw) in map {
                if let (Some(stat), Some(n)) = (Stat::from_key(key), loose_i64(raw)) {
                    stats.set(stat, n);
                }
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureRecord {
    pub id: i64,
    pub name: CreatureName,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub base: BaseStats,
    pub image: String,
}

/// Interpret a JSON value as an integer stat: numbers (truncated) or numeric strings.
pub fn loose_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Decode a `type` field that arrived as a string (multipart forms, legacy clients).
///
/// Tries a JSON array first, then falls back to splitting on commas.
pub fn decode_types(raw: &str) -> Vec<String> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list;
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode a `base` field that arrived as a string. Garbage becomes an empty object.
pub fn decode_base(raw: &str) -> Map<String, Value> {
    serde_json::from_str::<Map<String, Value>>(raw).unwrap_or_default()
}

/// Coerce a `type` value into a non-empty list of type names.
pub fn types_from_value(value: &Value) -> Option<Vec<String>> {
    let list = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => decode_types(s),
        _ => return None,
    };
    Some(with_unknown_fallback(list))
}

fn with_unknown_fallback(list: Vec<String>) -> Vec<String> {
    if list.is_empty() {
        vec![UNKNOWN_TYPE.to_string()]
    } else {
        list
    }
}

/// Explicit partial update. Only known attribute paths can be expressed, so an
/// arbitrary client payload can never touch `id` or invent new columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreaturePatch {
    pub name_french: Option<String>,
    pub name_english: Option<String>,
    pub name_japanese: Option<String>,
    pub name_chinese: Option<String>,
    pub types: Option<Vec<String>>,
    pub stats: BTreeMap<Stat, i64>,
    pub image: Option<String>,
}

impl CreaturePatch {
    /// Build a patch from flattened paths. Returns the patch together with the
    /// paths that were not recognised (or carried an unusable value).
    pub fn from_paths(paths: &FlatPaths) -> (Self, Vec<String>) {
        let mut patch = CreaturePatch::default();
        let mut ignored = Vec::new();

        for (path, value) in paths {
            let accepted = match path.as_str() {
                "name.french" => value
                    .as_str()
                    .map(canonical_name)
                    .filter(|s| !s.is_empty())
                    .map(|v| patch.name_french = Some(v))
                    .is_some(),
                "name.english" => set_text(&mut patch.name_english, value),
                "name.japanese" => set_text(&mut patch.name_japanese, value),
                "name.chinese" => set_text(&mut patch.name_chinese, value),
                "type" => types_from_value(value)
                    .map(|v| patch.types = Some(v))
                    .is_some(),
                "image" => set_text(&mut patch.image, value),
                other => match other.strip_prefix("base.").and_then(Stat::from_key) {
                    Some(stat) => loose_i64(value)
                        .map(|n| patch.stats.insert(stat, n))
                        .is_some(),
                    None => false,
                },
            };
            if !accepted {
                ignored.push(path.clone());
            }
        }

        (patch, ignored)
    }

    pub fn is_empty(&self) -> bool {
        self == &CreaturePatch::default()
    }

    /// Apply the patch to an in-memory record.
    pub fn apply_to(&self, record: &mut CreatureRecord) {
        if let Some(v) = &self.name_french {
            record.name.french = v.clone();
        }
        if let Some(v) = &self.name_english {
            record.name.english = Some(v.clone());
        }
        if let Some(v) = &self.name_japanese {
            record.name.japanese = Some(v.clone());
        }
        if let Some(v) = &self.name_chinese {
            record.name.chinese = Some(v.clone());
        }
        if let Some(v) = &self.types {
            record.types = v.clone();
        }
        for (stat, value) in &self.stats {
            record.base.set(*stat, *value);
        }
        if let Some(v) = &self.image {
            record.image = v.clone();
        }
    }
}

fn set_text(slot: &mut Option<String>, value: &Value) -> bool {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            *slot = Some(s.trim().to_string());
            true
        }
        _ => false,
    }
}
