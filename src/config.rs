use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How several cells of one (student, course, month) fold into the monthly grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MonthlyMerge {
    /// Each new cell mean is averaged 50/50 with the month so far. Earlier cells end up
    /// weighted less; kept because printed report cards were produced this way.
    #[default]
    Pairwise,
    RunningMean,
}

/// Which record survives when several share a (student, day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DedupOrder {
    FirstEncountered,
    #[default]
    LowestTimeSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RankPolicy {
    /// Ties get distinct consecutive ranks in cohort order: [18, 18, 12] -> 1, 2, 3.
    #[default]
    Sequential,
    /// Standard competition ranking: [18, 18, 12] -> 1, 1, 3.
    Competition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub monthly_merge: MonthlyMerge,
    pub dedup_order: DedupOrder,
    pub rank_policy: RankPolicy,
}

pub const ENGINE_SETTINGS_KEY: &str = "setup.engine";

fn parse_choice<T: Copy>(v: &Value, key: &str, choices: &[(&str, T)]) -> Result<T, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be string", key))?
        .trim();
    choices
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(s))
        .map(|(_, value)| *value)
        .ok_or_else(|| {
            let names: Vec<&str> = choices.iter().map(|(n, _)| *n).collect();
            format!("{} must be one of: {}", key, names.join(", "))
        })
}

impl EngineConfig {
    pub fn to_json(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Validates and applies a partial update. Unknown keys are rejected.
    pub fn merge_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            match k.as_str() {
                "monthlyMerge" => {
                    self.monthly_merge = parse_choice(
                        v,
                        k,
                        &[
                            ("pairwise", MonthlyMerge::Pairwise),
                            ("runningMean", MonthlyMerge::RunningMean),
                        ],
                    )?;
                }
                "dedupOrder" => {
                    self.dedup_order = parse_choice(
                        v,
                        k,
                        &[
                            ("firstEncountered", DedupOrder::FirstEncountered),
                            ("lowestTimeSlot", DedupOrder::LowestTimeSlot),
                        ],
                    )?;
                }
                "rankPolicy" => {
                    self.rank_policy = parse_choice(
                        v,
                        k,
                        &[
                            ("sequential", RankPolicy::Sequential),
                            ("competition", RankPolicy::Competition),
                        ],
                    )?;
                }
                _ => return Err(format!("unknown engine field: {}", k)),
            }
        }
        Ok(())
    }

    /// Best-effort load of a saved value: malformed historical fields keep their defaults.
    pub fn from_saved(saved: Option<&Value>) -> Self {
        let mut cfg = Self::default();
        if let Some(obj) = saved.and_then(|v| v.as_object()) {
            for (k, v) in obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                let _ = cfg.merge_patch(&single);
            }
        }
        cfg
    }
}
