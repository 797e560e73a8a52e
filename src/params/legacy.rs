use serde::{Deserialize, Serialize};

use super::ParamMap;

/// Rewrite rule for a retired parameter key.
///
/// Old links carried one raw value per repeated key (`tag=a&tag=b`); the
/// current form is a single comma-delimited, percent-encoded key
/// (`tags=a,b`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyKey {
    pub from: String,
    pub to: String,
}

impl LegacyKey {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Translate legacy keys into their current multi-value form.
///
/// Meant to run once on first load, before any container binds to the
/// store. Values already present under the target key are kept first.
pub fn forward_legacy_params(params: &ParamMap, rules: &[LegacyKey]) -> ParamMap {
    let mut forwarded = params.clone();
    for rule in rules {
        let Some(legacy) = forwarded.remove(&rule.from) else {
            continue;
        };

        let mut values: Vec<String> = forwarded
            .get_str(&rule.to)
            .filter(|existing| !existing.is_empty())
            .map(|existing| existing.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        for value in legacy.values() {
            let encoded = urlencoding::encode(value).into_owned();
            if !values.contains(&encoded) {
                values.push(encoded);
            }
        }

        tracing::warn!(from = %rule.from, to = %rule.to, count = values.len(), "forwarding legacy parameter");
        forwarded.insert(rule.to.clone(), values.join(","));
    }
    forwarded
}
