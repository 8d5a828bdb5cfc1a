//! Builds the nested JSON view `Engine::snapshot()` exposes. Factored out
//! of `engine.rs` so the single accumulation pass (§4.4) stays in one
//! place and is easy to keep O(I).

use std::collections::HashMap;

use serde_json::{json, Map, Value as Json};
use streamta_data::Timeframe;

use crate::indicators::indicator_trait::{Indicator, IndicatorRequirement};

struct TimeframeBucket {
    by_type: HashMap<String, Map<String, Json>>,
    warmed_up: bool,
    bar_close_ts: Option<i64>,
}

impl TimeframeBucket {
    fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            warmed_up: true,
            bar_close_ts: None,
        }
    }

    fn into_json(self) -> Json {
        let mut map = Map::new();
        for (type_tag, indicators) in self.by_type {
            map.insert(type_tag, Json::Object(indicators));
        }
        map.insert("is_warmed_up".to_string(), json!(self.warmed_up));
        map.insert("bar_close_ts".to_string(), json!(self.bar_close_ts));
        Json::Object(map)
    }
}

/// One accumulation pass over every `(id, indicator)` pair: builds the
/// `by_type`/`by_timeframe` buckets and the overall warmup conjunction in
/// the same loop, then assembles the top-level metadata from already
/// collected data. Keeps `snapshot` at O(I).
pub fn build(
    requirements: &HashMap<String, IndicatorRequirement>,
    indicators: &HashMap<String, Box<dyn Indicator>>,
    last_bar_ts_by_timeframe: &HashMap<Timeframe, i64>,
    last_update_ms: Option<i64>,
) -> Json {
    let mut top_by_type: HashMap<String, Map<String, Json>> = HashMap::new();
    let mut buckets: HashMap<Timeframe, TimeframeBucket> = HashMap::new();
    let mut overall_warmed_up = true;

    for (id, requirement) in requirements {
        let Some(indicator) = indicators.get(id) else {
            continue;
        };
        let warmed = indicator.is_warmed_up();
        let json_value = indicator.value().to_json();

        overall_warmed_up &= warmed;

        top_by_type
            .entry(requirement.type_tag.clone())
            .or_default()
            .insert(id.clone(), json_value.clone());

        let bucket = buckets
            .entry(requirement.timeframe.clone())
            .or_insert_with(TimeframeBucket::new);
        bucket.warmed_up &= warmed;
        bucket
            .by_type
            .entry(requirement.type_tag.clone())
            .or_default()
            .insert(id.clone(), json_value);
    }

    for (tf, ts) in last_bar_ts_by_timeframe {
        buckets.entry(tf.clone()).or_insert_with(TimeframeBucket::new).bar_close_ts = Some(*ts);
    }

    let bar_close_ts = last_bar_ts_by_timeframe.values().copied().max();

    let mut top = Map::new();
    for (type_tag, indicators) in top_by_type {
        top.insert(type_tag, Json::Object(indicators));
    }
    top.insert("is_warmed_up".to_string(), json!(overall_warmed_up));
    top.insert("timestamp".to_string(), json!(last_update_ms));
    top.insert("bar_close_ts".to_string(), json!(bar_close_ts));

    let mut by_timeframe = Map::new();
    for (tf, bucket) in buckets {
        by_timeframe.insert(tf.as_str().to_string(), bucket.into_json());
    }
    top.insert("by_timeframe".to_string(), Json::Object(by_timeframe));

    Json::Object(top)
}
