//! Score an ideal Archimedean spiral against a flat population table

use serde_json::{json, Map, Value};
use spiral_tremor::{Metric, PopulationStats, ScoringConfig, SpiralScorer, SpiralTemplate};
use std::f64::consts::PI;

fn main() {
    let points: Vec<Value> = (0..300)
        .map(|i| {
            let theta = 6.0 * PI * i as f64 / 299.0;
            json!({
                "x": 1.2 * theta * theta.cos(),
                "y": 1.2 * theta * theta.sin(),
                "t_ms": 8.0 * i as f64,
            })
        })
        .collect();
    let trial = json!({ "data": { "points": points } });

    let mut table = Map::new();
    for metric in Metric::ALL {
        table.insert(PopulationStats::mean_key(metric), json!(0.0));
        table.insert(PopulationStats::std_key(metric), json!(1.0));
    }

    let scorer = SpiralScorer::with_config(ScoringConfig {
        include_image: false,
        ..ScoringConfig::default()
    });

    let result = PopulationStats::from_value(&Value::Object(table))
        .and_then(|stats| scorer.score(&trial, SpiralTemplate::new(0.0, 1.2), &stats))
        .and_then(|artifact| Ok(serde_json::to_string_pretty(&artifact)?));

    match result {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
