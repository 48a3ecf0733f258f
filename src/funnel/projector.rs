use super::events::{ConversionEvent, TrackEvent};
use super::stage::{default_stages, saturating_sum, FunnelStage, StageDefinition};
use serde::{Deserialize, Serialize};

/// Borrowed view over the two upstream result sets.
#[derive(Debug, Clone, Copy)]
pub struct FunnelInput<'a> {
    pub conversions: &'a [ConversionEvent],
    pub tracks: &'a [TrackEvent],
}

impl<'a> FunnelInput<'a> {
    pub fn new(conversions: &'a [ConversionEvent], tracks: &'a [TrackEvent]) -> Self {
        Self {
            conversions,
            tracks,
        }
    }

    pub fn total_clicks(&self) -> u64 {
        saturating_sum(self.tracks.iter().map(|t| t.clicks))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelResult {
    pub stages: Vec<FunnelStage>,
    pub total_volume: u64,
    pub total_conversion_rate: f64,
    pub total_stages: usize,
}

/// Pure projection of conversions and tracks into funnel stages.
#[derive(Debug, Clone)]
pub struct FunnelProjector {
    stages: Vec<StageDefinition>,
}

impl FunnelProjector {
    pub fn new(stages: Vec<StageDefinition>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn project(&self, conversions: &[ConversionEvent], tracks: &[TrackEvent]) -> FunnelResult {
        self.project_input(&FunnelInput::new(conversions, tracks))
    }

    pub fn project_input(&self, input: &FunnelInput<'_>) -> FunnelResult {
        let total_clicks = input.total_clicks();
        let mut stages: Vec<FunnelStage> = Vec::with_capacity(self.stages.len());

        for (position, def) in self.stages.iter().enumerate() {
            let value = def.measure(input);
            if value == 0 {
                continue;
            }

            let percentage = match stages.last() {
                Some(prev) => percent(value, prev.value),
                None if position == 0 => 100.0,
                None => percent(value, total_clicks),
            };

            stages.push(FunnelStage {
                name: def.name.clone(),
                value,
                percentage,
                description: def.description.clone(),
            });
        }

        let total_volume = stages.first().map(|s| s.value).unwrap_or(0);
        let total_conversion_rate = stages
            .last()
            .map(|s| percent(s.value, total_volume))
            .unwrap_or(0.0);

        FunnelResult {
            total_stages: stages.len(),
            stages,
            total_volume,
            total_conversion_rate,
        }
    }
}

impl Default for FunnelProjector {
    fn default() -> Self {
        Self::new(default_stages())
    }
}

fn percent(value: u64, baseline: u64) -> f64 {
    if baseline == 0 {
        0.0
    } else {
        100.0 * value as f64 / baseline as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversion(event_type: &str, status: &str) -> ConversionEvent {
        ConversionEvent {
            event_type: event_type.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    /// Builds input whose default stages measure exactly `values`.
    fn input_for(values: [u64; 6]) -> (Vec<ConversionEvent>, Vec<TrackEvent>) {
        let [clicks, prelp, lp, offer, checkout, approved] = values;
        let tracks = vec![TrackEvent { clicks }];
        let mut conversions = vec![ConversionEvent {
            prelp_views: prelp,
            lp_views: lp,
            offer_views: offer,
            ..Default::default()
        }];
        conversions.extend((0..checkout).map(|_| conversion("initiatecheckout", "")));
        conversions.extend((0..approved).map(|_| conversion("conversion", "APPROVED")));
        (conversions, tracks)
    }

    fn summary(result: &FunnelResult) -> Vec<(&str, u64, f64)> {
        result
            .stages
            .iter()
            .map(|s| (s.name.as_str(), s.value, s.percentage))
            .collect()
    }

    #[test]
    fn test_zero_stages_are_skipped_and_baseline_looks_back() {
        let (conversions, tracks) = input_for([100, 0, 40, 0, 10, 5]);
        let result = FunnelProjector::default().project(&conversions, &tracks);

        assert_eq!(
            summary(&result),
            vec![
                ("Clicks", 100, 100.0),
                ("LP", 40, 40.0),
                ("InitiateCheckout", 10, 25.0),
                ("Conversion", 5, 50.0),
            ]
        );
        assert_eq!(result.total_volume, 100);
        assert_eq!(result.total_conversion_rate, 5.0);
        assert_eq!(result.total_stages, 4);
    }

    #[test]
    fn test_empty_input() {
        let result = FunnelProjector::default().project(&[], &[]);
        assert_eq!(result, FunnelResult::default());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "stages": [],
                "totalVolume": 0,
                "totalConversionRate": 0.0,
                "totalStages": 0
            })
        );
    }

    #[test]
    fn test_huge_counters_saturate() {
        let tracks: Vec<TrackEvent> =
            serde_json::from_value(json!([{ "clicks": "18446744073709551615" }, { "clicks": 1 }])).unwrap();
        let conversions: Vec<ConversionEvent> = serde_json::from_value(json!([
            { "type": "click", "lp_views": u64::MAX, "offer_views": u64::MAX },
            { "type": "click", "lp_views": 5, "offer_views": "7" }
        ]))
        .unwrap();

        let result = FunnelProjector::default().project(&conversions, &tracks);

        assert_eq!(
            summary(&result),
            vec![("Clicks", u64::MAX, 100.0), ("LP", u64::MAX, 100.0), ("Offer", u64::MAX, 100.0)]
        );
        assert_eq!(result.total_volume, u64::MAX);
        assert_eq!(result.total_conversion_rate, 100.0);
    }

    #[test]
    fn test_full_funnel() {
        let (conversions, tracks) = input_for([1000, 800, 400, 200, 50, 10]);
        let result = FunnelProjector::default().project(&conversions, &tracks);

        assert_eq!(
            summary(&result),
            vec![
                ("Clicks", 1000, 100.0),
                ("Pre-LP", 800, 80.0),
                ("LP", 400, 50.0),
                ("Offer", 200, 50.0),
                ("InitiateCheckout", 50, 25.0),
                ("Conversion", 10, 20.0),
            ]
        );
        assert_eq!(result.total_conversion_rate, 1.0);
    }

    #[test]
    fn test_missing_clicks_uses_zero_baseline() {
        let (conversions, tracks) = input_for([0, 0, 20, 0, 0, 4]);
        let result = FunnelProjector::default().project(&conversions, &tracks);

        assert_eq!(summary(&result), vec![("LP", 20, 0.0), ("Conversion", 4, 20.0)]);
        assert_eq!(result.total_volume, 20);
        assert_eq!(result.total_conversion_rate, 20.0);
    }

    #[test]
    fn test_unapproved_conversions_are_not_counted() {
        let tracks = vec![TrackEvent { clicks: 10 }];
        let conversions = vec![
            conversion("conversion", "PENDING"),
            conversion("Conversion", "approved"),
            conversion("lead", "APPROVED"),
        ];
        let result = FunnelProjector::default().project(&conversions, &tracks);

        assert_eq!(
            summary(&result),
            vec![("Clicks", 10, 100.0), ("Conversion", 1, 10.0)]
        );
    }

    #[test]
    fn test_custom_stage_definitions() {
        let projector = FunnelProjector::new(vec![
            StageDefinition::new("Visits", "", |_| 0),
            StageDefinition::new("Signups", "", |input| input.conversions.len() as u64),
            StageDefinition::new("Trials", "", |_| 0),
            StageDefinition::new("Paid", "", |_| 1),
        ]);
        let tracks = vec![TrackEvent { clicks: 8 }];
        let conversions = vec![ConversionEvent::default(); 4];

        let result = projector.project(&conversions, &tracks);

        assert_eq!(summary(&result), vec![("Signups", 4, 50.0), ("Paid", 1, 25.0)]);
        assert_eq!(result.total_volume, 4);
        assert_eq!(result.total_conversion_rate, 25.0);
    }
}
