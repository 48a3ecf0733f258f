use super::projector::FunnelInput;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

type Extractor = Arc<dyn Fn(&FunnelInput<'_>) -> u64 + Send + Sync>;

/// One candidate stage: a name plus the aggregate that measures it.
#[derive(Clone)]
pub struct StageDefinition {
    pub name: String,
    pub description: String,
    extractor: Extractor,
}

impl StageDefinition {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&FunnelInput<'_>) -> u64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            extractor: Arc::new(extractor),
        }
    }

    pub fn measure(&self, input: &FunnelInput<'_>) -> u64 {
        (self.extractor)(input)
    }
}

impl fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub name: String,
    pub value: u64,
    pub percentage: f64,
    pub description: String,
}

/// Sum that pins at `u64::MAX`; upstream counters are not trusted to stay small.
pub(crate) fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

/// Clicks, Pre-LP, LP, Offer, InitiateCheckout, Conversion.
pub fn default_stages() -> Vec<StageDefinition> {
    vec![
        StageDefinition::new("Clicks", "Total tracked clicks", |input| input.total_clicks()),
        StageDefinition::new("Pre-LP", "Pre-landing page views", |input| {
            saturating_sum(input.conversions.iter().map(|c| c.prelp_views))
        }),
        StageDefinition::new("LP", "Landing page views", |input| {
            saturating_sum(input.conversions.iter().map(|c| c.lp_views))
        }),
        StageDefinition::new("Offer", "Offer page views", |input| {
            saturating_sum(input.conversions.iter().map(|c| c.offer_views))
        }),
        StageDefinition::new("InitiateCheckout", "Checkouts started", |input| {
            input
                .conversions
                .iter()
                .filter(|c| c.is_type("initiatecheckout"))
                .count() as u64
        }),
        StageDefinition::new("Conversion", "Approved conversions", |input| {
            input
                .conversions
                .iter()
                .filter(|c| c.is_type("conversion") && c.is_approved())
                .count() as u64
        }),
    ]
}
