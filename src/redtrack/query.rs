use crate::{Error, ErrorContext, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";

static API_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{8,128}$").expect("static API key pattern compiles")
});

/// Validated report parameters shared by every upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub api_key: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub campaign_id: Option<String>,
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub per: Option<u32>,
}

impl ReportQuery {
    /// Validate raw query values. Every failure is a [`Error::Validation`]
    /// whose context names the offending field.
    pub fn parse(api_key: &str, date_from: &str, date_to: &str) -> Result<Self> {
        if !API_KEY_PATTERN.is_match(api_key) {
            return Err(Error::validation_with_context(
                "API key is malformed",
                ErrorContext::new()
                    .with_field_path("api_key")
                    .with_details("expected 8-128 characters of [A-Za-z0-9_-]")
                    .with_source("report_query"),
            ));
        }

        let date_from = parse_date("date_from", date_from)?;
        let date_to = parse_date("date_to", date_to)?;
        if date_from > date_to {
            return Err(Error::validation_with_context(
                "date_from must not be after date_to",
                ErrorContext::new()
                    .with_field_path("date_from")
                    .with_details(format!("{date_from} > {date_to}"))
                    .with_source("report_query"),
            ));
        }

        Ok(Self {
            api_key: api_key.to_string(),
            date_from,
            date_to,
            campaign_id: None,
            status: None,
            event_type: None,
            per: None,
        })
    }

    pub fn with_campaign_id(mut self, campaign_id: Option<String>) -> Self {
        self.campaign_id = campaign_id.filter(|c| !c.is_empty());
        self
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status.filter(|s| !s.is_empty());
        self
    }

    pub fn with_event_type(mut self, event_type: Option<String>) -> Self {
        self.event_type = event_type.filter(|t| !t.is_empty());
        self
    }

    pub fn with_per(mut self, per: Option<u32>) -> Self {
        self.per = per.filter(|p| *p > 0);
        self
    }

    /// Every parameter that distinguishes one cached response from another.
    pub fn cache_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("date_from", self.date_from.format(DATE_FORMAT).to_string()),
            ("date_to", self.date_to.format(DATE_FORMAT).to_string()),
        ];
        if let Some(ref c) = self.campaign_id {
            params.push(("campaign_id", c.clone()));
        }
        if let Some(ref s) = self.status {
            params.push(("status", s.clone()));
        }
        if let Some(ref t) = self.event_type {
            params.push(("type", t.clone()));
        }
        if let Some(p) = self.per {
            params.push(("per", p.to_string()));
        }
        params
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .filter(|_| raw.len() == 10)
        .ok_or_else(|| {
            Error::validation_with_context(
                format!("{field} must be a YYYY-MM-DD date"),
                ErrorContext::new()
                    .with_field_path(field)
                    .with_details(format!("got {raw:?}"))
                    .with_source("report_query"),
            )
        })
}
