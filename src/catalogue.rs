//! Indicator catalogue: XML parsing plus local search helpers.

use crate::error::{Error, Result};
use crate::models::Indicator;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LOG_TARGET: &str = "ine_rs::catalogue";

#[derive(Debug, Default, Deserialize)]
struct RawCatalogue {
    #[serde(rename = "indicator", default)]
    indicators: Vec<RawIndicator>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIndicator {
    #[serde(rename = "@id")]
    id: Option<String>,
    varcd: Option<String>,
    title: Option<String>,
    description: Option<String>,
    theme: Option<String>,
    subtheme: Option<String>,
    keywords: Option<String>,
    periodicity: Option<String>,
    source: Option<String>,
    geo_lastlevel: Option<String>,
    dates: RawDates,
    html: RawHtml,
    json: RawJson,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDates {
    last_period_available: Option<String>,
    last_update: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHtml {
    bdd_url: Option<String>,
    metainfo_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawJson {
    json_dataset: Option<String>,
    json_metainfo: Option<String>,
}

fn clean(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawIndicator {
    fn into_indicator(self) -> Option<Indicator> {
        let code = clean(self.varcd).or_else(|| clean(self.id))?;
        let last_update = clean(self.dates.last_update).and_then(|d| {
            NaiveDate::parse_from_str(&d, "%d-%m-%Y")
                .inspect_err(|e| {
                    log::debug!(target: LOG_TARGET, "Unparseable last_update '{d}' for {code}: {e}")
                })
                .ok()
        });
        let keywords = clean(self.keywords)
            .map(|k| {
                k.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Some(Indicator {
            title: clean(self.title).unwrap_or_default(),
            description: clean(self.description),
            theme: clean(self.theme),
            subtheme: clean(self.subtheme),
            keywords,
            periodicity: clean(self.periodicity),
            last_period: clean(self.dates.last_period_available),
            last_update,
            geo_last_level: clean(self.geo_lastlevel),
            source: clean(self.source),
            html_url: clean(self.html.bdd_url),
            metadata_url: clean(self.html.metainfo_url),
            data_url: clean(self.json.json_dataset),
            metadata_json_url: clean(self.json.json_metainfo),
            code,
        })
    }
}

/// Parse a catalogue document into indicators, in document order.
/// Entries without a code are skipped.
pub fn parse_catalogue(xml: &str) -> Result<Vec<Indicator>> {
    let raw: RawCatalogue = quick_xml::de::from_str(xml).map_err(|e| Error::Decode {
        format: "xml",
        message: format!("Invalid XML response: {e}"),
    })?;
    let total = raw.indicators.len();
    let indicators: Vec<Indicator> = raw
        .indicators
        .into_iter()
        .filter_map(RawIndicator::into_indicator)
        .collect();
    if indicators.len() < total {
        log::warn!(
            target: LOG_TARGET,
            "Skipped {} catalogue entries without an indicator code",
            total - indicators.len()
        );
    }
    log::debug!(target: LOG_TARGET, "Parsed {} indicators from catalogue", indicators.len());
    Ok(indicators)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn eq_ci(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| a.trim().to_lowercase() == b.trim().to_lowercase())
}

/// Case-insensitive substring search over title, description and keywords,
/// optionally narrowed to a theme and subtheme. An empty query matches all.
pub fn search<'a>(
    indicators: &'a [Indicator],
    query: &str,
    theme: Option<&str>,
    subtheme: Option<&str>,
) -> Vec<&'a Indicator> {
    let needle = query.trim().to_lowercase();
    indicators
        .iter()
        .filter(|ind| theme.is_none_or(|t| eq_ci(ind.theme.as_deref(), t)))
        .filter(|ind| subtheme.is_none_or(|s| eq_ci(ind.subtheme.as_deref(), s)))
        .filter(|ind| {
            needle.is_empty()
                || contains_ci(&ind.title, &needle)
                || ind
                    .description
                    .as_deref()
                    .is_some_and(|d| contains_ci(d, &needle))
                || ind.keywords.iter().any(|k| contains_ci(k, &needle))
        })
        .collect()
}

/// A theme and how many indicators carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeCount {
    pub theme: String,
    pub indicators: usize,
    pub subthemes: Vec<String>,
}

/// Distinct themes, sorted by name, with indicator counts and their subthemes.
pub fn list_themes(indicators: &[Indicator]) -> Vec<ThemeCount> {
    let mut by_theme: BTreeMap<&str, (usize, Vec<&str>)> = BTreeMap::new();
    for ind in indicators {
        let Some(theme) = ind.theme.as_deref() else {
            continue;
        };
        let entry = by_theme.entry(theme).or_default();
        entry.0 += 1;
        if let Some(sub) = ind.subtheme.as_deref()
            && !entry.1.contains(&sub)
        {
            entry.1.push(sub);
        }
    }
    by_theme
        .into_iter()
        .map(|(theme, (count, mut subs))| {
            subs.sort_unstable();
            ThemeCount {
                theme: theme.to_string(),
                indicators: count,
                subthemes: subs.into_iter().map(String::from).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog>
    <indicator id="0004167">
        <theme>Population</theme>
        <subtheme>Demographic estimates</subtheme>
        <keywords>INE,population, residents</keywords>
        <title>Resident population</title>
        <varcd>0004167</varcd>
        <description>Resident population (No.) by Place of residence; Annual</description>
        <geo_lastlevel>Municipality</geo_lastlevel>
        <source>INE, Population estimates</source>
        <dates>
            <last_period_available>2023</last_period_available>
            <last_update>14-06-2024</last_update>
        </dates>
        <periodicity>Annual</periodicity>
        <html>
            <bdd_url>https://www.ine.pt/xurl/indx/0004167/EN</bdd_url>
            <metainfo_url>https://www.ine.pt/xurl/metax/0004167/EN</metainfo_url>
        </html>
        <json>
            <json_dataset>https://www.ine.pt/ine/json_indicador/pindica.jsp?op=2&amp;varcd=0004167&amp;lang=EN</json_dataset>
            <json_metainfo>https://www.ine.pt/ine/json_indicador/pindicaMeta.jsp?varcd=0004167&amp;lang=EN</json_metainfo>
        </json>
    </indicator>
    <indicator id="0010003">
        <theme>Labour market</theme>
        <subtheme>Unemployment</subtheme>
        <title>Unemployment rate</title>
        <varcd>0010003</varcd>
        <dates>
            <last_update>not a date</last_update>
        </dates>
    </indicator>
</catalog>
"#;

    #[test]
    fn parses_all_fields() {
        let inds = parse_catalogue(SAMPLE).unwrap();
        assert_eq!(inds.len(), 2);
        let pop = &inds[0];
        assert_eq!(pop.code, "0004167");
        assert_eq!(pop.theme.as_deref(), Some("Population"));
        assert_eq!(pop.keywords, vec!["INE", "population", "residents"]);
        assert_eq!(pop.last_period.as_deref(), Some("2023"));
        assert_eq!(pop.last_update, NaiveDate::from_ymd_opt(2024, 6, 14));
        assert_eq!(pop.geo_last_level.as_deref(), Some("Municipality"));
        assert!(pop.data_url.as_deref().unwrap().contains("op=2&varcd=0004167"));
        assert!(pop.metadata_url.is_some());

        let unemp = &inds[1];
        assert_eq!(unemp.last_update, None);
        assert!(unemp.keywords.is_empty());
        assert_eq!(unemp.description, None);
    }

    #[test]
    fn empty_dataset_yields_no_indicators() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<diffgr:diffgram xmlns:diffgr="urn:schemas-microsoft-com:xml-diffgram-v1">
    <NewDataSet xmlns=""></NewDataSet>
</diffgr:diffgram>"#;
        assert!(parse_catalogue(xml).unwrap().is_empty());
    }

    #[test]
    fn malformed_xml_is_a_decode_error() {
        assert!(matches!(
            parse_catalogue("<broken><xml"),
            Err(Error::Decode { format: "xml", .. })
        ));
    }

    #[test]
    fn search_matches_title_description_and_keywords() {
        let inds = parse_catalogue(SAMPLE).unwrap();
        assert_eq!(search(&inds, "POPULATION", None, None).len(), 1);
        assert_eq!(search(&inds, "residents", None, None).len(), 1);
        assert_eq!(search(&inds, "rate", None, None)[0].code, "0010003");
        assert_eq!(search(&inds, "", Some("labour market"), None).len(), 1);
        assert!(search(&inds, "population", Some("Labour market"), None).is_empty());
        assert_eq!(
            search(&inds, "", None, Some("Demographic estimates"))[0].code,
            "0004167"
        );
    }

    #[test]
    fn themes_are_sorted_with_counts() {
        let inds = parse_catalogue(SAMPLE).unwrap();
        let themes = list_themes(&inds);
        assert_eq!(themes.len(), 2);
        assert_eq!(themes[0].theme, "Labour market");
        assert_eq!(themes[1].theme, "Population");
        assert_eq!(themes[1].indicators, 1);
        assert_eq!(themes[1].subthemes, vec!["Demographic estimates"]);
    }
}
