//! Shared fixtures: a scripted transport and INE-shaped payloads.
#![allow(dead_code)]

use ine_rs::{Error, HttpResponse, Result, Transport};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "http://ine.test";

#[derive(Debug, Clone)]
pub enum Reply {
    Http(HttpResponse),
    Timeout,
}

#[derive(Debug, Default)]
struct State {
    routes: Vec<(String, VecDeque<Reply>)>,
    calls: Vec<(String, Vec<(String, String)>)>,
}

/// Answers by endpoint path. Queued replies are consumed in order; the last
/// one repeats. Unknown endpoints answer 404.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, endpoint: &str, reply: Reply) -> &Self {
        let mut st = self.state.lock().unwrap();
        match st.routes.iter_mut().find(|(e, _)| e == endpoint) {
            Some((_, q)) => q.push_back(reply),
            None => st.routes.push((endpoint.to_string(), VecDeque::from([reply]))),
        }
        self
    }

    pub fn json(&self, endpoint: &str, body: Value) -> &Self {
        self.reply(endpoint, Reply::Http(HttpResponse::ok(body.to_string())))
    }

    pub fn status(&self, endpoint: &str, status: u16, body: &str) -> &Self {
        self.reply(endpoint, Reply::Http(HttpResponse::new(status, body)))
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Vec<(String, String)>> {
        self.calls()
            .into_iter()
            .filter(|(url, _)| url.ends_with(endpoint))
            .map(|(_, q)| q)
            .collect()
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        let mut st = self.state.lock().unwrap();
        st.calls.push((url.to_string(), query.to_vec()));
        let reply = st
            .routes
            .iter_mut()
            .find(|(e, _)| url.ends_with(e.as_str()))
            .and_then(|(_, q)| if q.len() > 1 { q.pop_front() } else { q.front().cloned() });
        match reply {
            Some(Reply::Http(resp)) => Ok(resp),
            Some(Reply::Timeout) => Err(Error::Timeout("operation timed out".into())),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}

pub fn param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Wrapper payload with points nested by period, as the data endpoint returns it.
pub fn wrapped_payload(code: &str, points: Vec<Value>) -> Value {
    json!([{
        "IndicadorCod": code,
        "IndicadorDsg": "Resident population",
        "UnidadeMedida": "No.",
        "Lingua": "EN",
        "DataExtracao": "2024-06-14T10:00:00",
        "Dados": { "2020": points }
    }])
}

/// `n` points with periods starting at `first_year`.
pub fn points(n: usize, first_year: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "geocod": "PT",
                "geodsg": "Portugal",
                "Period": (first_year + i).to_string(),
                "valor": format!("{}", 100 + i),
                "_internal": true
            })
        })
        .collect()
}

pub fn metadata_payload(code: &str) -> Value {
    json!([{
        "IndicadorCod": code,
        "IndicadorNome": "Resident population",
        "Lingua": "EN",
        "UnidadeMedida": "No.",
        "Dimensoes": [
            {
                "dim_num": "1",
                "abrv": "Data reference period",
                "valores": [
                    {"cat_id": "S7A2020", "categ_dsg": "2020"},
                    {"cat_id": "S7A2021", "categ_dsg": "2021"}
                ]
            },
            {
                "dim_num": "2",
                "abrv": "Place of residence",
                "valores": [
                    {"cat_id": "PT", "categ_dsg": "Portugal"},
                    {"cat_id": "1", "categ_dsg": "Continente"}
                ]
            }
        ]
    }])
}

pub const CATALOGUE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog>
    <indicator id="0004167">
        <theme>Population</theme>
        <subtheme>Demographic estimates</subtheme>
        <keywords>INE,population,residents,demographics</keywords>
        <title>Resident population</title>
        <varcd>0004167</varcd>
        <description>Resident population (No.) by Place of residence (NUTS - 2013); Annual</description>
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
    <indicator id="0008074">
        <theme>Population</theme>
        <subtheme>Demographic estimates</subtheme>
        <keywords>INE,population,sex,age</keywords>
        <title>Resident population by sex and age group</title>
        <varcd>0008074</varcd>
        <periodicity>Annual</periodicity>
    </indicator>
</catalog>
"#;
