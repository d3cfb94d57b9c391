//! search.rs
//!
//! Клиент поискового индекса рейсов. Говорит с Elasticsearch-совместимым
//! HTTP API: полная индексация документа, частичное обновление счётчика
//! свободных мест и поиск по аэропортам, дате и числу пассажиров.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::flight::error::FlightError;
use crate::flight::models::FlightDocument;

const INDEX_NAME: &str = "flights";

#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub from_airport: String,
    pub to_airport: String,
    pub date: NaiveDate,
    pub passenger_count: i64,
}

#[derive(Clone)]
pub struct SearchClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl SearchClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Создаёт индекс, если его ещё нет. Ответ 400 (resource_already_exists)
    /// не считается ошибкой.
    pub async fn ensure_index(&self) -> Result<(), FlightError> {
        let body = json!({
            "mappings": {
                "properties": {
                    "id":                { "type": "long" },
                    "departure_airport": { "type": "keyword" },
                    "arrival_airport":   { "type": "keyword" },
                    "departure_time":    { "type": "date" },
                    "price_minor_units": { "type": "long" },
                    "available_seats":   { "type": "long" }
                }
            }
        });

        let response = self
            .http_client
            .put(format!("{}/{}", self.base_url, INDEX_NAME))
            .json(&body)
            .send()
            .await
            .map_err(|e| FlightError::Search(e.to_string()))?;

        if response.status().is_success() || response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Ok(());
        }

        Err(FlightError::Search(format!(
            "create index failed: {}",
            response.status()
        )))
    }

    /// Индексирует полный документ рейса под его числовым id.
    pub async fn index_flight(&self, document: &FlightDocument) -> Result<(), FlightError> {
        let response = self
            .http_client
            .put(format!(
                "{}/{}/_doc/{}",
                self.base_url, INDEX_NAME, document.id
            ))
            .json(document)
            .send()
            .await
            .map_err(|e| FlightError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FlightError::Search(format!(
                "index request failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Частично обновляет документ: только счётчик свободных мест.
    pub async fn update_available_seats(
        &self,
        flight_id: i64,
        available_seats: i64,
    ) -> Result<(), FlightError> {
        let body = json!({ "doc": { "available_seats": available_seats } });

        let response = self
            .http_client
            .post(format!(
                "{}/{}/_update/{}",
                self.base_url, INDEX_NAME, flight_id
            ))
            .json(&body)
            .send()
            .await
            .map_err(|e| FlightError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FlightError::Search(format!(
                "update request failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Ищет рейсы: оба аэропорта, вылет в пределах суток от даты,
    /// свободных мест не меньше числа пассажиров, сортировка по цене.
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<FlightDocument>, FlightError> {
        let query = build_search_query(filter);

        let response = self
            .http_client
            .post(format!("{}/{}/_search", self.base_url, INDEX_NAME))
            .json(&query)
            .send()
            .await
            .map_err(|e| FlightError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FlightError::Search(format!(
                "search request failed: {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| FlightError::Search(e.to_string()))?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| hit.source)
            .collect())
    }
}

fn build_search_query(filter: &SearchFilter) -> serde_json::Value {
    let date_start = Utc.from_utc_datetime(&filter.date.and_time(NaiveTime::MIN));
    let date_end = date_start + chrono::Duration::hours(24);

    json!({
        "query": {
            "bool": {
                "must": [
                    { "match": { "departure_airport": filter.from_airport } },
                    { "match": { "arrival_airport": filter.to_airport } },
                    { "range": { "departure_time": {
                        "gte": date_start.to_rfc3339(),
                        "lt": date_end.to_rfc3339()
                    } } },
                    { "range": { "available_seats": { "gte": filter.passenger_count } } }
                ]
            }
        },
        "sort": [ { "price_minor_units": "asc" } ]
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: FlightDocument,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_document() -> FlightDocument {
        FlightDocument {
            id: 1,
            departure_airport: "SVO".to_string(),
            arrival_airport: "LED".to_string(),
            departure_time: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            price_minor_units: 150_00,
            available_seats: 100,
        }
    }

    #[test]
    fn search_query_covers_all_filters() {
        let filter = SearchFilter {
            from_airport: "SVO".to_string(),
            to_airport: "LED".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            passenger_count: 2,
        };

        let query = build_search_query(&filter);
        let must = query["query"]["bool"]["must"].as_array().unwrap();

        assert_eq!(must[0]["match"]["departure_airport"], "SVO");
        assert_eq!(must[1]["match"]["arrival_airport"], "LED");
        assert!(must[2]["range"]["departure_time"]["gte"]
            .as_str()
            .unwrap()
            .starts_with("2025-06-01T00:00:00"));
        assert!(must[2]["range"]["departure_time"]["lt"]
            .as_str()
            .unwrap()
            .starts_with("2025-06-02T00:00:00"));
        assert_eq!(must[3]["range"]["available_seats"]["gte"], 2);
        assert_eq!(query["sort"][0]["price_minor_units"], "asc");
    }

    #[tokio::test]
    async fn index_flight_puts_document() {
        let server = MockServer::start().await;
        let document = sample_document();

        Mock::given(method("PUT"))
            .and(path("/flights/_doc/1"))
            .and(body_json(&document))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new(&server.uri());
        client.index_flight(&document).await.unwrap();
    }

    #[tokio::test]
    async fn update_available_seats_sends_partial_doc() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/flights/_update/7"))
            .and(body_json(json!({"doc": {"available_seats": 99}})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new(&server.uri());
        client.update_available_seats(7, 99).await.unwrap();
    }

    #[tokio::test]
    async fn update_failure_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/flights/_update/7"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SearchClient::new(&server.uri());
        let err = client.update_available_seats(7, 99).await.unwrap_err();
        assert!(matches!(err, FlightError::Search(_)));
    }

    #[tokio::test]
    async fn search_parses_hits() {
        let server = MockServer::start().await;
        let document = sample_document();

        Mock::given(method("POST"))
            .and(path("/flights/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [ { "_source": document } ] }
            })))
            .mount(&server)
            .await;

        let client = SearchClient::new(&server.uri());
        let found = client
            .search(&SearchFilter {
                from_airport: "SVO".to_string(),
                to_airport: "LED".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                passenger_count: 1,
            })
            .await
            .unwrap();

        assert_eq!(found, vec![sample_document()]);
    }
}
