//! HTTP server and API handlers.
//!
//! Each endpoint is a thin composition over the store: derive the group-by
//! set for the requested granularity via `columns_between`, then call
//! `summarize_by`, optionally with equality filters taken from query
//! parameters or the path.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::data::{Filter, Record, Summary};
use crate::error::StoreError;
use crate::store::EnrollmentStore;

/// Dimension boundary columns, in the dataset's hierarchy order. The source
/// table's left-to-right column layout is load-bearing: `columns_between`
/// slices against it.
pub const PROVINCE: &str = "nama_provinsi";
pub const CITY: &str = "nama_kabupaten/kota";
pub const DISTRICT: &str = "nama_kecamatan";
pub const SUB_DISTRICT: &str = "nama_kelurahan";

/// Shortest accepted value for a repeated filter parameter.
const MIN_FILTER_LEN: usize = 3;

/// Application state shared across handlers. The store is immutable after
/// load, so no locking is needed.
pub struct AppState {
    pub store: EnrollmentStore,
}

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

/// Build the router over an already-loaded store.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/raw", get(raw_handler))
        .route("/summary", get(summary_handler))
        .route("/cities", get(cities_handler))
        .route("/districts", get(districts_handler))
        .route("/subdistricts", get(subdistricts_handler))
        .route("/city/:city", get(city_handler))
        .route("/district/:district", get(district_handler))
        .route("/subdistrict/:sub_district", get(subdistrict_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn run_server(store: EnrollmentStore, config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState { store });
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving enrollment API");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Request-level failures with their HTTP status mapping.
#[derive(Debug)]
enum ApiError {
    /// Malformed query parameter; the client can fix this.
    BadRequest(String),
    /// Store-side failure: a granularity boundary or filter field is
    /// misconfigured. No user input can trigger this with a fixed schema.
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, message).into_response()
    }
}

// --- Handlers ---

/// GET / - capability listing.
async fn home_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Welcome to DKI Education Data API",
        "instruction": "try some endpoints",
        "endpoints": {
            "/raw": "display raw data",
            "/summary": "display summary data for the whole jakarta",
            "/cities": "display summary data per city",
            "/districts": "display summary data per district",
            "/subdistricts": "display summary data per subdistrict",
            "/city/{city}": "display individual summary data per city",
            "/district/{district}": "display individual summary data per district",
            "/subdistrict/{sub_district}": "display individual summary data per subdistrict",
        }
    }))
}

/// GET /health - liveness probe for dev tooling.
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /raw - every record, unaggregated, in source order.
async fn raw_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Record>> {
    Json(state.store.all_records().to_vec())
}

/// GET /summary - grand total for the whole province.
async fn summary_handler(State(state): State<Arc<AppState>>) -> Result<Json<Summary>, ApiError> {
    let groups = vec![PROVINCE.to_string()];
    Ok(Json(state.store.summarize_by(&groups, &[])?))
}

/// GET /cities - totals per city.
async fn cities_handler(State(state): State<Arc<AppState>>) -> Result<Json<Summary>, ApiError> {
    let groups = state.store.columns_between(PROVINCE, CITY)?;
    Ok(Json(state.store.summarize_by(&groups, &[])?))
}

/// GET /districts - totals per district, optionally filtered by city.
async fn districts_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Summary>, ApiError> {
    let filters: Vec<Filter> = repeated_params(query.as_deref(), "city")?
        .into_iter()
        .map(|city| Filter::new(CITY, city))
        .collect();

    let groups = state.store.columns_between(PROVINCE, DISTRICT)?;
    Ok(Json(state.store.summarize_by(&groups, &filters)?))
}

/// GET /subdistricts - totals per sub-district, optionally filtered by city
/// and district.
async fn subdistricts_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Summary>, ApiError> {
    let mut filters: Vec<Filter> = repeated_params(query.as_deref(), "city")?
        .into_iter()
        .map(|city| Filter::new(CITY, city))
        .collect();
    filters.extend(
        repeated_params(query.as_deref(), "district")?
            .into_iter()
            .map(|district| Filter::new(DISTRICT, district)),
    );

    let groups = state.store.columns_between(PROVINCE, SUB_DISTRICT)?;
    Ok(Json(state.store.summarize_by(&groups, &filters)?))
}

/// GET /city/{city} - single summary record for exactly that city.
async fn city_handler(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<Summary>, ApiError> {
    single_entity(&state.store, CITY, &city)
}

/// GET /district/{district} - single summary record for exactly that district.
async fn district_handler(
    State(state): State<Arc<AppState>>,
    Path(district): Path<String>,
) -> Result<Json<Summary>, ApiError> {
    single_entity(&state.store, DISTRICT, &district)
}

/// GET /subdistrict/{sub_district} - single summary record for exactly that
/// sub-district.
async fn subdistrict_handler(
    State(state): State<Arc<AppState>>,
    Path(sub_district): Path<String>,
) -> Result<Json<Summary>, ApiError> {
    single_entity(&state.store, SUB_DISTRICT, &sub_district)
}

/// Group by the entity's own field, filtered to that exact (decoded) value.
/// An unknown name is not an error: it yields an empty list.
fn single_entity(
    store: &EnrollmentStore,
    field: &str,
    raw_value: &str,
) -> Result<Json<Summary>, ApiError> {
    let value = decode_path_value(raw_value);
    let groups = vec![field.to_string()];
    let filters = vec![Filter::new(field, value)];
    Ok(Json(store.summarize_by(&groups, &filters)?))
}

// --- Parameter decoding ---

/// Collect every occurrence of `key` in the raw query string, percent-decoded
/// with `+` treated as a space. Values shorter than [`MIN_FILTER_LEN`]
/// characters are rejected.
fn repeated_params(query: Option<&str>, key: &str) -> Result<Vec<String>, ApiError> {
    let mut values = Vec::new();
    let Some(query) = query else {
        return Ok(values);
    };

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, raw) = pair.split_once('=').unwrap_or((pair, ""));
        if name != key {
            continue;
        }
        let value = decode_query_value(raw);
        if value.chars().count() < MIN_FILTER_LEN {
            return Err(ApiError::BadRequest(format!(
                "query parameter '{key}' must be at least {MIN_FILTER_LEN} characters"
            )));
        }
        values.push(value);
    }

    Ok(values)
}

fn decode_query_value(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .unwrap_or(spaced)
}

/// Path segments arrive percent-decoded from the router; decoding once more
/// also accepts doubly-encoded names, matching the original surface.
fn decode_path_value(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
tahun,nama_provinsi,nama_kabupaten/kota,nama_kecamatan,nama_kelurahan,tidak_sekolah,tamat_sd,sltp,slta,strata_I,strata_II,strata_III
2014,DKI JAKARTA,JAKARTA UTARA,KOJA,TUGU UTARA,10,20,30,40,5,2,1
2014,DKI JAKARTA,JAKARTA UTARA,KOJA,LAGOA,1,2,3,4,6,1,2
2014,DKI JAKARTA,JAKARTA UTARA,PADEMANGAN,ANCOL,7,8,9,10,1,1,4
2014,DKI JAKARTA,JAKARTA PUSAT,GAMBIR,CIDENG,5,6,7,8,2,3,
";

    fn sample_state() -> Arc<AppState> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();
        let store = EnrollmentStore::load(file.path()).unwrap();
        Arc::new(AppState { store })
    }

    fn records_of(summary: Summary) -> Vec<Record> {
        match summary {
            Summary::One(record) => vec![record],
            Summary::Many(records) => records,
        }
    }

    #[tokio::test]
    async fn test_home_lists_endpoints() {
        let Json(body) = home_handler().await;
        let endpoints = body["endpoints"].as_object().unwrap();
        for path in ["/raw", "/summary", "/cities", "/districts", "/subdistricts"] {
            assert!(endpoints.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn test_raw_returns_every_source_row() {
        let state = sample_state();
        let Json(records) = raw_handler(State(state)).await;
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_summary_is_a_single_record() {
        let state = sample_state();
        let Json(summary) = summary_handler(State(state)).await.unwrap();
        match summary {
            Summary::One(record) => {
                assert_eq!(
                    record["nama_provinsi"],
                    Value::Text("DKI JAKARTA".to_string())
                );
                assert_eq!(record["tidak_sekolah"], Value::Count(23));
            }
            Summary::Many(_) => panic!("grand total must collapse to one record"),
        }
    }

    #[tokio::test]
    async fn test_cities_summarizes_per_city() {
        let state = sample_state();
        let Json(summary) = cities_handler(State(state)).await.unwrap();
        let records = records_of(summary);
        assert_eq!(records.len(), 2);
        // Group columns span province through city, per the boundary slice.
        assert!(records[0].get("nama_provinsi").is_some());
        assert!(records[0].get("nama_kecamatan").is_none());
    }

    #[tokio::test]
    async fn test_districts_filtered_by_city() {
        let state = sample_state();
        let query = RawQuery(Some("city=JAKARTA+UTARA".to_string()));
        let Json(summary) = districts_handler(State(state), query).await.unwrap();
        let records = records_of(summary);
        let districts: Vec<&Value> = records.iter().map(|r| &r["nama_kecamatan"]).collect();
        assert_eq!(
            districts,
            vec![
                &Value::Text("KOJA".to_string()),
                &Value::Text("PADEMANGAN".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_districts_handler_matches_direct_store_query() {
        let state = sample_state();
        let query = RawQuery(Some("city=JAKARTA%20PUSAT".to_string()));
        let Json(via_handler) = districts_handler(State(state.clone()), query).await.unwrap();

        let groups = state.store.columns_between(PROVINCE, DISTRICT).unwrap();
        let filters = vec![Filter::new(CITY, "JAKARTA PUSAT")];
        let direct = state.store.summarize_by(&groups, &filters).unwrap();

        assert_eq!(via_handler, direct);
    }

    #[tokio::test]
    async fn test_subdistricts_filtered_by_city_and_district() {
        let state = sample_state();
        let query = RawQuery(Some(
            "city=JAKARTA+PUSAT&district=KOJA".to_string(),
        ));
        let Json(summary) = subdistricts_handler(State(state), query).await.unwrap();
        let records = records_of(summary);
        // OR semantics: Koja's two kelurahan plus Cideng from Jakarta Pusat.
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_city_endpoint_matches_direct_summarize() {
        let state = sample_state();
        let Json(via_handler) = city_handler(
            State(state.clone()),
            Path("JAKARTA%20UTARA".to_string()),
        )
        .await
        .unwrap();

        let groups = vec![CITY.to_string()];
        let filters = vec![Filter::new(CITY, "JAKARTA UTARA")];
        let direct = state.store.summarize_by(&groups, &filters).unwrap();

        assert_eq!(via_handler, direct);
        assert!(matches!(via_handler, Summary::One(_)));
    }

    #[tokio::test]
    async fn test_unknown_city_yields_empty_list() {
        let state = sample_state();
        let Json(summary) = city_handler(State(state), Path("BANDUNG".to_string()))
            .await
            .unwrap();
        assert_eq!(summary, Summary::Many(Vec::new()));
    }

    #[tokio::test]
    async fn test_district_and_subdistrict_endpoints_collapse() {
        let state = sample_state();

        let Json(district) = district_handler(State(state.clone()), Path("GAMBIR".to_string()))
            .await
            .unwrap();
        assert!(matches!(district, Summary::One(_)));

        let Json(sub) = subdistrict_handler(State(state), Path("ANCOL".to_string()))
            .await
            .unwrap();
        match sub {
            Summary::One(record) => assert_eq!(record["slta"], Value::Count(10)),
            Summary::Many(_) => panic!("exact sub-district must collapse to one record"),
        }
    }

    #[test]
    fn test_repeated_params_collects_and_decodes() {
        let values =
            repeated_params(Some("city=JAKARTA%20UTARA&district=KOJA&city=JAKARTA+PUSAT"), "city")
                .unwrap();
        assert_eq!(values, vec!["JAKARTA UTARA", "JAKARTA PUSAT"]);
    }

    #[test]
    fn test_repeated_params_rejects_short_values() {
        let err = repeated_params(Some("city=ab"), "city").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_repeated_params_absent_query() {
        assert!(repeated_params(None, "city").unwrap().is_empty());
        assert!(repeated_params(Some("district=KOJA"), "city")
            .unwrap()
            .is_empty());
    }
}
