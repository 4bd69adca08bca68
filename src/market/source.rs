use crate::error::ReplayError;
use crate::market::types::{parse_session_payload, SessionRows};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};

const SESSION_FILE_DIR: &str = "api";

fn dates_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/dates")
}

fn instruments_endpoint(base_url: &str, date: &str) -> String {
    format!("{base_url}/api/stocks/{}", date.trim())
}

fn session_endpoint(base_url: &str, date: &str, instrument: &str) -> String {
    format!("{base_url}/api/data/{}/{}", date.trim(), instrument.trim())
}

/// `{root}/api/{date}/{instrument}.json`, the layout of pre-converted sessions.
pub fn session_file_path(root: &Path, date: &str, instrument: &str) -> PathBuf {
    root.join(SESSION_FILE_DIR)
        .join(date.trim())
        .join(format!("{}.json", instrument.trim()))
}

fn unavailable(context: &str, error: ReplayError) -> ReplayError {
    match error {
        ReplayError::DataUnavailable(_) => error,
        other => ReplayError::DataUnavailable(format!("{context}: {other}")),
    }
}

async fn get_bytes(client: &Client, endpoint: &str) -> Result<Vec<u8>, ReplayError> {
    let response = client.get(endpoint).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(ReplayError::DataUnavailable(format!("{endpoint} not found")));
    }
    let body = response.error_for_status()?.bytes().await?;
    Ok(body.to_vec())
}

async fn fetch_string_list(client: &Client, endpoint: &str) -> Result<Vec<String>, ReplayError> {
    let mut body = get_bytes(client, endpoint).await?;
    let values: Vec<String> = simd_json::serde::from_slice(&mut body)?;
    Ok(values)
}

/// Trading dates (`YYYYMMDD`), newest first.
pub async fn fetch_dates(client: &Client, base_url: &str) -> Result<Vec<String>, ReplayError> {
    let endpoint = dates_endpoint(base_url);
    let mut dates = fetch_string_list(client, &endpoint)
        .await
        .map_err(|error| unavailable("failed to list dates", error))?;
    sort_dates_newest_first(&mut dates);
    Ok(dates)
}

/// Instrument codes traded on `date`, sorted ascending.
pub async fn fetch_instruments(
    client: &Client,
    base_url: &str,
    date: &str,
) -> Result<Vec<String>, ReplayError> {
    let endpoint = instruments_endpoint(base_url, date);
    let mut instruments = fetch_string_list(client, &endpoint)
        .await
        .map_err(|error| unavailable(&format!("failed to list instruments for {date}"), error))?;
    instruments.sort_unstable();
    instruments.dedup();
    Ok(instruments)
}

pub async fn fetch_session(
    client: &Client,
    base_url: &str,
    date: &str,
    instrument: &str,
) -> Result<SessionRows, ReplayError> {
    let endpoint = session_endpoint(base_url, date, instrument);
    let context = format!("failed to load session {date}/{instrument}");

    let mut body = get_bytes(client, &endpoint)
        .await
        .map_err(|error| unavailable(&context, error))?;
    let rows = parse_session_payload(&mut body).map_err(|error| unavailable(&context, error))?;
    Ok(with_identity(rows, date, instrument))
}

pub async fn load_session_file(
    path: &Path,
    date: &str,
    instrument: &str,
) -> Result<SessionRows, ReplayError> {
    let context = format!("failed to read {}", path.display());

    let mut body = tokio::fs::read(path)
        .await
        .map_err(|error| unavailable(&context, error.into()))?;
    let rows = parse_session_payload(&mut body).map_err(|error| unavailable(&context, error))?;
    Ok(with_identity(rows, date, instrument))
}

fn with_identity(mut rows: SessionRows, date: &str, instrument: &str) -> SessionRows {
    if rows.date.is_none() {
        rows.date = Some(date.trim().to_string());
    }
    if rows.instrument.is_none() {
        rows.instrument = Some(instrument.trim().to_string());
    }
    tracing::info!(
        date = rows.date.as_deref().unwrap_or(date),
        instrument = rows.instrument.as_deref().unwrap_or(instrument),
        trades = rows.trades.len(),
        depths = rows.depths.len(),
        "loaded session rows"
    );
    rows
}

pub fn sort_dates_newest_first(dates: &mut Vec<String>) {
    dates.sort_unstable_by(|lhs, rhs| rhs.cmp(lhs));
    dates.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ONE_TRADE_PAYLOAD: &str = r#"{"trades":[{"time":"2024-01-05 09:00:01.000000","price":580.0,"volume":2}],
        "depth_history":[]}"#;

    async fn serve(route: &str, response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn builds_api_endpoints() {
        let base = "http://localhost:5000";

        assert_eq!(dates_endpoint(base), "http://localhost:5000/api/dates");
        assert_eq!(
            instruments_endpoint(base, " 20240105 "),
            "http://localhost:5000/api/stocks/20240105"
        );
        assert_eq!(
            session_endpoint(base, "20240105", "2330"),
            "http://localhost:5000/api/data/20240105/2330"
        );
    }

    #[test]
    fn sorts_dates_newest_first() {
        let mut dates = vec![
            "20240103".to_string(),
            "20240105".to_string(),
            "20240104".to_string(),
            "20240105".to_string(),
        ];
        sort_dates_newest_first(&mut dates);

        assert_eq!(dates, vec!["20240105", "20240104", "20240103"]);
    }

    #[test]
    fn builds_session_file_path() {
        let path = session_file_path(Path::new("/srv/static"), "20240105", "2330");
        assert_eq!(path, PathBuf::from("/srv/static/api/20240105/2330.json"));
    }

    #[tokio::test]
    async fn fetches_dates_newest_first_without_duplicates() {
        let server = serve(
            "/api/dates",
            ResponseTemplate::new(200)
                .set_body_string(r#"["20240103","20240105","20240104","20240105"]"#),
        )
        .await;

        let dates = fetch_dates(&Client::new(), &server.uri())
            .await
            .expect("dates should load");

        assert_eq!(dates, vec!["20240105", "20240104", "20240103"]);
    }

    #[tokio::test]
    async fn fetches_sorted_instruments() {
        let server = serve(
            "/api/stocks/20240105",
            ResponseTemplate::new(200).set_body_string(r#"["2454","2330","2317","2330"]"#),
        )
        .await;

        let instruments = fetch_instruments(&Client::new(), &server.uri(), " 20240105 ")
            .await
            .expect("instruments should load");

        assert_eq!(instruments, vec!["2317", "2330", "2454"]);
    }

    #[tokio::test]
    async fn fetches_session_and_fills_identity() {
        let server = serve(
            "/api/data/20240105/2330",
            ResponseTemplate::new(200).set_body_string(ONE_TRADE_PAYLOAD),
        )
        .await;

        let rows = fetch_session(&Client::new(), &server.uri(), "20240105", "2330")
            .await
            .expect("session should load");

        assert_eq!(rows.date.as_deref(), Some("20240105"));
        assert_eq!(rows.instrument.as_deref(), Some("2330"));
        assert_eq!(rows.trades.len(), 1);
        assert!(rows.depths.is_empty());
    }

    #[tokio::test]
    async fn missing_session_is_data_unavailable() {
        let server = serve("/api/data/20240105/9999", ResponseTemplate::new(404)).await;

        let error = fetch_session(&Client::new(), &server.uri(), "20240105", "9999")
            .await
            .expect_err("404 should fail");

        assert!(matches!(error, ReplayError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn server_error_is_data_unavailable() {
        let server = serve("/api/dates", ResponseTemplate::new(503)).await;

        let error = fetch_dates(&Client::new(), &server.uri())
            .await
            .expect_err("5xx should fail");

        assert!(error.is_data_unavailable());
    }

    #[tokio::test]
    async fn undecodable_body_is_data_unavailable() {
        let server = serve(
            "/api/stocks/20240105",
            ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
        )
        .await;
        let client = Client::new();

        let instruments = fetch_instruments(&client, &server.uri(), "20240105")
            .await
            .expect_err("html body should fail");
        assert!(instruments.is_data_unavailable());

        Mock::given(method("GET"))
            .and(path("/api/data/20240105/2330"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"trades": ["#))
            .mount(&server)
            .await;
        let session = fetch_session(&client, &server.uri(), "20240105", "2330")
            .await
            .expect_err("truncated payload should fail");
        assert!(session.is_data_unavailable());
    }

    #[tokio::test]
    async fn unreachable_server_is_data_unavailable() {
        let server = MockServer::start().await;
        let base_url = server.uri();
        drop(server);

        let error = fetch_dates(&Client::new(), &base_url)
            .await
            .expect_err("closed port should fail");

        assert!(error.is_data_unavailable());
    }

    #[tokio::test]
    async fn loads_session_file_from_disk() {
        let root = TempDir::new().expect("temp dir should be creatable");
        let path = session_file_path(root.path(), "20240105", "2330");
        let parent = path.parent().expect("session path has a parent");
        tokio::fs::create_dir_all(parent)
            .await
            .expect("session dir should be creatable");
        tokio::fs::write(&path, ONE_TRADE_PAYLOAD)
            .await
            .expect("fixture should be writable");

        let rows = load_session_file(&path, "20240105", "2330")
            .await
            .expect("fixture should load");

        assert_eq!(rows.date.as_deref(), Some("20240105"));
        assert_eq!(rows.instrument.as_deref(), Some("2330"));
        assert_eq!(rows.trades.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_data_unavailable() {
        let root = TempDir::new().expect("temp dir should be creatable");
        let path = root.path().join("nothing.json");

        let error = load_session_file(&path, "20240105", "2330")
            .await
            .expect_err("missing file should fail");

        assert!(matches!(error, ReplayError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn corrupt_file_is_data_unavailable() {
        let root = TempDir::new().expect("temp dir should be creatable");
        let path = root.path().join("broken.json");
        tokio::fs::write(&path, b"{\"trades\": [")
            .await
            .expect("fixture should be writable");

        let error = load_session_file(&path, "20240105", "2330")
            .await
            .expect_err("corrupt file should fail");

        assert!(error.is_data_unavailable());
        assert!(matches!(error, ReplayError::DataUnavailable(_)));
    }
}
