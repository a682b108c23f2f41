use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use url::Url;

use crate::config::DatabaseConfig;

pub fn create_ssl_connector(
    sslrootcert_path: Option<&str>,
    insecure: bool,
) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    if let Some(path) = sslrootcert_path {
        builder
            .set_ca_file(path)
            .map_err(|e| format!("Error loading CA cert: {}", e))?;
    }

    if insecure {
        builder.set_verify(SslVerifyMode::NONE);
    }

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Split the `sslrootcert` parameter off a connection URL
///
/// tokio-postgres does not understand `sslrootcert`, so it is removed from
/// the URL handed to it and returned separately.
pub fn split_database_url(database_url: &str) -> Result<(String, Option<String>), String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    Ok((clean_url.to_string(), sslrootcert_path))
}

pub async fn execute_with_retry<F, Fut>(database: &DatabaseConfig, operation: F) -> Result<(), String>
where
    F: Fn(tokio_postgres::Client) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<u64, tokio_postgres::Error>> + Send,
{
    // A malformed URL will not fix itself, so fail without retrying
    let (clean_database_url, sslrootcert_path) = split_database_url(&database.url)?;
    let connector = create_ssl_connector(sslrootcert_path.as_deref(), database.tls_insecure)?;

    let mut last_error = String::from("no attempt made");
    for attempt in 0..database.max_retries {
        match tokio_postgres::connect(&clean_database_url, connector.clone()).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Connection error: {}", e);
                    }
                });

                match operation(client).await {
                    Ok(_) => return Ok(()),
                    Err(e) => {
                        error!("Attempt {}: query error: {}", attempt + 1, e);
                        last_error = format!("Query error: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Attempt {}: connection error: {}", attempt + 1, e);
                last_error = format!("Connection error: {}", e);
            }
        }

        if attempt + 1 < database.max_retries {
            warn!("Retrying in {} seconds", database.retry_delay_secs);
            tokio::time::sleep(Duration::from_secs(database.retry_delay_secs)).await;
        }
    }

    Err(format!(
        "Max retries exceeded after {} attempts: {}",
        database.max_retries, last_error
    ))
}
