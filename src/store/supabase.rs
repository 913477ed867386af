// src/store/supabase.rs
//! Supabase (PostgREST) primary store.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use std::time::Duration;

use super::{PostRow, PrimaryStore, ReportRow, StoredPost};

pub struct SupabaseStore {
    http: reqwest::Client,
    rest_base: String,
    posts_table: String,
    reports_table: String,
}

impl SupabaseStore {
    pub fn new(
        project_url: &str,
        service_key: &str,
        posts_table: &str,
        reports_table: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(service_key).context("supabase key is not a valid header")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {service_key}"))
                .context("supabase key is not a valid header")?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building supabase http client")?;

        Ok(Self {
            http,
            rest_base: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            posts_table: posts_table.to_string(),
            reports_table: reports_table.to_string(),
        })
    }

    /// `POST /{table}?on_conflict=...` with merge-duplicates resolution.
    async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        on_conflict: &str,
        select: Option<&str>,
        body: &T,
    ) -> Result<reqwest::Response> {
        let mut query = vec![("on_conflict", on_conflict)];
        let prefer = match select {
            Some(cols) => {
                query.push(("select", cols));
                "resolution=merge-duplicates,return=representation"
            }
            None => "resolution=merge-duplicates,return=minimal",
        };

        let resp = self
            .http
            .post(format!("{}/{table}", self.rest_base))
            .query(&query)
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await
            .with_context(|| format!("supabase upsert into {table}"))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "supabase upsert into {table} failed (status {}): {message}",
                status.as_u16()
            ));
        }
        Ok(resp)
    }
}

#[async_trait]
impl PrimaryStore for SupabaseStore {
    async fn upsert_posts(&self, rows: &[PostRow]) -> Result<Vec<StoredPost>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .upsert(&self.posts_table, "url", Some("id,url"), rows)
            .await?;
        resp.json().await.context("supabase posts response")
    }

    async fn upsert_report(&self, row: &ReportRow) -> Result<()> {
        self.upsert(&self.reports_table, "id", None, &[row]).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
