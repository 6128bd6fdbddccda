//! News source and article persistence.

use chrono::{DateTime, Utc};
use the_foundation::{Article, CryptexError, CryptexResult, NewsSource};
use uuid::Uuid;

use crate::schema::{ArticleRow, NewsSourceRow};
use crate::TheArchive;

impl TheArchive {
    pub async fn upsert_news_source(&self, source: &NewsSource) -> CryptexResult<()> {
        sqlx::query(
            r#"
            INSERT INTO news_sources (
                id, name, feed_url, active, fetch_interval_seconds,
                last_fetched_at, last_fetch_status, last_fetch_error, total_articles
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (feed_url) DO UPDATE SET
                name = EXCLUDED.name,
                active = EXCLUDED.active,
                fetch_interval_seconds = EXCLUDED.fetch_interval_seconds,
                last_fetched_at = EXCLUDED.last_fetched_at,
                last_fetch_status = EXCLUDED.last_fetch_status,
                last_fetch_error = EXCLUDED.last_fetch_error,
                total_articles = EXCLUDED.total_articles
            "#,
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.feed_url)
        .bind(source.active)
        .bind(source.fetch_interval_seconds as i64)
        .bind(source.last_fetched_at)
        .bind(&source.last_fetch_status)
        .bind(&source.last_fetch_error)
        .bind(source.total_articles as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(())
    }

    /// `list_sources(active_only)`.
    pub async fn list_sources(&self, active_only: bool) -> CryptexResult<Vec<NewsSource>> {
        let rows: Vec<NewsSourceRow> = if active_only {
            sqlx::query_as(r#"SELECT * FROM news_sources WHERE active ORDER BY name"#)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query_as(r#"SELECT * FROM news_sources ORDER BY name"#)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows.into_iter().map(NewsSource::from).collect())
    }

    pub async fn find_news_source_by_feed_url(&self, feed_url: &str) -> CryptexResult<Option<NewsSource>> {
        let row: Option<NewsSourceRow> =
            sqlx::query_as(r#"SELECT * FROM news_sources WHERE feed_url = $1"#)
                .bind(feed_url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(row.map(NewsSource::from))
    }

    /// Upsert an article keyed by URL;
    /// returns whether the row was new.
    pub async fn upsert_article(&self, article: &Article) -> CryptexResult<bool> {
        let existed = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM news_articles WHERE url = $1)"#,
        )
        .bind(&article.url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO news_articles (
                url, source_id, title, author, summary, published_at, fetched_at,
                categories, related_cves, llm_summary, llm_key_points, llm_relevance, llm_processed
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (url) DO UPDATE SET
                title = EXCLUDED.title,
                author = EXCLUDED.author,
                summary = EXCLUDED.summary,
                published_at = EXCLUDED.published_at,
                categories = EXCLUDED.categories,
                related_cves = EXCLUDED.related_cves,
                llm_summary = COALESCE(news_articles.llm_summary, EXCLUDED.llm_summary),
                llm_key_points = COALESCE(news_articles.llm_key_points, EXCLUDED.llm_key_points),
                llm_relevance = COALESCE(news_articles.llm_relevance, EXCLUDED.llm_relevance),
                llm_processed = news_articles.llm_processed OR EXCLUDED.llm_processed
            "#,
        )
        .bind(&article.url)
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.summary)
        .bind(article.published_at)
        .bind(article.fetched_at)
        .bind(&article.categories)
        .bind(article.related_cves.iter().cloned().collect::<Vec<_>>())
        .bind(&article.llm_summary)
        .bind(&article.llm_key_points)
        .bind(article.llm_relevance)
        .bind(article.llm_processed)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(!existed)
    }

    pub async fn find_article(&self, url: &str) -> CryptexResult<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(r#"SELECT * FROM news_articles WHERE url = $1"#)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(row.map(Article::from))
    }

    pub async fn record_article_enrichment(
        &self,
        url: &str,
        llm_summary: Option<String>,
        llm_key_points: Option<Vec<String>>,
        llm_relevance: Option<f64>,
    ) -> CryptexResult<()> {
        sqlx::query(
            r#"
            UPDATE news_articles
            SET llm_summary = $2, llm_key_points = $3, llm_relevance = $4, llm_processed = TRUE
            WHERE url = $1
            "#,
        )
        .bind(url)
        .bind(llm_summary)
        .bind(llm_key_points)
        .bind(llm_relevance)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(())
    }

    pub async fn record_source_fetch(
        &self,
        feed_url: &str,
        status: &str,
        error: Option<String>,
        articles_added: u64,
        now: DateTime<Utc>,
    ) -> CryptexResult<()> {
        sqlx::query(
            r#"
            UPDATE news_sources
            SET last_fetched_at = $2, last_fetch_status = $3, last_fetch_error = $4,
                total_articles = total_articles + $5
            WHERE feed_url = $1
            "#,
        )
        .bind(feed_url)
        .bind(now)
        .bind(status)
        .bind(error)
        .bind(articles_added as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(())
    }
}

/// Convenience constructor matching `the_foundation`'s `Vulnerability::new_from_source`
/// idiom, used by the RSS source client's normalizer.
pub fn new_article(source_id: Uuid, url: String, title: String, now: DateTime<Utc>) -> Article {
    Article {
        source_id,
        title,
        url,
        author: None,
        summary: None,
        published_at: None,
        fetched_at: now,
        categories: Vec::new(),
        related_cves: Default::default(),
        llm_summary: None,
        llm_key_points: None,
        llm_relevance: None,
        llm_processed: false,
    }
}
