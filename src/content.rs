//! Pages, posts and media for the public site
//!
//! Managers see drafts; everyone else only sees published content and gets a
//! 404 for drafts.

use crate::error::{TrackerError, Validator};
use crate::models::{ContentStatus, Media, Page, Post};
use crate::pagination::{ContentFilter, PageRequest, Paginated};
use crate::store::Store;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_SLUG_LEN: usize = 120;
const MAX_TITLE_LEN: usize = 200;
const MAX_EXCERPT_LEN: usize = 500;
pub const MAX_MEDIA_BYTES: i64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagePayload {
    #[serde(default)]
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub body: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPayload {
    #[serde(default)]
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub body: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaPayload {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mime_type: String,
    pub size_bytes: Option<i64>,
    pub alt_text: Option<String>,
}

/// Lowercase ASCII words joined by single dashes
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug.split('-').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

/// Explicit slug if given, otherwise derived from the title
fn resolve_slug(v: &mut Validator, explicit: Option<&str>, title: &str) -> String {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_string(),
        None => slugify(title),
    };
    v.check(
        is_valid_slug(&slug),
        "slug",
        "The slug may only contain lowercase letters, numbers and single dashes.",
    );
    slug
}

fn resolve_status(v: &mut Validator, raw: Option<&str>) -> ContentStatus {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => ContentStatus::Draft,
        Some(raw) => match raw.parse() {
            Ok(status) => status,
            Err(_) => {
                v.check(false, "status", "The selected status is invalid.");
                ContentStatus::Draft
            }
        },
    }
}

pub struct ContentService {
    store: Arc<dyn Store>,
}

impl ContentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    //
    // ----- pages -----
    //

    pub async fn list_pages(&self, mut filter: ContentFilter, can_manage: bool) -> Result<Paginated<Page>> {
        if !can_manage {
            filter.fields.status = Some(ContentStatus::Published);
        }
        self.store.list_pages(&filter).await
    }

    pub async fn get_page(&self, id: Uuid, can_manage: bool) -> Result<Page> {
        self.store
            .get_page(id)
            .await?
            .filter(|page| can_manage || page.status == ContentStatus::Published)
            .ok_or_else(|| TrackerError::not_found("Page"))
    }

    fn validate_page(payload: &PagePayload) -> Result<(String, ContentStatus)> {
        let mut v = Validator::new();
        v.require_text(&payload.title, "title", MAX_TITLE_LEN);
        v.check(!payload.body.trim().is_empty(), "body", "The body field is required.");
        let slug = resolve_slug(&mut v, payload.slug.as_deref(), &payload.title);
        let status = resolve_status(&mut v, payload.status.as_deref());
        v.finish()?;
        Ok((slug, status))
    }

    pub async fn create_page(&self, author_id: Uuid, payload: PagePayload, now: DateTime<Utc>) -> Result<Page> {
        let (slug, status) = Self::validate_page(&payload)?;
        let page = Page {
            id: Uuid::new_v4(),
            author_id,
            slug,
            title: payload.title.trim().to_string(),
            body: payload.body,
            status,
            created_at: now,
            updated_at: now,
        };
        self.store.save_page(&page).await?;
        info!(page_id = %page.id, slug = %page.slug, "Page created");
        Ok(page)
    }

    pub async fn update_page(&self, id: Uuid, payload: PagePayload, now: DateTime<Utc>) -> Result<Page> {
        let mut page = self.get_page(id, true).await?;
        let (slug, status) = Self::validate_page(&payload)?;

        page.slug = slug;
        page.title = payload.title.trim().to_string();
        page.body = payload.body;
        page.status = status;
        page.updated_at = now;

        self.store.save_page(&page).await?;
        Ok(page)
    }

    pub async fn delete_page(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_page(id).await? {
            return Err(TrackerError::not_found("Page"));
        }
        Ok(())
    }

    //
    // ----- posts -----
    //

    pub async fn list_posts(&self, mut filter: ContentFilter, can_manage: bool) -> Result<Paginated<Post>> {
        if !can_manage {
            filter.fields.status = Some(ContentStatus::Published);
        }
        self.store.list_posts(&filter).await
    }

    pub async fn get_post(&self, id: Uuid, can_manage: bool) -> Result<Post> {
        self.store
            .get_post(id)
            .await?
            .filter(|post| can_manage || post.status == ContentStatus::Published)
            .ok_or_else(|| TrackerError::not_found("Post"))
    }

    fn validate_post(payload: &PostPayload) -> Result<(String, ContentStatus)> {
        let mut v = Validator::new();
        v.require_text(&payload.title, "title", MAX_TITLE_LEN);
        v.check(!payload.body.trim().is_empty(), "body", "The body field is required.");
        if let Some(excerpt) = payload.excerpt.as_deref() {
            v.check(
                excerpt.chars().count() <= MAX_EXCERPT_LEN,
                "excerpt",
                &format!("The excerpt may not be greater than {} characters.", MAX_EXCERPT_LEN),
            );
        }
        let slug = resolve_slug(&mut v, payload.slug.as_deref(), &payload.title);
        let status = resolve_status(&mut v, payload.status.as_deref());
        v.finish()?;
        Ok((slug, status))
    }

    /// Publishing stamps `published_at` once; returning to draft clears it
    fn published_at(
        status: ContentStatus,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match status {
            ContentStatus::Published => Some(previous.unwrap_or(now)),
            ContentStatus::Draft => None,
        }
    }

    pub async fn create_post(&self, author_id: Uuid, payload: PostPayload, now: DateTime<Utc>) -> Result<Post> {
        let (slug, status) = Self::validate_post(&payload)?;
        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            slug,
            title: payload.title.trim().to_string(),
            excerpt: payload.excerpt,
            body: payload.body,
            status,
            published_at: Self::published_at(status, None, now),
            created_at: now,
            updated_at: now,
        };
        self.store.save_post(&post).await?;
        info!(post_id = %post.id, slug = %post.slug, status = %post.status, "Post created");
        Ok(post)
    }

    pub async fn update_post(&self, id: Uuid, payload: PostPayload, now: DateTime<Utc>) -> Result<Post> {
        let mut post = self.get_post(id, true).await?;
        let (slug, status) = Self::validate_post(&payload)?;

        post.slug = slug;
        post.title = payload.title.trim().to_string();
        post.excerpt = payload.excerpt;
        post.body = payload.body;
        post.published_at = Self::published_at(status, post.published_at, now);
        post.status = status;
        post.updated_at = now;

        self.store.save_post(&post).await?;
        Ok(post)
    }

    pub async fn delete_post(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_post(id).await? {
            return Err(TrackerError::not_found("Post"));
        }
        Ok(())
    }

    //
    // ----- media -----
    //

    pub async fn list_media(&self, page: PageRequest) -> Result<Paginated<Media>> {
        self.store.list_media(page).await
    }

    pub async fn get_media(&self, id: Uuid) -> Result<Media> {
        self.store
            .get_media(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("Media"))
    }

    /// Registers metadata for a file already stored elsewhere
    pub async fn create_media(&self, uploader_id: Uuid, payload: MediaPayload, now: DateTime<Utc>) -> Result<Media> {
        let mut v = Validator::new();
        v.require_text(&payload.filename, "filename", 255);
        let url = payload.url.trim();
        v.check(
            url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/'),
            "url",
            "The url must be an absolute URL or a path.",
        );
        let mime = payload.mime_type.trim().to_lowercase();
        v.check(
            mime.split_once('/').map_or(false, |(a, b)| !a.is_empty() && !b.is_empty()),
            "mime_type",
            "The mime type must look like type/subtype.",
        );
        let size_bytes = payload.size_bytes.unwrap_or(0);
        v.check(
            (0..=MAX_MEDIA_BYTES).contains(&size_bytes),
            "size_bytes",
            "The file is too large.",
        );
        v.finish()?;

        let media = Media {
            id: Uuid::new_v4(),
            uploader_id,
            filename: payload.filename.trim().to_string(),
            url: url.to_string(),
            mime_type: mime,
            size_bytes,
            alt_text: payload.alt_text,
            created_at: now,
        };
        self.store.insert_media(&media).await?;
        Ok(media)
    }

    pub async fn delete_media(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_media(id).await? {
            return Err(TrackerError::not_found("Media"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn service() -> ContentService {
        ContentService::new(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Saving 101: The Basics! "), "saving-101-the-basics");
        assert_eq!(slugify("Ñandú"), "and");
        assert!(is_valid_slug("budget-tips-2024"));
        assert!(!is_valid_slug("Budget"));
        assert!(!is_valid_slug("double--dash"));
        assert!(!is_valid_slug("-lead"));
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_readers() {
        let service = service();
        let author = Uuid::new_v4();
        let now = Utc::now();

        let draft = service
            .create_page(
                author,
                PagePayload {
                    title: "Coming soon".to_string(),
                    body: "...".to_string(),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(draft.slug, "coming-soon");
        assert_eq!(draft.status, ContentStatus::Draft);

        assert!(matches!(service.get_page(draft.id, false).await, Err(TrackerError::NotFound(_))));
        assert!(service.get_page(draft.id, true).await.is_ok());

        let listed = service.list_pages(ContentFilter::default(), false).await.unwrap();
        assert_eq!(listed.meta.total, 0);
        let listed = service.list_pages(ContentFilter::default(), true).await.unwrap();
        assert_eq!(listed.meta.total, 1);
    }

    #[tokio::test]
    async fn test_post_publish_stamp_and_slug_conflict() {
        let service = service();
        let author = Uuid::new_v4();
        let now = Utc::now();

        let payload = PostPayload {
            title: "Ten budgeting tips".to_string(),
            body: "Start with a plan.".to_string(),
            status: Some("published".to_string()),
            ..Default::default()
        };
        let post = service.create_post(author, payload.clone(), now).await.unwrap();
        assert_eq!(post.published_at, Some(now));

        let later = now + chrono::Duration::hours(1);
        let updated = service.update_post(post.id, payload.clone(), later).await.unwrap();
        assert_eq!(updated.published_at, Some(now));

        let duplicate = service.create_post(author, payload, now).await;
        assert!(matches!(duplicate, Err(TrackerError::Validation(_))));

        let unpublished = service
            .update_post(
                post.id,
                PostPayload {
                    title: "Ten budgeting tips".to_string(),
                    body: "Start with a plan.".to_string(),
                    status: Some("draft".to_string()),
                    ..Default::default()
                },
                later,
            )
            .await
            .unwrap();
        assert_eq!(unpublished.published_at, None);
    }

    #[tokio::test]
    async fn test_media_validation() {
        let service = service();
        let err = service
            .create_media(
                Uuid::new_v4(),
                MediaPayload {
                    filename: "chart.png".to_string(),
                    url: "ftp://files/chart.png".to_string(),
                    mime_type: "png".to_string(),
                    size_bytes: Some(MAX_MEDIA_BYTES + 1),
                    alt_text: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        match err {
            TrackerError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {:?}", other),
        }

        let media = service
            .create_media(
                Uuid::new_v4(),
                MediaPayload {
                    filename: "chart.png".to_string(),
                    url: "/uploads/chart.png".to_string(),
                    mime_type: "Image/PNG".to_string(),
                    size_bytes: Some(2048),
                    alt_text: Some("Spending chart".to_string()),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(media.mime_type, "image/png");
        service.delete_media(media.id).await.unwrap();
        assert!(matches!(service.get_media(media.id).await, Err(TrackerError::NotFound(_))));
    }
}
