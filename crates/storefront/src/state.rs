//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use lettre::transport::smtp::Error as SmtpError;
use moka::future::Cache;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{CategoryRepository, RepositoryError};
use crate::models::CategoryWithCount;
use crate::services::auth::AuthService;
use crate::services::chatbot::ChatbotClient;
use crate::services::email::EmailService;
use crate::services::google::GoogleClient;
use crate::services::orders::OrderService;

/// How long the category listing is served from memory.
const CATEGORY_CACHE_TTL: Duration = Duration::from_secs(60);

/// Timeout for outbound calls to Google and Gemini.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("smtp transport: {0}")]
    Smtp(#[from] SmtpError),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    email: EmailService,
    google: Option<GoogleClient>,
    chatbot: Option<ChatbotClient>,
    categories: Cache<(), Arc<Vec<CategoryWithCount>>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Google sign-in and the chatbot are only wired up when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport or HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let email = EmailService::new(config.email.as_ref())?;

        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let google = config
            .google
            .as_ref()
            .map(|google| GoogleClient::new(google, http.clone()));
        let chatbot = config
            .gemini
            .as_ref()
            .map(|gemini| ChatbotClient::new(gemini, http.clone()));

        let categories = Cache::builder()
            .max_capacity(1)
            .time_to_live(CATEGORY_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                google,
                chatbot,
                categories,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Google OAuth client, if configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.inner.google.as_ref()
    }

    /// Gemini client, if configured.
    #[must_use]
    pub fn chatbot(&self) -> Option<&ChatbotClient> {
        self.inner.chatbot.as_ref()
    }

    /// Auth service bound to this state.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            &self.inner.pool,
            &self.inner.email,
            self.inner.config.token_ttl_days,
        )
    }

    /// Order service bound to this state.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(&self.inner.pool, &self.inner.config.shipping)
    }

    /// Categories with product counts, cached briefly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the listing has to be reloaded and the query fails.
    pub async fn categories(&self) -> Result<Arc<Vec<CategoryWithCount>>, RepositoryError> {
        if let Some(cached) = self.inner.categories.get(&()).await {
            return Ok(cached);
        }

        let fresh = Arc::new(
            CategoryRepository::new(&self.inner.pool)
                .list_with_counts()
                .await?,
        );
        self.inner.categories.insert((), Arc::clone(&fresh)).await;
        Ok(fresh)
    }

    /// Drop the cached category listing after catalog writes.
    pub async fn invalidate_categories(&self) {
        self.inner.categories.invalidate(&()).await;
    }
}
