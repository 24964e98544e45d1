//! Bounded page pool. One page per session, at most `size` open at once.

use super::EokaPage;
use crate::config::BrowserConfig;
use crate::page::PageHandle;
use crate::Result;
use async_trait::async_trait;
use eoka::{Browser, StealthConfig};
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Creates isolated pages for sessions.
#[async_trait]
pub trait PageFactory: Send + Sync {
    type Page: PageHandle + 'static;

    async fn create(&self, context_id: &str) -> Result<Self::Page>;
}

/// Launches one Chrome and hands out a fresh tab per session.
pub struct EokaLauncher {
    browser: Arc<Browser>,
}

impl EokaLauncher {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let viewport = config.viewport.unwrap_or_default();
        let stealth = StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: viewport.width,
            viewport_height: viewport.height,
            ..Default::default()
        };
        info!(
            "launching browser (headless={}, viewport={}x{})",
            config.headless, viewport.width, viewport.height
        );
        let browser = Browser::launch_with_config(stealth).await?;
        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Close the browser. Pages still leased keep it alive; it then closes on drop.
    pub async fn shutdown(self) -> Result<()> {
        match Arc::try_unwrap(self.browser) {
            Ok(browser) => {
                browser.close().await?;
                Ok(())
            }
            Err(_) => {
                warn!("browser still referenced by open pages; skipping close");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PageFactory for EokaLauncher {
    type Page = EokaPage;

    async fn create(&self, context_id: &str) -> Result<EokaPage> {
        let page = self.browser.new_blank_page().await?;
        debug!("context {} -> tab {}", context_id, page.target_id());
        Ok(EokaPage::new(page, Some(self.browser.clone())))
    }
}

/// Semaphore-gated pool over a [`PageFactory`].
pub struct PagePool<F: PageFactory> {
    factory: F,
    permits: Arc<Semaphore>,
    size: usize,
}

impl<F: PageFactory> PagePool<F> {
    pub fn new(factory: F, size: usize) -> Self {
        let size = size.max(1);
        Self {
            factory,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free slot, then open a page for `context_id`.
    pub async fn acquire(&self, context_id: &str) -> Result<Lease<F::Page>> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| crate::Error::Config("page pool closed".into()))?;
        let page = self.factory.create(context_id).await?;
        Ok(Lease {
            page: Arc::new(page),
            _permit: permit,
            context_id: context_id.to_string(),
            released: false,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn into_factory(self) -> F {
        self.factory
    }
}

/// A leased page. Its slot returns to the pool when the lease is dropped.
pub struct Lease<P: PageHandle + 'static> {
    page: Arc<P>,
    _permit: OwnedSemaphorePermit,
    context_id: String,
    released: bool,
}

impl<P: PageHandle + 'static> Lease<P> {
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Close the page and free the slot.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.page.close().await
    }
}

impl<P: PageHandle + 'static> Deref for Lease<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.page
    }
}

impl<P: PageHandle + 'static> Drop for Lease<P> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let page = self.page.clone();
        let ctx = std::mem::take(&mut self.context_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = page.close().await {
                    warn!("closing page for {}: {}", ctx, e);
                }
            });
        }
    }
}
