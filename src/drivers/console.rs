//! Console driver - logs all output effects for testing and rehearsal

use crate::drivers::{OutputDriver, OutputEffect};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// ConsoleDriver logs every effect instead of driving a real output
///
/// Useful for rehearsing a cue file without a display attached and for
/// watching what the resolver decides.
pub struct ConsoleDriver {
    name: String,
    initialized: Arc<RwLock<bool>>,
    /// Effects applied since init
    effect_count: Arc<RwLock<u64>>,
}

impl ConsoleDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialized: Arc::new(RwLock::new(false)),
            effect_count: Arc::new(RwLock::new(0)),
        }
    }
}

#[async_trait]
impl OutputDriver for ConsoleDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<()> {
        *self.initialized.write().await = true;
        *self.effect_count.write().await = 0;
        info!("✅ ConsoleDriver '{}' initialized", self.name);
        Ok(())
    }

    async fn apply(&self, effect: &OutputEffect) -> Result<()> {
        if !*self.initialized.read().await {
            warn!("⚠️  ConsoleDriver '{}' not initialized, skipping effect", self.name);
            return Ok(());
        }

        let mut count = self.effect_count.write().await;
        *count += 1;
        let effect_num = *count;
        drop(count);

        match effect {
            OutputEffect::Notice(text) => warn!(
                "⚠️  [{}] '{}' {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                self.name,
                text
            ),
            _ => info!(
                "🎬 [{}] '{}' → {} [#{}]",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                self.name,
                effect,
                effect_num
            ),
        }

        debug!(driver = self.name, effect = ?effect, count = effect_num, "ConsoleDriver effect");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if *self.initialized.read().await {
            let final_count = *self.effect_count.read().await;
            info!(
                "🛑 ConsoleDriver '{}' shutting down (applied {} effects)",
                self.name, final_count
            );
        }
        *self.initialized.write().await = false;
        Ok(())
    }
}
