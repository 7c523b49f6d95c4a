//! Periodic background retraining.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::context::ServiceContext;

/// Retrain every `interval_secs` seconds, starting one interval from now.
/// Returns `None` when `interval_secs` is zero.
pub fn spawn_periodic_retrain(
    context: Arc<ServiceContext>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("scheduled retraining disabled");
        return None;
    }

    info!(interval_secs, "scheduled retraining enabled");
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_scheduled_retrain(Arc::clone(&context)).await;
        }
    }))
}

/// One scheduled retrain. Failures are logged and swallowed; returns whether
/// a new model was activated.
pub async fn run_scheduled_retrain(context: Arc<ServiceContext>) -> bool {
    info!("scheduled retrain running");
    match tokio::task::spawn_blocking(move || context.retrain()).await {
        Ok(Ok(result)) => {
            info!(
                accuracy = result.accuracy,
                n_train = result.n_train,
                n_val = result.n_val,
                "scheduled retrain finished"
            );
            true
        }
        Ok(Err(err)) => {
            warn!("scheduled retrain failed: {err}");
            false
        }
        Err(err) => {
            warn!("scheduled retrain task failed: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn context(dir: &tempfile::TempDir) -> anyhow::Result<Arc<ServiceContext>> {
        let config = ServiceConfig {
            data_dir: dir.path().to_path_buf(),
            ..ServiceConfig::default()
        };
        Ok(Arc::new(ServiceContext::open(&config)?))
    }

    #[tokio::test]
    async fn failure_is_swallowed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ctx = context(&dir)?;

        assert!(!run_scheduled_retrain(Arc::clone(&ctx)).await);
        assert!(!ctx.model_loaded());
        Ok(())
    }

    #[tokio::test]
    async fn success_activates_model() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ctx = context(&dir)?;

        let mut csv = String::from("planet_radius,stellar_radius,target\n");
        for i in 0..6 {
            csv.push_str(&format!("{},1,{}\n", 1 + i, i % 2));
        }
        ctx.upload_csv(csv.as_bytes())?;

        assert!(run_scheduled_retrain(Arc::clone(&ctx)).await);
        assert!(ctx.model_loaded());
        Ok(())
    }

    #[tokio::test]
    async fn zero_interval_disables() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(spawn_periodic_retrain(context(&dir)?, 0).is_none());

        let handle = spawn_periodic_retrain(context(&dir)?, 3600);
        assert!(handle.as_ref().is_some_and(|h| !h.is_finished()));
        if let Some(handle) = handle {
            handle.abort();
        }
        Ok(())
    }
}
