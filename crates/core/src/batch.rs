//! Selecting the apps a CI job actually builds.

use crate::app::App;
use crate::error::{CoreError, Result};
use crate::status::InclusionFlags;

/// 1-based inclusive `(start, stop)` range of apps handled by shard
/// `index` out of `count`. Empty shards return `start > stop`.
pub fn parallel_slice(total: usize, count: usize, index: usize) -> Result<(usize, usize)> {
    if count == 0 || index == 0 || index > count {
        return Err(CoreError::InvalidSlice(format!(
            "index {} out of range for {} parallel jobs",
            index, count
        )));
    }
    if count == 1 {
        return Ok((1, total));
    }

    let per_job = total.div_ceil(count);
    let start = per_job * (index - 1) + 1;
    let stop = (per_job * index).min(total);
    Ok((start, stop))
}

/// Keep apps in `should_build`, re-admitting excluded ones per `flags`.
///
/// Apps must already be classified; an `unknown` app is an error.
pub fn active_batch(apps: Vec<App>, flags: InclusionFlags) -> Result<Vec<App>> {
    let mut active = Vec::with_capacity(apps.len());
    for mut app in apps {
        if app.state.include(flags)? {
            active.push(app);
        } else {
            tracing::debug!(app = %app, status = %app.status(), "excluded from active batch");
        }
    }
    Ok(active)
}

/// Apps of shard `index`/`count`, with their 1-based batch index assigned.
pub fn shard(apps: Vec<App>, count: usize, index: usize) -> Result<Vec<App>> {
    let (start, stop) = parallel_slice(apps.len(), count, index)?;
    tracing::info!(total = apps.len(), start, stop, "selecting apps for parallel job");
    Ok(apps
        .into_iter()
        .enumerate()
        .map(|(i, mut app)| {
            app.index = Some(i + 1);
            app
        })
        .filter(|app| app.index.is_some_and(|i| i >= start && i <= stop))
        .collect())
}
