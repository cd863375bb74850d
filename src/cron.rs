/*
 * This file is part of the Sentra authentication core.
 *
 * Copyright (C) 2026 Sentra Contributors <hello@sentra-auth.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::common::error::{TenancyError, TenancyResult};
use crate::multitenancy::identifier::TenantIdentifier;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info};

/// A recurring task executed against the current tenant set. Jobs never see
/// a stale set: each tick snapshots the scheduler's tenant list.
#[async_trait]
pub trait CronJob: Send + Sync {
    fn name(&self) -> &'static str;
    fn interval(&self) -> Duration;
    async fn run(&self, tenants: &[TenantIdentifier]) -> TenancyResult<()>;
}

/// Scheduler for recurring per-tenant work. The reconciler hands over the
/// visible tenant identifiers after every successful reload via
/// `set_tenants_info`; the call is an idempotent total replacement.
pub struct CronScheduler {
    tenants: RwLock<Vec<TenantIdentifier>>,
    jobs: RwLock<Vec<Arc<dyn CronJob>>>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self {
            tenants: RwLock::new(Vec::new()),
            jobs: RwLock::new(Vec::new()),
        }
    }

    pub fn set_tenants_info(&self, mut tenants: Vec<TenantIdentifier>) -> TenancyResult<()> {
        tenants.sort_by(|a, b| a.as_tuple().cmp(&b.as_tuple()));
        tenants.dedup();
        let mut guard = self
            .tenants
            .write()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        *guard = tenants;
        Ok(())
    }

    pub fn tenants_info(&self) -> TenancyResult<Vec<TenantIdentifier>> {
        let guard = self
            .tenants
            .read()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        Ok(guard.clone())
    }

    pub fn register_job(&self, job: Arc<dyn CronJob>) -> TenancyResult<()> {
        let mut guard = self
            .jobs
            .write()
            .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
        guard.push(job);
        Ok(())
    }

    /// Spawns one tokio task per registered job. Job failures are logged and
    /// do not stop the schedule.
    pub fn spawn_all(self: &Arc<Self>) -> TenancyResult<()> {
        let jobs = {
            let guard = self
                .jobs
                .read()
                .map_err(|e| TenancyError::LockPoisoned(e.to_string()))?;
            guard.clone()
        };
        for job in jobs {
            let scheduler = Arc::clone(self);
            info!(job = job.name(), "cron job spawned");
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(job.interval());
                // The first tick of tokio's interval fires immediately.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let tenants = match scheduler.tenants_info() {
                        Ok(tenants) => tenants,
                        Err(e) => {
                            error!(job = job.name(), "cron tenant snapshot failed: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = job.run(&tenants).await {
                        error!(job = job.name(), "cron job failed: {e}");
                    }
                }
            });
        }
        Ok(())
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identifier(cud: &str) -> TenantIdentifier {
        TenantIdentifier::new(Some(cud), None, None)
    }

    #[test]
    fn set_tenants_info_is_a_total_replacement() {
        let scheduler = CronScheduler::new();
        scheduler
            .set_tenants_info(vec![identifier("c1"), identifier("c2")])
            .unwrap();
        scheduler.set_tenants_info(vec![identifier("c3")]).unwrap();
        assert_eq!(scheduler.tenants_info().unwrap(), vec![identifier("c3")]);
    }

    #[test]
    fn set_tenants_info_is_idempotent_and_dedupes() {
        let scheduler = CronScheduler::new();
        let tenants = vec![identifier("c2"), identifier("c1"), identifier("c1")];
        scheduler.set_tenants_info(tenants.clone()).unwrap();
        let first = scheduler.tenants_info().unwrap();
        scheduler.set_tenants_info(tenants).unwrap();
        assert_eq!(scheduler.tenants_info().unwrap(), first);
        assert_eq!(first, vec![identifier("c1"), identifier("c2")]);
    }
}
