use std::sync::Arc;

use axum::Router;

use super::clock::Clock;
use super::deals::{deal_router, DealEngine};
use super::leads::{lead_router, LeadRegistry};
use super::notifications::NotificationPublisher;
use super::repository::PipelineStore;
use super::visits::{visit_router, VisitScheduler};

/// The three pipeline services wired over one store, notification sink, and clock.
pub struct PipelineServices<S, N> {
    pub leads: Arc<LeadRegistry<S>>,
    pub visits: Arc<VisitScheduler<S>>,
    pub deals: Arc<DealEngine<S, N>>,
}

impl<S, N> Clone for PipelineServices<S, N> {
    fn clone(&self) -> Self {
        Self {
            leads: Arc::clone(&self.leads),
            visits: Arc::clone(&self.visits),
            deals: Arc::clone(&self.deals),
        }
    }
}

impl<S, N> PipelineServices<S, N>
where
    S: PipelineStore,
    N: NotificationPublisher,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            leads: Arc::new(LeadRegistry::new(Arc::clone(&store), Arc::clone(&clock))),
            visits: Arc::new(VisitScheduler::new(Arc::clone(&store), Arc::clone(&clock))),
            deals: Arc::new(DealEngine::new(store, notifications, clock)),
        }
    }
}

/// Every pipeline endpoint, unprefixed. The service binary nests this under its API version.
pub fn pipeline_router<S, N>(services: &PipelineServices<S, N>) -> Router
where
    S: PipelineStore,
    N: NotificationPublisher,
{
    Router::new()
        .merge(lead_router(Arc::clone(&services.leads)))
        .merge(visit_router(Arc::clone(&services.visits)))
        .merge(deal_router(Arc::clone(&services.deals)))
}
