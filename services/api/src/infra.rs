use chrono::{DateTime, Duration, Utc};
use estate_desk::config::StoreConfig;
use estate_desk::workflows::domain::{
    PropertyId, PropertyRecord, PropertyStatus, Role, UserAccount, UserId,
};
use estate_desk::workflows::{
    Clock, InMemoryNotificationOutbox, InMemoryPipelineStore, PipelineServices, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type Services = PipelineServices<InMemoryPipelineStore, InMemoryNotificationOutbox>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_ADMIN: UserId = UserId(1);
pub(crate) const DEMO_BUYER: UserId = UserId(10);
pub(crate) const DEMO_SELLER: UserId = UserId(30);
pub(crate) const DEMO_LISTING: PropertyId = PropertyId(100);

/// Identity and property directory rows for local runs and the demo.
pub(crate) fn seed_directory(
    store: &InMemoryPipelineStore,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let accounts = [
        (DEMO_ADMIN, "Ada Admin", "ada@estate-desk.test", Role::Admin, 365),
        (DEMO_BUYER, "Priya Raman", "priya@estate-desk.test", Role::Buyer, 20),
        (UserId(11), "Tom Becker", "tom@estate-desk.test", Role::Buyer, 12),
        (UserId(20), "Marco Silva", "marco@estate-desk.test", Role::Agent, 200),
        (UserId(21), "Lena Ortiz", "lena@estate-desk.test", Role::Agent, 90),
        (DEMO_SELLER, "Sofia Lind", "sofia@estate-desk.test", Role::Seller, 45),
    ];
    for (id, name, email, role, age_days) in accounts {
        store.upsert_user(UserAccount {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            is_active: true,
            created_at: now - Duration::days(age_days),
        })?;
    }

    let listings = [
        (DEMO_LISTING, "Lakeside Bungalow", "Austin, TX", 485_000.0, PropertyStatus::Approved),
        (PropertyId(101), "Elm Street Townhouse", "Denver, CO", 372_500.0, PropertyStatus::Approved),
        (PropertyId(102), "Harbor View Loft", "Seattle, WA", 640_000.0, PropertyStatus::Pending),
    ];
    for (id, title, location, price, status) in listings {
        store.upsert_property(PropertyRecord {
            id,
            title: title.to_string(),
            location: Some(location.to_string()),
            price: Some(price),
            status,
            seller_id: Some(DEMO_SELLER),
        })?;
    }

    info!(
        users = accounts.len(),
        properties = listings.len(),
        "seeded demo directory"
    );
    Ok(())
}

/// Store, outbox, and services wired together; the directory is seeded when configured.
pub(crate) fn build_services(
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> Result<(Services, Arc<InMemoryNotificationOutbox>), RepositoryError> {
    let store = Arc::new(InMemoryPipelineStore::new(config));
    if config.seed_demo_data {
        seed_directory(&store, clock.now())?;
    }
    let outbox = Arc::new(InMemoryNotificationOutbox::default());
    let services = PipelineServices::new(store, Arc::clone(&outbox), clock);
    Ok((services, outbox))
}
