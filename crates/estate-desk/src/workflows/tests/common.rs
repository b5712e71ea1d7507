use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::workflows::deals::{ConvertLeadRequest, UpdateDealStatusRequest};
use crate::workflows::domain::{
    Actor, DealStatus, DealView, LeadId, LeadStatus, PropertyId, PropertyRecord, PropertyStatus,
    Role, UserAccount, UserId, VisitId, VisitStatus,
};
use crate::workflows::http::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
use crate::workflows::leads::{CreateLeadRequest, UpdateLeadStatusRequest};
use crate::workflows::visits::{CreateVisitRequest, SetVisitStatusRequest};
use crate::workflows::{
    InMemoryNotificationOutbox, InMemoryPipelineStore, ManualClock, PipelineServices,
};

pub(super) const ADMIN: UserId = UserId(1);
pub(super) const BUYER: UserId = UserId(10);
pub(super) const OTHER_BUYER: UserId = UserId(11);
pub(super) const AGENT: UserId = UserId(20);
pub(super) const OTHER_AGENT: UserId = UserId(21);
pub(super) const INACTIVE_AGENT: UserId = UserId(22);
pub(super) const SELLER: UserId = UserId(30);

pub(super) const LISTING: PropertyId = PropertyId(100);
pub(super) const SECOND_LISTING: PropertyId = PropertyId(101);
pub(super) const SOLD_LISTING: PropertyId = PropertyId(102);
pub(super) const PENDING_LISTING: PropertyId = PropertyId(103);
pub(super) const AGENT_LISTING: PropertyId = PropertyId(104);

/// Monday 2025-06-02 09:00 UTC.
pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn admin() -> Actor {
    Actor::new(ADMIN, Role::Admin)
}

pub(super) fn buyer() -> Actor {
    Actor::new(BUYER, Role::Buyer)
}

pub(super) fn other_buyer() -> Actor {
    Actor::new(OTHER_BUYER, Role::Buyer)
}

pub(super) fn agent() -> Actor {
    Actor::new(AGENT, Role::Agent)
}

pub(super) fn other_agent() -> Actor {
    Actor::new(OTHER_AGENT, Role::Agent)
}

pub(super) fn seller() -> Actor {
    Actor::new(SELLER, Role::Seller)
}

fn account(id: UserId, name: &str, role: Role, is_active: bool, age_days: i64) -> UserAccount {
    UserAccount {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        role,
        is_active,
        created_at: start() - Duration::days(age_days),
    }
}

fn listing(id: PropertyId, title: &str, status: PropertyStatus, seller: UserId) -> PropertyRecord {
    PropertyRecord {
        id,
        title: title.to_string(),
        location: Some("Riverside".to_string()),
        price: Some(450_000.0),
        status,
        seller_id: Some(seller),
    }
}

pub(super) type Services = PipelineServices<InMemoryPipelineStore, InMemoryNotificationOutbox>;

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryPipelineStore>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) outbox: Arc<InMemoryNotificationOutbox>,
    pub(super) services: Services,
}

impl Harness {
    pub(super) fn new() -> Self {
        let store = Arc::new(InMemoryPipelineStore::new(&StoreConfig {
            lock_timeout: StdDuration::from_secs(2),
            seed_demo_data: false,
        }));
        let users = [
            account(ADMIN, "Ada Admin", Role::Admin, true, 90),
            account(BUYER, "Bea Buyer", Role::Buyer, true, 20),
            account(OTHER_BUYER, "Ben Buyer", Role::Buyer, true, 15),
            account(AGENT, "Alma Agent", Role::Agent, true, 60),
            account(OTHER_AGENT, "Otto Agent", Role::Agent, true, 30),
            account(INACTIVE_AGENT, "Ivy Agent", Role::Agent, false, 120),
            account(SELLER, "Sam Seller", Role::Seller, true, 40),
        ];
        for user in users {
            store.upsert_user(user).expect("seed user");
        }
        let listings = [
            listing(LISTING, "Lakeside Bungalow", PropertyStatus::Approved, SELLER),
            listing(SECOND_LISTING, "Hilltop Villa", PropertyStatus::Approved, SELLER),
            listing(SOLD_LISTING, "Old Mill Loft", PropertyStatus::Sold, SELLER),
            listing(PENDING_LISTING, "Harbor Studio", PropertyStatus::Pending, SELLER),
            listing(AGENT_LISTING, "Agent Owned Cottage", PropertyStatus::Approved, OTHER_AGENT),
        ];
        for record in listings {
            store.upsert_property(record).expect("seed property");
        }

        let clock = Arc::new(ManualClock::new(start()));
        let outbox = Arc::new(InMemoryNotificationOutbox::default());
        let services = PipelineServices::new(store.clone(), outbox.clone(), clock.clone());
        Self {
            store,
            clock,
            outbox,
            services,
        }
    }

    pub(super) fn set_property_status(&self, id: PropertyId, status: PropertyStatus) {
        use crate::workflows::repository::PropertyDirectory;
        self.store
            .set_property_status(id, status)
            .expect("property status");
    }

    pub(super) fn property_status(&self, id: PropertyId) -> PropertyStatus {
        use crate::workflows::repository::PropertyDirectory;
        self.store
            .property(id)
            .expect("read property")
            .expect("property exists")
            .status
    }

    pub(super) fn lead_status(&self, id: LeadId) -> LeadStatus {
        use crate::workflows::repository::LeadRepository;
        self.store
            .fetch_lead(id)
            .expect("read lead")
            .expect("lead exists")
            .status
    }

    pub(super) fn visit_status(&self, id: VisitId) -> VisitStatus {
        use crate::workflows::repository::VisitRepository;
        self.store
            .fetch_visit(id)
            .expect("read visit")
            .expect("visit exists")
            .status
    }

    /// Buyer inquiry on the main listing, routed to `AGENT`.
    pub(super) fn new_lead(&self) -> LeadId {
        self.services
            .leads
            .create_lead(
                &buyer(),
                CreateLeadRequest {
                    property_id: LISTING,
                    message: Some("Is the garden south facing?".to_string()),
                },
            )
            .expect("lead created")
            .lead
            .id
    }

    pub(super) fn advance_lead(&self, lead: LeadId, status: LeadStatus) {
        self.services
            .leads
            .update_status(&agent(), lead, UpdateLeadStatusRequest { status })
            .expect("lead status advanced");
    }

    pub(super) fn contacted_lead(&self) -> LeadId {
        let lead = self.new_lead();
        self.advance_lead(lead, LeadStatus::Contacted);
        lead
    }

    pub(super) fn book_visit(&self, lead: LeadId, date: &str, time: &str) -> VisitId {
        self.services
            .visits
            .create_visit(
                &buyer(),
                CreateVisitRequest {
                    inquiry_id: lead,
                    visit_date: date.to_string(),
                    visit_time: time.to_string(),
                    notes: None,
                },
            )
            .expect("visit booked")
            .visit
            .id
    }

    pub(super) fn complete_visit(&self, visit: VisitId) {
        self.services
            .visits
            .set_status(
                &agent(),
                visit,
                SetVisitStatusRequest {
                    status: VisitStatus::Completed,
                    notes: None,
                },
            )
            .expect("visit completed");
    }

    /// Lead in `visit_scheduled` whose only visit (2025-06-03 10:00) is completed; clock at 11:00.
    pub(super) fn qualified_lead(&self) -> (LeadId, VisitId) {
        let lead = self.contacted_lead();
        let visit = self.book_visit(lead, "2025-06-03", "10:00");
        self.advance_lead(lead, LeadStatus::VisitScheduled);
        self.clock.set(at(3, 11));
        self.complete_visit(visit);
        (lead, visit)
    }

    pub(super) fn convert(&self, lead: LeadId, offer_price: Option<f64>) -> DealView {
        self.services
            .deals
            .convert_lead(&agent(), conversion(lead, offer_price))
            .expect("lead converted")
    }

    /// Converted deal moved along the graph to `status`.
    pub(super) fn deal_in(&self, status: DealStatus, offer_price: f64) -> (LeadId, DealView) {
        let (lead, _) = self.qualified_lead();
        let mut deal = self.convert(lead, Some(offer_price));
        let path: &[DealStatus] = match status {
            DealStatus::Open => &[],
            DealStatus::Negotiation => &[DealStatus::Negotiation],
            DealStatus::AgreementPending => {
                &[DealStatus::Negotiation, DealStatus::AgreementPending]
            }
            other => panic!("use update_status to reach {other:?}"),
        };
        for next in path {
            deal = self
                .services
                .deals
                .update_status(&agent(), deal.deal.id, status_change(*next, None))
                .expect("deal advanced");
        }
        (lead, deal)
    }
}

pub(super) fn conversion(lead: LeadId, offer_price: Option<f64>) -> ConvertLeadRequest {
    ConvertLeadRequest {
        inquiry_id: lead,
        offer_price,
        message: None,
        admin_override: false,
        override_reason: None,
    }
}

pub(super) fn status_change(status: DealStatus, final_price: Option<f64>) -> UpdateDealStatusRequest {
    UpdateDealStatusRequest {
        status,
        final_price,
        notes: None,
    }
}

pub(super) fn json_request(method: Method, uri: &str, actor: Option<Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(ACTOR_ID_HEADER, actor.id.to_string())
            .header(ACTOR_ROLE_HEADER, actor.role.label());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
