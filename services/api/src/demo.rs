use crate::infra::{build_services, Services, DEMO_ADMIN, DEMO_BUYER, DEMO_LISTING};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::Args;
use estate_desk::config::StoreConfig;
use estate_desk::error::AppError;
use estate_desk::workflows::deals::{ConvertLeadRequest, UpdateDealStatusRequest};
use estate_desk::workflows::domain::{
    Actor, DealId, DealStatus, LeadId, LeadStatus, Role, VisitStatus,
};
use estate_desk::workflows::leads::{CreateLeadRequest, UpdateLeadStatusRequest};
use estate_desk::workflows::visits::{CreateVisitRequest, SetVisitStatusRequest};
use estate_desk::workflows::{
    Clock, ConflictReason, InMemoryNotificationOutbox, ManualClock, PipelineError,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Day the buyer sends the inquiry (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Offer recorded when the agent converts the lead.
    #[arg(long, default_value_t = 470_000.0)]
    pub(crate) offer_price: f64,
    /// Agreed price when the deal closes.
    #[arg(long, default_value_t = 478_500.0)]
    pub(crate) final_price: f64,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

struct Walkthrough {
    services: Services,
    outbox: Arc<InMemoryNotificationOutbox>,
    clock: Arc<ManualClock>,
    buyer: Actor,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        offer_price,
        final_price,
    } = args;

    let start = start.unwrap_or_else(|| Utc::now().date_naive());
    let opening = at(start, 9)?;
    let clock = Arc::new(ManualClock::new(opening));
    let config = StoreConfig {
        seed_demo_data: true,
        ..StoreConfig::default()
    };
    let (services, outbox) =
        build_services(&config, Arc::clone(&clock) as Arc<dyn Clock>).map_err(PipelineError::from)?;

    let demo = Walkthrough {
        services,
        outbox,
        clock,
        buyer: Actor::new(DEMO_BUYER, Role::Buyer),
    };

    println!("Estate desk pipeline demo (starting {})", start.format("%Y-%m-%d"));
    let (lead, agent) = demo.inquiry()?;
    demo.qualify(lead, agent, start)?;
    let deal = demo.convert(lead, agent, offer_price)?;
    demo.close(deal, agent, final_price)?;
    demo.summarize(lead, deal)?;
    Ok(())
}

fn at(day: NaiveDate, hour: u32) -> Result<DateTime<Utc>, PipelineError> {
    NaiveTime::from_hms_opt(hour, 0, 0)
        .map(|time| day.and_time(time).and_utc())
        .ok_or_else(|| PipelineError::validation("start", "hour out of range"))
}

impl Walkthrough {
    fn inquiry(&self) -> Result<(LeadId, Actor), PipelineError> {
        let view = self.services.leads.create_lead(
            &self.buyer,
            CreateLeadRequest {
                property_id: DEMO_LISTING,
                message: Some("Is the dock included in the sale?".to_string()),
            },
        )?;
        let agent_id = view
            .lead
            .agent_id
            .ok_or(PipelineError::Conflict(ConflictReason::NoAssignedAgent))?;
        println!(
            "1. inquiry #{} on '{}' -> status {}, routed to agent {}",
            view.lead.id,
            view.property
                .as_ref()
                .map(|property| property.title.as_str())
                .unwrap_or("unknown listing"),
            view.lead.status.label(),
            agent_id
        );
        Ok((view.lead.id, Actor::new(agent_id, Role::Agent)))
    }

    fn qualify(&self, lead: LeadId, agent: Actor, start: NaiveDate) -> Result<(), PipelineError> {
        let contacted = self.services.leads.update_status(
            &agent,
            lead,
            UpdateLeadStatusRequest {
                status: LeadStatus::Contacted,
            },
        )?;
        println!("2. agent reached out -> lead {}", contacted.lead.status.label());

        let visit_day = start + Duration::days(1);
        let visit = self.services.visits.create_visit(
            &self.buyer,
            CreateVisitRequest {
                inquiry_id: lead,
                visit_date: visit_day.format("%Y-%m-%d").to_string(),
                visit_time: "10:00".to_string(),
                notes: Some("Bring the survey".to_string()),
            },
        )?;
        let scheduled = self.services.leads.update_status(
            &agent,
            lead,
            UpdateLeadStatusRequest {
                status: LeadStatus::VisitScheduled,
            },
        )?;
        println!(
            "3. visit #{} booked for {} 10:00 UTC -> visit {}, lead {}",
            visit.visit.id,
            visit_day.format("%Y-%m-%d"),
            visit.visit.status.label(),
            scheduled.lead.status.label()
        );

        self.clock.set(at(visit_day, 11)?);
        let completed = self.services.visits.set_status(
            &agent,
            visit.visit.id,
            SetVisitStatusRequest {
                status: VisitStatus::Completed,
                notes: Some("Buyer wants to move fast".to_string()),
            },
        )?;
        println!("4. viewing done -> visit {}", completed.visit.status.label());
        Ok(())
    }

    fn convert(&self, lead: LeadId, agent: Actor, offer_price: f64) -> Result<DealId, PipelineError> {
        let deal = self.services.deals.convert_lead(
            &agent,
            ConvertLeadRequest {
                inquiry_id: lead,
                offer_price: Some(offer_price),
                message: Some("Offer subject to inspection".to_string()),
                admin_override: false,
                override_reason: None,
            },
        )?;
        println!(
            "5. converted -> deal #{} {} at {:.2}, lead {}",
            deal.deal.id,
            deal.deal.status.label(),
            offer_price,
            deal.lead
                .as_ref()
                .map(|summary| summary.status.label())
                .unwrap_or("unknown")
        );

        let retry = self.services.deals.convert_lead(
            &Actor::new(DEMO_ADMIN, Role::Admin),
            ConvertLeadRequest {
                inquiry_id: lead,
                offer_price: Some(offer_price),
                message: None,
                admin_override: false,
                override_reason: None,
            },
        );
        if let Err(err) = retry {
            println!(
                "   second conversion rejected: {}",
                err.conflict_code().unwrap_or("unexpected error")
            );
        }
        Ok(deal.deal.id)
    }

    fn close(&self, deal: DealId, agent: Actor, final_price: f64) -> Result<(), PipelineError> {
        let steps = [
            (DealStatus::Negotiation, None),
            (DealStatus::AgreementPending, None),
            (DealStatus::ClosedWon, Some(final_price)),
        ];
        for (index, (status, price)) in steps.into_iter().enumerate() {
            self.clock.advance(Duration::days(2));
            let view = self.services.deals.update_status(
                &agent,
                deal,
                UpdateDealStatusRequest {
                    status,
                    final_price: price,
                    notes: None,
                },
            )?;
            println!("{}. deal -> {}", index + 6, view.deal.status.label());
        }
        Ok(())
    }

    fn summarize(&self, lead: LeadId, deal: DealId) -> Result<(), PipelineError> {
        let admin = Actor::new(DEMO_ADMIN, Role::Admin);
        let lead = self.services.leads.get_lead(&admin, lead)?;
        let deal_view = self.services.deals.get_deal(&admin, deal)?;
        let trail = self.services.deals.audit_trail(&admin, deal)?;

        println!("\nOutcome");
        println!("  lead: {}", lead.lead.status.label());
        println!(
            "  property: {}",
            deal_view
                .property
                .as_ref()
                .map(|property| property.status.label())
                .unwrap_or("unknown")
        );
        if let Some(price) = deal_view.deal.final_price {
            println!("  final price: {price:.2}");
        }
        println!("  audit trail (newest first):");
        for entry in &trail {
            println!("    - {}", entry.action.label());
        }
        println!("  notifications queued: {}", self.outbox.events().len());
        Ok(())
    }
}
