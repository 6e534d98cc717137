//! Job card lifecycle on top of the fan-out writer.

use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    store_timestamp, CreateJobCard, JobCard, JobCardPage, JobCardStatus, SequenceKind,
    UpdateJobCard, YearMonth, JOBCARDS,
};
use crate::services::fanout::{FanoutEvent, FanoutWriter};
use crate::services::numbering::SequenceAllocator;
use crate::services::store::{get_as, query_as, DocumentStore, FilterOp, Query, SortOrder};
use crate::services::workflow::Transition;

const DATE_CREATED: &str = "dateCreated";

pub struct JobCardService {
    store: Arc<dyn DocumentStore>,
    fanout: FanoutWriter,
    sequences: SequenceAllocator,
}

impl JobCardService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            fanout: FanoutWriter::new(Arc::clone(&store)),
            sequences: SequenceAllocator::new(Arc::clone(&store)),
            store,
        }
    }

    /// Open a new job card with the next number of its month.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateJobCard) -> Result<JobCard, AppError> {
        let input = input.trimmed();
        input.validate()?;

        let date_created = store_timestamp(input.date_created.unwrap_or_else(Utc::now));
        let jobcard_number = self
            .sequences
            .next(SequenceKind::JobCard, YearMonth::of(&date_created))
            .await?;

        let card = JobCard {
            id: Uuid::new_v4().to_string(),
            jobcard_number,
            date_created,
            vehicle_registration: input.vehicle_registration.trim().to_uppercase(),
            customer_name: input.customer_name,
            mobile_number: input.mobile_number,
            gst_number: input.gst_number,
            address: input.address,
            chassis_number: input.chassis_number,
            kilometer: input.kilometer,
            model: input.model,
            work_type: input.work_type,
            complaints: clean_complaints(input.complaints),
            status: JobCardStatus::Open,
        };

        self.fanout.create(&card).await?;
        info!(jobcard_id = %card.id, number = %card.jobcard_number, "Job card opened");
        Ok(card)
    }

    pub async fn get(&self, id: &str) -> Result<JobCard, AppError> {
        get_as(self.store.as_ref(), JOBCARDS, id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Job card {} not found", id)))
    }

    /// Move a card to another status. Any status may follow any other.
    #[instrument(skip(self))]
    pub async fn change_status(&self, id: &str, status: JobCardStatus) -> Result<JobCard, AppError> {
        let before = self.get(id).await?;
        let transition = Transition::new(before.status, status);

        let mut after = before.clone();
        after.status = status;
        self.fanout
            .update(&before, &after, FanoutEvent::StatusChange)
            .await?;

        info!(
            jobcard_id = %id,
            from = %transition.from,
            to = %transition.to,
            moved = transition.moves_collection(),
            reopened = transition.is_reopen(),
            "Job card status changed"
        );
        Ok(after)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: UpdateJobCard) -> Result<JobCard, AppError> {
        let before = self.get(id).await?;
        let mut after = before.clone();
        input.apply(&mut after);
        after.complaints = clean_complaints(after.complaints);

        if after.vehicle_registration.trim().is_empty() || after.customer_name.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Vehicle registration and customer name are required"
            )));
        }

        self.fanout.update(&before, &after, FanoutEvent::Edit).await?;
        info!(jobcard_id = %id, "Job card updated");
        Ok(after)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let card = self.get(id).await?;
        self.fanout.delete(&card).await?;
        info!(jobcard_id = %id, number = %card.jobcard_number, "Job card deleted");
        Ok(())
    }

    /// Newest-first page of cards in one status. `cursor` is the
    /// `next_cursor` of the previous page.
    pub async fn list_by_status(
        &self,
        status: JobCardStatus,
        limit: usize,
        cursor: Option<i64>,
    ) -> Result<JobCardPage, AppError> {
        let limit = limit.max(1);
        let mut query = Query::new()
            .order_by(DATE_CREATED, SortOrder::Descending)
            .limit(limit);
        if let Some(cursor) = cursor {
            query = query.start_after(cursor);
        }

        let items: Vec<JobCard> = query_as(self.store.as_ref(), status.collection(), &query).await?;
        let next_cursor = (items.len() == limit)
            .then(|| items.last().map(|card| card.date_created.timestamp_millis()))
            .flatten();
        Ok(JobCardPage { items, next_cursor })
    }

    /// Cards created in `[from, to)`, newest first.
    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<JobCard>, AppError> {
        if from >= to {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Start of range must be before its end"
            )));
        }
        let query = Query::new()
            .filter(DATE_CREATED, FilterOp::Gte, from.timestamp_millis())
            .filter(DATE_CREATED, FilterOp::Lt, to.timestamp_millis())
            .order_by(DATE_CREATED, SortOrder::Descending);
        query_as(self.store.as_ref(), JOBCARDS, &query).await
    }

    /// Every card of one month, read from its partition, newest first.
    pub async fn list_month(&self, year_month: YearMonth) -> Result<Vec<JobCard>, AppError> {
        let query = Query::new().order_by(DATE_CREATED, SortOrder::Descending);
        query_as(self.store.as_ref(), &year_month.partition(JOBCARDS), &query).await
    }
}

fn clean_complaints(complaints: Vec<String>) -> Vec<String> {
    complaints
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
