use std::collections::HashMap;

use bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, InsertManyOptions, ReturnDocument,
};
use mongodb::{Database, IndexModel};
use rocket::futures::TryStreamExt;
use uuid::Uuid;

use super::{
    BatchOutcome, DirectoryStore, NotificationFilter, NotificationStore, SubmissionFilter,
    SubmissionStore, TaskStore,
};
use crate::data::class::{Class, School};
use crate::data::filter;
use crate::data::notification::{
    Notification, NotificationKind, NotificationRecord, RefModel,
};
use crate::data::submission::{EvaluationStatus, Submission};
use crate::data::task::{Task, TaskStatus};
use crate::data::{
    CLASS_COLLECTION_NAME, NOTIFICATION_COLLECTION_NAME, SCHOOL_COLLECTION_NAME,
    SUBMISSION_COLLECTION_NAME, TASK_COLLECTION_NAME,
};
use crate::error::StoreError;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Creates the indexes the engine relies on. Safe to call on every start.
pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    let unique_task_notification = IndexModel::builder()
        .keys(doc! { "refId": 1, "receiverId": 1, "refModel": 1 })
        .options(
            IndexOptions::builder()
                .name("unique_task_notification".to_string())
                .unique(true)
                .partial_filter_expression(doc! { "type": NotificationKind::Task.as_str() })
                .build(),
        )
        .build();
    db.collection::<Document>(NOTIFICATION_COLLECTION_NAME)
        .create_index(unique_task_notification, None)
        .await?;

    let submission_lookup = IndexModel::builder()
        .keys(doc! { "taskId": 1, "classId": 1, "studentId": 1 })
        .build();
    db.collection::<Document>(SUBMISSION_COLLECTION_NAME)
        .create_index(submission_lookup, None)
        .await?;

    Ok(())
}

fn submission_query(criteria: &SubmissionFilter) -> Document {
    let mut query = Document::new();
    if let Some(term) = criteria.term {
        query.insert("term", i64::from(term));
    }
    if let Some(week) = criteria.week {
        query.insert("week", i64::from(week));
    }
    if let Some(task_id) = criteria.task_id {
        query.insert("taskId", filter::uuid(task_id));
    }
    match criteria.class_ids.as_slice() {
        [] => {}
        [class_id] => {
            query.insert("classId", filter::uuid(*class_id));
        }
        class_ids => {
            query.insert("classId", doc! { "$in": filter::uuids(class_ids) });
        }
    }
    if let Some(student_id) = criteria.student_id {
        query.insert("studentId", filter::uuid(student_id));
    }
    if let Some(status) = criteria.evaluation_status {
        query.insert("evaluationStatus", status.as_str());
    }
    query
}

fn notification_query(criteria: &NotificationFilter) -> Document {
    let mut query = doc! {
        "type": criteria.kind.as_str(),
        "refModel": criteria.target.ref_model().as_str(),
        "refId": filter::uuid(criteria.target.task_id()),
    };
    if let Some(class_id) = criteria.target.class_id() {
        query.insert("refClass", filter::uuid(class_id));
    }
    if let Some(receivers) = &criteria.receivers {
        query.insert("receiverId", doc! { "$in": filter::uuids(receivers) });
    }
    if let Some(after) = criteria.created_after {
        query.insert(
            "createdAt",
            doc! { "$gte": bson::DateTime::from_chrono(after) },
        );
    }
    query
}

/// Outcome of an unordered insert of `total` documents that reported the
/// given write error codes. Duplicate key rejections are skips, not failures.
fn batch_outcome(total: usize, error_codes: &[i32]) -> BatchOutcome {
    let duplicates = error_codes
        .iter()
        .filter(|it| **it == DUPLICATE_KEY_CODE)
        .count();
    BatchOutcome {
        inserted: total.saturating_sub(error_codes.len()),
        duplicates,
        failed: error_codes.len() - duplicates,
    }
}

impl SubmissionStore for Database {
    async fn find_submissions(
        &self,
        criteria: &SubmissionFilter,
    ) -> Result<Vec<Submission>, StoreError> {
        let submissions = self
            .collection::<Submission>(SUBMISSION_COLLECTION_NAME)
            .find(submission_query(criteria), None)
            .await?
            .try_collect()
            .await?;
        Ok(submissions)
    }

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self
            .collection::<Submission>(SUBMISSION_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn count_task_submissions(&self, task_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .collection::<Document>(SUBMISSION_COLLECTION_NAME)
            .count_documents(doc! { "taskId": filter::uuid(task_id) }, None)
            .await?)
    }

    async fn complete_evaluation(
        &self,
        id: Uuid,
        score: Option<f64>,
    ) -> Result<Option<Submission>, StoreError> {
        let mut set = doc! { "evaluationStatus": EvaluationStatus::Completed.as_str() };
        if let Some(score) = score {
            set.insert("score", score);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .collection::<Submission>(SUBMISSION_COLLECTION_NAME)
            .find_one_and_update(filter::by_id(id), doc! { "$set": set }, options)
            .await?)
    }
}

impl TaskStore for Database {
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self
            .collection::<Task>(TASK_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?)
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .collection::<Task>(TASK_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": { "status": bson::to_bson(&status)? } },
                options,
            )
            .await?)
    }

    async fn find_assigned_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = self
            .collection::<Task>(TASK_COLLECTION_NAME)
            .find(
                doc! { "status": bson::to_bson(&TaskStatus::Assigned)? },
                None,
            )
            .await?
            .try_collect()
            .await?;
        Ok(tasks)
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = self
            .collection::<Task>(TASK_COLLECTION_NAME)
            .delete_one(filter::by_id(id), None)
            .await?;
        Ok(result.deleted_count > 0)
    }
}

impl DirectoryStore for Database {
    async fn get_classes(&self, ids: &[Uuid]) -> Result<Vec<Class>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let classes = self
            .collection::<Class>(CLASS_COLLECTION_NAME)
            .find(filter::by_ids(ids), None)
            .await?
            .try_collect()
            .await?;
        Ok(classes)
    }

    async fn school_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let schools: Vec<School> = self
            .collection::<School>(SCHOOL_COLLECTION_NAME)
            .find(None, None)
            .await?
            .try_collect()
            .await?;
        Ok(schools.into_iter().map(|it| it.id).collect())
    }

    async fn student_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let classes: Vec<Class> = self
            .collection::<Class>(CLASS_COLLECTION_NAME)
            .find(
                doc! { "participants.userId": { "$in": filter::uuids(ids) } },
                None,
            )
            .await?
            .try_collect()
            .await?;

        Ok(classes
            .iter()
            .flat_map(|class| class.roster())
            .filter(|it| ids.contains(&it.user_id))
            .map(|it| (it.user_id, it.display_name.clone()))
            .collect())
    }
}

impl NotificationStore for Database {
    async fn find_notifications(
        &self,
        criteria: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
        let records: Vec<NotificationRecord> = self
            .collection::<NotificationRecord>(NOTIFICATION_COLLECTION_NAME)
            .find(notification_query(criteria), options)
            .await?
            .try_collect()
            .await?;

        let mut notifications = Vec::with_capacity(records.len());
        for record in records {
            match Notification::try_from(record) {
                Ok(it) => notifications.push(it),
                Err(err) => tracing::warn!("Skipping malformed notification: {}", err),
            }
        }
        Ok(notifications)
    }

    async fn insert_notifications(
        &self,
        batch: Vec<Notification>,
    ) -> Result<BatchOutcome, StoreError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let total = batch.len();
        let records: Vec<NotificationRecord> = batch.into_iter().map(Into::into).collect();
        let options = InsertManyOptions::builder().ordered(false).build();

        let result = self
            .collection::<NotificationRecord>(NOTIFICATION_COLLECTION_NAME)
            .insert_many(records, options)
            .await;

        match result {
            Ok(inserted) => Ok(BatchOutcome {
                inserted: inserted.inserted_ids.len(),
                ..Default::default()
            }),
            Err(err) => match err.kind.as_ref() {
                ErrorKind::BulkWrite(failure) => {
                    let codes: Vec<i32> = failure
                        .write_errors
                        .iter()
                        .flatten()
                        .map(|it| it.code)
                        .collect();
                    Ok(batch_outcome(total, &codes))
                }
                _ => Err(err.into()),
            },
        }
    }

    async fn delete_task_notifications(
        &self,
        task_id: Uuid,
        receivers: &[Uuid],
    ) -> Result<u64, StoreError> {
        if receivers.is_empty() {
            return Ok(0);
        }
        let query = doc! {
            "type": NotificationKind::Task.as_str(),
            "refModel": RefModel::Task.as_str(),
            "refId": filter::uuid(task_id),
            "receiverId": { "$in": filter::uuids(receivers) },
        };
        let result = self
            .collection::<Document>(NOTIFICATION_COLLECTION_NAME)
            .delete_many(query, None)
            .await?;
        Ok(result.deleted_count)
    }
}
