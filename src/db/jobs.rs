use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};

use super::DbConn;
use crate::models::{Job, User};
use crate::utils::ApiError;

pub const JOBS: &str = "jobs";
pub const USERS: &str = "users";

pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {} ID", what)))
}

pub async fn load_job(db: &DbConn, job_id: &str) -> Result<Job, ApiError> {
    let id = parse_id(job_id, "job")?;
    db.collection::<Job>(JOBS)
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

pub async fn insert_job(db: &DbConn, job: &mut Job, now: DateTime) -> Result<ObjectId, ApiError> {
    job.prepare_for_save(now);
    job.version = 0;

    let result = db.collection::<Job>(JOBS).insert_one(&*job, None).await?;
    let id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Invalid job ID"))?;
    job.id = Some(id);
    Ok(id)
}

/// Writes the whole job back, but only if nobody saved it since it was
/// loaded. A stale copy yields 409 and the caller's change is dropped.
pub async fn save_job(db: &DbConn, job: &mut Job, now: DateTime) -> Result<(), ApiError> {
    let id = job
        .id
        .ok_or_else(|| ApiError::internal_error("Cannot save a job without an ID"))?;
    let loaded_version = stamp_for_save(job, now);

    let result = db
        .collection::<Job>(JOBS)
        .replace_one(version_filter(id, loaded_version), &*job, None)
        .await?;

    if result.matched_count == 0 {
        return Err(version_conflict(job, loaded_version));
    }
    Ok(())
}

/// Normalizes the job and bumps its version. Returns the version it was loaded at.
pub(crate) fn stamp_for_save(job: &mut Job, now: DateTime) -> i64 {
    let loaded_version = job.version;
    job.prepare_for_save(now);
    job.version = loaded_version + 1;
    loaded_version
}

/// Matches the stored document only while it is still at `loaded_version`.
pub(crate) fn version_filter(id: ObjectId, loaded_version: i64) -> Document {
    // Documents written before versioning have no field at all.
    if loaded_version == 0 {
        doc! {
            "_id": id,
            "$or": [{ "version": 0_i64 }, { "version": { "$exists": false } }],
        }
    } else {
        doc! { "_id": id, "version": loaded_version }
    }
}

/// Restores the loaded version after a lost race.
pub(crate) fn version_conflict(job: &mut Job, loaded_version: i64) -> ApiError {
    job.version = loaded_version;
    ApiError::conflict("The job was changed by someone else. Reload and try again.")
}

pub async fn find_user(db: &DbConn, user_id: &ObjectId) -> Result<Option<User>, ApiError> {
    Ok(db
        .collection::<User>(USERS)
        .find_one(doc! { "_id": user_id }, None)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use mongodb::bson::{from_document, to_document, Bson};
    use rocket::http::Status;

    #[test]
    fn fresh_job_matches_version_zero_or_missing() {
        let id = ObjectId::new();
        let filter = version_filter(id, 0);

        assert_eq!(filter.get_object_id("_id").unwrap(), id);
        assert!(filter.get("version").is_none());
        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0], Bson::Document(doc! { "version": 0_i64 }));
        assert_eq!(
            branches[1],
            Bson::Document(doc! { "version": { "$exists": false } })
        );
    }

    #[test]
    fn saved_job_matches_only_its_loaded_version() {
        let id = ObjectId::new();
        let filter = version_filter(id, 3);

        assert_eq!(filter, doc! { "_id": id, "version": 3_i64 });
        assert!(filter.get("$or").is_none());
        // A copy loaded at 3 must not match a document already at 4.
        assert_ne!(filter, version_filter(id, 4));
    }

    #[test]
    fn stamping_bumps_the_version_and_a_conflict_restores_it() {
        let mut job = open_job(ObjectId::new());
        job.version = 3;

        let loaded = stamp_for_save(&mut job, now());
        assert_eq!(loaded, 3);
        assert_eq!(job.version, 4);
        assert_eq!(job.updated_at, now());

        let err = version_conflict(&mut job, loaded);
        assert_eq!(err.status, Status::Conflict);
        assert_eq!(job.version, 3);
    }

    #[test]
    fn legacy_document_without_version_saves_against_the_missing_field() {
        let mut stored = to_document(&open_job(ObjectId::new())).unwrap();
        stored.remove("version");
        let mut job: Job = from_document(stored).unwrap();
        assert_eq!(job.version, 0);

        let loaded = stamp_for_save(&mut job, now());
        let filter = version_filter(job.id.unwrap(), loaded);

        assert_eq!(job.version, 1);
        assert!(filter.get_array("$or").is_ok());
    }
}
